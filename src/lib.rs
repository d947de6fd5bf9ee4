pub mod cli;
pub mod conditions;
pub mod data;
pub mod parallel;
pub mod race;
pub mod simulation;
