use std::path::Path;
use std::sync::Arc;

use crate::conditions::ConditionTable;
use crate::data::{data_dir_from_env, load_single, validate_dataset, DataError, Dataset, ValidationSeverity};
use crate::parallel::WorkerPool;
use crate::race::{Course, HorseDescriptor};
use crate::simulation::{
    compare_skill, export_runs_csv, rank_skills, CompareRequest, Scenario, DEFAULT_CI_WIDTH, DEFAULT_SAMPLES,
};

const USAGE: &str = "usage: racesim <compare|rank|validate>";
const COMPARE_USAGE: &str = "usage: racesim compare <course> <horse> <skill-id> [--samples N] [--seed S] \
[--ci W] [--raw] [--mood-sweep] [--export-csv PATH]";
const RANK_USAGE: &str = "usage: racesim rank <course> <horse> [skill-id ...] [--samples N] [--seed S] [--ci W]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Compare,
    Rank,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("compare") => Some(Command::Compare),
        Some("rank") => Some(Command::Rank),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Compare) => handle_compare(args),
        Some(Command::Rank) => handle_rank(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

/// Positional arguments and flags after the subcommand.
#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    samples: Option<String>,
    seed: Option<String>,
    ci: Option<String>,
    export_csv: Option<String>,
    raw: bool,
    mood_sweep: bool,
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(2);
    while let Some(arg) = iter.next() {
        let slot = match arg.as_str() {
            "--raw" => {
                options.raw = true;
                continue;
            }
            "--mood-sweep" => {
                options.mood_sweep = true;
                continue;
            }
            "--samples" => &mut options.samples,
            "--seed" => &mut options.seed,
            "--ci" => &mut options.ci,
            "--export-csv" => &mut options.export_csv,
            flag if flag.starts_with("--") => return Err(format!("unknown flag '{flag}'")),
            _ => {
                options.positional.push(arg.clone());
                continue;
            }
        };
        match iter.next() {
            Some(value) => *slot = Some(value.clone()),
            None => return Err(format!("missing value for '{arg}'")),
        }
    }
    Ok(options)
}

fn load_dataset() -> Result<Dataset, DataError> {
    Dataset::load(data_dir_from_env())
}

/// A numeric course id from the dataset, or a path to a course file.
fn resolve_course(dataset: &Dataset, raw: &str) -> Result<Arc<Course>, DataError> {
    match raw.parse::<u32>() {
        Ok(id) => dataset.course(id),
        Err(_) => {
            let course: Course = load_single(raw)?;
            course.validate()?;
            Ok(Arc::new(course))
        }
    }
}

/// A path to a horse file, or a horse name from the dataset.
fn resolve_horse(dataset: &Dataset, raw: &str) -> Result<HorseDescriptor, DataError> {
    if Path::new(raw).is_file() {
        load_single(raw)
    } else {
        dataset.horse(raw).cloned()
    }
}

fn load_inputs(course: &str, horse: &str) -> Result<(Dataset, Arc<Course>, HorseDescriptor), DataError> {
    let dataset = load_dataset()?;
    let course = resolve_course(&dataset, course)?;
    let horse = resolve_horse(&dataset, horse)?;
    Ok((dataset, course, horse))
}

fn print_json<T: serde::Serialize>(value: &T, what: &str) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

fn handle_compare(args: &[String]) -> i32 {
    let options = match parse_options(args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}\n{COMPARE_USAGE}");
            return 2;
        }
    };
    let [course, horse, skill] = options.positional.as_slice() else {
        eprintln!("{COMPARE_USAGE}");
        return 2;
    };

    let (dataset, course, horse) = match load_inputs(course, horse) {
        Ok(inputs) => inputs,
        Err(err) => {
            eprintln!("failed to load inputs: {err}");
            return 1;
        }
    };
    let request = CompareRequest {
        course: (*course).clone(),
        params: dataset.params.clone(),
        horse,
        skill: skill.clone(),
        samples: parse_usize_arg(options.samples.as_ref(), "samples", DEFAULT_SAMPLES),
        seed: parse_u32_arg(options.seed.as_ref(), "seed", 0),
        mood_sweep: options.mood_sweep,
        ci_width: parse_f64_arg(options.ci.as_ref(), "ci", DEFAULT_CI_WIDTH),
        raw: options.raw,
    };

    let table = ConditionTable::standard();
    let (response, comparison) = match compare_skill(&request, &table, &dataset.skills, &WorkerPool::from_env()) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("comparison failed: {err}");
            return 1;
        }
    };

    if let Some(path) = &options.export_csv {
        if let Err(err) = export_runs_csv(&comparison.runs, path) {
            eprintln!("csv export failed: {err}");
            return 1;
        }
    }
    print_json(&response, "comparison result")
}

fn handle_rank(args: &[String]) -> i32 {
    let options = match parse_options(args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}\n{RANK_USAGE}");
            return 2;
        }
    };
    let [course, horse, candidates @ ..] = options.positional.as_slice() else {
        eprintln!("{RANK_USAGE}");
        return 2;
    };

    let (dataset, course, horse) = match load_inputs(course, horse) {
        Ok(inputs) => inputs,
        Err(err) => {
            eprintln!("failed to load inputs: {err}");
            return 1;
        }
    };
    let scenario = Scenario {
        course,
        params: dataset.params.clone(),
        horse,
        samples: parse_usize_arg(options.samples.as_ref(), "samples", DEFAULT_SAMPLES),
        seed: parse_u32_arg(options.seed.as_ref(), "seed", 0),
    };
    let ci_width = parse_f64_arg(options.ci.as_ref(), "ci", DEFAULT_CI_WIDTH);

    let table = ConditionTable::standard();
    match rank_skills(
        &scenario,
        candidates,
        ci_width,
        &table,
        &dataset.skills,
        &WorkerPool::from_env(),
    ) {
        Ok(ranked) => print_json(&ranked, "ranking"),
        Err(err) => {
            eprintln!("ranking failed: {err}");
            1
        }
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let dir = args
        .get(2)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(data_dir_from_env);

    let dataset = match Dataset::load(&dir) {
        Ok(dataset) => dataset,
        Err(err) => {
            eprintln!("validation failed: {err}");
            return 1;
        }
    };
    let report = validate_dataset(&dataset, &ConditionTable::standard());
    for diagnostic in &report.diagnostics {
        eprintln!("- {diagnostic}");
    }
    if report.has_errors() {
        eprintln!(
            "validation failed: {} error(s), {} warning(s)",
            report.count(ValidationSeverity::Error),
            report.count(ValidationSeverity::Warning)
        );
        1
    } else {
        println!(
            "validation passed: {} ({} warning(s))",
            dir.display(),
            report.count(ValidationSeverity::Warning)
        );
        0
    }
}

fn parse_u32_arg(raw: Option<&String>, name: &str, default: u32) -> u32 {
    raw.and_then(|value| value.parse::<u32>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_usize_arg(raw: Option<&String>, name: &str, default: usize) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_f64_arg(raw: Option<&String>, name: &str, default: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}
