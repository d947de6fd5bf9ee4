//! CSV dump of the representative runs, one row per recorded step.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::simulation::compare::{RepresentativeRuns, Trajectory};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unable to create '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct StepRow<'a> {
    run: &'a str,
    side: &'a str,
    trial: usize,
    t: f64,
    pos: f64,
    v: f64,
    hp: f64,
}

fn write_path<W: Write>(
    writer: &mut csv::Writer<W>,
    run: &str,
    side: &str,
    trial: usize,
    path: &Trajectory,
) -> Result<usize, csv::Error> {
    for i in 0..path.len() {
        writer.serialize(StepRow {
            run,
            side,
            trial,
            t: path.t[i],
            pos: path.pos[i],
            v: path.v[i],
            hp: path.hp[i],
        })?;
    }
    Ok(path.len())
}

/// Writes every recorded run; returns the number of data rows.
pub fn write_runs_csv<W: Write>(runs: &RepresentativeRuns, out: W) -> Result<usize, ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut rows = 0;
    for (label, record) in runs.iter() {
        rows += write_path(&mut writer, label, "standard", record.trial, &record.standard)?;
        rows += write_path(&mut writer, label, "compare", record.trial, &record.compare)?;
    }
    writer.flush()?;
    Ok(rows)
}

pub fn export_runs_csv(runs: &RepresentativeRuns, path: impl AsRef<Path>) -> Result<usize, ExportError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = write_runs_csv(runs, file)?;
    info!(path = %path.display(), rows, "representative runs exported");
    Ok(rows)
}
