//! Command-line interface of the solver binary.

use crate::options::Options;
use clap::Parser;
use miette::{Diagnostic, Result};
use std::{io::Read, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "skolemium", about = "A 2QBF solver based on incremental determinization")]
pub struct Cli {
    /// Path to a QDIMACS file; reads from stdin if omitted
    pub input: Option<PathBuf>,

    /// Conflict clause minimization
    #[arg(long)]
    pub minimize_conflicts: bool,

    /// CEGAR refinement in addition to incremental determinization
    #[arg(long)]
    pub cegar: bool,

    /// Solve purely by CEGAR
    #[arg(long)]
    pub cegar_only: bool,

    /// Case distinctions
    #[arg(long = "case-splits")]
    pub casesplits: bool,

    /// Partition-based decomposition analysis
    #[arg(long)]
    pub miniscoping: bool,

    /// Easy debugging configuration (deterministic thresholds)
    #[arg(short = 'p', long)]
    pub easy_debugging: bool,

    /// Expect a functional synthesis problem
    #[arg(long)]
    pub functional_synthesis: bool,

    /// Use the QBF engine also for propositional problems
    #[arg(long)]
    pub sat_by_qbf: bool,

    /// Blocked clause elimination before solving
    #[arg(long)]
    pub qbce: bool,

    /// Print QDIMACS-compliant status lines
    #[arg(long)]
    pub qdimacs_compliant: bool,

    /// Bound of the universal counterexample cache
    #[arg(long, default_value_t = 8)]
    pub examples: usize,
}

impl Cli {
    #[must_use]
    pub fn to_options(&self) -> Options {
        Options {
            minimize_conflicts: self.minimize_conflicts,
            cegar: self.cegar,
            cegar_only: self.cegar_only,
            casesplits: self.casesplits,
            miniscoping: self.miniscoping,
            reinforcement_learning: false,
            easy_debugging: self.easy_debugging,
            functional_synthesis: self.functional_synthesis,
            sat_by_qbf: self.sat_by_qbf,
            qbce: self.qbce,
            qdimacs_compliant: self.qdimacs_compliant,
            examples_max_num: self.examples,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum InputError {
    #[error("Path {} does not exist", path.display())]
    FileDoesNotExist { path: PathBuf },

    #[error("{} is not a file", path.display())]
    NotAFile { path: PathBuf },

    #[error("Cannot read file {}: {}", path.display(), err)]
    CannotReadFile { path: PathBuf, err: std::io::Error },

    #[error("Cannot read from stdin: {}", err)]
    CannotReadStdIn { err: std::io::Error },
}

/// Reads the input from the given path, or from stdin when no path is
/// provided.
pub fn read_input(path: Option<&std::path::Path>) -> Result<Vec<u8>> {
    let Some(path) = path else {
        tracing::info!("no input file provided, reading from stdin");
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .map_err(|err| InputError::CannotReadStdIn { err })?;
        return Ok(buffer);
    };
    if !path.exists() {
        return Err(InputError::FileDoesNotExist { path: path.into() }.into());
    }
    if !path.is_file() {
        return Err(InputError::NotAFile { path: path.into() }.into());
    }
    let contents = std::fs::read(path)
        .map_err(|err| InputError::CannotReadFile { path: path.into(), err })?;
    Ok(contents)
}
