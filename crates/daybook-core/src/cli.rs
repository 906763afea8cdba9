use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::Horizon;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "daybook",
    version,
    about = "Daybook: dated to-dos in color-coded folders",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rcfile", global = true)]
    pub rcfile: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show tasks for a time horizon, a folder, or both
    List(ListArgs),
    /// Create a task; date and time default to now
    Add(AddArgs),
    /// Change fields of an existing task
    Edit(EditArgs),
    /// Toggle a task between open and completed
    Done { id: String },
    /// Remove a task
    Delete { id: String },
    /// Show every field of one task
    Info { id: String },
    /// Today's task count and how many are completed
    Stats,
    /// List folders with their colors
    Folders,
    /// Create a folder
    FolderAdd(FolderAddArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(value_enum)]
    pub horizon: Option<Horizon>,

    /// Only tasks in this folder; without a horizon this shows all dates
    #[arg(long)]
    pub folder: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(long)]
    pub memo: Option<String>,

    #[arg(long, conflicts_with = "no_date")]
    pub date: Option<String>,

    #[arg(long, conflicts_with = "no_date")]
    pub time: Option<String>,

    /// Folder id as shown by `daybook folders`
    #[arg(long)]
    pub folder: Option<String>,

    /// Leave the task unscheduled
    #[arg(long)]
    pub no_date: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    /// Pass an empty string to clear the memo
    #[arg(long)]
    pub memo: Option<String>,

    #[arg(long, conflicts_with = "no_date")]
    pub date: Option<String>,

    #[arg(long, conflicts_with = "no_date")]
    pub time: Option<String>,

    #[arg(long, conflicts_with = "no_folder")]
    pub folder: Option<String>,

    #[arg(long)]
    pub no_date: bool,

    #[arg(long)]
    pub no_folder: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FolderAddArgs {
    #[arg(required = true, num_args = 1..)]
    pub name: Vec<String>,

    #[arg(long, default_value = "#EDE7F6")]
    pub color: String,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.KEY=VALUE` (or `rc.KEY:VALUE`) words out of the argument list so
/// they can appear anywhere on the command line.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                rest.split_once(':')
                    .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
