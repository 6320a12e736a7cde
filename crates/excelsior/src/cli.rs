//! `spec.md` §6's command surface: `init`, `check`, `fix`, `plan`,
//! `blueprint`, `verify`, plus the teacher's global-flag conventions
//! (`--config-file`/`--isolated`, `LogLevelArgs`, `--output-format`).
//! Grounded on `fortitude::cli::{Cli, SubCommands, GlobalConfigArgs,
//! LogLevelArgs}`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::logging::LogLevel;

#[derive(Debug, Parser)]
#[command(
    author,
    name = "excelsior",
    about = "Excelsior: an architectural governance engine for clean-architecture invariants.",
    after_help = "For help with a specific command, see: `excelsior help <command>`."
)]
#[command(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    pub global_options: GlobalConfigArgs,
}

#[derive(Debug, Default, Clone, clap::Args)]
pub struct GlobalConfigArgs {
    #[clap(flatten)]
    log_level_args: LogLevelArgs,

    /// Path to a TOML configuration file, bypassing ancestor-directory discovery.
    #[arg(long, global = true, help_heading = "Global options")]
    pub config_file: Option<PathBuf>,

    /// Ignore all configuration files; use engine defaults only.
    #[arg(long, global = true, help_heading = "Global options", conflicts_with = "config_file")]
    pub isolated: bool,

    /// How findings are rendered to stdout.
    #[arg(long, global = true, value_enum, default_value = "text", help_heading = "Global options")]
    pub output_format: OutputFormat,
}

impl GlobalConfigArgs {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from(&self.log_level_args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Default, Clone, clap::Args)]
pub struct LogLevelArgs {
    #[arg(short, long, global = true, group = "verbosity", help_heading = "Log levels")]
    pub verbose: bool,
    #[arg(short, long, global = true, group = "verbosity", help_heading = "Log levels")]
    pub quiet: bool,
    #[arg(short, long, global = true, group = "verbosity", help_heading = "Log levels")]
    pub silent: bool,
}

impl From<&LogLevelArgs> for LogLevel {
    fn from(args: &LogLevelArgs) -> Self {
        if args.silent {
            LogLevel::Silent
        } else if args.quiet {
            LogLevel::Quiet
        } else if args.verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Default
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    /// Write a default `.excelsior.toml` and create `.excelsior/` artifact directories.
    Init(InitCommand),
    /// Run the Gated Audit Pipeline.
    Check(CheckCommand),
    /// Run the Fix Pipeline.
    Fix(FixCommand),
    /// Emit the Markdown fix-plan for one rule or topic.
    Plan(PlanCommand),
    /// Strategic-refactor blueprint — not implemented by this engine.
    Blueprint(BlueprintCommand),
    /// Re-run the audit and compare against a persisted baseline.
    Verify(VerifyCommand),
}

#[derive(Debug, Parser, Clone)]
pub struct InitCommand {
    /// Directory to initialize (defaults to the current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct CheckCommand {
    /// File or directory to audit.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Restrict which of the five passes run.
    #[arg(long, value_enum, default_value = "all")]
    pub linter: LinterSelector,

    /// Skip writing the `health/` artifact mirror.
    #[arg(long)]
    pub no_health: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinterSelector {
    All,
    Architecture,
    ImportLinter,
    RuffImportTyping,
    Mypy,
    RuffCodeQuality,
}

#[derive(Debug, Parser, Clone)]
pub struct FixCommand {
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Repeat architectural fix passes until a fixed point (bounded).
    #[arg(long)]
    pub iterative: bool,

    /// Emit Handover guidance without calling the CST Gateway.
    #[arg(long)]
    pub manual_only: bool,

    /// Restrict to comment-only (pass 4) rules.
    #[arg(long)]
    pub comments: bool,

    /// Prompt before writing any file.
    #[arg(long)]
    pub confirm: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct PlanCommand {
    /// Rule code or topic to emit a fix plan for.
    pub topic: String,
}

#[derive(Debug, Parser, Clone)]
pub struct BlueprintCommand {
    #[arg(long, value_enum, default_value = "check")]
    pub source: BlueprintSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BlueprintSource {
    Check,
    Health,
}

#[derive(Debug, Parser, Clone)]
pub struct VerifyCommand {
    #[arg(long)]
    pub baseline: Option<PathBuf>,
}
