//! Entry point: parses `Cli`, sets up logging, and dispatches to the
//! subcommand drivers. Grounded on the teacher's `fortitude::main`,
//! including its broken-pipe-is-not-an-error handling.

mod adapters;
mod blueprint;
mod check;
mod cli;
mod discover;
mod fix;
mod init;
mod logging;
mod module_path;
mod plan;
mod trail;
mod verify;

use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, SubCommands};
use logging::set_up_logging;

/// The project root a dotted module path is relative to: the directory
/// holding `.excelsior.toml`, found by walking up from `path`, or `path`
/// itself (dir-passthrough-or-parent) when no config file exists yet.
fn project_root(path: &std::path::Path) -> std::path::PathBuf {
    let start = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map(std::path::Path::to_path_buf).unwrap_or_default()
    };
    excelsior_workspace::find_settings_toml(&start)
        .and_then(|toml_path| toml_path.parent().map(std::path::Path::to_path_buf))
        .unwrap_or(start)
}

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

fn run(cli: Cli) -> Result<ExitCode> {
    set_up_logging(cli.global_options.log_level())?;

    match cli.command {
        SubCommands::Init(cmd) => {
            init::run(&cmd)?;
            Ok(ExitCode::SUCCESS)
        }
        SubCommands::Check(cmd) => {
            let root = project_root(&cmd.path);
            let config = load_configuration(&cli.global_options, &root)?;
            let result = check::run(&cmd, &root, &config, timestamp())?;
            Ok(exit_code_for(&result))
        }
        SubCommands::Fix(cmd) => {
            let root = project_root(&cmd.path);
            let config = load_configuration(&cli.global_options, &root)?;
            let check_cmd = cli::CheckCommand {
                path: cmd.path.clone(),
                linter: cli::LinterSelector::All,
                no_health: true,
            };
            let mut audit = check::run(&check_cmd, &root, &config, timestamp())?;

            if cmd.confirm && !confirm_fix(&audit) {
                log::info!("fix: aborted, nothing written");
                return Ok(exit_code_for(&audit));
            }

            let mut summary = fix::run(&cmd, &root, &config, &audit)?;

            if cmd.iterative {
                for _ in 0..excelsior_linter::MAX_ITERATIONS {
                    if summary.files_changed == 0 {
                        break;
                    }
                    audit = check::run(&check_cmd, &root, &config, timestamp())?;
                    if audit.blocked_by.is_none() {
                        break;
                    }
                    summary = fix::run(&cmd, &root, &config, &audit)?;
                }
            }

            log::info!(
                "fix: {} file(s) changed, {} skipped",
                summary.files_changed,
                summary.files_skipped
            );
            Ok(exit_code_for(&audit))
        }
        SubCommands::Plan(cmd) => {
            let root = std::env::current_dir()?;
            let path = plan::run(&cmd, &root, &timestamp())?;
            log::info!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        SubCommands::Blueprint(cmd) => {
            blueprint::run(&cmd)?;
            Ok(ExitCode::SUCCESS)
        }
        SubCommands::Verify(cmd) => {
            let root = std::env::current_dir()?;
            let config = load_configuration(&cli.global_options, &root)?;
            let report = verify::run(&cmd, &root, &config, timestamp())?;
            if report.regressed {
                log::error!(
                    "audit regressed: now blocked by {:?}, baseline was blocked by {:?}",
                    report.current.blocked_by,
                    report.baseline_blocked_by
                );
                return Ok(ExitCode::FAILURE);
            }
            Ok(exit_code_for(&report.current))
        }
    }
}

fn load_configuration(
    global: &cli::GlobalConfigArgs,
    root: &std::path::Path,
) -> Result<excelsior_workspace::Configuration> {
    if global.isolated {
        return Ok(excelsior_workspace::Configuration::default());
    }
    if let Some(path) = &global.config_file {
        return excelsior_workspace::load_configuration_from_file(path);
    }
    excelsior_workspace::load_configuration(root)
}

/// `--confirm` prompts once before any file on disk is touched, listing
/// how many violations the fix pipeline is about to act on.
fn confirm_fix(audit: &excelsior_linter::AuditResult) -> bool {
    let pending: usize = audit
        .per_pass
        .iter()
        .filter_map(|(_, outcome)| match outcome {
            excelsior_linter::PassOutcome::Ran(v) => Some(v.len()),
            _ => None,
        })
        .sum();
    eprint!("About to attempt fixes for {pending} violation(s). Continue? [y/N] ");
    std::io::stderr().flush().ok();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Exit code 0 iff the audit is unblocked, per spec §6.
fn exit_code_for(result: &excelsior_linter::AuditResult) -> ExitCode {
    if result.blocked_by.is_none() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => Ok(code),
        Err(err) => {
            for cause in err.chain() {
                if let Some(ioerr) = cause.downcast_ref::<std::io::Error>() {
                    if ioerr.kind() == std::io::ErrorKind::BrokenPipe {
                        return Ok(ExitCode::from(0));
                    }
                }
            }

            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", "excelsior failed".red().bold()).ok();
            Err(err)
        }
    }
}
