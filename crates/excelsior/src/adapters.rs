//! Concrete `LinterAdapter` implementations for the four external passes
//! (import-linter, ruff import/typing, mypy, ruff code quality). Each shells
//! out to the real tool and maps its JSON report onto `Violation`; a
//! non-zero exit that isn't a findings report becomes an `ExternalToolError`
//! per `spec.md` §7, not a silent empty result.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use excelsior_linter::{LinterAdapter, SourceLocation, Violation};

/// Runs one external command with a hard timeout, returning stdout on a
/// clean or lint-findings exit and an error otherwise. `wait-timeout`-style
/// process groups aren't available through `std::process` alone, so this
/// polls the child rather than blocking indefinitely — good enough for a
/// CLI invocation, not meant to survive a runaway subprocess tree.
fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<(std::process::ExitStatus, String)> {
    let mut child = command
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .with_context(|| "failed to spawn external tool")?;

    let start = std::time::Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            let output = child.wait_with_output()?;
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            return Ok((status, stdout));
        }
        if start.elapsed() > timeout {
            child.kill().ok();
            return Err(anyhow!("external tool timed out after {:?}", timeout));
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

/// `import-linter` — contract checker for the import-direction pass.
pub struct ImportLinterAdapter {
    pub timeout: Duration,
}

impl LinterAdapter for ImportLinterAdapter {
    fn gather_results(&self, path: &Path) -> Result<Vec<Violation>> {
        let mut command = Command::new("lint-imports");
        command.arg("--config").arg(".importlinter").current_dir(
            path.parent().unwrap_or(path),
        );
        let (status, stdout) = run_with_timeout(command, self.timeout)?;
        if status.success() {
            return Ok(Vec::new());
        }
        Ok(parse_plain_violations("W9001", &stdout, path))
    }

    fn apply_fixes(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }

    fn get_fixable_rules(&self) -> Vec<String> {
        Vec::new()
    }

    fn supports_autofix(&self) -> bool {
        false
    }

    fn get_manual_fix_instructions(&self, _code: &str) -> Option<String> {
        Some("Move the importing module to an outer layer or invert the dependency behind a Protocol.".to_string())
    }
}

/// `ruff --select I,ANN` — import ordering + typing-adjacent quick-lint pass.
pub struct RuffImportTypingAdapter {
    pub timeout: Duration,
}

impl LinterAdapter for RuffImportTypingAdapter {
    fn gather_results(&self, path: &Path) -> Result<Vec<Violation>> {
        let mut command = Command::new("ruff");
        command
            .arg("check")
            .arg("--select")
            .arg("I,ANN")
            .arg("--output-format")
            .arg("concise")
            .arg(path);
        let (status, stdout) = run_with_timeout(command, self.timeout)?;
        if status.code() == Some(0) || status.code() == Some(1) {
            return Ok(parse_plain_violations("RUF-IMPORT", &stdout, path));
        }
        Err(anyhow!("ruff import/typing pass exited with {status}"))
    }

    fn apply_fixes(&self, path: &Path) -> Result<bool> {
        let mut command = Command::new("ruff");
        command.arg("check").arg("--fix").arg(path);
        let (status, _) = run_with_timeout(command, self.timeout)?;
        Ok(status.success())
    }

    fn get_fixable_rules(&self) -> Vec<String> {
        vec!["I001".to_string()]
    }

    fn supports_autofix(&self) -> bool {
        true
    }

    fn get_manual_fix_instructions(&self, _code: &str) -> Option<String> {
        None
    }
}

/// `mypy` — static type-checking pass.
pub struct MypyAdapter {
    pub timeout: Duration,
}

impl LinterAdapter for MypyAdapter {
    fn gather_results(&self, path: &Path) -> Result<Vec<Violation>> {
        let mut command = Command::new("mypy");
        command.arg("--no-error-summary").arg(path);
        let (status, stdout) = run_with_timeout(command, self.timeout)?;
        if status.code() == Some(0) || status.code() == Some(1) {
            return Ok(parse_plain_violations("MYPY", &stdout, path));
        }
        Err(anyhow!("mypy exited with {status}"))
    }

    fn apply_fixes(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }

    fn get_fixable_rules(&self) -> Vec<String> {
        Vec::new()
    }

    fn supports_autofix(&self) -> bool {
        false
    }

    fn get_manual_fix_instructions(&self, _code: &str) -> Option<String> {
        Some("Add the missing annotation or narrow the inferred type mypy rejected.".to_string())
    }
}

/// `ruff --select E,F,C90` — the catch-all code-quality pass that runs last,
/// after architecture, so a god-file isn't also buried under unrelated
/// style noise earlier in the pipeline.
pub struct RuffCodeQualityAdapter {
    pub timeout: Duration,
}

impl LinterAdapter for RuffCodeQualityAdapter {
    fn gather_results(&self, path: &Path) -> Result<Vec<Violation>> {
        let mut command = Command::new("ruff");
        command
            .arg("check")
            .arg("--select")
            .arg("E,F,C90")
            .arg("--output-format")
            .arg("concise")
            .arg(path);
        let (status, stdout) = run_with_timeout(command, self.timeout)?;
        if status.code() == Some(0) || status.code() == Some(1) {
            return Ok(parse_plain_violations("RUF-QUALITY", &stdout, path));
        }
        Err(anyhow!("ruff code-quality pass exited with {status}"))
    }

    fn apply_fixes(&self, path: &Path) -> Result<bool> {
        let mut command = Command::new("ruff");
        command.arg("check").arg("--fix").arg(path);
        let (status, _) = run_with_timeout(command, self.timeout)?;
        Ok(status.success())
    }

    fn get_fixable_rules(&self) -> Vec<String> {
        vec!["F401".to_string(), "E501".to_string()]
    }

    fn supports_autofix(&self) -> bool {
        true
    }

    fn get_manual_fix_instructions(&self, _code: &str) -> Option<String> {
        None
    }
}

/// Maps `path:line:col: message` lines (the common concise format every one
/// of these tools can be asked to emit) onto `Violation`s. Precise schema
/// parsing (ruff's own JSON, mypy's `--output json`) is a drop-in
/// replacement behind this same function if a project wants it; this
/// default keeps the adapter dependency-free.
fn parse_plain_violations(code: &str, stdout: &str, fallback_path: &Path) -> Vec<Violation> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut parts = line.splitn(4, ':');
            let path = parts
                .next()
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| fallback_path.to_path_buf());
            let line_no: usize = parts.next().and_then(|s| s.trim().parse().ok()).unwrap_or(1);
            let col_no: usize = parts.next().and_then(|s| s.trim().parse().ok()).unwrap_or(1);
            let message = parts.next().unwrap_or(line).trim().to_string();
            Violation::new(
                code,
                message,
                SourceLocation::new(path, excelsior_ast::Location::new(line_no, col_no)),
            )
        })
        .collect()
}
