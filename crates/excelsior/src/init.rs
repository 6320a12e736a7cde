//! `excelsior init`: writes a commented default `.excelsior.toml` and
//! creates the `.excelsior/` artifact directories so the first `check` run
//! has somewhere to write its trail. Grounded on the teacher's own
//! `fortitude init`, which does the analogous thing for `fpm.toml`.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::cli::InitCommand;

const DEFAULT_CONFIG: &str = r#"[clean-arch]
# project_type narrows default thresholds: "generic", "cli_app", "web_like", "data_pipeline".
project_type = "generic"
visibility_enforcement = true
silent_layers = ["Domain", "UseCase"]
allowed_io_interfaces = []
shared_kernel_modules = []
complexity_threshold = 10
interface_segregation_limit = 5
mock_limit = 4
import_linter_enabled = true
ruff_enabled = true
mypy_enabled = true

[clean-arch.layer_map]
# "my_project.domain" = "Domain"

[clean-arch.contract_integrity]
require_protocol = false
allow_private_prefix = true
allow_internal_decorator = true
"#;

pub fn run(cmd: &InitCommand) -> Result<()> {
    if !cmd.path.is_dir() {
        bail!("{} is not a directory", cmd.path.display());
    }

    let config_path = cmd.path.join(".excelsior.toml");
    if config_path.exists() {
        bail!("{} already exists; remove it first to re-init", config_path.display());
    }
    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    for dir in ["check", "health", "fix_plans", "logs"] {
        create_artifact_dir(&cmd.path, dir)?;
    }

    Ok(())
}

fn create_artifact_dir(root: &Path, name: &str) -> Result<()> {
    let dir = root.join(".excelsior").join(name);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_config_and_artifact_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = InitCommand { path: dir.path().to_path_buf() };
        run(&cmd).unwrap();

        assert!(dir.path().join(".excelsior.toml").is_file());
        assert!(dir.path().join(".excelsior/check").is_dir());
        assert!(dir.path().join(".excelsior/health").is_dir());
        assert!(dir.path().join(".excelsior/fix_plans").is_dir());
        assert!(dir.path().join(".excelsior/logs").is_dir());
    }

    #[test]
    fn test_refuses_to_overwrite_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".excelsior.toml"), "").unwrap();
        let cmd = InitCommand { path: dir.path().to_path_buf() };
        assert!(run(&cmd).is_err());
    }
}
