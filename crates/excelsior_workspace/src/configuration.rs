//! The `clean-arch` TOML namespace: file-config loading, ancestor-directory
//! discovery, and CLI-overrides-over-file-over-default merge. Grounded on
//! the teacher's `Configuration`/`find_settings_toml`/`ConfigurationTransformer`
//! in `fortitude_workspace::configuration`, narrowed to this engine's own
//! config keys (`spec.md` §6) instead of Fortran's rule-selector grammar.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use excelsior_linter::{AuditConfig, LayerMapConfig};

/// `project_type` narrows which default rules/thresholds apply; kept as an
/// open enum (not matched exhaustively by the engine) since a project type
/// only changes *defaults*, never which rules exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    #[default]
    Generic,
    CliApp,
    WebLike,
    DataPipeline,
}

/// `[clean-arch.contract_integrity]` sub-table, `spec.md` §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractIntegrityOptions {
    #[serde(default)]
    pub require_protocol: bool,
    #[serde(default)]
    pub internal_implementation: Option<String>,
    #[serde(default)]
    pub framework_base_classes: Vec<String>,
    #[serde(default)]
    pub allow_private_prefix: bool,
    #[serde(default)]
    pub allow_internal_decorator: bool,
    #[serde(default)]
    pub services_require_protocol: bool,
    #[serde(default)]
    pub adapters_require_protocol: bool,
    #[serde(default)]
    pub gateways_require_protocol: bool,
    #[serde(default)]
    pub other_require_protocol: bool,
}

/// Raw `[clean-arch]` table as it appears on disk, every field optional so a
/// project only needs to name what it wants to override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanArchOptions {
    pub project_type: Option<ProjectType>,
    pub visibility_enforcement: Option<bool>,
    pub silent_layers: Option<Vec<String>>,
    pub allowed_io_interfaces: Option<Vec<String>>,
    pub shared_kernel_modules: Option<Vec<String>>,
    #[serde(default)]
    pub layer_map: FxHashMap<String, String>,
    pub contract_integrity: Option<ContractIntegrityOptions>,
    pub complexity_threshold: Option<usize>,
    pub interface_segregation_limit: Option<usize>,
    pub mock_limit: Option<usize>,
    pub import_linter_enabled: Option<bool>,
    pub ruff_enabled: Option<bool>,
    pub mypy_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFile {
    #[serde(rename = "clean-arch")]
    clean_arch: Option<CleanArchOptions>,
}

/// The "known good" merged config after file + CLI overrides have been
/// applied, still distinct from `LayerMapConfig`/`AuditConfig` which are
/// what the engine actually consumes — mirrors the teacher's
/// `Configuration` vs. `Settings` split (`Configuration::into_settings`).
#[derive(Debug, Clone)]
pub struct Configuration {
    pub project_type: ProjectType,
    pub visibility_enforcement: bool,
    pub silent_layers: Vec<String>,
    pub allowed_io_interfaces: Vec<String>,
    pub shared_kernel_modules: Vec<String>,
    pub layer_map: FxHashMap<String, String>,
    pub contract_integrity: ContractIntegrityOptions,
    pub complexity_threshold: usize,
    pub interface_segregation_limit: usize,
    pub mock_limit: usize,
    /// Gates the `ImportLinter` pass. Disabling a pass removes it from the
    /// gated sequence entirely (`Pass::Skipped`), it never silently passes.
    pub import_linter_enabled: bool,
    /// Gates both ruff passes (`RuffImportTyping` and `RuffCodeQuality`) —
    /// the config surface treats "ruff" as one toggle even though the
    /// engine runs it as two separately-ordered passes.
    pub ruff_enabled: bool,
    pub mypy_enabled: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            project_type: ProjectType::Generic,
            visibility_enforcement: true,
            silent_layers: vec!["Domain".to_string(), "UseCase".to_string()],
            allowed_io_interfaces: Vec::new(),
            shared_kernel_modules: Vec::new(),
            layer_map: FxHashMap::default(),
            contract_integrity: ContractIntegrityOptions::default(),
            complexity_threshold: 10,
            interface_segregation_limit: 5,
            mock_limit: 4,
            import_linter_enabled: true,
            ruff_enabled: true,
            mypy_enabled: true,
        }
    }
}

impl Configuration {
    pub fn from_options(options: CleanArchOptions) -> Self {
        let default = Self::default();
        Self {
            project_type: options.project_type.unwrap_or(default.project_type),
            visibility_enforcement: options
                .visibility_enforcement
                .unwrap_or(default.visibility_enforcement),
            silent_layers: options.silent_layers.unwrap_or(default.silent_layers),
            allowed_io_interfaces: options
                .allowed_io_interfaces
                .unwrap_or(default.allowed_io_interfaces),
            shared_kernel_modules: options
                .shared_kernel_modules
                .unwrap_or(default.shared_kernel_modules),
            layer_map: if options.layer_map.is_empty() {
                default.layer_map
            } else {
                options.layer_map
            },
            contract_integrity: options
                .contract_integrity
                .unwrap_or(default.contract_integrity),
            complexity_threshold: options
                .complexity_threshold
                .unwrap_or(default.complexity_threshold),
            interface_segregation_limit: options
                .interface_segregation_limit
                .unwrap_or(default.interface_segregation_limit),
            mock_limit: options.mock_limit.unwrap_or(default.mock_limit),
            import_linter_enabled: options
                .import_linter_enabled
                .unwrap_or(default.import_linter_enabled),
            ruff_enabled: options.ruff_enabled.unwrap_or(default.ruff_enabled),
            mypy_enabled: options.mypy_enabled.unwrap_or(default.mypy_enabled),
        }
    }

    /// CLI overrides win; anything `other` leaves unset falls back to
    /// `self`, the same direction as the teacher's `Configuration::combine`
    /// (`self.or(config)` throughout).
    #[must_use]
    pub fn combine(self, other: PartialConfiguration) -> Self {
        Self {
            project_type: other.project_type.unwrap_or(self.project_type),
            visibility_enforcement: other
                .visibility_enforcement
                .unwrap_or(self.visibility_enforcement),
            silent_layers: other.silent_layers.unwrap_or(self.silent_layers),
            allowed_io_interfaces: other
                .allowed_io_interfaces
                .unwrap_or(self.allowed_io_interfaces),
            shared_kernel_modules: other
                .shared_kernel_modules
                .unwrap_or(self.shared_kernel_modules),
            layer_map: self.layer_map,
            contract_integrity: self.contract_integrity,
            complexity_threshold: other
                .complexity_threshold
                .unwrap_or(self.complexity_threshold),
            interface_segregation_limit: other
                .interface_segregation_limit
                .unwrap_or(self.interface_segregation_limit),
            mock_limit: other.mock_limit.unwrap_or(self.mock_limit),
        }
    }

    pub fn layer_map_config(&self) -> LayerMapConfig {
        LayerMapConfig {
            layer_map: self.layer_map.clone(),
            path_patterns: Vec::new(),
            shared_kernel_modules: self.shared_kernel_modules.clone(),
            exception_decorators: Vec::new(),
        }
    }

    /// `AuditConfig::enabled` is keyed the same order as `Pass::ORDER`
    /// (`ImportLinter, RuffImportTyping, Mypy, Excelsior, RuffCodeQuality`);
    /// the architecture pass (index 3) has no corresponding toggle — it's
    /// this engine's own rule catalog and can't be disabled by config.
    pub fn audit_config(&self) -> AuditConfig {
        AuditConfig {
            enabled: [
                self.import_linter_enabled,
                self.ruff_enabled,
                self.mypy_enabled,
                true,
                self.ruff_enabled,
            ],
            ..AuditConfig::default()
        }
    }
}

/// Sparse overrides, typically built from parsed CLI flags. Applied with
/// [`Configuration::combine`] the same way the teacher layers a CLI
/// `ConfigurationTransformer` over a file-derived `Configuration`.
#[derive(Debug, Clone, Default)]
pub struct PartialConfiguration {
    pub project_type: Option<ProjectType>,
    pub visibility_enforcement: Option<bool>,
    pub silent_layers: Option<Vec<String>>,
    pub allowed_io_interfaces: Option<Vec<String>>,
    pub shared_kernel_modules: Option<Vec<String>>,
    pub complexity_threshold: Option<usize>,
    pub interface_segregation_limit: Option<usize>,
    pub mock_limit: Option<usize>,
}

/// Applies CLI-derived overrides to a file-loaded [`Configuration`]; the
/// engine never constructs one of these directly, only the CLI crate does.
pub trait ConfigurationTransformer {
    fn transform(&self, config: Configuration) -> Configuration;
}

pub fn parse_config_toml(path: &Path) -> Result<CleanArchOptions> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: RawFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(raw.clean_arch.unwrap_or_default())
}

/// Loads a specific config file, bypassing ancestor-directory discovery —
/// what `--config-file` asks for instead of the usual `.excelsior.toml`
/// walk in [`load_configuration`].
pub fn load_configuration_from_file(path: &Path) -> Result<Configuration> {
    Ok(Configuration::from_options(parse_config_toml(path)?))
}

/// Looks for `.excelsior.toml` in one directory. Adapted from the teacher's
/// `settings_toml`, minus the `fpm.toml`-as-fallback special case (this
/// engine has no Fortran package manager equivalent to piggyback on).
pub fn settings_toml(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(".excelsior.toml");
    candidate.is_file().then_some(candidate)
}

/// Walks `path.ancestors()` looking for `.excelsior.toml`, same search order
/// as the teacher's `find_settings_toml`.
pub fn find_settings_toml(path: &Path) -> Option<PathBuf> {
    path.ancestors().find_map(settings_toml)
}

/// Loads and converts `.excelsior.toml` if one exists on any ancestor of
/// `start`; returns engine defaults (not an error) when none is found, since
/// an absent config file is the common case for a freshly-`init`ed project.
pub fn load_configuration(start: &Path) -> Result<Configuration> {
    match find_settings_toml(start) {
        Some(path) => Ok(Configuration::from_options(parse_config_toml(&path)?)),
        None => Ok(Configuration::default()),
    }
}
