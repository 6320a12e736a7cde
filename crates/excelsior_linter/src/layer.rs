//! Maps module paths to layer names. First match wins, per the resolution
//! order in the design: exceptions, explicit map, regex, site-packages/
//! `.venv` (strict, non-overridable by convention), then directory
//! convention.

use std::path::Path;

use globset::Glob;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One of the default layer names, or a project-defined extension.
/// Kept as a `String` (not an enum) since `layer_map`/convention config can
/// introduce names the engine never hard-codes.
pub type Layer = String;

pub const DOMAIN: &str = "Domain";
pub const USE_CASE: &str = "UseCase";
pub const INTERFACE: &str = "Interface";
pub const INFRASTRUCTURE: &str = "Infrastructure";

/// Directory-segment conventions used by resolution step 4, case-insensitive.
const CONVENTION_SEGMENTS: &[(&str, &str)] = &[
    ("domain", DOMAIN),
    ("use_cases", USE_CASE),
    ("usecases", USE_CASE),
    ("interface", INTERFACE),
    ("infrastructure", INFRASTRUCTURE),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LayerMapConfig {
    /// dotted-prefix or regex pattern -> layer name.
    #[serde(default)]
    pub layer_map: FxHashMap<String, String>,
    /// Regex patterns (applied to the absolute file path) -> layer name,
    /// tried in declaration order after `layer_map`.
    #[serde(default)]
    pub path_patterns: Vec<(String, String)>,
    /// Dotted module names that always opt out of layer resolution.
    #[serde(default)]
    pub shared_kernel_modules: Vec<String>,
    /// Decorator names that mark a module/class as exempt (step 1).
    #[serde(default)]
    pub exception_decorators: Vec<String>,
}

/// Dependency-direction rank: lower is more inward. W9001 fires when a
/// module imports a layer with a strictly higher rank than its own.
pub fn layer_rank(layer: &str) -> Option<u8> {
    match layer {
        DOMAIN => Some(0),
        USE_CASE => Some(1),
        INTERFACE => Some(2),
        INFRASTRUCTURE => Some(3),
        _ => None,
    }
}

pub struct LayerResolver<'a> {
    config: &'a LayerMapConfig,
    compiled_patterns: Vec<(Regex, String)>,
}

impl<'a> LayerResolver<'a> {
    pub fn new(config: &'a LayerMapConfig) -> Self {
        let compiled_patterns = config
            .path_patterns
            .iter()
            .filter_map(|(pattern, layer)| {
                Regex::new(pattern).ok().map(|re| (re, layer.clone()))
            })
            .collect();
        Self {
            config,
            compiled_patterns,
        }
    }

    /// Resolves a module's layer. `dotted_path` is e.g. `use_cases.order`;
    /// `file_path` the absolute path on disk; `decorators` any decorator
    /// names found on the module's top-level class (step 1 exceptions).
    pub fn resolve(
        &self,
        dotted_path: &str,
        file_path: &Path,
        decorators: &[String],
    ) -> Option<Layer> {
        if self.is_exception(dotted_path, decorators) {
            return None;
        }
        if let Some(layer) = self.longest_prefix_match(dotted_path) {
            return Some(layer);
        }
        if let Some(layer) = self.regex_match(file_path) {
            return Some(layer);
        }
        if self.is_vendored(file_path) {
            return Some(INFRASTRUCTURE.to_string());
        }
        if let Some(layer) = self.convention_match(file_path) {
            return Some(layer);
        }
        None
    }

    fn is_exception(&self, dotted_path: &str, decorators: &[String]) -> bool {
        if self
            .config
            .shared_kernel_modules
            .iter()
            .any(|m| m == dotted_path)
        {
            return true;
        }
        decorators
            .iter()
            .any(|d| self.config.exception_decorators.iter().any(|e| e == d))
    }

    fn longest_prefix_match(&self, dotted_path: &str) -> Option<Layer> {
        self.config
            .layer_map
            .iter()
            .filter(|(prefix, _)| {
                dotted_path == prefix.as_str() || dotted_path.starts_with(&format!("{prefix}."))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, layer)| layer.clone())
    }

    fn regex_match(&self, file_path: &Path) -> Option<Layer> {
        let path_str = file_path.to_string_lossy();
        self.compiled_patterns
            .iter()
            .find(|(re, _)| re.is_match(&path_str))
            .map(|(_, layer)| layer.clone())
    }

    fn convention_match(&self, file_path: &Path) -> Option<Layer> {
        file_path.components().find_map(|component| {
            let segment = component.as_os_str().to_string_lossy().to_lowercase();
            CONVENTION_SEGMENTS
                .iter()
                .find(|(needle, _)| *needle == segment)
                .map(|(_, layer)| layer.to_string())
        })
    }

    fn is_vendored(&self, file_path: &Path) -> bool {
        let venv_glob = Glob::new("**/.venv/**").unwrap().compile_matcher();
        let site_packages_glob = Glob::new("**/site-packages/**").unwrap().compile_matcher();
        venv_glob.is_match(file_path) || site_packages_glob.is_match(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LayerMapConfig {
        LayerMapConfig {
            layer_map: FxHashMap::from_iter([
                ("use_cases".to_string(), USE_CASE.to_string()),
                ("use_cases.order".to_string(), "SpecialOrder".to_string()),
            ]),
            path_patterns: vec![],
            shared_kernel_modules: vec!["shared.constants".to_string()],
            exception_decorators: vec!["framework.exempt".to_string()],
        }
    }

    #[test]
    fn test_longest_prefix_wins_over_shorter() {
        let cfg = config();
        let resolver = LayerResolver::new(&cfg);
        let layer = resolver.resolve("use_cases.order", Path::new("/proj/src/use_cases/order.py"), &[]);
        assert_eq!(layer.as_deref(), Some("SpecialOrder"));
    }

    #[test]
    fn test_shared_kernel_module_is_exempt() {
        let cfg = config();
        let resolver = LayerResolver::new(&cfg);
        assert_eq!(
            resolver.resolve("shared.constants", Path::new("/proj/src/shared/constants.py"), &[]),
            None
        );
    }

    #[test]
    fn test_directory_convention_detects_domain() {
        let cfg = LayerMapConfig::default();
        let resolver = LayerResolver::new(&cfg);
        let layer = resolver.resolve(
            "domain.entities.user",
            Path::new("/proj/src/domain/entities/user.py"),
            &[],
        );
        assert_eq!(layer.as_deref(), Some(DOMAIN));
    }

    #[test]
    fn test_venv_forces_infrastructure_even_under_domain_named_dir() {
        let cfg = LayerMapConfig::default();
        let resolver = LayerResolver::new(&cfg);
        let layer = resolver.resolve(
            "somelib",
            Path::new("/proj/.venv/lib/domain/somelib.py"),
            &[],
        );
        assert_eq!(layer.as_deref(), Some(INFRASTRUCTURE));
    }

    #[test]
    fn test_decorator_exception_opts_out() {
        let cfg = config();
        let resolver = LayerResolver::new(&cfg);
        let layer = resolver.resolve(
            "infrastructure.framework_base",
            Path::new("/proj/src/infrastructure/framework_base.py"),
            &["framework.exempt".to_string()],
        );
        assert_eq!(layer, None);
    }

    #[test]
    fn test_unresolvable_path_returns_none() {
        let cfg = LayerMapConfig::default();
        let resolver = LayerResolver::new(&cfg);
        assert_eq!(
            resolver.resolve("misc.script", Path::new("/proj/misc/script.py"), &[]),
            None
        );
    }
}
