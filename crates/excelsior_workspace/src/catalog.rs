//! Rule catalog loading plus the single-source-of-truth invariant: every
//! code a `Checkable`/`StatefulRule`/`TextRule` implementation returns from
//! `code()` must have exactly one matching `[excelsior.W9xxx]` entry here,
//! and vice versa. Grounded on the teacher's own rule/doc consistency check
//! (`fortitude_dev::generate_rules_table` cross-references `Rule::iter()`
//! against the docs it emits); this is the read-time half of that idea.

use std::path::Path;

use excelsior_linter::{RegistryError, RuleRegistry};

/// Shipped with the binary so `excelsior init`/a fresh checkout always has a
/// complete catalog even before any project-level override exists.
pub const DEFAULT_CATALOG_TOML: &str = include_str!("../resources/default_catalog.toml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("rule catalog is missing entries for implemented codes: {0:?}")]
    MissingCatalogEntries(Vec<String>),
    #[error("rule catalog has entries for codes no rule implements: {0:?}")]
    OrphanedCatalogEntries(Vec<String>),
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loads the default, in-binary catalog.
pub fn load_default_catalog() -> Result<RuleRegistry, CatalogError> {
    Ok(RuleRegistry::from_toml_str(DEFAULT_CATALOG_TOML)?)
}

/// Loads a catalog from a project-supplied override file, falling back to
/// the default embedded one if `path` doesn't exist — a project only needs
/// to ship a catalog file at all if it wants to change `manual_instructions`
/// or add a project-local rule's metadata.
pub fn load_catalog(path: &Path) -> Result<RuleRegistry, CatalogError> {
    if !path.is_file() {
        return load_default_catalog();
    }
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RuleRegistry::from_toml_str(&raw)?)
}

/// Cross-checks `registry`'s codes against the codes every rule
/// implementation actually declares via `code()`. A mismatch in either
/// direction is a build-time defect (a rule nobody can see in docs/config,
/// or dead catalog metadata for a rule that no longer exists) and fails
/// loudly rather than silently tolerating drift.
pub fn verify_single_source_of_truth(
    registry: &RuleRegistry,
    implemented_codes: &[&str],
) -> Result<(), CatalogError> {
    let catalog_codes: std::collections::HashSet<&str> =
        registry.iter().map(|d| d.code.as_str()).collect();
    let implemented: std::collections::HashSet<&str> = implemented_codes.iter().copied().collect();

    let mut missing: Vec<String> = implemented
        .difference(&catalog_codes)
        .map(|s| s.to_string())
        .collect();
    missing.sort();
    if !missing.is_empty() {
        return Err(CatalogError::MissingCatalogEntries(missing));
    }

    let mut orphaned: Vec<String> = catalog_codes
        .difference(&implemented)
        .map(|s| s.to_string())
        .collect();
    orphaned.sort();
    if !orphaned.is_empty() {
        return Err(CatalogError::OrphanedCatalogEntries(orphaned));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_parses() {
        let registry = load_default_catalog().unwrap();
        assert!(registry.len() > 30);
        assert!(registry.is_fixable("W9015"));
    }

    #[test]
    fn test_missing_entries_are_reported() {
        let registry = load_default_catalog().unwrap();
        let err = verify_single_source_of_truth(&registry, &["W9001", "W9999"]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingCatalogEntries(codes) if codes == vec!["W9999".to_string()]));
    }

    #[test]
    fn test_orphaned_entries_are_reported() {
        let registry = load_default_catalog().unwrap();
        let all_codes: Vec<&str> = registry.iter().map(|d| d.code.as_str()).collect();
        let missing_one: Vec<&str> = all_codes.iter().skip(1).copied().collect();
        let err = verify_single_source_of_truth(&registry, &missing_one).unwrap_err();
        assert!(matches!(err, CatalogError::OrphanedCatalogEntries(_)));
    }
}
