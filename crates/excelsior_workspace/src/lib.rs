//! Config-file loading and rule catalog loading. Grounded on
//! `fortitude_workspace`'s split of these two concerns into separate
//! modules, one level above the engine crate so the CLI and engine both
//! depend on it without the engine needing to know how config is sourced.

pub mod catalog;
pub mod configuration;

pub use catalog::{
    load_catalog, load_default_catalog, verify_single_source_of_truth, CatalogError,
    DEFAULT_CATALOG_TOML,
};
pub use configuration::{
    find_settings_toml, load_configuration, load_configuration_from_file, parse_config_toml,
    settings_toml, CleanArchOptions, Configuration, ConfigurationTransformer,
    ContractIntegrityOptions, PartialConfiguration, ProjectType,
};
