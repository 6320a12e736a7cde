//! Layer resolution, the rule engine, and the gated audit/fix pipelines.
//! Grounded on `fortitude_linter`'s module layout: one file per concern,
//! re-exported flat from here so callers don't need to know the internal
//! split between `registry`/`engine`/`audit`/`fix`/`gateway`/`handover`.

pub mod audit;
pub mod diagnostics;
pub mod engine;
pub mod fix;
pub mod gateway;
pub mod handover;
pub mod layer;
pub mod registry;
pub mod rules;
pub mod type_oracle;

pub use audit::{AuditConfig, AuditResult, LinterAdapter, Pass, PassOutcome};
pub use diagnostics::{Anchor, Edit, PlanKind, SourceLocation, TransformationPlan, Violation};
pub use engine::check_file;
pub use fix::{fix_architectural, run_external_fix_pass, FixOutcome, MAX_ITERATIONS};
pub use gateway::{CstGateway, GatewayError, TextSpliceGateway};
pub use handover::{build_handover, HandoverArtifact, RuleGroup};
pub use layer::{Layer, LayerMapConfig, LayerResolver};
pub use registry::{
    Checkable, Fixable, RegistryError, RuleContext, RuleDefinition, RuleRegistry, ScopeToken,
    StatefulRule, TextRule,
};
pub use rules::EngineRules;
pub use type_oracle::TypeOracle;
