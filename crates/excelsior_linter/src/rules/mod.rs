//! Rule catalog, grouped the way the teacher groups `rules/correctness`,
//! `rules/style`, ... — one module per category of concern rather than one
//! file per code.

pub mod access;
pub mod bypass;
pub mod contracts;
pub mod demeter;
pub mod io_isolation;
pub mod layering;
pub mod patterns;
pub mod scatter;
pub mod structure;
pub mod support;
pub mod testing;
pub mod typing;

use std::collections::HashMap;

use excelsior_ast::Ast;

use crate::registry::{Checkable, Fixable, RuleContext, StatefulRule, TextRule};

/// Every stateless `Checkable` rule, in catalog order. The engine dispatches
/// each to the node kinds it names in `entrypoints()`.
pub fn checkable_rules() -> Vec<Box<dyn Checkable>> {
    vec![
        Box::new(layering::IllegalDependency),
        Box::new(layering::LayerIntegrity),
        Box::new(demeter::LawOfDemeter),
        Box::new(demeter::NakedReturn),
        Box::new(demeter::MissingAbstraction),
        Box::new(io_isolation::ForbiddenIoInSilentLayer),
        Box::new(io_isolation::DefensiveNoneCheck),
        Box::new(io_isolation::IllegalIoInSilentCore),
        Box::new(io_isolation::UiConcernInDomain),
        Box::new(structure::DelegationAntiPattern),
        Box::new(structure::GodFile),
        Box::new(structure::DeepStructure),
        Box::new(structure::NoTopLevelFunctions),
        Box::new(structure::GlobalState),
        Box::new(structure::InterfaceSegregation),
        Box::new(structure::MethodComplexity),
        Box::new(typing::MissingTypeHint),
        Box::new(typing::BannedAny),
        Box::new(typing::UninferableDependency),
        Box::new(contracts::ContractIntegrity::default()),
        Box::new(contracts::ConcreteMethodStub),
        Box::new(contracts::DiViolation),
        Box::new(contracts::DomainImmutability),
        Box::new(access::ProtectedMemberAccess),
        Box::new(access::ConstructorInjection),
        Box::new(access::ExceptionHygiene),
        Box::new(patterns::BuilderSuggestion),
        Box::new(patterns::FactorySuggestion),
        Box::new(patterns::StrategySuggestion),
        Box::new(patterns::StateSuggestion),
        Box::new(patterns::FacadeSuggestion),
        Box::new(testing::PrivateMethodTest),
    ]
}

/// Every rule that carries cross-node scope state (currently just W9101).
/// Kept distinct from `scatter`'s cross-*file* reduction, which has no
/// per-scope lifecycle and is driven separately by the audit/fix pipelines.
pub fn stateful_rules() -> Vec<Box<dyn StatefulRule>> {
    vec![Box::new(testing::FragileTestMocks::default())]
}

/// Every rule whose catalog entry is marked `fixable`, keyed by code so the
/// fix pipeline can look one up by the `Violation::code` it is repairing.
pub fn fixable_rules() -> Vec<(&'static str, Box<dyn Fixable>)> {
    vec![
        ("W9006", Box::new(demeter::LawOfDemeter)),
        ("W9015", Box::new(typing::MissingTypeHint)),
        ("W9601", Box::new(contracts::DomainImmutability)),
    ]
}

/// Rules that scan raw source text rather than the AST (currently just
/// W9501). Run once per file, independent of the AST walk.
pub fn text_rules() -> Vec<Box<dyn TextRule>> {
    vec![Box::new(bypass::AntiBypass)]
}

/// W9030 is dispatched like any other `Checkable` (it subscribes to
/// `Const` nodes) but its verdict only exists after every file in the run
/// has been collected, so the pipeline holds a concrete instance instead of
/// boxing it into `checkable_rules()` — it needs `reduce()` called once,
/// after the last file, which a `Box<dyn Checkable>` can't expose.
pub fn scatter_rule() -> scatter::ArchitecturalEntropy {
    scatter::ArchitecturalEntropy::default()
}

/// Bundles the checkable and fixable catalogs for callers (the fix
/// pipeline) that need to both re-check a file and look up a fix for one
/// of the violations found, without re-deriving either list each time.
pub struct EngineRules {
    checkable: Vec<Box<dyn Checkable>>,
    fixable: HashMap<&'static str, Box<dyn Fixable>>,
}

impl Default for EngineRules {
    fn default() -> Self {
        Self {
            checkable: checkable_rules(),
            fixable: fixable_rules().into_iter().collect(),
        }
    }
}

impl EngineRules {
    pub fn check_all(&self, ast: &Ast, ctx: &RuleContext) -> Vec<crate::diagnostics::Violation> {
        let mut violations = Vec::new();
        for node in ast.walk() {
            for rule in &self.checkable {
                if rule.entrypoints().contains(&node.kind) {
                    violations.extend(rule.check(node.id, ctx));
                }
            }
        }
        violations
    }

    pub fn fixable_for(&self, code: &str) -> Option<&dyn Fixable> {
        self.fixable.get(code).map(|b| b.as_ref())
    }
}
