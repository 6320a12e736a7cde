//! `excelsior check`: runs the Gated Sequential Audit Pipeline over a path
//! and persists the `.excelsior/check` (and, unless suppressed, `.excelsior/
//! health`) artifact trail. Grounded on the teacher's `check_path` driver
//! in `fortitude::check`, generalized from "one linter's own rules" to
//! "five passes, four of them delegated to adapters".

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use excelsior_ast::{parse, NodeKind, SourceFile};
use excelsior_linter::engine::{check_file, EntrypointMap};
use excelsior_linter::rules::{checkable_rules, scatter_rule, stateful_rules, text_rules};
use excelsior_linter::{build_handover, run_audit, AuditResult, LayerResolver, LinterAdapter, Pass};
use excelsior_workspace::Configuration;
use log::debug;

use crate::adapters::{ImportLinterAdapter, MypyAdapter, RuffCodeQualityAdapter, RuffImportTypingAdapter};
use crate::cli::{CheckCommand, LinterSelector};
use crate::discover::discover_python_files;
use crate::module_path::dotted_module;
use crate::trail::write_audit_trail;

fn decorator_names(ast: &excelsior_ast::Ast) -> Vec<String> {
    ast.walk()
        .filter(|n| matches!(n.kind, NodeKind::ClassDef | NodeKind::FunctionDef))
        .flat_map(|n| n.payload.decorator_names.clone())
        .collect()
}

/// Runs every `Checkable`/`StatefulRule`/`TextRule`/scatter check across
/// every discovered file, then reduces the cross-file scatter table once
/// at the end — the only one of the five passes this crate owns directly.
fn run_excelsior_pass(
    files: &[PathBuf],
    root: &Path,
    config: &Configuration,
) -> Result<Vec<excelsior_linter::Violation>> {
    let checkable = checkable_rules();
    let stateful = stateful_rules();
    let text = text_rules();
    let scatter = scatter_rule();
    let entrypoints = EntrypointMap::build(&checkable);

    let layer_map_config = config.layer_map_config();
    let resolver = LayerResolver::new(&layer_map_config);

    let mut violations = Vec::new();

    for path in files {
        let text_content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let source = SourceFile::new(path.clone(), text_content);
        let ast = match parse(&source) {
            Ok(ast) => ast,
            Err(err) => {
                debug!("skipping {}: parse error: {err}", path.display());
                continue;
            }
        };

        let module = dotted_module(path, root);
        let decorators = decorator_names(&ast);
        let layer = resolver.resolve(&module, path, &decorators);
        let resolve_layer = |dotted: &str| -> Option<String> { resolver.resolve(dotted, Path::new(dotted), &[]) };

        violations.extend(check_file(
            &checkable,
            &entrypoints,
            &stateful,
            &text,
            &scatter,
            &ast,
            &source,
            path,
            &module,
            layer.as_ref(),
            &resolve_layer,
        ));
    }

    violations.extend(scatter.reduce());
    violations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(violations)
}

fn selected_adapters(selector: LinterSelector, timeout: Duration) -> Vec<(Pass, Box<dyn LinterAdapter>)> {
    let all: Vec<(Pass, Box<dyn LinterAdapter>)> = vec![
        (Pass::ImportLinter, Box::new(ImportLinterAdapter { timeout })),
        (Pass::RuffImportTyping, Box::new(RuffImportTypingAdapter { timeout })),
        (Pass::Mypy, Box::new(MypyAdapter { timeout })),
        (Pass::RuffCodeQuality, Box::new(RuffCodeQualityAdapter { timeout })),
    ];

    match selector {
        LinterSelector::All => all,
        // The architecture pass is this crate's own rule catalog, not an
        // adapter — selecting it means "skip all four external adapters".
        LinterSelector::Architecture => Vec::new(),
        LinterSelector::ImportLinter => all.into_iter().filter(|(p, _)| *p == Pass::ImportLinter).collect(),
        LinterSelector::RuffImportTyping => {
            all.into_iter().filter(|(p, _)| *p == Pass::RuffImportTyping).collect()
        }
        LinterSelector::Mypy => all.into_iter().filter(|(p, _)| *p == Pass::Mypy).collect(),
        LinterSelector::RuffCodeQuality => {
            all.into_iter().filter(|(p, _)| *p == Pass::RuffCodeQuality).collect()
        }
    }
}

pub fn run(cmd: &CheckCommand, root: &Path, config: &Configuration, timestamp: String) -> Result<AuditResult> {
    let files = discover_python_files(&cmd.path);
    let excelsior_violations = run_excelsior_pass(&files, root, config)?;

    let adapter_boxes = selected_adapters(cmd.linter, config.audit_config().external_timeout);
    let adapters: Vec<(Pass, &dyn LinterAdapter)> =
        adapter_boxes.iter().map(|(p, a)| (*p, a.as_ref())).collect();

    let mut audit_config = config.audit_config();
    if !matches!(cmd.linter, LinterSelector::All) {
        for (idx, pass) in Pass::ORDER.iter().enumerate() {
            audit_config.enabled[idx] =
                audit_config.enabled[idx] && (adapters.iter().any(|(p, _)| p == pass) || *pass == Pass::Excelsior);
        }
    }

    let result = run_audit(&audit_config, &files, &adapters, excelsior_violations, timestamp);

    let registry =
        excelsior_workspace::load_default_catalog().context("failed to load the default rule catalog")?;
    let handover = build_handover(&result, &|code| {
        registry
            .get(code)
            .map(|def| (def.manual_instructions.clone(), def.proactive_guidance.clone()))
    });

    write_audit_trail(root, &result, &handover, cmd.no_health)?;

    Ok(result)
}
