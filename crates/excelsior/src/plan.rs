//! `excelsior plan <topic>`: emits a human-readable Markdown fix plan for
//! one rule, read back out of the last persisted `ai_handover.json` rather
//! than re-running the audit — `plan` answers "what would fixing this
//! look like", it doesn't itself find new violations.

use std::path::Path;

use anyhow::{bail, Context, Result};
use excelsior_linter::{HandoverArtifact, RuleGroup};

use crate::cli::PlanCommand;

fn load_handover(root: &Path) -> Result<HandoverArtifact> {
    let path = root.join(".excelsior").join("check").join("ai_handover.json");
    let body = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "no handover artifact at {} — run `excelsior check` first",
            path.display()
        )
    })?;
    serde_json::from_str(&body).with_context(|| format!("failed to parse {}", path.display()))
}

fn find_group<'a>(handover: &'a HandoverArtifact, topic: &str) -> Option<&'a RuleGroup> {
    handover
        .groups
        .iter()
        .find(|g| g.code.eq_ignore_ascii_case(topic))
        .or_else(|| {
            handover
                .groups
                .iter()
                .find(|g| g.message.to_lowercase().contains(&topic.to_lowercase()))
        })
}

fn render_plan(group: &RuleGroup) -> String {
    let mut body = format!("# Fix plan: {}\n\n{}\n\n", group.code, group.message);

    body.push_str(&format!(
        "**Fixable automatically:** {}\n\n",
        if group.fixable { "yes" } else { "no" }
    ));

    if let Some(instructions) = &group.manual_instructions {
        body.push_str(&format!("## Manual steps\n\n{instructions}\n\n"));
    }
    if let Some(guidance) = &group.proactive_guidance {
        body.push_str(&format!("## Suggested pattern\n\n{guidance}\n\n"));
    }
    if !group.fix_failure_reasons.is_empty() {
        body.push_str("## Why automatic fixing failed here\n\n");
        for reason in &group.fix_failure_reasons {
            body.push_str(&format!("- {reason}\n"));
        }
        body.push('\n');
    }

    body.push_str(&format!("## Occurrences ({})\n\n", group.occurrences.len()));
    for occurrence in &group.occurrences {
        body.push_str(&format!("- {occurrence}\n"));
    }

    body
}

pub fn run(cmd: &PlanCommand, root: &Path, timestamp: &str) -> Result<std::path::PathBuf> {
    let handover = load_handover(root)?;
    let Some(group) = find_group(&handover, &cmd.topic) else {
        bail!(
            "no rule or occurrence matching `{}` in the last audit's handover",
            cmd.topic
        );
    };

    let plan_dir = root.join(".excelsior").join("fix_plans");
    std::fs::create_dir_all(&plan_dir)
        .with_context(|| format!("failed to create {}", plan_dir.display()))?;
    let out_path = plan_dir.join(format!("{}_{}.md", group.code, timestamp));
    std::fs::write(&out_path, render_plan(group))
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    Ok(out_path)
}
