//! CST Gateway: the only thing allowed to turn a `TransformationPlan` into
//! bytes on disk. Grounded on the teacher's `fix::edits::Edit` model — a
//! flat list of byte-range rewrites applied back-to-front so earlier edits
//! don't invalidate later offsets — generalized from Fortran-specific plan
//! kinds to this engine's `PlanKind` catalog.

use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Edit, PlanKind, TransformationPlan};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unrecognized plan kind `{0}`; refusing to apply silently")]
    UnrecognizedPlan(String),
    #[error("io error applying fixes to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `apply_fixes(file_path, [TransformationPlan]) -> bool` per spec §4.6.
/// Implementations never receive a raw rewriter handle — only declarative
/// plans — so swapping the text-splice default for a real CST library
/// later is a drop-in replacement behind this port.
pub trait CstGateway {
    fn apply_fixes(&self, path: &Path, plans: &[TransformationPlan]) -> Result<bool, GatewayError>;
}

/// Default implementation: converts each plan to an `Edit`, applies all of
/// them as one ordered pass over the file's text, and atomically replaces
/// the file. A `.bak` backup is written first unless `backup` is `false`.
pub struct TextSpliceGateway {
    pub backup: bool,
}

impl Default for TextSpliceGateway {
    fn default() -> Self {
        Self { backup: true }
    }
}

impl TextSpliceGateway {
    fn plan_to_edit(&self, text: &str, plan: &TransformationPlan) -> Result<Edit, GatewayError> {
        let offset = line_col_to_offset(text, plan.anchor.line, plan.anchor.column);
        match plan.kind {
            PlanKind::AddReturnType => {
                let annotation = plan.params["annotation"].as_str().unwrap_or_default();
                Ok(Edit::insertion(format!(" -> {annotation}"), offset))
            }
            PlanKind::AddParameterType => {
                let annotation = plan.params["annotation"].as_str().unwrap_or_default();
                Ok(Edit::insertion(format!(": {annotation}"), offset))
            }
            PlanKind::AddFrozenDecorator => {
                let decorator = plan.params["decorator"].as_str().unwrap_or("frozen");
                Ok(Edit::insertion(format!("@{decorator}\n"), offset))
            }
            PlanKind::AddGovernanceComment => {
                let comment = plan.params["comment"].as_str().unwrap_or_default();
                Ok(Edit::insertion(format!("# {comment}\n"), offset))
            }
            PlanKind::AddImport => {
                let import = plan.params["import"].as_str().unwrap_or_default();
                Ok(Edit::insertion(format!("{import}\n"), offset))
            }
            PlanKind::AddNoneReturnAnnotation => Ok(Edit::insertion(" -> None", offset)),
            PlanKind::AddPyTypedMarker | PlanKind::AddInitFile => Ok(Edit::insertion("", offset)),
            PlanKind::StripDuplicateAnnotation | PlanKind::ApplyNamedTransformer => {
                Err(GatewayError::UnrecognizedPlan(plan.kind.to_string()))
            }
        }
    }
}

impl CstGateway for TextSpliceGateway {
    fn apply_fixes(&self, path: &Path, plans: &[TransformationPlan]) -> Result<bool, GatewayError> {
        if plans.is_empty() {
            return Ok(false);
        }
        let text = fs::read_to_string(path).map_err(|source| GatewayError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if self.backup {
            let backup_path = path.with_extension(format!(
                "{}.bak",
                path.extension().and_then(|e| e.to_str()).unwrap_or("")
            ));
            fs::write(&backup_path, &text).map_err(|source| GatewayError::Io {
                path: backup_path,
                source,
            })?;
        }

        let mut edits: Vec<Edit> = plans
            .iter()
            .map(|plan| self.plan_to_edit(&text, plan))
            .collect::<Result<_, _>>()?;
        edits.sort_by(|a, b| b.start.cmp(&a.start));

        let mut rewritten = text.clone();
        for edit in &edits {
            let replacement = edit.content.clone().unwrap_or_default();
            rewritten.replace_range(edit.start..edit.end, &replacement);
        }

        fs::write(path, rewritten).map_err(|source| GatewayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }
}

fn line_col_to_offset(text: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (idx, line_text) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            return offset + (column.saturating_sub(1)).min(line_text.len());
        }
        offset += line_text.len();
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_to_offset_finds_second_line() {
        let text = "a = 1\nb = 2\n";
        assert_eq!(line_col_to_offset(text, 2, 1), 6);
    }

    #[test]
    fn test_unrecognized_plan_kind_fails_loudly() {
        let gateway = TextSpliceGateway::default();
        let plan = TransformationPlan {
            kind: PlanKind::StripDuplicateAnnotation,
            target_path: PathBuf::from("t.py"),
            anchor: crate::diagnostics::Anchor {
                node_kind: "AnnAssign".to_string(),
                identifier: None,
                line: 1,
                column: 1,
            },
            params: serde_json::json!({}),
        };
        let err = gateway.plan_to_edit("x: int\n", &plan).unwrap_err();
        assert!(matches!(err, GatewayError::UnrecognizedPlan(_)));
    }

    /// End-to-end for W9015: the plan `MissingTypeHint::fix` actually emits
    /// (`"annotation"`, not `"type"`) must round-trip through the gateway
    /// into a real `-> str:` return annotation, not an empty `-> :`.
    #[test]
    fn test_add_return_type_plan_writes_real_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greet.py");
        fs::write(&path, "def greet(name: str):\n    return \"hi \" + name\n").unwrap();

        let plan = TransformationPlan {
            kind: PlanKind::AddReturnType,
            target_path: path.clone(),
            anchor: crate::diagnostics::Anchor {
                node_kind: "FunctionDef".to_string(),
                identifier: Some("greet".to_string()),
                line: 1,
                column: 21,
            },
            params: serde_json::json!({ "annotation": "str" }),
        };

        let gateway = TextSpliceGateway { backup: false };
        assert!(gateway.apply_fixes(&path, &[plan]).unwrap());
        let rewritten = fs::read_to_string(&path).unwrap();
        assert_eq!(rewritten, "def greet(name: str) -> str:\n    return \"hi \" + name\n");
    }

    /// End-to-end for W9006: `LawOfDemeter::fix` emits `"comment"`, not
    /// `"message"` — must produce the violation text in the comment, not
    /// an empty `# `.
    #[test]
    fn test_add_governance_comment_plan_writes_real_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.py");
        fs::write(&path, "total = order.customer.address.city\n").unwrap();

        let plan = TransformationPlan {
            kind: PlanKind::AddGovernanceComment,
            target_path: path.clone(),
            anchor: crate::diagnostics::Anchor {
                node_kind: "Attribute".to_string(),
                identifier: Some("city".to_string()),
                line: 1,
                column: 1,
            },
            params: serde_json::json!({ "comment": "Law of Demeter: chain through `order.customer.address` reaches past one hop" }),
        };

        let gateway = TextSpliceGateway { backup: false };
        assert!(gateway.apply_fixes(&path, &[plan]).unwrap());
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.starts_with(
            "# Law of Demeter: chain through `order.customer.address` reaches past one hop\n"
        ));
    }
}
