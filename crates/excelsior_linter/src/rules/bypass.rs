//! W9501 Anti-Bypass. Token-driven: scans raw lines rather than the AST,
//! the one rule that cannot be expressed as a node-kind query, since a
//! disable directive is a comment convention the grammar never models.

use excelsior_ast::{Location, SourceFile};

use crate::diagnostics::{SourceLocation, Violation};
use crate::registry::TextRule;

const JUSTIFICATION_MARKER: &str = "JUSTIFICATION:";

fn disable_directive(line: &str) -> Option<&str> {
    let idx = line.find("# excelsior: disable=")?;
    Some(line[idx + "# excelsior: disable=".len()..].trim())
}

pub struct AntiBypass;

impl TextRule for AntiBypass {
    fn code(&self) -> &'static str {
        "W9501"
    }

    fn check(&self, path: &std::path::Path, source: &SourceFile) -> Vec<Violation> {
        let lines: Vec<&str> = source.text().lines().collect();
        lines
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| {
                let codes = disable_directive(line)?;
                let justified = line.contains(JUSTIFICATION_MARKER)
                    || idx > 0 && lines[idx - 1].contains(JUSTIFICATION_MARKER);
                if justified {
                    return None;
                }
                Some(
                    Violation::new(
                        self.code(),
                        format!(
                            "disable directive for `{codes}` has no adjacent `# JUSTIFICATION:` comment"
                        ),
                        SourceLocation::new(path, Location::new(idx + 1, 1)),
                    )
                    .with_symbol(codes.to_string()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anti_bypass_fires_without_justification() {
        let source = SourceFile::new("t.py", "value = 1  # excelsior: disable=W9016\n");
        let violations = AntiBypass.check(std::path::Path::new("t.py"), &source);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].symbol.as_deref(), Some("W9016"));
    }

    #[test]
    fn test_anti_bypass_allows_same_line_justification() {
        let source = SourceFile::new(
            "t.py",
            "value = 1  # excelsior: disable=W9016  # JUSTIFICATION: third-party stub has no types\n",
        );
        let violations = AntiBypass.check(std::path::Path::new("t.py"), &source);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_anti_bypass_allows_preceding_line_justification() {
        let source = SourceFile::new(
            "t.py",
            "# JUSTIFICATION: vendored client has no stubs\nvalue = 1  # excelsior: disable=W9016\n",
        );
        let violations = AntiBypass.check(std::path::Path::new("t.py"), &source);
        assert!(violations.is_empty());
    }
}
