//! Small helpers shared across rule modules: name extraction, location
//! building, and the few literal pattern tables the catalog's message
//! templates reference. Kept out of `registry.rs` so rules stay the only
//! consumers of AST-shape-specific plumbing.

use std::path::Path;

use excelsior_ast::{Ast, Node, NodeId, NodeKind};

use crate::diagnostics::SourceLocation;

pub fn location(path: &Path, node: &Node) -> SourceLocation {
    SourceLocation::new(path.to_path_buf(), node.span.start)
}

/// The identifier a `Name` or `Attribute` node ultimately names — for
/// `Attribute`, that's the rightmost segment (`payload.identifier` already
/// holds just that segment, see `excelsior_ast::parser::parse_postfix_expr`).
pub fn leaf_name(ast: &Ast, id: NodeId) -> Option<String> {
    let node = ast.get(id);
    match node.kind {
        NodeKind::Name | NodeKind::Attribute | NodeKind::AssignName | NodeKind::AssignAttr => {
            node.payload.identifier.clone()
        }
        NodeKind::Subscript => node.children.first().and_then(|c| leaf_name(ast, *c)),
        NodeKind::Call => node.children.first().and_then(|c| leaf_name(ast, *c)),
        _ => None,
    }
}

/// Full dotted chain for an `Attribute`/`Name` expression, receiver first:
/// `user.address.coordinates` -> `["user", "address", "coordinates"]`.
pub fn dotted_chain(ast: &Ast, id: NodeId) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = Some(id);
    while let Some(cur) = current {
        let node = ast.get(cur);
        match node.kind {
            NodeKind::Attribute => {
                if let Some(name) = &node.payload.identifier {
                    parts.push(name.clone());
                }
                current = node.children.first().copied();
            }
            NodeKind::Name => {
                if let Some(name) = &node.payload.identifier {
                    parts.push(name.clone());
                }
                current = None;
            }
            _ => current = None,
        }
    }
    parts.reverse();
    parts
}

pub const MOCK_CONSTRUCTORS: &[&str] = &["Mock", "MagicMock", "AsyncMock", "patch"];

pub fn is_mock_constructor_call(name: &str) -> bool {
    MOCK_CONSTRUCTORS.contains(&name)
}

pub fn is_test_function(name: &str) -> bool {
    name.starts_with("test_")
}

/// Banned receivers for W9004/W9013: stdlib calls that perform direct I/O,
/// disallowed in silent layers.
pub const BANNED_IO_RECEIVERS: &[&str] = &[
    "open", "socket", "requests", "urllib", "sqlite3", "psycopg2", "subprocess", "shutil",
];

pub const BANNED_PRINT_LIKE: &[&str] = &["print", "pprint"];

/// Raw host-language types W9007/W9009 treat as leaking infrastructure
/// details across a layer boundary.
pub const BANNED_RAW_TYPES: &[&str] = &["Cursor", "Response", "Row", "Connection", "Socket"];
