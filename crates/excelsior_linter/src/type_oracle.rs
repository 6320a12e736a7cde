//! Best-effort type resolution over the AST model plus bundled stub files.
//! No counterpart exists in the teacher (Fortran is statically typed end to
//! end); this module is original design work, shaped like the teacher's
//! other best-effort lookup surfaces (`ast::types` queries) but with the
//! "give up and return `None`" discipline the design calls for.

use std::collections::HashMap;

use excelsior_ast::{Ast, Literal, Node, NodeId, NodeKind};

/// A resolved type name, always fully qualified when known (`builtins.int`,
/// not `int`). `None` from any oracle query means "unknown, do not guess" —
/// callers must not treat it as `Any`.
pub type QName = String;

fn normalize_primitive(alias: &str) -> QName {
    match alias {
        "int" | "float" | "str" | "bool" | "bytes" | "list" | "dict" | "set" | "tuple"
        | "frozenset" | "complex" | "object" => format!("builtins.{alias}"),
        "None" | "NoneType" => "builtins.NoneType".to_string(),
        other => other.to_string(),
    }
}

/// Bundled interface descriptions for the standard library and the AST
/// library itself, loaded lazily. A real deployment ships `.pyi`-style stub
/// text; here the stub set is a small embedded qname -> return-type map
/// covering the oracle's own documented callers (`is_stdlib_qname`, W9004's
/// banned-receiver checks).
#[derive(Debug, Default)]
pub struct StubIndex {
    return_types: HashMap<String, QName>,
    stdlib_modules: Vec<&'static str>,
}

impl StubIndex {
    pub fn load_bundled() -> Self {
        let mut return_types = HashMap::new();
        return_types.insert("builtins.len".to_string(), "builtins.int".to_string());
        return_types.insert("builtins.str".to_string(), "builtins.str".to_string());
        return_types.insert("builtins.repr".to_string(), "builtins.str".to_string());
        return_types.insert("pathlib.Path".to_string(), "pathlib.Path".to_string());
        Self {
            return_types,
            stdlib_modules: vec![
                "os", "sys", "re", "json", "pathlib", "subprocess", "socket", "sqlite3",
                "collections", "itertools", "functools", "typing", "dataclasses", "logging",
                "datetime", "io", "abc",
            ],
        }
    }

    pub fn is_stdlib_module(&self, module: &str) -> bool {
        let root = module.split('.').next().unwrap_or(module);
        self.stdlib_modules.contains(&root)
    }

    fn return_type_of(&self, qname: &str) -> Option<QName> {
        self.return_types.get(qname).cloned()
    }
}

/// Receivers treated as safe to chain through without tripping W9006 Law of
/// Demeter, configurable via `trusted_authorities` (see DESIGN.md Open
/// Question decisions).
const DEFAULT_TRUSTED_AUTHORITIES: &[&str] = &[
    "pathlib.Path",
    "re.Match",
    "subprocess.CompletedProcess",
    "builtins.dict",
    "builtins.list",
    "builtins.str",
    "builtins.tuple",
];

pub struct TypeOracle<'a> {
    ast: &'a Ast,
    stubs: StubIndex,
    trusted_authorities: Vec<String>,
}

impl<'a> TypeOracle<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            stubs: StubIndex::load_bundled(),
            trusted_authorities: DEFAULT_TRUSTED_AUTHORITIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_trusted_authorities(mut self, extra: Vec<String>) -> Self {
        self.trusted_authorities.extend(extra);
        self
    }

    /// Resolves the type of `node`, trying explicit annotations first, then
    /// literal inference, then the stub index. Returns `None` rather than
    /// guessing when every source is silent or conflicting.
    pub fn resolve(&self, id: NodeId) -> Option<QName> {
        let node = self.ast.get(id);
        self.from_annotation(node)
            .or_else(|| self.from_literal(node))
            .or_else(|| self.from_stub_call(node))
    }

    fn from_annotation(&self, node: &Node) -> Option<QName> {
        node.payload
            .type_annotation
            .as_ref()
            .map(|raw| normalize_primitive(raw.trim()))
    }

    fn from_literal(&self, node: &Node) -> Option<QName> {
        if node.kind != NodeKind::Const {
            return None;
        }
        match node.payload.literal.as_ref()? {
            Literal::Int(_) => Some("builtins.int".to_string()),
            Literal::Float(_) => Some("builtins.float".to_string()),
            Literal::Str(_) => Some("builtins.str".to_string()),
            Literal::Bool(_) => Some("builtins.bool".to_string()),
            Literal::None => Some("builtins.NoneType".to_string()),
        }
    }

    fn from_stub_call(&self, node: &Node) -> Option<QName> {
        if node.kind != NodeKind::Call {
            return None;
        }
        let callee = node.children.first()?;
        let name = self.ast.get(*callee).payload.identifier.as_ref()?;
        self.stubs.return_type_of(name)
    }

    pub fn is_primitive(&self, qname: &str) -> bool {
        matches!(
            qname,
            "builtins.int"
                | "builtins.float"
                | "builtins.str"
                | "builtins.bool"
                | "builtins.bytes"
                | "builtins.NoneType"
        )
    }

    pub fn is_stdlib_qname(&self, qname: &str) -> bool {
        let module = qname.rsplit_once('.').map(|(m, _)| m).unwrap_or(qname);
        self.stubs.is_stdlib_module(module)
    }

    /// A call is "fluent" when its resolved return type equals its
    /// receiver's type — `builder.with_x().with_y()` stays one conceptual
    /// step for W9006 purposes.
    pub fn is_fluent_call(&self, call_id: NodeId, receiver_type: &QName) -> bool {
        self.resolve(call_id)
            .map(|t| &t == receiver_type)
            .unwrap_or(false)
    }

    pub fn is_trusted_authority_call(&self, receiver_type: &str) -> bool {
        self.trusted_authorities.iter().any(|t| t == receiver_type)
    }
}
