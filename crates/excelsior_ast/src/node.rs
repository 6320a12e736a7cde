//! The tagged-variant AST. Per Design Note §9, this is a hand-written
//! exhaustive enum + arena rather than a nominal single-dispatch
//! `visit_<node>` tree: the driver in `excelsior_linter::engine` walks the
//! arena once and dispatches to rules by `NodeKind`, so adding a node kind
//! here forces every dispatch table to be reconsidered at compile time.

use std::collections::HashMap;

use crate::source::Span;

/// Arena index. Children own nothing; the arena owns every node, and a
/// `Node` only ever refers to siblings/children/parent by index, never by
/// reference, which sidesteps the cyclic-parent-link problem Design Note §9
/// calls out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct NodeId(pub u32);

/// The canonical node catalog from `spec.md` §3. Exhaustive: every rule's
/// `entrypoints()` returns a subset of this enum, and the engine's dispatch
/// table is required to handle every variant (even if most rules ignore
/// most of them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, is_macro::Is)]
pub enum NodeKind {
    Module,
    ClassDef,
    FunctionDef,
    AsyncFunctionDef,
    Arguments,
    Decorators,
    Call,
    Keyword,
    Assign,
    AugAssign,
    AnnAssign,
    AssignName,
    AssignAttr,
    Attribute,
    Name,
    Const,
    Subscript,
    If,
    For,
    While,
    Try,
    With,
    ExceptHandler,
    Expr,
    Compare,
    BoolOp,
    UnaryOp,
    BinOp,
    Dict,
    List,
    Set,
    Tuple,
    Lambda,
    IfExp,
    Comprehension,
    ListComp,
    SetComp,
    DictComp,
    GeneratorExp,
    Yield,
    YieldFrom,
    Await,
    Starred,
    FormattedValue,
    JoinedStr,
    Pass,
    Break,
    Continue,
    Raise,
    Assert,
    Delete,
    Slice,
    Index,
    ExtSlice,
    Match,
    MatchCase,
    NamedExpr,
    Global,
    Import,
    ImportFrom,
    Return,
}

impl NodeKind {
    /// Node kinds that introduce a new lexical scope/frame, used by
    /// `Node::enclosing_scope` and by stateful rules that need "am I inside
    /// a function" queries (W9101, W9034, ...).
    pub fn opens_scope(self) -> bool {
        matches!(
            self,
            NodeKind::Module
                | NodeKind::ClassDef
                | NodeKind::FunctionDef
                | NodeKind::AsyncFunctionDef
                | NodeKind::Lambda
        )
    }
}

/// A literal value attached to `Const` nodes and used for best-effort type
/// inference (`excelsior_linter::type_oracle`).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

/// Payload carried by a small number of node kinds where the kind tag alone
/// isn't enough for rules to do their job (an identifier, an operator, a
/// literal value). Most node kinds carry no payload — their meaning comes
/// entirely from their children.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
pub struct NodePayload {
    pub identifier: Option<String>,
    pub literal: Option<Literal>,
    pub operator: Option<String>,
    pub decorator_names: Vec<String>,
    pub type_annotation: Option<String>,
    pub is_async: bool,
    /// Generic string-list slot, reused by whichever node kind needs a list
    /// of names: `Import`/`ImportFrom` aliases, `Global` identifiers.
    pub names: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub payload: NodePayload,
}

/// Owns every `Node` in a parsed file. Invariant: parent links form a tree
/// rooted at the single `Module` node (index 0).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn push(
        &mut self,
        kind: NodeKind,
        span: Span,
        parent: Option<NodeId>,
        payload: NodePayload,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            kind,
            span,
            parent,
            children: Vec::new(),
            payload,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0 as usize].children.push(id);
        }
        id
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.get(id).parent.map(|p| self.get(p))
    }

    pub(crate) fn set_span(&mut self, id: NodeId, span: Span) {
        self.nodes[id.0 as usize].span = span;
    }

    pub(crate) fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0 as usize].kind = kind;
    }

    pub(crate) fn payload_mut(&mut self, id: NodeId) -> &mut NodePayload {
        &mut self.nodes[id.0 as usize].payload
    }

    /// Attaches a node built with no parent (`push(.., None, ..)`) under
    /// `new_parent`, the way the parser builds an operand before it knows
    /// which wrapping node (BinOp, Call, ...) will own it. `child` must not
    /// already be anyone's child.
    pub(crate) fn reparent(&mut self, child: NodeId, new_parent: NodeId) {
        self.nodes[child.0 as usize].parent = Some(new_parent);
        self.nodes[new_parent.0 as usize].children.push(child);
    }

    /// Flips a freshly-parsed expression node (and, recursively, its
    /// unpacking-target children) from its expression kind to the matching
    /// assignment-target kind (`Name` -> `AssignName`, `Attribute` ->
    /// `AssignAttr`). Mutating in place keeps the arena's ids and spans
    /// stable instead of re-allocating a parallel target tree.
    pub(crate) fn retag_as_target(&mut self, id: NodeId) {
        let kind = self.get(id).kind;
        match kind {
            NodeKind::Name => self.nodes[id.0 as usize].kind = NodeKind::AssignName,
            NodeKind::Attribute => self.nodes[id.0 as usize].kind = NodeKind::AssignAttr,
            NodeKind::Tuple | NodeKind::List => {
                let children = self.get(id).children.clone();
                for child in children {
                    self.retag_as_target(child);
                }
            }
            NodeKind::Starred => {
                if let Some(child) = self.get(id).children.first().copied() {
                    self.retag_as_target(child);
                }
            }
            _ => {}
        }
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.get(id).children.iter().map(move |c| self.get(*c))
    }

    /// Base-class expressions of a `ClassDef`. The parser attaches base
    /// expressions before any body statement, and no statement is ever
    /// itself a bare `Name`/`Attribute`/`Subscript` node (they're wrapped
    /// in `Expr`), so the leading run of those kinds is exactly the base
    /// list.
    pub fn class_bases(&self, id: NodeId) -> Vec<&Node> {
        self.children(id)
            .take_while(|n| {
                matches!(n.kind, NodeKind::Name | NodeKind::Attribute | NodeKind::Subscript)
            })
            .collect()
    }

    /// Pre-order traversal of the whole tree, the same "walk once, dispatch
    /// by kind" shape as the teacher's `check_path` (`once(root).chain(root.descendants())`).
    pub fn walk(&self) -> impl Iterator<Item = &Node> {
        let mut stack = vec![NodeId(0)];
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = self.get(id);
            stack.extend(node.children.iter().rev());
        }
        order.into_iter().map(move |id| self.get(id))
    }

    /// Walks up from `id` to the nearest enclosing scope-opening node
    /// (`FunctionDef`/`AsyncFunctionDef`/`ClassDef`/`Module`/`Lambda`).
    pub fn enclosing_scope(&self, id: NodeId) -> &Node {
        let mut current = self.get(id);
        while !current.kind.opens_scope() {
            match current.parent {
                Some(parent) => current = self.get(parent),
                None => break,
            }
        }
        current
    }

    /// Every ancestor `ClassDef`/`FunctionDef` name, outermost first —
    /// used to build qualified names for the Layer Resolver and Type Oracle.
    pub fn enclosing_names(&self, id: NodeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = self.get(id).parent;
        while let Some(parent_id) = current {
            let node = self.get(parent_id);
            if matches!(
                node.kind,
                NodeKind::ClassDef | NodeKind::FunctionDef | NodeKind::AsyncFunctionDef
            ) {
                if let Some(name) = &node.payload.identifier {
                    names.push(name.clone());
                }
            }
            current = node.parent;
        }
        names.reverse();
        names
    }

    /// Attribute-access chain length for a (possibly nested) `Attribute`
    /// node, e.g. `user.address.coordinates.lat` has chain length 3 (three
    /// dots past the receiver). Used by W9006.
    pub fn attribute_chain_len(&self, id: NodeId) -> usize {
        let mut len = 0;
        let mut current = self.get(id);
        while current.kind == NodeKind::Attribute {
            len += 1;
            match current.children.first() {
                Some(child) => current = self.get(*child),
                None => break,
            }
        }
        len
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Flat map of identifier -> declaring `NodeId`, scoped per `Ast::enclosing_scope`.
/// Used by the Type Oracle's `Name.lookup` style queries.
#[derive(Debug, Default)]
pub struct SymbolTable {
    by_scope: HashMap<NodeId, HashMap<String, NodeId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, scope: NodeId, name: impl Into<String>, decl: NodeId) {
        self.by_scope.entry(scope).or_default().insert(name.into(), decl);
    }

    pub fn lookup(&self, ast: &Ast, from: NodeId, name: &str) -> Option<NodeId> {
        let mut scope = ast.enclosing_scope(from).id;
        loop {
            if let Some(found) = self.by_scope.get(&scope).and_then(|s| s.get(name)) {
                return Some(*found);
            }
            let parent = ast.get(scope).parent?;
            scope = ast.enclosing_scope(parent).id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;

    fn pt() -> Span {
        Span::point(Location::new(1, 1))
    }

    #[test]
    fn test_push_registers_child() {
        let mut ast = Ast::new();
        let module = ast.push(NodeKind::Module, pt(), None, NodePayload::default());
        let func = ast.push(NodeKind::FunctionDef, pt(), Some(module), NodePayload::default());
        assert_eq!(ast.get(module).children, vec![func]);
        assert_eq!(ast.parent(func).unwrap().id, module);
    }

    #[test]
    fn test_walk_is_pre_order() {
        let mut ast = Ast::new();
        let module = ast.push(NodeKind::Module, pt(), None, NodePayload::default());
        let a = ast.push(NodeKind::Pass, pt(), Some(module), NodePayload::default());
        let b = ast.push(NodeKind::Pass, pt(), Some(module), NodePayload::default());
        let order: Vec<NodeId> = ast.walk().map(|n| n.id).collect();
        assert_eq!(order, vec![module, a, b]);
    }

    #[test]
    fn test_enclosing_scope_walks_up_to_function() {
        let mut ast = Ast::new();
        let module = ast.push(NodeKind::Module, pt(), None, NodePayload::default());
        let func = ast.push(NodeKind::FunctionDef, pt(), Some(module), NodePayload::default());
        let stmt = ast.push(NodeKind::Pass, pt(), Some(func), NodePayload::default());
        assert_eq!(ast.enclosing_scope(stmt).id, func);
    }

    #[test]
    fn test_enclosing_names_outermost_first() {
        let mut ast = Ast::new();
        let module = ast.push(NodeKind::Module, pt(), None, NodePayload::default());
        let mut class_payload = NodePayload::default();
        class_payload.identifier = Some("Outer".to_string());
        let class = ast.push(NodeKind::ClassDef, pt(), Some(module), class_payload);
        let mut func_payload = NodePayload::default();
        func_payload.identifier = Some("inner".to_string());
        let func = ast.push(NodeKind::FunctionDef, pt(), Some(class), func_payload);
        let stmt = ast.push(NodeKind::Pass, pt(), Some(func), NodePayload::default());
        assert_eq!(ast.enclosing_names(stmt), vec!["Outer", "inner"]);
    }

    #[test]
    fn test_attribute_chain_len_counts_dots_past_receiver() {
        let mut ast = Ast::new();
        let receiver = ast.push(NodeKind::Name, pt(), None, NodePayload::default());
        let a1 = ast.push(NodeKind::Attribute, pt(), None, NodePayload::default());
        ast.reparent(receiver, a1);
        let a2 = ast.push(NodeKind::Attribute, pt(), None, NodePayload::default());
        ast.reparent(a1, a2);
        let a3 = ast.push(NodeKind::Attribute, pt(), None, NodePayload::default());
        ast.reparent(a2, a3);
        assert_eq!(ast.attribute_chain_len(a3), 3);
    }

    #[test]
    fn test_retag_as_target_flips_kind() {
        let mut ast = Ast::new();
        let name = ast.push(NodeKind::Name, pt(), None, NodePayload::default());
        ast.retag_as_target(name);
        assert_eq!(ast.get(name).kind, NodeKind::AssignName);
    }

    #[test]
    fn test_retag_as_target_recurses_into_tuple_unpacking() {
        let mut ast = Ast::new();
        let a = ast.push(NodeKind::Name, pt(), None, NodePayload::default());
        let b = ast.push(NodeKind::Attribute, pt(), None, NodePayload::default());
        let tuple = ast.push(NodeKind::Tuple, pt(), None, NodePayload::default());
        ast.reparent(a, tuple);
        ast.reparent(b, tuple);
        ast.retag_as_target(tuple);
        assert_eq!(ast.get(a).kind, NodeKind::AssignName);
        assert_eq!(ast.get(b).kind, NodeKind::AssignAttr);
    }

    #[test]
    fn test_symbol_table_lookup_walks_scope_chain() {
        let mut ast = Ast::new();
        let module = ast.push(NodeKind::Module, pt(), None, NodePayload::default());
        let func = ast.push(NodeKind::FunctionDef, pt(), Some(module), NodePayload::default());
        let decl = ast.push(NodeKind::AssignName, pt(), Some(module), NodePayload::default());
        let mut table = SymbolTable::new();
        table.declare(module, "config", decl);
        assert_eq!(table.lookup(&ast, func, "config"), Some(decl));
        assert_eq!(table.lookup(&ast, func, "missing"), None);
    }

    #[test]
    fn test_node_kind_is_helpers() {
        assert!(NodeKind::Module.is_module());
        assert!(!NodeKind::Module.is_class_def());
    }
}
