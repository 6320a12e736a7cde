//! Recursive-descent parser producing the tagged-variant [`Ast`]. Covers the
//! constructs the rule set in `excelsior_linter` actually inspects —
//! definitions, imports, assignment forms, control flow, decorators, calls
//! and attribute chains, literals and container displays, comprehensions,
//! and a pragmatic f-string split — rather than claiming full grammar
//! coverage of any real dynamic language (see SPEC_FULL.md Design Notes).

use crate::lexer::{is_keyword, Lexer, Tok, Token};
use crate::node::{Ast, Literal, NodeId, NodeKind, NodePayload};
use crate::source::{Location, SourceFile, Span};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{path}: unexpected token {found:?} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        path: String,
        found: String,
        offset: usize,
        expected: String,
    },
    #[error("{path}: unexpected end of file")]
    UnexpectedEof { path: String },
}

pub fn parse(source: &SourceFile) -> Result<Ast, ParseError> {
    let tokens = Lexer::new(source.text()).tokenize();
    let mut parser = Parser {
        tokens,
        pos: 0,
        source,
        ast: Ast::new(),
    };
    parser.parse_module()
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a SourceFile,
    ast: Ast,
}

impl<'a> Parser<'a> {
    fn tok(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn loc(&self, offset: usize) -> Location {
        self.source.location_for(offset)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.loc(start), self.loc(self.offset()))
    }

    fn bump(&mut self) -> Tok {
        let t = self.tok().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            path: self.source.path().display().to_string(),
            found: format!("{:?}", self.tok()),
            offset: self.offset(),
            expected: expected.to_string(),
        }
    }

    fn is_op(&self, s: &str) -> bool {
        matches!(self.tok(), Tok::Op(o) if o == s)
    }

    fn is_kw(&self, s: &str) -> bool {
        matches!(self.tok(), Tok::Name(n) if n == s)
    }

    fn eat_op(&mut self, s: &str) -> Result<(), ParseError> {
        if self.is_op(s) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(s))
        }
    }

    fn eat_kw(&mut self, s: &str) -> Result<(), ParseError> {
        if self.is_kw(s) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(s))
        }
    }

    fn eat_name(&mut self) -> Result<String, ParseError> {
        match self.tok().clone() {
            Tok::Name(n) if !is_keyword(&n) => {
                self.bump();
                Ok(n)
            }
            _ => Err(self.err("identifier")),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.tok(), Tok::Newline) {
            self.bump();
        }
    }

    // ---- top level -------------------------------------------------

    fn parse_module(&mut self) -> Result<Ast, ParseError> {
        let module = self
            .ast
            .push(NodeKind::Module, Span::point(Location::new(1, 1)), None, NodePayload::default());
        self.skip_newlines();
        while !matches!(self.tok(), Tok::Eof) {
            self.parse_statement(module)?;
            self.skip_newlines();
        }
        let mut ast = std::mem::replace(&mut self.ast, Ast::new());
        let end = self.loc(self.offset());
        let root_span = Span::new(Location::new(1, 1), end);
        ast = retarget_module_span(ast, root_span);
        Ok(ast)
    }

    fn parse_block(&mut self, parent: NodeId) -> Result<(), ParseError> {
        // `: NEWLINE INDENT stmt+ DEDENT` or `: simple_stmt NEWLINE`.
        self.eat_op(":")?;
        if matches!(self.tok(), Tok::Newline) {
            self.skip_newlines();
            if !matches!(self.tok(), Tok::Indent) {
                return Err(self.err("indented block"));
            }
            self.bump();
            while !matches!(self.tok(), Tok::Dedent | Tok::Eof) {
                self.parse_statement(parent)?;
                self.skip_newlines();
            }
            if matches!(self.tok(), Tok::Dedent) {
                self.bump();
            }
        } else {
            self.parse_simple_statement_line(parent)?;
        }
        Ok(())
    }

    fn parse_simple_statement_line(&mut self, parent: NodeId) -> Result<(), ParseError> {
        loop {
            self.parse_simple_statement(parent)?;
            if self.is_op(";") {
                self.bump();
                if matches!(self.tok(), Tok::Newline | Tok::Eof) {
                    break;
                }
                continue;
            }
            break;
        }
        if matches!(self.tok(), Tok::Newline) {
            self.bump();
        }
        Ok(())
    }

    // ---- statements --------------------------------------------------

    fn parse_statement(&mut self, parent: NodeId) -> Result<(), ParseError> {
        if self.is_op("@") {
            let decorators = self.parse_decorators()?;
            let is_async = self.is_kw("async");
            if is_async {
                self.bump();
                if !self.is_kw("def") {
                    return Err(self.err("def after async"));
                }
            }
            let def_id = self.parse_def_or_class(parent)?;
            if is_async {
                self.ast.set_kind(def_id, NodeKind::AsyncFunctionDef);
                self.ast.payload_mut(def_id).is_async = true;
            }
            self.attach_decorators(def_id, decorators);
            return Ok(());
        }
        match self.tok().clone() {
            Tok::Name(n) if n == "def" => {
                self.parse_def_or_class(parent)?;
                Ok(())
            }
            Tok::Name(n) if n == "async" => {
                self.parse_async(parent)
            }
            Tok::Name(n) if n == "class" => {
                self.parse_def_or_class(parent)?;
                Ok(())
            }
            Tok::Name(n) if n == "if" => self.parse_if(parent),
            Tok::Name(n) if n == "for" => self.parse_for(parent, false),
            Tok::Name(n) if n == "while" => self.parse_while(parent),
            Tok::Name(n) if n == "try" => self.parse_try(parent),
            Tok::Name(n) if n == "with" => self.parse_with(parent, false),
            Tok::Name(n) if n == "match" => self.parse_match(parent),
            _ => self.parse_simple_statement_line(parent),
        }
    }

    fn parse_async(&mut self, parent: NodeId) -> Result<(), ParseError> {
        self.eat_kw("async")?;
        match self.tok().clone() {
            Tok::Name(n) if n == "def" => {
                let id = self.parse_def_or_class(parent)?;
                self.ast.set_kind(id, NodeKind::AsyncFunctionDef);
                self.ast.payload_mut(id).is_async = true;
                Ok(())
            }
            Tok::Name(n) if n == "for" => self.parse_for(parent, true),
            Tok::Name(n) if n == "with" => self.parse_with(parent, true),
            _ => Err(self.err("def/for/with after async")),
        }
    }

    fn parse_decorators(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut decorators = Vec::new();
        while self.is_op("@") {
            self.bump();
            let expr = self.parse_test()?;
            decorators.push(expr);
            self.skip_newlines();
        }
        Ok(decorators)
    }

    fn attach_decorators(&mut self, def_id: NodeId, decorator_exprs: Vec<NodeId>) {
        let names: Vec<String> = decorator_exprs
            .iter()
            .map(|id| decorator_name(&self.ast, *id))
            .collect();
        self.ast.payload_mut(def_id).decorator_names = names;
    }

    fn parse_def_or_class(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let is_class = self.is_kw("class");
        if is_class {
            self.eat_kw("class")?;
        } else {
            self.eat_kw("def")?;
        }
        let name = self.eat_name()?;
        let kind = if is_class {
            NodeKind::ClassDef
        } else {
            NodeKind::FunctionDef
        };
        let mut payload = NodePayload::default();
        payload.identifier = Some(name);
        let def_id = self.ast.push(kind, self.span_from(start), Some(parent), payload);

        if is_class {
            if self.is_op("(") {
                self.bump();
                while !self.is_op(")") {
                    if matches!(self.tok(), Tok::Name(n) if !is_keyword(n))
                        && matches!(self.tokens.get(self.pos + 1).map(|t| &t.tok), Some(Tok::Op(o)) if o == "=")
                    {
                        // keyword base-class arg, e.g. `metaclass=ABCMeta` — skip, not a base
                        self.bump();
                        self.bump();
                        self.parse_test()?;
                    } else {
                        let base = self.parse_test()?;
                        self.ast.reparent(base, def_id);
                    }
                    if self.is_op(",") {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.eat_op(")")?;
            }
        } else {
            self.parse_arguments(def_id)?;
            if self.is_op("->") {
                self.bump();
                let ann_start = self.offset();
                self.parse_test()?;
                self.ast.payload_mut(def_id).type_annotation = Some(self.text_between(ann_start));
            }
        }
        self.parse_block(def_id)?;
        let span = self.span_from(start);
        self.ast.set_span(def_id, span);
        Ok(def_id)
    }

    fn parse_arguments(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        let start = self.offset();
        self.eat_op("(")?;
        let args_id = self
            .ast
            .push(NodeKind::Arguments, self.span_from(start), Some(parent), NodePayload::default());
        while !self.is_op(")") {
            if self.is_op("*") || self.is_op("**") {
                self.bump();
            }
            if matches!(self.tok(), Tok::Name(n) if !is_keyword(n)) {
                let name = self.eat_name()?;
                let mut payload = NodePayload::default();
                payload.identifier = Some(name);
                if self.is_op(":") {
                    self.bump();
                    let ann_start = self.offset();
                    self.parse_test()?;
                    payload.type_annotation = Some(self.text_between(ann_start));
                }
                self.ast.push(NodeKind::AssignName, Span::point(self.loc(self.offset())), Some(args_id), payload);
            }
            if self.is_op("=") {
                self.bump();
                self.parse_test()?;
            }
            if self.is_op(",") {
                self.bump();
            } else {
                break;
            }
        }
        self.eat_op(")")?;
        Ok(args_id)
    }

    fn text_between(&self, start_offset: usize) -> String {
        self.source
            .text()
            .get(start_offset..self.offset())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn parse_if(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let start = self.offset();
        self.eat_kw("if")?;
        let cond = self.parse_namedexpr_test()?;
        let if_id = self.ast.push(NodeKind::If, self.span_from(start), Some(parent), NodePayload::default());
        self.ast.reparent(cond, if_id);
        self.parse_block(if_id)?;
        if self.is_kw("elif") {
            self.parse_if(if_id)?;
        } else if self.is_kw("else") {
            self.bump();
            self.parse_block(if_id)?;
        }
        self.ast.set_span(if_id, self.span_from(start));
        Ok(())
    }

    fn parse_for(&mut self, parent: NodeId, is_async: bool) -> Result<(), ParseError> {
        let start = self.offset();
        self.eat_kw("for")?;
        let target = self.parse_testlist_target()?;
        self.ast.retag_as_target(target);
        self.eat_kw("in")?;
        let iter = self.parse_testlist()?;
        let mut payload = NodePayload::default();
        payload.is_async = is_async;
        let for_id = self.ast.push(NodeKind::For, self.span_from(start), Some(parent), payload);
        self.ast.reparent(target, for_id);
        self.ast.reparent(iter, for_id);
        self.parse_block(for_id)?;
        if self.is_kw("else") {
            self.bump();
            self.parse_block(for_id)?;
        }
        self.ast.set_span(for_id, self.span_from(start));
        Ok(())
    }

    fn parse_while(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let start = self.offset();
        self.eat_kw("while")?;
        let cond = self.parse_namedexpr_test()?;
        let id = self.ast.push(NodeKind::While, self.span_from(start), Some(parent), NodePayload::default());
        self.ast.reparent(cond, id);
        self.parse_block(id)?;
        if self.is_kw("else") {
            self.bump();
            self.parse_block(id)?;
        }
        self.ast.set_span(id, self.span_from(start));
        Ok(())
    }

    fn parse_try(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let start = self.offset();
        self.eat_kw("try")?;
        let try_id = self.ast.push(NodeKind::Try, self.span_from(start), Some(parent), NodePayload::default());
        self.parse_block(try_id)?;
        while self.is_kw("except") {
            let h_start = self.offset();
            self.bump();
            if self.is_op("*") {
                self.bump();
            }
            let mut payload = NodePayload::default();
            if !self.is_op(":") {
                let ty_start = self.offset();
                self.parse_test()?;
                payload.type_annotation = Some(self.text_between(ty_start));
                if self.is_kw("as") {
                    self.bump();
                    payload.identifier = Some(self.eat_name()?);
                }
            }
            let handler_id =
                self.ast
                    .push(NodeKind::ExceptHandler, self.span_from(h_start), Some(try_id), payload);
            self.parse_block(handler_id)?;
            self.ast.set_span(handler_id, self.span_from(h_start));
        }
        if self.is_kw("else") {
            self.bump();
            self.parse_block(try_id)?;
        }
        if self.is_kw("finally") {
            self.bump();
            self.parse_block(try_id)?;
        }
        self.ast.set_span(try_id, self.span_from(start));
        Ok(())
    }

    fn parse_with(&mut self, parent: NodeId, is_async: bool) -> Result<(), ParseError> {
        let start = self.offset();
        self.eat_kw("with")?;
        let mut payload = NodePayload::default();
        payload.is_async = is_async;
        let with_id = self.ast.push(NodeKind::With, self.span_from(start), Some(parent), payload);
        loop {
            let ctx = self.parse_test()?;
            self.ast.reparent(ctx, with_id);
            if self.is_kw("as") {
                self.bump();
                let target = self.parse_atom_for_target()?;
                self.ast.retag_as_target(target);
                self.ast.reparent(target, with_id);
            }
            if self.is_op(",") {
                self.bump();
                continue;
            }
            break;
        }
        self.parse_block(with_id)?;
        self.ast.set_span(with_id, self.span_from(start));
        Ok(())
    }

    fn parse_match(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let start = self.offset();
        self.eat_kw("match")?;
        let subject = self.parse_testlist()?;
        let match_id = self.ast.push(NodeKind::Match, self.span_from(start), Some(parent), NodePayload::default());
        self.ast.reparent(subject, match_id);
        self.eat_op(":")?;
        self.skip_newlines();
        if matches!(self.tok(), Tok::Indent) {
            self.bump();
            while self.is_kw("case") {
                let case_start = self.offset();
                self.bump();
                // Pattern grammar is deliberately approximate: consume
                // tokens up to the optional `if` guard or the block colon.
                while !self.is_op(":") && !self.is_kw("if") && !matches!(self.tok(), Tok::Eof) {
                    self.bump();
                }
                if self.is_kw("if") {
                    self.bump();
                    self.parse_test()?;
                }
                let case_id = self.ast.push(
                    NodeKind::MatchCase,
                    self.span_from(case_start),
                    Some(match_id),
                    NodePayload::default(),
                );
                self.parse_block(case_id)?;
            }
            if matches!(self.tok(), Tok::Dedent) {
                self.bump();
            }
        }
        self.ast.set_span(match_id, self.span_from(start));
        Ok(())
    }

    fn parse_simple_statement(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let start = self.offset();
        match self.tok().clone() {
            Tok::Name(n) if n == "pass" => {
                self.bump();
                self.ast.push(NodeKind::Pass, self.span_from(start), Some(parent), NodePayload::default());
            }
            Tok::Name(n) if n == "break" => {
                self.bump();
                self.ast.push(NodeKind::Break, self.span_from(start), Some(parent), NodePayload::default());
            }
            Tok::Name(n) if n == "continue" => {
                self.bump();
                self.ast.push(NodeKind::Continue, self.span_from(start), Some(parent), NodePayload::default());
            }
            Tok::Name(n) if n == "return" => {
                self.bump();
                let id = self.ast.push(NodeKind::Return, self.span_from(start), Some(parent), NodePayload::default());
                if !matches!(self.tok(), Tok::Newline | Tok::Eof) && !self.is_op(";") {
                    let value = self.parse_testlist()?;
                    self.ast.reparent(value, id);
                }
                self.ast.set_span(id, self.span_from(start));
            }
            Tok::Name(n) if n == "raise" => {
                self.bump();
                let id = self.ast.push(NodeKind::Raise, self.span_from(start), Some(parent), NodePayload::default());
                if !matches!(self.tok(), Tok::Newline | Tok::Eof) && !self.is_op(";") {
                    let exc = self.parse_test()?;
                    self.ast.reparent(exc, id);
                    if self.is_kw("from") {
                        self.bump();
                        let cause = self.parse_test()?;
                        self.ast.reparent(cause, id);
                    }
                }
                self.ast.set_span(id, self.span_from(start));
            }
            Tok::Name(n) if n == "assert" => {
                self.bump();
                let id = self.ast.push(NodeKind::Assert, self.span_from(start), Some(parent), NodePayload::default());
                let test = self.parse_test()?;
                self.ast.reparent(test, id);
                if self.is_op(",") {
                    self.bump();
                    let msg = self.parse_test()?;
                    self.ast.reparent(msg, id);
                }
                self.ast.set_span(id, self.span_from(start));
            }
            Tok::Name(n) if n == "del" => {
                self.bump();
                let id = self.ast.push(NodeKind::Delete, self.span_from(start), Some(parent), NodePayload::default());
                let target = self.parse_testlist_target()?;
                self.ast.retag_as_target(target);
                self.ast.reparent(target, id);
                self.ast.set_span(id, self.span_from(start));
            }
            Tok::Name(n) if n == "global" || n == "nonlocal" => {
                self.bump();
                let mut names = vec![self.eat_name()?];
                while self.is_op(",") {
                    self.bump();
                    names.push(self.eat_name()?);
                }
                let mut payload = NodePayload::default();
                payload.names = names;
                self.ast.push(NodeKind::Global, self.span_from(start), Some(parent), payload);
            }
            Tok::Name(n) if n == "import" => {
                self.parse_import(parent, start)?;
            }
            Tok::Name(n) if n == "from" => {
                self.parse_import_from(parent, start)?;
            }
            _ => {
                self.parse_expr_statement(parent)?;
            }
        }
        Ok(())
    }

    fn parse_import(&mut self, parent: NodeId, start: usize) -> Result<(), ParseError> {
        self.eat_kw("import")?;
        let mut names = Vec::new();
        loop {
            let mut dotted = self.eat_name()?;
            while self.is_op(".") {
                self.bump();
                dotted.push('.');
                dotted.push_str(&self.eat_name()?);
            }
            if self.is_kw("as") {
                self.bump();
                let alias = self.eat_name()?;
                dotted = format!("{dotted} as {alias}");
            }
            names.push(dotted);
            if self.is_op(",") {
                self.bump();
                continue;
            }
            break;
        }
        let mut payload = NodePayload::default();
        payload.names = names;
        self.ast.push(NodeKind::Import, self.span_from(start), Some(parent), payload);
        Ok(())
    }

    fn parse_import_from(&mut self, parent: NodeId, start: usize) -> Result<(), ParseError> {
        self.eat_kw("from")?;
        let mut module = String::new();
        while self.is_op(".") {
            self.bump();
            module.push('.');
        }
        if matches!(self.tok(), Tok::Name(n) if !is_keyword(n)) {
            module.push_str(&self.eat_name()?);
            while self.is_op(".") {
                self.bump();
                module.push('.');
                module.push_str(&self.eat_name()?);
            }
        }
        self.eat_kw("import")?;
        let mut names = Vec::new();
        if self.is_op("*") {
            self.bump();
            names.push("*".to_string());
        } else {
            let parenthesized = self.is_op("(");
            if parenthesized {
                self.bump();
            }
            loop {
                let mut name = self.eat_name()?;
                if self.is_kw("as") {
                    self.bump();
                    name = format!("{name} as {}", self.eat_name()?);
                }
                names.push(name);
                if self.is_op(",") {
                    self.bump();
                    if parenthesized {
                        self.skip_newlines();
                    }
                    continue;
                }
                break;
            }
            if parenthesized {
                self.skip_newlines();
                self.eat_op(")")?;
            }
        }
        let mut payload = NodePayload::default();
        payload.identifier = Some(module);
        payload.names = names;
        self.ast.push(NodeKind::ImportFrom, self.span_from(start), Some(parent), payload);
        Ok(())
    }

    fn parse_expr_statement(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let start = self.offset();
        let first = self.parse_testlist_star()?;
        if self.is_op(":") && !matches!(self.ast.get(first).kind, NodeKind::Dict) {
            self.bump();
            self.ast.retag_as_target(first);
            let ann_start = self.offset();
            let annotation = self.parse_test()?;
            let mut payload = NodePayload::default();
            payload.type_annotation = Some(self.text_between(ann_start));
            let id = self.ast.push(NodeKind::AnnAssign, self.span_from(start), Some(parent), payload);
            self.ast.reparent(first, id);
            self.ast.reparent(annotation, id);
            if self.is_op("=") {
                self.bump();
                let value = self.parse_testlist_star()?;
                self.ast.reparent(value, id);
            }
            self.ast.set_span(id, self.span_from(start));
            return Ok(());
        }
        if let Some(op) = self.aug_assign_op() {
            self.bump();
            self.ast.retag_as_target(first);
            let value = self.parse_testlist_star()?;
            let mut payload = NodePayload::default();
            payload.operator = Some(op);
            let id = self.ast.push(NodeKind::AugAssign, self.span_from(start), Some(parent), payload);
            self.ast.reparent(first, id);
            self.ast.reparent(value, id);
            self.ast.set_span(id, self.span_from(start));
            return Ok(());
        }
        if self.is_op("=") {
            let mut targets = vec![first];
            let mut value = first;
            while self.is_op("=") {
                self.bump();
                value = self.parse_testlist_star()?;
                targets.push(value);
            }
            let value = targets.pop().unwrap();
            let id = self.ast.push(NodeKind::Assign, self.span_from(start), Some(parent), NodePayload::default());
            for target in targets {
                self.ast.retag_as_target(target);
                self.ast.reparent(target, id);
            }
            self.ast.reparent(value, id);
            self.ast.set_span(id, self.span_from(start));
            return Ok(());
        }
        let id = self.ast.push(NodeKind::Expr, self.span_from(start), Some(parent), NodePayload::default());
        self.ast.reparent(first, id);
        self.ast.set_span(id, self.span_from(start));
        Ok(())
    }

    fn aug_assign_op(&self) -> Option<String> {
        const OPS: &[&str] = &[
            "+=", "-=", "*=", "/=", "//=", "%=", "**=", "&=", "|=", "^=", ">>=", "<<=", "@=",
        ];
        if let Tok::Op(o) = self.tok() {
            if OPS.contains(&o.as_str()) {
                return Some(o.clone());
            }
        }
        None
    }

    fn parse_testlist_target(&mut self) -> Result<NodeId, ParseError> {
        self.parse_testlist_star()
    }

    fn parse_atom_for_target(&mut self) -> Result<NodeId, ParseError> {
        self.parse_postfix_expr()
    }

    // ---- expressions ---------------------------------------------------

    fn parse_testlist(&mut self) -> Result<NodeId, ParseError> {
        self.parse_list_like(Self::parse_namedexpr_test)
    }

    fn parse_testlist_star(&mut self) -> Result<NodeId, ParseError> {
        self.parse_list_like(Self::parse_star_or_test)
    }

    fn parse_list_like(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<NodeId, ParseError>,
    ) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let first = item(self)?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.is_op(",") {
            self.bump();
            if self.at_expr_end() {
                break;
            }
            items.push(item(self)?);
        }
        let tuple = self.ast.push(NodeKind::Tuple, self.span_from(start), None, NodePayload::default());
        for it in items {
            self.ast.reparent(it, tuple);
        }
        Ok(tuple)
    }

    fn at_expr_end(&self) -> bool {
        matches!(self.tok(), Tok::Newline | Tok::Eof)
            || self.is_op(")")
            || self.is_op("]")
            || self.is_op("}")
            || self.is_op(":")
            || self.is_op("=")
            || self.is_kw("in")
    }

    fn parse_star_or_test(&mut self) -> Result<NodeId, ParseError> {
        if self.is_op("*") {
            let start = self.offset();
            self.bump();
            let operand = self.parse_namedexpr_test()?;
            let id = self.ast.push(NodeKind::Starred, self.span_from(start), None, NodePayload::default());
            self.ast.reparent(operand, id);
            return Ok(id);
        }
        self.parse_namedexpr_test()
    }

    fn parse_namedexpr_test(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let expr = self.parse_ternary()?;
        if self.is_op(":=") {
            self.bump();
            self.ast.retag_as_target(expr);
            let value = self.parse_ternary()?;
            let id = self.ast.push(NodeKind::NamedExpr, self.span_from(start), None, NodePayload::default());
            self.ast.reparent(expr, id);
            self.ast.reparent(value, id);
            return Ok(id);
        }
        Ok(expr)
    }

    fn parse_test(&mut self) -> Result<NodeId, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<NodeId, ParseError> {
        if self.is_kw("lambda") {
            return self.parse_lambda();
        }
        let start = self.offset();
        let body = self.parse_or_test()?;
        if self.is_kw("if") {
            self.bump();
            let cond = self.parse_or_test()?;
            self.eat_kw("else")?;
            let orelse = self.parse_ternary()?;
            let id = self.ast.push(NodeKind::IfExp, self.span_from(start), None, NodePayload::default());
            self.ast.reparent(body, id);
            self.ast.reparent(cond, id);
            self.ast.reparent(orelse, id);
            return Ok(id);
        }
        Ok(body)
    }

    fn parse_lambda(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        self.eat_kw("lambda")?;
        let id = self.ast.push(NodeKind::Lambda, self.span_from(start), None, NodePayload::default());
        let args_id = self.ast.push(NodeKind::Arguments, self.span_from(start), Some(id), NodePayload::default());
        while !self.is_op(":") {
            let mut payload = NodePayload::default();
            payload.identifier = Some(self.eat_name()?);
            self.ast.push(NodeKind::AssignName, Span::point(self.loc(self.offset())), Some(args_id), payload);
            if self.is_op("=") {
                self.bump();
                self.parse_test()?;
            }
            if self.is_op(",") {
                self.bump();
            } else {
                break;
            }
        }
        self.eat_op(":")?;
        let body = self.parse_test()?;
        self.ast.reparent(body, id);
        self.ast.set_span(id, self.span_from(start));
        Ok(id)
    }

    fn parse_or_test(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let mut left = self.parse_and_test()?;
        while self.is_kw("or") {
            self.bump();
            let right = self.parse_and_test()?;
            let mut payload = NodePayload::default();
            payload.operator = Some("or".to_string());
            let id = self.ast.push(NodeKind::BoolOp, self.span_from(start), None, payload);
            self.ast.reparent(left, id);
            self.ast.reparent(right, id);
            left = id;
        }
        Ok(left)
    }

    fn parse_and_test(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let mut left = self.parse_not_test()?;
        while self.is_kw("and") {
            self.bump();
            let right = self.parse_not_test()?;
            let mut payload = NodePayload::default();
            payload.operator = Some("and".to_string());
            let id = self.ast.push(NodeKind::BoolOp, self.span_from(start), None, payload);
            self.ast.reparent(left, id);
            self.ast.reparent(right, id);
            left = id;
        }
        Ok(left)
    }

    fn parse_not_test(&mut self) -> Result<NodeId, ParseError> {
        if self.is_kw("not") {
            let start = self.offset();
            self.bump();
            let operand = self.parse_not_test()?;
            let mut payload = NodePayload::default();
            payload.operator = Some("not".to_string());
            let id = self.ast.push(NodeKind::UnaryOp, self.span_from(start), None, payload);
            self.ast.reparent(operand, id);
            return Ok(id);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let left = self.parse_bitor()?;
        let Some(op) = self.comp_op() else {
            return Ok(left);
        };
        self.consume_comp_op(&op);
        let right = self.parse_bitor()?;
        let mut payload = NodePayload::default();
        payload.operator = Some(op);
        let id = self.ast.push(NodeKind::Compare, self.span_from(start), None, payload);
        self.ast.reparent(left, id);
        self.ast.reparent(right, id);
        Ok(id)
    }

    fn comp_op(&self) -> Option<String> {
        match self.tok() {
            Tok::Op(o) if matches!(o.as_str(), "==" | "!=" | "<" | "<=" | ">" | ">=") => {
                Some(o.clone())
            }
            Tok::Name(n) if n == "in" => Some("in".to_string()),
            Tok::Name(n) if n == "is" => Some("is".to_string()),
            Tok::Name(n) if n == "not" => {
                if matches!(self.tokens.get(self.pos + 1).map(|t| &t.tok), Some(Tok::Name(n2)) if n2 == "in") {
                    Some("not in".to_string())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn consume_comp_op(&mut self, op: &str) {
        match op {
            "not in" => {
                self.bump();
                self.bump();
            }
            "is" => {
                self.bump();
                if self.is_kw("not") {
                    self.bump();
                }
            }
            _ => {
                self.bump();
            }
        }
    }

    fn parse_bitor(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binop_level(&["|"], Self::parse_bitxor)
    }
    fn parse_bitxor(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binop_level(&["^"], Self::parse_bitand)
    }
    fn parse_bitand(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binop_level(&["&"], Self::parse_shift)
    }
    fn parse_shift(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binop_level(&["<<", ">>"], Self::parse_arith)
    }
    fn parse_arith(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binop_level(&["+", "-"], Self::parse_term)
    }
    fn parse_term(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binop_level(&["*", "/", "//", "%", "@"], Self::parse_factor)
    }

    fn parse_binop_level(
        &mut self,
        ops: &[&str],
        mut next: impl FnMut(&mut Self) -> Result<NodeId, ParseError>,
    ) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let mut left = next(self)?;
        loop {
            let Tok::Op(o) = self.tok() else { break };
            if !ops.contains(&o.as_str()) {
                break;
            }
            let op = o.clone();
            self.bump();
            let right = next(self)?;
            let mut payload = NodePayload::default();
            payload.operator = Some(op);
            let id = self.ast.push(NodeKind::BinOp, self.span_from(start), None, payload);
            self.ast.reparent(left, id);
            self.ast.reparent(right, id);
            left = id;
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<NodeId, ParseError> {
        if self.is_op("+") || self.is_op("-") || self.is_op("~") {
            let start = self.offset();
            let Tok::Op(op) = self.bump() else { unreachable!() };
            let operand = self.parse_factor()?;
            let mut payload = NodePayload::default();
            payload.operator = Some(op);
            let id = self.ast.push(NodeKind::UnaryOp, self.span_from(start), None, payload);
            self.ast.reparent(operand, id);
            return Ok(id);
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let base = self.parse_postfix_expr()?;
        if self.is_op("**") {
            self.bump();
            let exp = self.parse_factor()?;
            let mut payload = NodePayload::default();
            payload.operator = Some("**".to_string());
            let id = self.ast.push(NodeKind::BinOp, self.span_from(start), None, payload);
            self.ast.reparent(base, id);
            self.ast.reparent(exp, id);
            return Ok(id);
        }
        Ok(base)
    }

    fn parse_postfix_expr(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let mut expr = self.parse_atom()?;
        loop {
            if self.is_op(".") {
                self.bump();
                let mut payload = NodePayload::default();
                payload.identifier = Some(self.eat_name()?);
                let id = self.ast.push(NodeKind::Attribute, self.span_from(start), None, payload);
                self.ast.reparent(expr, id);
                expr = id;
            } else if self.is_op("(") {
                expr = self.parse_call(expr, start)?;
            } else if self.is_op("[") {
                expr = self.parse_subscript(expr, start)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call(&mut self, func: NodeId, start: usize) -> Result<NodeId, ParseError> {
        self.eat_op("(")?;
        let id = self.ast.push(NodeKind::Call, self.span_from(start), None, NodePayload::default());
        self.ast.reparent(func, id);
        while !self.is_op(")") {
            if self.is_op("**") {
                self.bump();
                let value = self.parse_test()?;
                self.ast.reparent(value, id);
            } else if matches!(self.tok(), Tok::Name(n) if !is_keyword(n))
                && matches!(self.tokens.get(self.pos + 1).map(|t| &t.tok), Some(Tok::Op(o)) if o == "=")
            {
                let name = self.eat_name()?;
                self.eat_op("=")?;
                let value = self.parse_test()?;
                let mut payload = NodePayload::default();
                payload.identifier = Some(name);
                let kw_id = self.ast.push(NodeKind::Keyword, self.span_from(start), Some(id), payload);
                self.ast.reparent(value, kw_id);
            } else {
                let value = self.parse_star_or_test_gen()?;
                self.ast.reparent(value, id);
            }
            if self.is_op(",") {
                self.bump();
            } else {
                break;
            }
        }
        self.eat_op(")")?;
        self.ast.set_span(id, self.span_from(start));
        Ok(id)
    }

    fn parse_star_or_test_gen(&mut self) -> Result<NodeId, ParseError> {
        let item = self.parse_star_or_test()?;
        if self.is_kw("for") || (self.is_kw("async") && self.peek_is_kw_at(1, "for")) {
            return self.parse_comprehension_tail(item, NodeKind::GeneratorExp);
        }
        Ok(item)
    }

    fn peek_is_kw_at(&self, ahead: usize, kw: &str) -> bool {
        matches!(self.tokens.get(self.pos + ahead).map(|t| &t.tok), Some(Tok::Name(n)) if n == kw)
    }

    fn parse_subscript(&mut self, value: NodeId, start: usize) -> Result<NodeId, ParseError> {
        self.eat_op("[")?;
        let id = self.ast.push(NodeKind::Subscript, self.span_from(start), None, NodePayload::default());
        self.ast.reparent(value, id);
        let slice = self.parse_slice_item()?;
        self.ast.reparent(slice, id);
        self.eat_op("]")?;
        self.ast.set_span(id, self.span_from(start));
        Ok(id)
    }

    fn parse_slice_item(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let lower = if self.is_op(":") || self.is_op("]") {
            None
        } else {
            Some(self.parse_test()?)
        };
        if !self.is_op(":") {
            let idx = self.ast.push(NodeKind::Index, self.span_from(start), None, NodePayload::default());
            if let Some(lower) = lower {
                self.ast.reparent(lower, idx);
            }
            return Ok(idx);
        }
        self.bump();
        let upper = if self.is_op(":") || self.is_op("]") {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.is_op(":") {
            self.bump();
            if self.is_op("]") {
                None
            } else {
                Some(self.parse_test()?)
            }
        } else {
            None
        };
        let slice_id = self.ast.push(NodeKind::Slice, self.span_from(start), None, NodePayload::default());
        for part in [lower, upper, step].into_iter().flatten() {
            self.ast.reparent(part, slice_id);
        }
        Ok(slice_id)
    }

    fn parse_atom(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        match self.tok().clone() {
            Tok::Int(v) => {
                self.bump();
                let mut payload = NodePayload::default();
                payload.literal = Some(Literal::Int(v));
                Ok(self.ast.push(NodeKind::Const, self.span_from(start), None, payload))
            }
            Tok::Float(v) => {
                self.bump();
                let mut payload = NodePayload::default();
                payload.literal = Some(Literal::Float(v));
                Ok(self.ast.push(NodeKind::Const, self.span_from(start), None, payload))
            }
            Tok::Str(s) => {
                self.bump();
                let mut text = s;
                while let Tok::Str(more) = self.tok().clone() {
                    self.bump();
                    text.push_str(&more);
                }
                let mut payload = NodePayload::default();
                payload.literal = Some(Literal::Str(text));
                Ok(self.ast.push(NodeKind::Const, self.span_from(start), None, payload))
            }
            Tok::FStr(s) => {
                self.bump();
                self.parse_fstring(start, &s)
            }
            Tok::Name(n) if n == "None" => {
                self.bump();
                let mut payload = NodePayload::default();
                payload.literal = Some(Literal::None);
                Ok(self.ast.push(NodeKind::Const, self.span_from(start), None, payload))
            }
            Tok::Name(n) if n == "True" || n == "False" => {
                self.bump();
                let mut payload = NodePayload::default();
                payload.literal = Some(Literal::Bool(n == "True"));
                Ok(self.ast.push(NodeKind::Const, self.span_from(start), None, payload))
            }
            Tok::Name(n) if n == "yield" => self.parse_yield(),
            Tok::Name(n) if n == "await" => {
                self.bump();
                let operand = self.parse_postfix_expr()?;
                let id = self.ast.push(NodeKind::Await, self.span_from(start), None, NodePayload::default());
                self.ast.reparent(operand, id);
                Ok(id)
            }
            Tok::Name(n) if !is_keyword(&n) => {
                self.bump();
                let mut payload = NodePayload::default();
                payload.identifier = Some(n);
                Ok(self.ast.push(NodeKind::Name, self.span_from(start), None, payload))
            }
            Tok::Op(o) if o == "(" => self.parse_paren(),
            Tok::Op(o) if o == "[" => self.parse_list_display(),
            Tok::Op(o) if o == "{" => self.parse_set_or_dict_display(),
            Tok::Op(o) if o == "*" => {
                self.bump();
                let operand = self.parse_or_test()?;
                let id = self.ast.push(NodeKind::Starred, self.span_from(start), None, NodePayload::default());
                self.ast.reparent(operand, id);
                Ok(id)
            }
            _ => Err(self.err("expression")),
        }
    }

    fn parse_yield(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        self.eat_kw("yield")?;
        if self.is_kw("from") {
            self.bump();
            let value = self.parse_test()?;
            let id = self.ast.push(NodeKind::YieldFrom, self.span_from(start), None, NodePayload::default());
            self.ast.reparent(value, id);
            return Ok(id);
        }
        let id = self.ast.push(NodeKind::Yield, self.span_from(start), None, NodePayload::default());
        if !self.at_expr_end() && !self.is_op(",") {
            let value = self.parse_testlist()?;
            self.ast.reparent(value, id);
        }
        Ok(id)
    }

    fn parse_paren(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        self.eat_op("(")?;
        self.skip_newlines();
        if self.is_op(")") {
            self.bump();
            return Ok(self.ast.push(NodeKind::Tuple, self.span_from(start), None, NodePayload::default()));
        }
        let first = self.parse_star_or_test()?;
        if self.is_kw("for") || (self.is_kw("async") && self.peek_is_kw_at(1, "for")) {
            let gen = self.parse_comprehension_tail(first, NodeKind::GeneratorExp)?;
            self.skip_newlines();
            self.eat_op(")")?;
            return Ok(gen);
        }
        if self.is_op(":=") {
            self.bump();
            self.ast.retag_as_target(first);
            let value = self.parse_ternary()?;
            let named = self.ast.push(NodeKind::NamedExpr, self.span_from(start), None, NodePayload::default());
            self.ast.reparent(first, named);
            self.ast.reparent(value, named);
            self.skip_newlines();
            self.eat_op(")")?;
            return Ok(named);
        }
        if !self.is_op(",") {
            self.skip_newlines();
            self.eat_op(")")?;
            return Ok(first);
        }
        let mut items = vec![first];
        while self.is_op(",") {
            self.bump();
            self.skip_newlines();
            if self.is_op(")") {
                break;
            }
            items.push(self.parse_star_or_test()?);
        }
        self.skip_newlines();
        self.eat_op(")")?;
        let tuple = self.ast.push(NodeKind::Tuple, self.span_from(start), None, NodePayload::default());
        for item in items {
            self.ast.reparent(item, tuple);
        }
        Ok(tuple)
    }

    fn parse_list_display(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        self.eat_op("[")?;
        self.skip_newlines();
        if self.is_op("]") {
            self.bump();
            return Ok(self.ast.push(NodeKind::List, self.span_from(start), None, NodePayload::default()));
        }
        let first = self.parse_star_or_test()?;
        if self.is_kw("for") || (self.is_kw("async") && self.peek_is_kw_at(1, "for")) {
            let comp = self.parse_comprehension_tail(first, NodeKind::ListComp)?;
            self.skip_newlines();
            self.eat_op("]")?;
            return Ok(comp);
        }
        let mut items = vec![first];
        while self.is_op(",") {
            self.bump();
            self.skip_newlines();
            if self.is_op("]") {
                break;
            }
            items.push(self.parse_star_or_test()?);
        }
        self.skip_newlines();
        self.eat_op("]")?;
        let id = self.ast.push(NodeKind::List, self.span_from(start), None, NodePayload::default());
        for item in items {
            self.ast.reparent(item, id);
        }
        Ok(id)
    }

    fn parse_set_or_dict_display(&mut self) -> Result<NodeId, ParseError> {
        let start = self.offset();
        self.eat_op("{")?;
        self.skip_newlines();
        if self.is_op("}") {
            self.bump();
            return Ok(self.ast.push(NodeKind::Dict, self.span_from(start), None, NodePayload::default()));
        }
        if self.is_op("**") {
            self.bump();
            let first = self.parse_or_test()?;
            return self.finish_dict(start, None, first);
        }
        let first = self.parse_star_or_test()?;
        if self.is_op(":") {
            self.bump();
            let value = self.parse_test()?;
            return self.finish_dict(start, Some(first), value);
        }
        if self.is_kw("for") || (self.is_kw("async") && self.peek_is_kw_at(1, "for")) {
            let comp = self.parse_comprehension_tail(first, NodeKind::SetComp)?;
            self.skip_newlines();
            self.eat_op("}")?;
            return Ok(comp);
        }
        let mut items = vec![first];
        while self.is_op(",") {
            self.bump();
            self.skip_newlines();
            if self.is_op("}") {
                break;
            }
            items.push(self.parse_star_or_test()?);
        }
        self.skip_newlines();
        self.eat_op("}")?;
        let id = self.ast.push(NodeKind::Set, self.span_from(start), None, NodePayload::default());
        for item in items {
            self.ast.reparent(item, id);
        }
        Ok(id)
    }

    fn finish_dict(&mut self, start: usize, key: Option<NodeId>, value: NodeId) -> Result<NodeId, ParseError> {
        if self.is_kw("for") || (self.is_kw("async") && self.peek_is_kw_at(1, "for")) {
            let elt = key.unwrap_or(value);
            let comp = self.parse_comprehension_tail(elt, NodeKind::DictComp)?;
            if key.is_some() {
                self.ast.reparent(value, comp);
            }
            self.skip_newlines();
            self.eat_op("}")?;
            return Ok(comp);
        }
        let id = self.ast.push(NodeKind::Dict, self.span_from(start), None, NodePayload::default());
        if let Some(key) = key {
            self.ast.reparent(key, id);
        }
        self.ast.reparent(value, id);
        while self.is_op(",") {
            self.bump();
            self.skip_newlines();
            if self.is_op("}") {
                break;
            }
            if self.is_op("**") {
                self.bump();
                let v = self.parse_or_test()?;
                self.ast.reparent(v, id);
                continue;
            }
            let k = self.parse_test()?;
            self.eat_op(":")?;
            let v = self.parse_test()?;
            self.ast.reparent(k, id);
            self.ast.reparent(v, id);
        }
        self.skip_newlines();
        self.eat_op("}")?;
        Ok(id)
    }

    fn parse_comprehension_tail(&mut self, elt: NodeId, kind: NodeKind) -> Result<NodeId, ParseError> {
        let start = self.offset();
        let comp_id = self.ast.push(kind, self.span_from(start), None, NodePayload::default());
        self.ast.reparent(elt, comp_id);
        loop {
            let clause_start = self.offset();
            let is_async = self.is_kw("async");
            if is_async {
                self.bump();
            }
            if !self.is_kw("for") {
                break;
            }
            self.bump();
            let target = self.parse_testlist_target()?;
            self.ast.retag_as_target(target);
            self.eat_kw("in")?;
            let iter = self.parse_or_test()?;
            let mut payload = NodePayload::default();
            payload.is_async = is_async;
            let clause_id =
                self.ast
                    .push(NodeKind::Comprehension, self.span_from(clause_start), Some(comp_id), payload);
            self.ast.reparent(target, clause_id);
            self.ast.reparent(iter, clause_id);
            while self.is_kw("if") {
                self.bump();
                let cond = self.parse_or_test()?;
                self.ast.reparent(cond, clause_id);
            }
        }
        Ok(comp_id)
    }

    /// Splits an f-string body on balanced top-level `{...}` spans into a
    /// `JoinedStr` of `Const` text chunks and `FormattedValue` sub-expressions.
    fn parse_fstring(&mut self, start: usize, body: &str) -> Result<NodeId, ParseError> {
        if !body.contains('{') {
            let mut payload = NodePayload::default();
            payload.literal = Some(Literal::Str(body.to_string()));
            return Ok(self.ast.push(NodeKind::Const, self.span_from(start), None, payload));
        }
        let joined = self.ast.push(NodeKind::JoinedStr, self.span_from(start), None, NodePayload::default());
        let chars: Vec<char> = body.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let mut text = String::new();
            while i < chars.len() && chars[i] != '{' {
                text.push(chars[i]);
                i += 1;
            }
            if !text.is_empty() {
                let mut payload = NodePayload::default();
                payload.literal = Some(Literal::Str(text));
                let node = self.ast.push(NodeKind::Const, self.span_from(start), None, payload);
                self.ast.reparent(node, joined);
            }
            if i >= chars.len() {
                break;
            }
            if chars.get(i + 1) == Some(&'{') {
                i += 2;
                continue;
            }
            i += 1;
            let mut depth = 1;
            let mut inner = String::new();
            while i < chars.len() && depth > 0 {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            i += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                if depth > 0 {
                    inner.push(chars[i]);
                }
                i += 1;
            }
            let expr_text = inner.split(['!', ':']).next().unwrap_or(&inner).trim();
            let fv = self.parse_embedded_expr(expr_text, start);
            let formatted = self.ast.push(NodeKind::FormattedValue, self.span_from(start), None, NodePayload::default());
            self.ast.reparent(fv, formatted);
            self.ast.reparent(formatted, joined);
        }
        Ok(joined)
    }

    /// Parses an f-string `{...}` interior by swapping in a fresh token
    /// stream over the *same* arena, so the returned id is valid in
    /// `self.ast` without cross-arena grafting. Falls back to a bare `Name`
    /// node if the interior doesn't parse as an expression (e.g. a format
    /// spec fragment slipped past the `!`/`:` split above).
    fn parse_embedded_expr(&mut self, text: &str, outer_start: usize) -> NodeId {
        let tokens = Lexer::new(text).tokenize();
        let saved_tokens = std::mem::replace(&mut self.tokens, tokens);
        let saved_pos = std::mem::replace(&mut self.pos, 0);
        let result = self.parse_test();
        self.tokens = saved_tokens;
        self.pos = saved_pos;
        match result {
            Ok(id) => id,
            Err(_) => {
                let mut payload = NodePayload::default();
                payload.identifier = Some(text.to_string());
                self.ast.push(NodeKind::Name, self.span_from(outer_start), None, payload)
            }
        }
    }
}

fn decorator_name(ast: &Ast, id: NodeId) -> String {
    let node = ast.get(id);
    match node.kind {
        NodeKind::Name | NodeKind::Attribute => node.payload.identifier.clone().unwrap_or_default(),
        NodeKind::Call => {
            let callee = node
                .children
                .first()
                .map(|c| decorator_name(ast, *c))
                .unwrap_or_default();
            let args: Vec<String> = node
                .children
                .iter()
                .skip(1)
                .map(|c| decorator_call_arg(ast, *c))
                .collect();
            if args.is_empty() {
                callee
            } else {
                format!("{callee}({})", args.join(", "))
            }
        }
        _ => String::new(),
    }
}

/// Renders one `Call` argument for a decorator's string form. Keyword
/// arguments render as `name=value`; the value itself is kept to the small
/// set of literal shapes decorators actually take (`frozen=True`, a string,
/// a bare name) rather than a full expression unparser.
fn decorator_call_arg(ast: &Ast, id: NodeId) -> String {
    let node = ast.get(id);
    match node.kind {
        NodeKind::Keyword => {
            let name = node.payload.identifier.clone().unwrap_or_default();
            let value = node
                .children
                .first()
                .map(|c| decorator_arg_value(ast, *c))
                .unwrap_or_default();
            format!("{name}={value}")
        }
        _ => decorator_arg_value(ast, id),
    }
}

fn decorator_arg_value(ast: &Ast, id: NodeId) -> String {
    let node = ast.get(id);
    match node.kind {
        NodeKind::Name | NodeKind::Attribute => node.payload.identifier.clone().unwrap_or_default(),
        NodeKind::Const => match &node.payload.literal {
            Some(Literal::Bool(b)) => if *b { "True" } else { "False" }.to_string(),
            Some(Literal::Str(s)) => format!("\"{s}\""),
            Some(Literal::Int(n)) => n.to_string(),
            Some(Literal::Float(f)) => f.to_string(),
            Some(Literal::None) => "None".to_string(),
            None => String::new(),
        },
        _ => String::new(),
    }
}

fn retarget_module_span(mut ast: Ast, span: Span) -> Ast {
    ast.set_span(NodeId(0), span);
    ast
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_src(src: &str) -> Ast {
        let source = SourceFile::new("test.py", src.to_string());
        parse(&source).expect("source should parse")
    }

    fn find_first(ast: &Ast, kind: NodeKind) -> Option<&crate::node::Node> {
        ast.walk().find(|n| n.kind == kind)
    }

    #[test]
    fn test_module_has_single_root() {
        let ast = parse_src("x = 1\n");
        assert_eq!(ast.root().kind, NodeKind::Module);
    }

    #[test]
    fn test_function_def_with_decorator() {
        let ast = parse_src("@staticmethod\ndef build(x, y):\n    return x\n");
        let func = find_first(&ast, NodeKind::FunctionDef).unwrap();
        assert_eq!(func.payload.identifier.as_deref(), Some("build"));
        assert_eq!(func.payload.decorator_names, vec!["staticmethod".to_string()]);
    }

    #[test]
    fn test_decorator_call_keyword_args_are_captured_in_name() {
        let ast = parse_src("@dataclass(frozen=True)\nclass Order:\n    pass\n");
        let class = find_first(&ast, NodeKind::ClassDef).unwrap();
        assert_eq!(
            class.payload.decorator_names,
            vec!["dataclass(frozen=True)".to_string()]
        );
    }

    #[test]
    fn test_async_function_def_sets_kind_and_flag() {
        let ast = parse_src("async def fetch():\n    pass\n");
        let func = find_first(&ast, NodeKind::AsyncFunctionDef).unwrap();
        assert!(func.payload.is_async);
    }

    #[test]
    fn test_class_def_with_bases() {
        let ast = parse_src("class Repo(Base, Mixin):\n    pass\n");
        let class = find_first(&ast, NodeKind::ClassDef).unwrap();
        assert_eq!(class.payload.identifier.as_deref(), Some("Repo"));
    }

    #[test]
    fn test_import_from_collects_names() {
        let ast = parse_src("from app.domain import Order, Customer as Cust\n");
        let node = find_first(&ast, NodeKind::ImportFrom).unwrap();
        assert_eq!(node.payload.identifier.as_deref(), Some("app.domain"));
        assert_eq!(node.payload.names, vec!["Order".to_string(), "Customer as Cust".to_string()]);
    }

    #[test]
    fn test_plain_import_dotted_path() {
        let ast = parse_src("import app.infrastructure.db\n");
        let node = find_first(&ast, NodeKind::Import).unwrap();
        assert_eq!(node.payload.names, vec!["app.infrastructure.db".to_string()]);
    }

    #[test]
    fn test_assign_target_retagged_to_assign_name() {
        let ast = parse_src("total = 0\n");
        let assign = find_first(&ast, NodeKind::Assign).unwrap();
        let target = ast.get(assign.children[0]);
        assert_eq!(target.kind, NodeKind::AssignName);
        assert_eq!(target.payload.identifier.as_deref(), Some("total"));
    }

    #[test]
    fn test_chained_assignment_targets() {
        let ast = parse_src("a = b = 1\n");
        let assign = find_first(&ast, NodeKind::Assign).unwrap();
        assert_eq!(assign.children.len(), 3);
        assert_eq!(ast.get(assign.children[0]).kind, NodeKind::AssignName);
        assert_eq!(ast.get(assign.children[1]).kind, NodeKind::AssignName);
    }

    #[test]
    fn test_attribute_assignment_target() {
        let ast = parse_src("self.balance = 0\n");
        let assign = find_first(&ast, NodeKind::Assign).unwrap();
        assert_eq!(ast.get(assign.children[0]).kind, NodeKind::AssignAttr);
    }

    #[test]
    fn test_ann_assign_captures_annotation_text() {
        let ast = parse_src("count: int = 0\n");
        let node = find_first(&ast, NodeKind::AnnAssign).unwrap();
        assert_eq!(node.payload.type_annotation.as_deref(), Some("int"));
    }

    #[test]
    fn test_aug_assign_operator() {
        let ast = parse_src("count += 1\n");
        let node = find_first(&ast, NodeKind::AugAssign).unwrap();
        assert_eq!(node.payload.operator.as_deref(), Some("+="));
    }

    #[test]
    fn test_if_elif_else_chain_nests() {
        let ast = parse_src("if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n");
        let outer = find_first(&ast, NodeKind::If).unwrap();
        let nested_if = outer.children.iter().find(|c| ast.get(**c).kind == NodeKind::If);
        assert!(nested_if.is_some());
    }

    #[test]
    fn test_for_loop_target_and_iter() {
        let ast = parse_src("for item in items:\n    pass\n");
        let for_node = find_first(&ast, NodeKind::For).unwrap();
        assert_eq!(ast.get(for_node.children[0]).kind, NodeKind::AssignName);
    }

    #[test]
    fn test_with_statement_as_target() {
        let ast = parse_src("with open(path) as handle:\n    pass\n");
        let with_node = find_first(&ast, NodeKind::With).unwrap();
        let target_kind = with_node
            .children
            .iter()
            .map(|c| ast.get(*c).kind)
            .find(|k| *k == NodeKind::AssignName);
        assert_eq!(target_kind, Some(NodeKind::AssignName));
    }

    #[test]
    fn test_try_except_handler_binds_name() {
        let ast = parse_src("try:\n    pass\nexcept ValueError as exc:\n    pass\n");
        let handler = find_first(&ast, NodeKind::ExceptHandler).unwrap();
        assert_eq!(handler.payload.identifier.as_deref(), Some("exc"));
    }

    #[test]
    fn test_call_with_keyword_argument() {
        let ast = parse_src("build(x=1, y=2)\n");
        let call = find_first(&ast, NodeKind::Call).unwrap();
        let kw = call.children.iter().find(|c| ast.get(**c).kind == NodeKind::Keyword);
        assert!(kw.is_some());
    }

    #[test]
    fn test_attribute_chain_depth_three() {
        let ast = parse_src("user.address.coordinates.lat\n");
        let attr = ast
            .walk()
            .filter(|n| n.kind == NodeKind::Attribute)
            .max_by_key(|n| ast.attribute_chain_len(n.id))
            .unwrap();
        assert_eq!(ast.attribute_chain_len(attr.id), 3);
    }

    #[test]
    fn test_list_comprehension_with_filter() {
        let ast = parse_src("result = [x for x in values if x > 0]\n");
        let comp = find_first(&ast, NodeKind::ListComp).unwrap();
        let clause = find_first(&ast, NodeKind::Comprehension).unwrap();
        assert!(comp.children.contains(&clause.id));
    }

    #[test]
    fn test_dict_display_pairs() {
        let ast = parse_src("config = {\"a\": 1, \"b\": 2}\n");
        let dict = find_first(&ast, NodeKind::Dict).unwrap();
        assert_eq!(dict.children.len(), 4);
    }

    #[test]
    fn test_lambda_with_default_argument() {
        let ast = parse_src("key = lambda x, y=1: x + y\n");
        let lambda = find_first(&ast, NodeKind::Lambda).unwrap();
        assert!(lambda.children.iter().any(|c| ast.get(*c).kind == NodeKind::Arguments));
    }

    #[test]
    fn test_fstring_splits_text_and_formatted_value() {
        let ast = parse_src("greeting = f\"hello {name}!\"\n");
        let joined = find_first(&ast, NodeKind::JoinedStr).unwrap();
        let has_formatted = joined.children.iter().any(|c| ast.get(*c).kind == NodeKind::FormattedValue);
        assert!(has_formatted);
    }

    #[test]
    fn test_global_statement_collects_names() {
        let ast = parse_src("def f():\n    global counter, total\n");
        let node = find_first(&ast, NodeKind::Global).unwrap();
        assert_eq!(node.payload.names, vec!["counter".to_string(), "total".to_string()]);
    }

    #[test]
    fn test_walrus_in_condition() {
        let ast = parse_src("if (n := len(items)) > 0:\n    pass\n");
        assert!(find_first(&ast, NodeKind::NamedExpr).is_some());
    }

    #[test]
    fn test_match_case_blocks() {
        let ast = parse_src("match command:\n    case \"go\":\n        pass\n    case _:\n        pass\n");
        let match_node = find_first(&ast, NodeKind::Match).unwrap();
        let cases: Vec<_> = match_node
            .children
            .iter()
            .filter(|c| ast.get(**c).kind == NodeKind::MatchCase)
            .collect();
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_function_return_annotation_is_captured() {
        let ast = parse_src("def greet(name: str) -> str:\n    return name\n");
        let def = find_first(&ast, NodeKind::FunctionDef).unwrap();
        assert_eq!(def.payload.type_annotation.as_deref(), Some("str"));
    }

    #[test]
    fn test_class_bases_are_captured_as_children() {
        let ast = parse_src("class Repo(abc.ABC, Protocol):\n    pass\n");
        let class = find_first(&ast, NodeKind::ClassDef).unwrap();
        let bases = ast.class_bases(class.id);
        assert_eq!(bases.len(), 2);
        assert_eq!(bases[0].payload.identifier.as_deref(), Some("ABC"));
        assert_eq!(bases[1].payload.identifier.as_deref(), Some("Protocol"));
    }
}
