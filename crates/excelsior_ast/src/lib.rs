//! Tagged-variant AST model and a recursive-descent parser for the source
//! language the governance engine audits. `excelsior_linter` is the only
//! intended consumer; this crate owns no rule logic of its own.

pub mod lexer;
pub mod node;
pub mod parser;
pub mod source;

pub use node::{Ast, Literal, Node, NodeId, NodeKind, NodePayload, SymbolTable};
pub use parser::{parse, ParseError};
pub use source::{Location, SourceFile, Span};
