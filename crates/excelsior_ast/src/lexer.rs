//! Indentation-sensitive tokenizer for the governed source language. Tracks
//! an indent stack and bracket depth so that logical lines spanning
//! multiple physical lines (inside `()`/`[]`/`{}` or after a trailing `\`)
//! collapse into one statement, the way Python's own tokenizer does.

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    FStr(String),
    Newline,
    Indent,
    Dedent,
    Op(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub offset: usize,
}

const KEYWORDS: &[&str] = &[
    "def", "async", "class", "return", "if", "elif", "else", "for", "while", "try", "except",
    "finally", "with", "as", "import", "from", "pass", "break", "continue", "raise", "assert",
    "del", "global", "nonlocal", "lambda", "yield", "await", "not", "and", "or", "in", "is",
    "None", "True", "False", "match", "case",
];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    indents: Vec<usize>,
    bracket_depth: i32,
    at_line_start: bool,
    pending_dedents: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            indents: vec![0],
            bracket_depth: 0,
            at_line_start: true,
            pending_dedents: 0,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Some(b)
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            if self.pending_dedents > 0 {
                self.pending_dedents -= 1;
                tokens.push(Token {
                    tok: Tok::Dedent,
                    offset: self.pos,
                });
                continue;
            }
            if self.at_line_start && self.bracket_depth == 0 {
                if let Some(tok) = self.consume_indentation() {
                    tokens.push(tok);
                    if matches!(tokens.last().unwrap().tok, Tok::Dedent) {
                        continue;
                    }
                }
            }
            self.at_line_start = false;
            self.skip_intra_line_whitespace_and_comments();
            let offset = self.pos;
            let Some(b) = self.peek_byte() else {
                while self.indents.len() > 1 {
                    self.indents.pop();
                    tokens.push(Token {
                        tok: Tok::Dedent,
                        offset,
                    });
                }
                tokens.push(Token {
                    tok: Tok::Eof,
                    offset,
                });
                break;
            };
            if b == b'\n' {
                self.pos += 1;
                if self.bracket_depth == 0 {
                    self.at_line_start = true;
                    tokens.push(Token {
                        tok: Tok::Newline,
                        offset,
                    });
                }
                continue;
            }
            if b == b'\\' && self.peek_next_is_newline() {
                self.pos += 2;
                continue;
            }
            if b.is_ascii_digit() || (b == b'.' && self.peek_digit_after_dot()) {
                tokens.push(self.lex_number(offset));
                continue;
            }
            if is_ident_start(b) {
                tokens.push(self.lex_name_or_string_prefix(offset));
                continue;
            }
            if b == b'"' || b == b'\'' {
                tokens.push(self.lex_string(offset, false));
                continue;
            }
            tokens.push(self.lex_operator(offset));
        }
        tokens
    }

    fn peek_next_is_newline(&self) -> bool {
        matches!(self.bytes.get(self.pos + 1), Some(b'\n'))
    }

    fn peek_digit_after_dot(&self) -> bool {
        matches!(self.bytes.get(self.pos + 1), Some(b) if b.is_ascii_digit())
    }

    fn consume_indentation(&mut self) -> Option<Token> {
        let start = self.pos;
        let mut width = 0usize;
        loop {
            match self.peek_byte() {
                Some(b' ') => {
                    width += 1;
                    self.pos += 1;
                }
                Some(b'\t') => {
                    width += 8 - (width % 8);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        // Blank line or comment-only line: no indentation token, let the
        // caller fall through to normal scanning and emit Newline.
        match self.peek_byte() {
            None => return None,
            Some(b'\n') | Some(b'#') => return None,
            _ => {}
        }
        self.at_line_start = false;
        let current = *self.indents.last().unwrap();
        if width > current {
            self.indents.push(width);
            return Some(Token {
                tok: Tok::Indent,
                offset: start,
            });
        }
        if width < current {
            let mut count = 0;
            while *self.indents.last().unwrap() > width {
                self.indents.pop();
                count += 1;
            }
            if count > 0 {
                self.pending_dedents = count - 1;
                return Some(Token {
                    tok: Tok::Dedent,
                    offset: start,
                });
            }
        }
        None
    }

    fn skip_intra_line_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.pos += 1;
                }
                Some(b'#') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self, offset: usize) -> Token {
        let start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_digit() || b == b'_' {
                self.pos += 1;
            } else if b == b'.' && !is_float {
                is_float = true;
                self.pos += 1;
            } else if (b == b'e' || b == b'E')
                && matches!(self.bytes.get(self.pos + 1), Some(b'+') | Some(b'-') | Some(b'0'..=b'9'))
            {
                is_float = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let tok = if is_float {
            Tok::Float(text.parse().unwrap_or(0.0))
        } else {
            Tok::Int(text.parse().unwrap_or(0))
        };
        Token { tok, offset }
    }

    fn lex_name_or_string_prefix(&mut self, offset: usize) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if is_ident_continue(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name = self.src[start..self.pos].to_string();
        let lower = name.to_ascii_lowercase();
        if matches!(lower.as_str(), "f" | "rf" | "fr") {
            if matches!(self.peek_byte(), Some(b'"') | Some(b'\'')) {
                return self.lex_string(offset, true);
            }
        }
        if matches!(lower.as_str(), "r" | "b" | "rb" | "br") && matches!(self.peek_byte(), Some(b'"') | Some(b'\'')) {
            return self.lex_string(offset, false);
        }
        Token {
            tok: Tok::Name(name),
            offset,
        }
    }

    fn lex_string(&mut self, offset: usize, is_fstring: bool) -> Token {
        let quote = self.advance().unwrap();
        let triple = self.peek_byte() == Some(quote)
            && self.bytes.get(self.pos + 1) == Some(&quote)
            && {
                self.pos += 2;
                true
            };
        let start = self.pos;
        loop {
            match self.peek_byte() {
                None => break,
                Some(b'\\') => {
                    self.pos += 2;
                }
                Some(b) if b == quote => {
                    if !triple {
                        break;
                    }
                    if self.bytes.get(self.pos + 1) == Some(&quote)
                        && self.bytes.get(self.pos + 2) == Some(&quote)
                    {
                        break;
                    }
                    self.pos += 1;
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
        let text = self.src.get(start..self.pos).unwrap_or("").to_string();
        let consume = if triple { 3 } else { 1 };
        self.pos = (self.pos + consume).min(self.bytes.len());
        Token {
            tok: if is_fstring { Tok::FStr(text) } else { Tok::Str(text) },
            offset,
        }
    }

    fn lex_operator(&mut self, offset: usize) -> Token {
        const THREE: &[&str] = &["**=", "//=", "...", ">>=", "<<="];
        const TWO: &[&str] = &[
            "**", "//", "==", "!=", "<=", ">=", "->", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
            "^=", ":=", "<<", ">>",
        ];
        for op in THREE {
            if self.src[self.pos..].starts_with(op) {
                self.pos += op.len();
                return Token {
                    tok: Tok::Op((*op).to_string()),
                    offset,
                };
            }
        }
        for op in TWO {
            if self.src[self.pos..].starts_with(op) {
                self.pos += op.len();
                return Token {
                    tok: Tok::Op((*op).to_string()),
                    offset,
                };
            }
        }
        let b = self.advance().unwrap();
        if matches!(b, b'(' | b'[' | b'{') {
            self.bracket_depth += 1;
        } else if matches!(b, b')' | b']' | b'}') {
            self.bracket_depth -= 1;
        }
        Token {
            tok: Tok::Op((b as char).to_string()),
            offset,
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic() || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        Lexer::new(src).tokenize().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_indent_dedent_balance() {
        let toks = kinds("def f():\n    pass\n    pass\nx = 1\n");
        let indents = toks.iter().filter(|t| matches!(t, Tok::Indent)).count();
        let dedents = toks.iter().filter(|t| matches!(t, Tok::Dedent)).count();
        assert_eq!(indents, dedents);
        assert_eq!(indents, 1);
    }

    #[test]
    fn test_nested_indentation() {
        let toks = kinds("if a:\n    if b:\n        pass\n    pass\n");
        let indents = toks.iter().filter(|t| matches!(t, Tok::Indent)).count();
        let dedents = toks.iter().filter(|t| matches!(t, Tok::Dedent)).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
    }

    #[test]
    fn test_bracket_depth_suppresses_newline() {
        let toks = kinds("x = (\n    1,\n    2,\n)\n");
        let newlines = toks.iter().filter(|t| matches!(t, Tok::Newline)).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_backslash_continuation_suppresses_newline() {
        let toks = kinds("x = 1 + \\\n    2\n");
        let newlines = toks.iter().filter(|t| matches!(t, Tok::Newline)).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_float_and_int_literals() {
        let toks = kinds("1_000 3.14 2e10\n");
        assert_eq!(toks[0], Tok::Int(1000));
        assert_eq!(toks[1], Tok::Float(3.14));
        assert_eq!(toks[2], Tok::Float(2e10));
    }

    #[test]
    fn test_fstring_prefix_detected() {
        let toks = kinds("f\"hi {name}\"\n");
        assert!(matches!(&toks[0], Tok::FStr(s) if s == "hi {name}"));
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let toks = kinds("\"\"\"line one\nline two\"\"\"\n");
        assert!(matches!(&toks[0], Tok::Str(s) if s.contains('\n')));
    }

    #[test]
    fn test_operator_maximal_munch() {
        let toks = kinds("a **= 2\nb //= 3\n");
        assert!(toks.contains(&Tok::Op("**=".to_string())));
        assert!(toks.contains(&Tok::Op("//=".to_string())));
    }

    #[test]
    fn test_keyword_recognition() {
        assert!(is_keyword("class"));
        assert!(is_keyword("async"));
        assert!(!is_keyword("my_var"));
    }

    #[test]
    fn test_trailing_eof_closes_open_indents() {
        let toks = kinds("def f():\n    pass");
        assert_eq!(toks.last().unwrap(), &Tok::Eof);
        assert!(matches!(toks[toks.len() - 2], Tok::Dedent));
    }
}
