//! Recursive-descent parser producing [`File`] trees.
//!
//! Only the BUILD-file subset described in the parent module is accepted.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::lexer::{tokenize, Token, TokenKind};
use super::{Arg, CallExpr, Comments, DictExpr, Expr, ExprKind, File, KeyValue, ListExpr};

/// A syntax error in a BUILD file.
#[derive(Debug, Error)]
#[error("{}:{line}:{col}: {msg}", path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub line: usize,
    pub col: usize,
    pub msg: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, col: usize, msg: impl Into<String>) -> Self {
        ParseError {
            path: PathBuf::new(),
            line,
            col,
            msg: msg.into(),
        }
    }
}

/// Parse the contents of a BUILD file.
pub fn parse(path: &Path, src: &str) -> Result<File, ParseError> {
    let tokens = tokenize(src).map_err(|e| e.at(path))?;
    let mut parser = Parser { tokens, pos: 0 };
    let stmts = parser.parse_file().map_err(|e| e.at(path))?;
    Ok(File::with_stmts(path, stmts))
}

impl ParseError {
    fn at(mut self, path: &Path) -> Self {
        self.path = path.to_path_buf();
        self
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn next(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.next())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> ParseError {
        let tok = self.peek();
        let found = match tok.kind {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Str => format!("string \"{}\"", tok.text),
            _ => format!("`{}`", tok.text),
        };
        ParseError::new(tok.line, tok.col, format!("expected {}, found {}", what, found))
    }

    /// Consume a comment that shares its line with the previous token.
    fn suffix_comment(&mut self) -> Option<String> {
        let tok = self.peek();
        if tok.kind == TokenKind::Comment && !tok.line_start {
            Some(self.next().text)
        } else {
            None
        }
    }

    /// Consume full-line comments, returning them with their line numbers.
    fn line_comments(&mut self) -> Vec<(usize, String)> {
        let mut comments = Vec::new();
        while self.peek_kind() == TokenKind::Comment {
            let tok = self.next();
            comments.push((tok.line, tok.text));
        }
        comments
    }

    fn parse_file(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut stmts = Vec::new();

        loop {
            let comments = self.line_comments();
            let next_line = self.peek().line;
            let at_eof = self.peek_kind() == TokenKind::Eof;

            // Split comment lines into blocks separated by blank lines. The
            // block directly above a statement belongs to that statement.
            let mut blocks: Vec<(usize, Vec<String>)> = Vec::new();
            for (line, text) in comments {
                match blocks.last_mut() {
                    Some((last, block)) if *last + 1 == line => {
                        *last = line;
                        block.push(text);
                    }
                    _ => blocks.push((line, vec![text])),
                }
            }
            let mut before = Vec::new();
            if !at_eof {
                if let Some((last, _)) = blocks.last() {
                    if *last + 1 == next_line {
                        if let Some((_, block)) = blocks.pop() {
                            before = block;
                        }
                    }
                }
            }
            for (_, block) in blocks {
                stmts.push(Expr {
                    kind: ExprKind::CommentBlock,
                    comments: Comments {
                        before: block,
                        suffix: None,
                    },
                });
            }

            if at_eof {
                break;
            }

            let mut stmt = self.parse_stmt()?;
            stmt.comments.before.splice(0..0, before);
            if let Some(comment) = self.suffix_comment() {
                attach_suffix(&mut stmt.comments, comment);
            }
            stmts.push(stmt);
        }

        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Expr, ParseError> {
        if self.peek_kind() == TokenKind::Ident && self.peek_kind_at(1) == TokenKind::Assign {
            let target = self.next().text;
            self.next();
            let value = self.parse_expr()?;
            return Ok(Expr::new(ExprKind::Assign {
                target,
                value: Box::new(value),
            }));
        }
        match self.peek_kind() {
            TokenKind::Ident
            | TokenKind::Str
            | TokenKind::Number
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::LParen => self.parse_expr(),
            _ => Err(self.unexpected("statement")),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_primary()?;
        while self.peek_kind() == TokenKind::Plus {
            self.next();
            let rhs = self.parse_primary()?;
            lhs = Expr::concat(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            TokenKind::Str => Ok(Expr::string(self.next().text)),
            TokenKind::Number => Ok(Expr::new(ExprKind::Number(self.next().text))),
            TokenKind::Ident => {
                let mut name = self.next().text;
                while self.peek_kind() == TokenKind::Dot {
                    self.next();
                    let part = self.expect(TokenKind::Ident, "identifier")?;
                    name.push('.');
                    name.push_str(&part.text);
                }
                if self.peek_kind() == TokenKind::LParen {
                    self.parse_call(name)
                } else {
                    Ok(Expr::ident(name))
                }
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_dict(),
            TokenKind::LParen => {
                self.next();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_call(&mut self, func: String) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, "`(`")?;
        let suffix = self.suffix_comment();
        let mut args = Vec::new();
        let trailing;

        loop {
            let before: Vec<String> = self.line_comments().into_iter().map(|(_, c)| c).collect();
            if self.peek_kind() == TokenKind::RParen {
                trailing = before;
                self.next();
                break;
            }

            let name = if self.peek_kind() == TokenKind::Ident
                && self.peek_kind_at(1) == TokenKind::Assign
            {
                let name = self.next().text;
                self.next();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expr()?;
            let mut comments = Comments {
                before,
                suffix: None,
            };
            self.finish_element(&mut comments, TokenKind::RParen, "`,` or `)`")?;
            args.push(Arg {
                name,
                value,
                comments,
            });
        }

        Ok(Expr {
            kind: ExprKind::Call(CallExpr {
                func,
                args,
                trailing,
            }),
            comments: Comments {
                before: Vec::new(),
                suffix,
            },
        })
    }

    fn parse_list(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBracket, "`[`")?;
        let suffix = self.suffix_comment();
        let mut items = Vec::new();
        let trailing;

        loop {
            let before: Vec<String> = self.line_comments().into_iter().map(|(_, c)| c).collect();
            if self.peek_kind() == TokenKind::RBracket {
                trailing = before;
                self.next();
                break;
            }
            let mut item = self.parse_expr()?;
            item.comments.before.splice(0..0, before);
            self.finish_element(&mut item.comments, TokenKind::RBracket, "`,` or `]`")?;
            items.push(item);
        }

        Ok(Expr {
            kind: ExprKind::List(ListExpr { items, trailing }),
            comments: Comments {
                before: Vec::new(),
                suffix,
            },
        })
    }

    fn parse_dict(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let suffix = self.suffix_comment();
        let mut entries = Vec::new();
        let trailing;

        loop {
            let before: Vec<String> = self.line_comments().into_iter().map(|(_, c)| c).collect();
            if self.peek_kind() == TokenKind::RBrace {
                trailing = before;
                self.next();
                break;
            }
            let mut key = self.parse_expr()?;
            key.comments.before.splice(0..0, before);
            self.expect(TokenKind::Colon, "`:`")?;
            let mut value = self.parse_expr()?;
            self.finish_element(&mut value.comments, TokenKind::RBrace, "`,` or `}`")?;
            entries.push(KeyValue { key, value });
        }

        Ok(Expr {
            kind: ExprKind::Dict(DictExpr { entries, trailing }),
            comments: Comments {
                before: Vec::new(),
                suffix,
            },
        })
    }

    /// Handle the separator after a list item, dict entry or argument,
    /// picking up a same-line comment before or after the comma.
    fn finish_element(
        &mut self,
        comments: &mut Comments,
        close: TokenKind,
        what: &str,
    ) -> Result<(), ParseError> {
        if let Some(comment) = self.suffix_comment() {
            attach_suffix(comments, comment);
        }
        match self.peek_kind() {
            TokenKind::Comma => {
                self.next();
                if let Some(comment) = self.suffix_comment() {
                    attach_suffix(comments, comment);
                }
                Ok(())
            }
            kind if kind == close => Ok(()),
            // A full-line comment may sit between the last element and the
            // closing bracket.
            TokenKind::Comment => {
                let mut lookahead = self.pos;
                while self.tokens[lookahead].kind == TokenKind::Comment {
                    lookahead += 1;
                }
                if self.tokens[lookahead].kind == close {
                    Ok(())
                } else {
                    Err(self.unexpected(what))
                }
            }
            _ => Err(self.unexpected(what)),
        }
    }
}

fn attach_suffix(comments: &mut Comments, comment: String) {
    if comments.suffix.is_none() {
        comments.suffix = Some(comment);
    } else {
        comments.before.push(comment);
    }
}
