//! Tokenizer for BUILD files.

use super::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Str,
    Number,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Assign,
    Plus,
    Dot,
    Comment,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Identifier or number text, decoded string value, or comment text.
    pub text: String,
    /// 1-based line of the first character.
    pub line: usize,
    pub col: usize,
    /// Line of the last character (differs from `line` only for strings
    /// containing escaped newlines).
    pub end_line: usize,
    /// True when nothing but whitespace precedes the token on its line.
    pub line_start: bool,
}

/// Split `src` into tokens. Newlines are not significant inside BUILD files
/// beyond comment placement, which the parser derives from line numbers.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut col = 1;
    let mut line_start = true;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            i += 1;
            line += 1;
            col = 1;
            line_start = true;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            col += 1;
            continue;
        }
        // Explicit line continuations carry no meaning inside brackets.
        if c == '\\' && chars.get(i + 1) == Some(&'\n') {
            i += 2;
            line += 1;
            col = 1;
            continue;
        }

        let start_line = line;
        let start_col = col;

        if c == '#' {
            let start = i;
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            col += i - start;
            tokens.push(Token {
                kind: TokenKind::Comment,
                text: text.trim_end().to_string(),
                line: start_line,
                col: start_col,
                end_line: start_line,
                line_start,
            });
            line_start = false;
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Err(ParseError::new(
                    start_line,
                    start_col,
                    "triple-quoted strings are not supported",
                ));
            }
            i += 1;
            col += 1;
            let mut value = String::new();
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(ParseError::new(start_line, start_col, "unterminated string"));
                };
                match ch {
                    '\n' => {
                        return Err(ParseError::new(
                            start_line,
                            start_col,
                            "unterminated string",
                        ));
                    }
                    '\\' => {
                        let Some(&escaped) = chars.get(i + 1) else {
                            return Err(ParseError::new(
                                start_line,
                                start_col,
                                "unterminated string",
                            ));
                        };
                        match escaped {
                            'n' => value.push('\n'),
                            't' => value.push('\t'),
                            '\\' => value.push('\\'),
                            '"' => value.push('"'),
                            '\'' => value.push('\''),
                            '\n' => {
                                line += 1;
                                col = 0;
                            }
                            other => {
                                value.push('\\');
                                value.push(other);
                            }
                        }
                        i += 2;
                        col += 2;
                    }
                    ch if ch == quote => {
                        i += 1;
                        col += 1;
                        break;
                    }
                    ch => {
                        value.push(ch);
                        i += 1;
                        col += 1;
                    }
                }
            }
            tokens.push(Token {
                kind: TokenKind::Str,
                text: value,
                line: start_line,
                col: start_col,
                end_line: line,
                line_start,
            });
            line_start = false;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            col += i - start;
            let kind = if c.is_ascii_digit() {
                TokenKind::Number
            } else {
                TokenKind::Ident
            };
            tokens.push(Token {
                kind,
                text,
                line: start_line,
                col: start_col,
                end_line: start_line,
                line_start,
            });
            line_start = false;
            continue;
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '=' => TokenKind::Assign,
            '+' => TokenKind::Plus,
            '.' => TokenKind::Dot,
            other => {
                return Err(ParseError::new(
                    start_line,
                    start_col,
                    format!("unexpected character `{}`", other),
                ));
            }
        };
        tokens.push(Token {
            kind,
            text: c.to_string(),
            line: start_line,
            col: start_col,
            end_line: start_line,
            line_start,
        });
        line_start = false;
        i += 1;
        col += 1;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
        col,
        end_line: line,
        line_start: true,
    });

    Ok(tokens)
}
