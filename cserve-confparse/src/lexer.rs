//! Indentation-sensitive tokenizer for the config-script table language.
//!
//! Grounded on the reference server's own hand-rolled config lexer: a
//! line-oriented scanner that turns leading whitespace into `Indent(n)`
//! tokens and recognises a small fixed punctuation set, rather than pulling
//! in a general-purpose parser combinator crate for a deliberately tiny
//! grammar.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    StringLit(String),
    Number(i64),
    Colon,
    Dash,
    Comma,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Newline,
    Indent(usize),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(c) = c {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn loc(&self) -> Loc {
        Loc {
            line: self.line,
            col: self.col,
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn read_indent(&mut self) -> usize {
        let mut n = 0;
        while let Some(' ') = self.peek() {
            self.advance();
            n += 1;
        }
        n
    }

    fn read_quoted(&mut self, quote: char) -> String {
        let mut s = String::new();
        self.advance(); // opening quote
        while let Some(c) = self.peek() {
            if c == quote {
                self.advance();
                break;
            }
            s.push(c);
            self.advance();
        }
        s
    }

    fn read_text(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ',' | '[' | ']' | '{' | '}' | '#') {
                break;
            }
            if c == ':' && self.colon_is_separator() {
                break;
            }
            s.push(c);
            self.advance();
        }
        s
    }

    /// A `:` only separates key from value (becomes a `Colon` token) when
    /// followed by whitespace or end-of-line; a bare `GET:/hello:h.lua`
    /// route string keeps its colons as literal text.
    fn colon_is_separator(&mut self) -> bool {
        let mut clone = self.chars.clone();
        clone.next();
        matches!(clone.peek(), None | Some(' ') | Some('\n') | Some('\t'))
    }

    /// Tokenizes the whole source up front; the config-script grammar is
    /// small enough that a streaming tokenizer buys nothing.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut at_line_start = true;

        loop {
            if at_line_start {
                let loc = self.loc();
                let n = self.read_indent();
                if let Some('#') = self.peek() {
                    self.skip_comment();
                }
                if let Some('\n') = self.peek() {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        loc,
                    });
                    continue;
                }
                if self.peek().is_none() {
                    break;
                }
                tokens.push(Token {
                    kind: TokenKind::Indent(n),
                    loc,
                });
                at_line_start = false;
                continue;
            }

            let loc = self.loc();
            let Some(c) = self.peek() else { break };

            match c {
                '#' => self.skip_comment(),
                '\n' => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        loc,
                    });
                    at_line_start = true;
                }
                ' ' | '\t' => {
                    self.advance();
                }
                ':' if self.colon_is_separator() => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Colon,
                        loc,
                    });
                }
                '-' if matches!(self.next_non_dash(), Some(c2) if c2.is_whitespace()) => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Dash,
                        loc,
                    });
                }
                ',' => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Comma,
                        loc,
                    });
                }
                '[' => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::LBracket,
                        loc,
                    });
                }
                ']' => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::RBracket,
                        loc,
                    });
                }
                '{' => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::LBrace,
                        loc,
                    });
                }
                '}' => {
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::RBrace,
                        loc,
                    });
                }
                '"' | '\'' => {
                    let s = self.read_quoted(c);
                    tokens.push(Token {
                        kind: TokenKind::StringLit(s),
                        loc,
                    });
                }
                _ => {
                    let text = self.read_text();
                    if text.is_empty() {
                        self.advance();
                        continue;
                    }
                    if let Ok(n) = text.parse::<i64>() {
                        tokens.push(Token {
                            kind: TokenKind::Number(n),
                            loc,
                        });
                    } else {
                        tokens.push(Token {
                            kind: TokenKind::Text(text),
                            loc,
                        });
                    }
                }
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            loc: self.loc(),
        });
        tokens
    }

    /// A `-` only starts a list marker when followed by whitespace; otherwise
    /// it's part of a bare token such as a negative number or a route string.
    fn next_non_dash(&mut self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.peek().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_a_flat_mapping() {
        let got = kinds("port: 8080\n");
        assert_eq!(
            got,
            vec![
                TokenKind::Indent(0),
                TokenKind::Text("port".into()),
                TokenKind::Colon,
                TokenKind::Number(8080),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dash_inside_a_token_is_not_a_list_marker() {
        let got = kinds("route: GET:/a:handler-one\n");
        assert!(got.iter().any(|k| matches!(k, TokenKind::Text(s) if s.contains("handler-one"))));
    }
}
