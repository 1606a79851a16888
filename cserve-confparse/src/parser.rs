use crate::lexer::{Lexer, Loc, Token, TokenKind};
use crate::table::TableValue;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub loc: Loc,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config parse error at line {}, col {}: {}",
            self.loc.line, self.loc.col, self.message
        )
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parses a whole config-script document into its root mapping.
pub fn parse(source: &str) -> Result<TableValue, ParseError> {
    let tokens = Lexer::new(source).tokenize();
    let mut parser = Parser { tokens, pos: 0 };
    let map = parser.parse_mapping(0)?;
    parser.skip_blank_lines();
    if !matches!(parser.peek(), TokenKind::Eof) {
        return Err(parser.error("trailing content after top-level mapping"));
    }
    Ok(TableValue::Map(map))
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn loc(&self) -> Loc {
        self.tokens[self.pos].loc
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            loc: self.loc(),
        }
    }

    fn skip_blank_lines(&mut self) {
        while matches!(self.peek(), TokenKind::Newline) {
            self.advance();
        }
    }

    /// Indentation of the next non-blank line, without consuming it.
    fn peek_indent(&self) -> Option<usize> {
        let mut i = self.pos;
        loop {
            match &self.tokens[i].kind {
                TokenKind::Newline => i += 1,
                TokenKind::Indent(n) => return Some(*n),
                TokenKind::Eof => return None,
                _ => return None,
            }
        }
    }

    fn parse_mapping(&mut self, indent: usize) -> Result<BTreeMap<String, TableValue>, ParseError> {
        let mut map = BTreeMap::new();
        loop {
            self.skip_blank_lines();
            match self.peek_indent() {
                Some(n) if n == indent => {}
                _ => break,
            }
            self.advance(); // Indent token

            let key = self.parse_key()?;
            self.expect_colon()?;

            let value = match self.peek() {
                TokenKind::Newline => {
                    self.advance();
                    match self.peek_indent() {
                        Some(n) if n > indent => self.parse_nested_value(n)?,
                        _ => TableValue::Map(BTreeMap::new()),
                    }
                }
                _ => {
                    let v = self.parse_inline_value()?;
                    self.expect_eol()?;
                    v
                }
            };

            map.insert(key, value);
        }
        Ok(map)
    }

    fn parse_nested_value(&mut self, indent: usize) -> Result<TableValue, ParseError> {
        match self.peek_at_indent(indent) {
            Some(TokenKind::Dash) => Ok(TableValue::List(self.parse_list(indent)?)),
            _ => Ok(TableValue::Map(self.parse_mapping(indent)?)),
        }
    }

    /// Peeks the token immediately after the Indent(indent) that starts the
    /// next non-blank line, without consuming anything.
    fn peek_at_indent(&self, indent: usize) -> Option<TokenKind> {
        let mut i = self.pos;
        loop {
            match &self.tokens[i].kind {
                TokenKind::Newline => i += 1,
                TokenKind::Indent(n) if *n == indent => return self.tokens.get(i + 1).map(|t| t.kind.clone()),
                _ => return None,
            }
        }
    }

    fn parse_list(&mut self, indent: usize) -> Result<Vec<TableValue>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_blank_lines();
            match self.peek_indent() {
                Some(n) if n == indent => {}
                _ => break,
            }
            // confirm this line is a dash item, not a sibling mapping key
            if !matches!(self.peek_at_indent(indent), Some(TokenKind::Dash)) {
                break;
            }
            self.advance(); // Indent
            self.advance(); // Dash

            let item = if self.looks_like_inline_map_entry() {
                TableValue::Map(self.parse_dash_mapping(indent)?)
            } else {
                let v = self.parse_inline_value()?;
                self.expect_eol()?;
                v
            };
            items.push(item);
        }
        Ok(items)
    }

    /// A dash item of the shape `- key: value` starts a single-entry inline
    /// mapping; further keys of that same entry may follow on indented
    /// continuation lines one level deeper than the dash.
    fn looks_like_inline_map_entry(&self) -> bool {
        matches!(self.peek(), TokenKind::Text(_) | TokenKind::StringLit(_))
            && matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Colon))
    }

    fn parse_dash_mapping(&mut self, dash_indent: usize) -> Result<BTreeMap<String, TableValue>, ParseError> {
        let mut map = BTreeMap::new();
        let key = self.parse_key()?;
        self.expect_colon()?;
        let value = match self.peek() {
            TokenKind::Newline => {
                self.advance();
                match self.peek_indent() {
                    Some(n) if n > dash_indent => self.parse_nested_value(n)?,
                    _ => TableValue::Map(BTreeMap::new()),
                }
            }
            _ => {
                let v = self.parse_inline_value()?;
                self.expect_eol()?;
                v
            }
        };
        map.insert(key, value);

        let continuation_indent = dash_indent + 2;
        if matches!(self.peek_indent(), Some(n) if n == continuation_indent) {
            map.extend(self.parse_mapping(continuation_indent)?);
        }
        Ok(map)
    }

    fn parse_key(&mut self) -> Result<String, ParseError> {
        match self.advance().kind {
            TokenKind::Text(s) => Ok(s),
            TokenKind::StringLit(s) => Ok(s),
            TokenKind::Number(n) => Ok(n.to_string()),
            other => Err(self.error(&format!("expected a key, found {other:?}"))),
        }
    }

    fn expect_colon(&mut self) -> Result<(), ParseError> {
        match self.advance().kind {
            TokenKind::Colon => Ok(()),
            other => Err(self.error(&format!("expected ':', found {other:?}"))),
        }
    }

    fn expect_eol(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            TokenKind::Newline | TokenKind::Eof => {
                if matches!(self.peek(), TokenKind::Newline) {
                    self.advance();
                }
                Ok(())
            }
            other => Err(self.error(&format!("expected end of line, found {other:?}"))),
        }
    }

    fn parse_inline_value(&mut self) -> Result<TableValue, ParseError> {
        match self.peek().clone() {
            TokenKind::LBracket => self.parse_inline_list(),
            TokenKind::LBrace => self.parse_inline_map(),
            TokenKind::Text(s) => {
                self.advance();
                Ok(TableValue::Scalar(s))
            }
            TokenKind::StringLit(s) => {
                self.advance();
                Ok(TableValue::Scalar(s))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(TableValue::Scalar(n.to_string()))
            }
            other => Err(self.error(&format!("expected a value, found {other:?}"))),
        }
    }

    fn parse_inline_list(&mut self) -> Result<TableValue, ParseError> {
        self.advance(); // [
        let mut items = Vec::new();
        loop {
            self.skip_blank_lines();
            if matches!(self.peek(), TokenKind::RBracket) {
                self.advance();
                break;
            }
            items.push(self.parse_inline_value()?);
            self.skip_blank_lines();
            match self.peek() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                other => return Err(self.error(&format!("expected ',' or ']', found {other:?}"))),
            }
        }
        Ok(TableValue::List(items))
    }

    fn parse_inline_map(&mut self) -> Result<TableValue, ParseError> {
        self.advance(); // {
        let mut map = BTreeMap::new();
        loop {
            self.skip_blank_lines();
            if matches!(self.peek(), TokenKind::RBrace) {
                self.advance();
                break;
            }
            let key = self.parse_key()?;
            self.expect_colon()?;
            let value = self.parse_inline_value()?;
            map.insert(key, value);
            self.skip_blank_lines();
            match self.peek() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                other => return Err(self.error(&format!("expected ',' or '}}', found {other:?}"))),
            }
        }
        Ok(TableValue::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_scalars() {
        let doc = parse("port: 8080\nhost: localhost\n").unwrap();
        assert_eq!(doc.get("port").unwrap().as_scalar(), Some("8080"));
        assert_eq!(doc.get("host").unwrap().as_scalar(), Some("localhost"));
    }

    #[test]
    fn parses_nested_mapping() {
        let src = "server:\n  port: 8080\n  tls:\n    cert: a.pem\n";
        let doc = parse(src).unwrap();
        let server = doc.get("server").unwrap();
        assert_eq!(server.get("port").unwrap().as_scalar(), Some("8080"));
        assert_eq!(server.get("tls").unwrap().get("cert").unwrap().as_scalar(), Some("a.pem"));
    }

    #[test]
    fn parses_dash_list_of_route_strings() {
        let src = "routes:\n  - GET:/hello:hello.lua\n  - POST:/upload:upload.lua\n";
        let doc = parse(src).unwrap();
        let routes = doc.get("routes").unwrap().as_list().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].as_scalar(), Some("GET:/hello:hello.lua"));
        assert_eq!(routes[1].as_scalar(), Some("POST:/upload:upload.lua"));
    }

    #[test]
    fn parses_inline_list_and_map() {
        let src = "tags: [a, b, c]\nlimits: {max: 10, min: 1}\n";
        let doc = parse(src).unwrap();
        let tags = doc.get("tags").unwrap().as_list().unwrap();
        assert_eq!(tags.len(), 3);
        let limits = doc.get("limits").unwrap();
        assert_eq!(limits.get("max").unwrap().as_scalar(), Some("10"));
    }

    #[test]
    fn parses_dash_mapping_items_with_continuation() {
        let src = "plugins:\n  - name: auth\n    path: auth.so\n  - name: metrics\n    path: metrics.so\n";
        let doc = parse(src).unwrap();
        let plugins = doc.get("plugins").unwrap().as_list().unwrap();
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].get("name").unwrap().as_scalar(), Some("auth"));
        assert_eq!(plugins[1].get("path").unwrap().as_scalar(), Some("metrics.so"));
    }

    #[test]
    fn rejects_malformed_key_line() {
        let err = parse("port 8080\n").unwrap_err();
        assert!(err.to_string().contains("expected ':'"));
    }
}
