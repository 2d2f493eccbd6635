//! Parser for the OData `$filter` subset.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or      := and ('or' and)*
//! and     := unary ('and' unary)*
//! unary   := 'not' unary | primary
//! primary := '(' or ')' | 'true' | 'false'
//!          | 'search.in' '(' ident ',' string [',' string] ')'
//!          | ident '/' ('any' | 'all') '(' [ident ':' or] ')'
//!          | ident cmp literal | literal cmp ident
//! cmp     := 'eq' | 'ne' | 'gt' | 'ge' | 'lt' | 'le'
//! literal := string | number | 'true' | 'false' | 'null'
//! ```

use crate::error::{Result, SearchError};
use crate::search::filter::{CompareOp, FilterExpr, Literal};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    Comma,
    Colon,
    Slash,
}

fn err(message: impl Into<String>) -> SearchError {
    SearchError::InvalidFilter(message.into())
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '\'' => {
                // '' inside a literal is an escaped quote
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(err("unterminated string literal")),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            s.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || matches!(chars[i], '.' | 'e' | 'E')
                        || (matches!(chars[i], '+' | '-') && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| err(format!("invalid number '{text}'")))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(err(format!("expected {expected:?}, found {t:?}"))),
            None => Err(err(format!("expected {expected:?}, found end of input"))),
        }
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(word))
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn string(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(s),
            other => Err(err(format!("expected string literal, found {other:?}"))),
        }
    }

    fn or(&mut self) -> Result<FilterExpr> {
        let mut left = self.and()?;
        while self.keyword("or") {
            self.pos += 1;
            let right = self.and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<FilterExpr> {
        let mut left = self.unary()?;
        while self.keyword("and") {
            self.pos += 1;
            let right = self.unary()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<FilterExpr> {
        if self.keyword("not") {
            self.pos += 1;
            return Ok(FilterExpr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<FilterExpr> {
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("search.in") => self.search_in(),
            Some(Token::Ident(_)) if self.peek_at(1) == Some(&Token::Slash) => self.lambda(),
            Some(Token::Ident(word))
                if (word == "true" || word == "false") && self.comparison_op_at(1).is_none() =>
            {
                let value = word == "true";
                self.pos += 1;
                Ok(FilterExpr::Const(value))
            }
            Some(_) => self.comparison(),
            None => Err(err("unexpected end of filter")),
        }
    }

    fn comparison_op_at(&self, offset: usize) -> Option<CompareOp> {
        match self.peek_at(offset) {
            Some(Token::Ident(w)) => match w.to_ascii_lowercase().as_str() {
                "eq" => Some(CompareOp::Eq),
                "ne" => Some(CompareOp::Ne),
                "gt" => Some(CompareOp::Gt),
                "ge" => Some(CompareOp::Ge),
                "lt" => Some(CompareOp::Lt),
                "le" => Some(CompareOp::Le),
                _ => None,
            },
            _ => None,
        }
    }

    fn literal(&mut self) -> Result<Option<Literal>> {
        let literal = match self.peek() {
            Some(Token::Str(s)) => Literal::String(s.clone()),
            Some(Token::Num(n)) => Literal::Number(*n),
            Some(Token::Ident(w)) if w == "true" => Literal::Bool(true),
            Some(Token::Ident(w)) if w == "false" => Literal::Bool(false),
            Some(Token::Ident(w)) if w == "null" => Literal::Null,
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(literal))
    }

    fn comparison(&mut self) -> Result<FilterExpr> {
        // literal on the left: `5 lt rating`
        if let Some(value) = self.literal()? {
            let op = self
                .comparison_op_at(0)
                .ok_or_else(|| err("expected comparison operator"))?;
            self.pos += 1;
            let field = self.ident()?;
            return Ok(FilterExpr::Compare {
                field,
                op: op.flipped(),
                value,
            });
        }
        let field = self.ident()?;
        let op = self
            .comparison_op_at(0)
            .ok_or_else(|| err(format!("expected comparison operator after '{field}'")))?;
        self.pos += 1;
        let value = self
            .literal()?
            .ok_or_else(|| err(format!("expected literal after '{field}'")))?;
        Ok(FilterExpr::Compare { field, op, value })
    }

    fn search_in(&mut self) -> Result<FilterExpr> {
        self.pos += 1;
        self.expect(Token::LParen)?;
        let field = self.ident()?;
        self.expect(Token::Comma)?;
        let list = self.string()?;
        let delimiters = if self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            self.string()?
        } else {
            " ,".to_string()
        };
        self.expect(Token::RParen)?;
        let values = list
            .split(|c| delimiters.contains(c))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Ok(FilterExpr::In { field, values })
    }

    fn lambda(&mut self) -> Result<FilterExpr> {
        let field = self.ident()?;
        self.expect(Token::Slash)?;
        let kind = self.ident()?.to_ascii_lowercase();
        self.expect(Token::LParen)?;
        if kind == "any" && self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(FilterExpr::Any {
                field,
                var: String::new(),
                body: None,
            });
        }
        let var = self.ident()?;
        self.expect(Token::Colon)?;
        let body = Box::new(self.or()?);
        self.expect(Token::RParen)?;
        match kind.as_str() {
            "any" => Ok(FilterExpr::Any {
                field,
                var,
                body: Some(body),
            }),
            "all" => Ok(FilterExpr::All { field, var, body }),
            other => Err(err(format!("unsupported lambda operator '{other}'"))),
        }
    }
}

/// Parse a `$filter` expression.
pub fn parse_filter(input: &str) -> Result<FilterExpr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(err("empty filter"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    if let Some(extra) = parser.peek() {
        return Err(err(format!("unexpected token {extra:?}")));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, FieldValue};

    fn doc() -> Document {
        let mut d = Document::new("7");
        d.fields.insert("category".into(), FieldValue::String("Luxury".into()));
        d.fields.insert("rating".into(), FieldValue::Float(4.2));
        d.fields.insert("rooms".into(), FieldValue::Integer(120));
        d.fields.insert("smoking".into(), FieldValue::Boolean(false));
        d.fields.insert(
            "tags".into(),
            FieldValue::StringCollection(vec!["pool".into(), "view".into()]),
        );
        d.fields.insert("owner".into(), FieldValue::String("O'Neil".into()));
        d
    }

    fn eval(filter: &str) -> bool {
        parse_filter(filter).unwrap().matches(&doc())
    }

    #[test]
    fn test_simple_comparisons() {
        assert!(eval("category eq 'Luxury'"));
        assert!(eval("rating ge 4"));
        assert!(eval("rating lt 4.5"));
        assert!(eval("rooms gt 1e2"));
        assert!(eval("smoking eq false"));
        assert!(eval("owner eq 'O''Neil'"));
        assert!(!eval("category ne 'Luxury'"));
        assert!(eval("missing eq null"));
    }

    #[test]
    fn test_literal_on_left_is_flipped() {
        assert!(eval("4 lt rating"));
        assert!(!eval("5 lt rating"));
    }

    #[test]
    fn test_precedence() {
        // and binds tighter than or
        assert!(eval("category eq 'Budget' and rating gt 1 or rooms eq 120"));
        assert!(!eval("category eq 'Budget' and (rating gt 1 or rooms eq 120)"));
        assert!(eval("not (rating gt 5) and not smoking eq true"));
    }

    #[test]
    fn test_search_in_and_lambdas() {
        assert!(eval("search.in(category, 'Budget,Luxury', ',')"));
        assert!(eval("search.in(category, 'Budget Luxury')"));
        assert!(!eval("search.in(category, 'Budget|Basic', '|')"));
        assert!(eval("tags/any(t: t eq 'pool')"));
        assert!(eval("tags/any()"));
        assert!(!eval("tags/all(t: t eq 'pool')"));
        assert!(eval("tags/any(t: search.in(t, 'spa,view'))"));
        assert!(eval("true"));
        assert!(!eval("false or false"));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "rating",
            "rating gt",
            "rating gt 'x' extra",
            "(rating gt 1",
            "category eq 'unterminated",
            "tags/first(t: t eq 'a')",
            "rating ~ 3",
            "search.in(category)",
        ] {
            assert!(
                matches!(parse_filter(bad), Err(SearchError::InvalidFilter(_))),
                "'{bad}' should not parse"
            );
        }
    }

    #[test]
    fn test_negative_numbers() {
        let expr = parse_filter("rating gt -1.5").unwrap();
        assert_eq!(
            expr,
            FilterExpr::Compare {
                field: "rating".into(),
                op: CompareOp::Gt,
                value: Literal::Number(-1.5),
            }
        );
    }
}
