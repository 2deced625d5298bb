//! Recursive-descent parser producing raw statement trees.

use std::time::Duration;

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::ast::{Sort, SortOrder};
use crate::query::condition::{ConditionKind, Connective};
use crate::query::parser::lexer::{Token, TokenKind};
use crate::query::parser::raw::{RawCondition, RawDelete, RawSelect, RawWrite};
use crate::query::value::{Column, TypeHint, Value};

pub(crate) struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    config: &'a QueryConfig,
    depth: usize,
    literal_depth: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must end with [`TokenKind::Eof`].
    pub(crate) fn new(input: &'a str, tokens: Vec<Token>, config: &'a QueryConfig) -> Self {
        Self {
            input,
            tokens,
            pos: 0,
            config,
            depth: 0,
            literal_depth: 0,
        }
    }

    // ---- token helpers ----

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + ahead).min(last)].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        let offset = self.current().offset.min(self.input.len());
        QueryError::syntax(message, &self.input[offset..])
    }

    fn unexpected(&self, expected: &str) -> QueryError {
        self.error(format!(
            "expected {expected}, found {}",
            self.peek().describe()
        ))
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(name) if name == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{keyword}'")))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub(crate) fn expect_end(&self) -> Result<()> {
        match self.peek() {
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of query")),
        }
    }

    fn entity(&mut self, command: &'static str) -> Result<String> {
        match self.peek() {
            TokenKind::Ident(_) => self.expect_ident("entity name"),
            TokenKind::Eof => Err(QueryError::MissingEntity { command }),
            _ => Err(self.unexpected("entity name")),
        }
    }

    fn non_negative(&mut self, clause: &str) -> Result<u64> {
        match self.peek() {
            TokenKind::Int(n) if *n >= 0 => {
                let n = *n as u64;
                self.advance();
                Ok(n)
            }
            TokenKind::Int(_) => Err(self.error(format!("{clause} must not be negative"))),
            _ => Err(self.unexpected(&format!("number after '{clause}'"))),
        }
    }

    // ---- statements ----

    pub(crate) fn select(&mut self) -> Result<RawSelect> {
        self.expect_keyword("select")?;
        let fields = if self.eat(&TokenKind::Star) {
            Vec::new()
        } else {
            self.field_list()?
        };
        if self.peek() == &TokenKind::Eof {
            return Err(QueryError::MissingEntity { command: "select" });
        }
        self.expect_keyword("from")?;
        let entity = self.entity("select")?;
        let condition = self.where_clause()?;

        let mut query = RawSelect {
            entity,
            fields,
            condition,
            sorts: Vec::new(),
            limit: 0,
            skip: 0,
        };
        let (mut seen_order, mut seen_skip, mut seen_limit) = (false, false, false);
        loop {
            if self.is_keyword("order") {
                if seen_order {
                    return Err(self.error("duplicate 'order by' clause"));
                }
                seen_order = true;
                self.advance();
                self.expect_keyword("by")?;
                query.sorts = self.sort_list()?;
            } else if self.is_keyword("skip") {
                if seen_skip {
                    return Err(self.error("duplicate 'skip' clause"));
                }
                seen_skip = true;
                self.advance();
                query.skip = self.non_negative("skip")?;
            } else if self.is_keyword("limit") {
                if seen_limit {
                    return Err(self.error("duplicate 'limit' clause"));
                }
                seen_limit = true;
                self.advance();
                query.limit = self.non_negative("limit")?;
            } else {
                self.expect_end()?;
                return Ok(query);
            }
        }
    }

    pub(crate) fn delete(&mut self) -> Result<RawDelete> {
        self.expect_keyword("delete")?;
        let fields = if self.is_keyword("from") {
            Vec::new()
        } else if self.peek() == &TokenKind::Eof {
            return Err(QueryError::MissingEntity { command: "delete" });
        } else {
            self.field_list()?
        };
        if self.peek() == &TokenKind::Eof {
            return Err(QueryError::MissingEntity { command: "delete" });
        }
        self.expect_keyword("from")?;
        let entity = self.entity("delete")?;
        let condition = self.where_clause()?;
        self.expect_end()?;
        Ok(RawDelete {
            entity,
            fields,
            condition,
        })
    }

    pub(crate) fn insert(&mut self) -> Result<RawWrite> {
        self.expect_keyword("insert")?;
        let entity = self.entity("insert")?;
        let columns = self.write_body()?;
        let ttl = match self.peek() {
            TokenKind::Eof => None,
            _ => Some(self.ttl()?),
        };
        self.expect_end()?;
        Ok(RawWrite {
            entity,
            columns,
            ttl,
        })
    }

    pub(crate) fn update(&mut self) -> Result<RawWrite> {
        self.expect_keyword("update")?;
        let entity = self.entity("update")?;
        let columns = self.write_body()?;
        self.expect_end()?;
        Ok(RawWrite {
            entity,
            columns,
            ttl: None,
        })
    }

    fn field_list(&mut self) -> Result<Vec<String>> {
        let mut fields = vec![self.expect_ident("field name")?];
        while self.eat(&TokenKind::Comma) {
            fields.push(self.expect_ident("field name")?);
        }
        Ok(fields)
    }

    fn sort_list(&mut self) -> Result<Vec<Sort>> {
        let mut sorts = Vec::new();
        loop {
            let name = self.expect_ident("sort field")?;
            let order = if self.eat_keyword("desc") {
                SortOrder::Desc
            } else {
                self.eat_keyword("asc");
                SortOrder::Asc
            };
            sorts.push(Sort { name, order });
            if !self.eat(&TokenKind::Comma) {
                return Ok(sorts);
            }
        }
    }

    /// `(field = value, ...)`, `{json}` or `({json})`.
    fn write_body(&mut self) -> Result<Vec<Column>> {
        match self.peek() {
            TokenKind::LBrace => self.json_payload(),
            TokenKind::LParen if self.peek_at(1) == &TokenKind::LBrace => {
                self.advance();
                let columns = self.json_payload()?;
                self.expect(TokenKind::RParen)?;
                Ok(columns)
            }
            TokenKind::LParen => {
                self.advance();
                let mut columns = Vec::new();
                loop {
                    let name = self.expect_ident("field name")?;
                    self.expect(TokenKind::Eq)?;
                    let value = self.value()?;
                    columns.push(Column::new(name, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                Ok(columns)
            }
            _ => Err(self.unexpected("'(' or '{'")),
        }
    }

    fn json_payload(&mut self) -> Result<Vec<Column>> {
        match self.brace_literal()? {
            Value::Document(columns) => Ok(columns),
            _ => Err(self.error("expected a JSON object payload")),
        }
    }

    fn ttl(&mut self) -> Result<Duration> {
        let amount = self.non_negative("ttl")?;
        let unit = self.expect_ident("ttl unit")?;
        let seconds = |factor: u64| {
            amount
                .checked_mul(factor)
                .map(Duration::from_secs)
                .ok_or_else(|| self.error("ttl overflows"))
        };
        match unit.as_str() {
            "nanosecond" | "nanoseconds" => Ok(Duration::from_nanos(amount)),
            "millisecond" | "milliseconds" => Ok(Duration::from_millis(amount)),
            "second" | "seconds" => seconds(1),
            "minute" | "minutes" => seconds(60),
            "hour" | "hours" => seconds(3_600),
            "day" | "days" => seconds(86_400),
            other => Err(self.error(format!("unknown ttl unit '{other}'"))),
        }
    }

    // ---- conditions ----

    fn where_clause(&mut self) -> Result<Option<RawCondition>> {
        if self.eat_keyword("where") {
            Ok(Some(self.chain()?))
        } else {
            Ok(None)
        }
    }

    fn chain(&mut self) -> Result<RawCondition> {
        let first = self.operand()?;
        let mut rest = Vec::new();
        loop {
            let connective = if self.eat_keyword("and") {
                Connective::And
            } else if self.eat_keyword("or") {
                Connective::Or
            } else {
                break;
            };
            rest.push((connective, self.operand()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(RawCondition::Chain {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.config.max_condition_depth {
            return Err(QueryError::LimitExceeded {
                what: "condition depth",
                max: self.config.max_condition_depth,
                found: self.depth,
            });
        }
        Ok(())
    }

    fn operand(&mut self) -> Result<RawCondition> {
        if self.eat_keyword("not") {
            self.enter()?;
            let inner = self.operand()?;
            self.depth -= 1;
            return Ok(RawCondition::Not(Box::new(inner)));
        }
        if self.eat(&TokenKind::LParen) {
            self.enter()?;
            let group = self.chain()?;
            self.expect(TokenKind::RParen)?;
            self.depth -= 1;
            return Ok(group);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<RawCondition> {
        let field = self.expect_ident("field name")?;
        let negated = self.eat_keyword("not");

        let (kind, value) = match self.peek().clone() {
            TokenKind::Eq => (ConditionKind::Equals, self.operator_value()?),
            TokenKind::Gt => (ConditionKind::GreaterThan, self.operator_value()?),
            TokenKind::Gte => (ConditionKind::GreaterEqualsThan, self.operator_value()?),
            TokenKind::Lt => (ConditionKind::LesserThan, self.operator_value()?),
            TokenKind::Lte => (ConditionKind::LesserEqualsThan, self.operator_value()?),
            TokenKind::Ident(op) if op == "like" => (ConditionKind::Like, self.operator_value()?),
            TokenKind::Ident(op) if op == "in" => {
                self.advance();
                (ConditionKind::In, self.in_values()?)
            }
            TokenKind::Ident(op) if op == "between" => {
                self.advance();
                let low = self.value()?;
                self.expect_keyword("and")?;
                let high = self.value()?;
                (ConditionKind::Between, Value::List(vec![low, high]))
            }
            TokenKind::Ident(op) => {
                return Err(QueryError::UnsupportedOperator { operator: op });
            }
            _ => return Err(self.unexpected("comparison operator")),
        };
        if negated && !matches!(kind, ConditionKind::In | ConditionKind::Like | ConditionKind::Between)
        {
            return Err(self.error("'not' may only precede in, like or between"));
        }

        let compare = RawCondition::Compare { field, kind, value };
        Ok(if negated {
            RawCondition::Not(Box::new(compare))
        } else {
            compare
        })
    }

    fn operator_value(&mut self) -> Result<Value> {
        self.advance();
        self.value()
    }

    fn in_values(&mut self) -> Result<Value> {
        if !self.eat(&TokenKind::LParen) {
            return match self.value()? {
                Value::List(items) => {
                    self.check_in_list(items.len())?;
                    Ok(Value::List(items))
                }
                value @ Value::Param(_) => Ok(value),
                _ => Err(self.error("in expects a list of values")),
            };
        }
        let mut items = Vec::new();
        loop {
            items.push(self.value()?);
            self.check_in_list(items.len())?;
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Value::List(items))
    }

    fn check_in_list(&self, len: usize) -> Result<()> {
        if len > self.config.max_in_list {
            return Err(QueryError::LimitExceeded {
                what: "in list",
                max: self.config.max_in_list,
                found: len,
            });
        }
        Ok(())
    }

    // ---- literals ----

    pub(crate) fn value(&mut self) -> Result<Value> {
        match self.peek().clone() {
            TokenKind::Str(s) => {
                self.advance();
                Ok(Value::String(s))
            }
            TokenKind::Int(i) => {
                self.advance();
                Ok(Value::Int(i))
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Value::Float(x))
            }
            TokenKind::Param(name) => {
                self.advance();
                Ok(Value::Param(name))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => {
                    self.advance();
                    Ok(Value::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Value::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Value::Null)
                }
                "convert" if self.peek_at(1) == &TokenKind::LParen => self.nested(Self::convert),
                _ => Err(self.unexpected("value")),
            },
            TokenKind::LBrace => self.nested(Self::brace_literal),
            TokenKind::LBracket => self.nested(Self::bracket_list),
            _ => Err(self.unexpected("value")),
        }
    }

    /// Runs `parse` one literal level deeper, bounded by `max_literal_depth`.
    fn nested(&mut self, parse: fn(&mut Self) -> Result<Value>) -> Result<Value> {
        self.literal_depth += 1;
        if self.literal_depth > self.config.max_literal_depth {
            return Err(QueryError::LimitExceeded {
                what: "literal depth",
                max: self.config.max_literal_depth,
                found: self.literal_depth,
            });
        }
        let value = parse(self);
        self.literal_depth -= 1;
        value
    }

    /// `convert(<literal>, <type name>)`
    fn convert(&mut self) -> Result<Value> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let literal_at = self.pos;
        let literal = self.value()?;
        let mut has_param = false;
        literal.visit_params(&mut |_| has_param = true);
        if has_param {
            self.pos = literal_at;
            return Err(self.error("convert() requires a literal, not a parameter"));
        }
        self.expect(TokenKind::Comma)?;
        let type_name = self.expect_ident("type name")?;
        self.expect(TokenKind::RParen)?;
        literal.convert(TypeHint::parse(&type_name)?)
    }

    /// `{k: v, ...}` as a document, `{v, ...}` as a list, `{}` as an empty document.
    fn brace_literal(&mut self) -> Result<Value> {
        self.expect(TokenKind::LBrace)?;
        if self.eat(&TokenKind::RBrace) {
            return Ok(Value::Document(Vec::new()));
        }
        let is_map = matches!(self.peek(), TokenKind::Str(_) | TokenKind::Ident(_))
            && self.peek_at(1) == &TokenKind::Colon;
        if !is_map {
            let items = self.value_sequence(TokenKind::RBrace)?;
            return Ok(Value::List(items));
        }

        let mut columns: Vec<Column> = Vec::new();
        loop {
            let key = match self.peek().clone() {
                TokenKind::Str(key) | TokenKind::Ident(key) => {
                    self.advance();
                    key
                }
                _ => return Err(self.unexpected("object key")),
            };
            self.expect(TokenKind::Colon)?;
            let value = self.value()?;
            match columns.iter_mut().find(|column| column.name == key) {
                Some(existing) => existing.value = value,
                None => columns.push(Column::new(key, value)),
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Value::Document(columns))
    }

    fn bracket_list(&mut self) -> Result<Value> {
        self.expect(TokenKind::LBracket)?;
        if self.eat(&TokenKind::RBracket) {
            return Ok(Value::List(Vec::new()));
        }
        let items = self.value_sequence(TokenKind::RBracket)?;
        Ok(Value::List(items))
    }

    fn value_sequence(&mut self, close: TokenKind) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            items.push(self.value()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}
