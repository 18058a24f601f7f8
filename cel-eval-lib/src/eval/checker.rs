//! Semantic checks applied to an expression once the engine has parsed it
//!
//! Two checks run here: every referenced variable must be declared, and (when the
//! environment asks for it) list and map literals must be homogeneous. Element types are
//! inferred bottom-up from literals, operators and nested aggregates. Variables, field
//! selections, indexing and most calls are dynamically typed and always accepted.

use super::lexer::{Token, TokenKind, line_col};
use core::fmt;
use std::collections::BTreeSet;

/// Receiver macros whose first argument introduces an iteration variable.
const COMPREHENSION_MACROS: [&str; 5] = ["all", "exists", "exists_one", "map", "filter"];

/// Identifiers that denote types and can appear as plain values, e.g. `type(x) == int`.
const TYPE_NAMES: [&str; 11] = [
    "int", "uint", "double", "string", "bytes", "bool", "list", "map", "type", "null_type", "dyn",
];

const LITERAL_IDENTS: [&str; 3] = ["true", "false", "null"];

/// Reports references to variables that are not declared.
pub fn undeclared_references(source: &str, tokens: &[Token], declared: &BTreeSet<String>) -> Vec<String> {
    let binders = comprehension_binders(tokens);
    let mut issues = Vec::new();

    // open brackets, `true` when the bracket starts a message construction
    let mut brackets: Vec<bool> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
        let next = tokens.get(i + 1);

        match &token.kind {
            TokenKind::Punct("(" | "[") => brackets.push(false),
            TokenKind::Punct("{") => brackets.push(prev.is_some_and(|p| p.ident().is_some_and(|name| name != "in"))),
            TokenKind::Punct(")" | "]" | "}") => {
                let _ = brackets.pop();
            }
            TokenKind::Ident(name) => {
                let selected = prev.is_some_and(|p| p.is_punct("."));
                let called = next.is_some_and(|n| n.is_punct("("));
                let constructed = next.is_some_and(|n| n.is_punct("{"));
                let field_name = brackets.last() == Some(&true) && next.is_some_and(|n| n.is_punct(":"));

                let known = declared.contains(name)
                    || binders.contains(name.as_str())
                    || LITERAL_IDENTS.contains(&name.as_str())
                    || TYPE_NAMES.contains(&name.as_str())
                    || name == "in";

                if !(selected || called || constructed || field_name || known) {
                    issues.push(format_issue(
                        source,
                        token.offset,
                        &format!("undeclared reference to '{name}' (in container '')"),
                    ));
                }
            }
            _ => {}
        }
    }

    issues
}

fn comprehension_binders(tokens: &[Token]) -> BTreeSet<&str> {
    tokens
        .windows(5)
        .filter_map(|w| {
            let is_macro = w[0].is_punct(".")
                && w[1].ident().is_some_and(|name| COMPREHENSION_MACROS.contains(&name))
                && w[2].is_punct("(")
                && w[4].is_punct(",");
            if is_macro { w[3].ident() } else { None }
        })
        .collect()
}

/// Reports list and map literals whose elements disagree on their static type.
pub fn heterogeneous_literals(source: &str, tokens: &[Token]) -> Vec<String> {
    let mut issues = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).and_then(|p| tokens.get(p));

        if token.is_punct("[") && !prev.is_some_and(Token::ends_operand) {
            let elements = split_elements(tokens, i);
            check_same_type(source, elements.iter().copied(), &mut issues);
        } else if token.is_punct("{") && !prev.is_some_and(|p| p.ident().is_some_and(|name| name != "in")) {
            let entries: Vec<_> = split_elements(tokens, i).into_iter().map(split_entry).collect();
            check_same_type(source, entries.iter().map(|(key, _)| *key), &mut issues);
            check_same_type(source, entries.iter().filter_map(|(_, value)| *value), &mut issues);
        }
    }

    issues
}

fn check_same_type<'a>(source: &str, elements: impl Iterator<Item = &'a [Token]>, issues: &mut Vec<String>) {
    let mut expected: Option<Type> = None;

    for element in elements {
        let found = static_type(element);
        if found == Type::Dyn {
            continue;
        }

        match &expected {
            None => expected = Some(found),
            Some(expected) if !expected.agrees_with(&found) => {
                issues.push(format_issue(
                    source,
                    element[0].offset,
                    &format!("expected type '{expected}' but found '{found}'"),
                ));
            }
            Some(_) => {}
        }
    }
}

/// Statically known type of an expression; anything that depends on a variable is `Dyn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Dyn,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    List(Box<Self>),
    Map(Box<Self>, Box<Self>),
}

impl Type {
    /// Whether two types can be elements of one aggregate; `Dyn` agrees with anything.
    fn agrees_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Dyn, _) | (_, Self::Dyn) => true,
            (Self::List(a), Self::List(b)) => a.agrees_with(b),
            (Self::Map(ak, av), Self::Map(bk, bv)) => ak.agrees_with(bk) && av.agrees_with(bv),
            _ => self == other,
        }
    }

    fn from_literal(token: &Token) -> Option<Self> {
        Some(match token.literal_type()? {
            "int" => Self::Int,
            "uint" => Self::Uint,
            "double" => Self::Double,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            "bool" => Self::Bool,
            _ => Self::Null,
        })
    }

    const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Uint | Self::Double)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dyn => f.write_str("dyn"),
            Self::Null => f.write_str("null_type"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Uint => f.write_str("uint"),
            Self::Double => f.write_str("double"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::List(elem) => write!(f, "list({elem})"),
            Self::Map(key, value) => write!(f, "map({key}, {value})"),
        }
    }
}

/// Infers the static type of a complete expression.
pub fn static_type(tokens: &[Token]) -> Type {
    let mut typer = Typer { tokens, pos: 0 };
    let ty = typer.expr();
    if typer.pos == tokens.len() { ty } else { Type::Dyn }
}

/// Binary operators by increasing precedence.
const BINARY_LEVELS: [&[&str]; 5] = [
    &["||"],
    &["&&"],
    &["==", "!=", "<", "<=", ">", ">=", "in"],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Global functions whose result type does not depend on their arguments.
const TYPED_FUNCTIONS: [(&str, Type); 8] = [
    ("int", Type::Int),
    ("uint", Type::Uint),
    ("double", Type::Double),
    ("string", Type::String),
    ("bytes", Type::Bytes),
    ("bool", Type::Bool),
    ("size", Type::Int),
    ("has", Type::Bool),
];

/// Precedence-climbing walk over tokens the engine has already parsed.
struct Typer<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Typer<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn at_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    fn eat(&mut self, p: &str) -> bool {
        let found = self.at_punct(p);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expr(&mut self) -> Type {
        let condition = self.binary(0);
        if !self.eat("?") {
            return condition;
        }

        let then = self.expr();
        let _ = self.eat(":");
        let otherwise = self.expr();
        if then == otherwise { then } else { Type::Dyn }
    }

    fn operator(&self, level: usize) -> Option<&'static str> {
        let token = self.peek()?;
        BINARY_LEVELS[level]
            .iter()
            .copied()
            .find(|op| token.is_punct(op) || token.ident() == Some(*op))
    }

    fn binary(&mut self, level: usize) -> Type {
        if level == BINARY_LEVELS.len() {
            return self.unary();
        }

        let mut left = self.binary(level + 1);
        while let Some(op) = self.operator(level) {
            self.pos += 1;
            let right = self.binary(level + 1);
            left = combine(op, left, right);
        }
        left
    }

    fn unary(&mut self) -> Type {
        if self.eat("!") {
            let _ = self.unary();
            return Type::Bool;
        }
        if self.eat("-") {
            let operand = self.unary();
            return if matches!(operand, Type::Int | Type::Double) { operand } else { Type::Dyn };
        }
        self.member()
    }

    fn member(&mut self) -> Type {
        let mut ty = self.primary();
        loop {
            if self.eat(".") {
                if self.peek().and_then(Token::ident).is_some() {
                    self.pos += 1;
                }
                if self.at_punct("(") {
                    self.skip_group();
                }
                ty = Type::Dyn;
            } else if self.at_punct("[") {
                self.skip_group();
                ty = Type::Dyn;
            } else {
                return ty;
            }
        }
    }

    fn primary(&mut self) -> Type {
        let Some(token) = self.peek() else {
            return Type::Dyn;
        };

        if let Some(ty) = Type::from_literal(token) {
            self.pos += 1;
            return ty;
        }

        if let Some(name) = token.ident() {
            self.pos += 1;
            if self.at_punct("(") {
                self.skip_group();
                return TYPED_FUNCTIONS
                    .iter()
                    .find(|(function, _)| *function == name)
                    .map_or(Type::Dyn, |(_, ty)| ty.clone());
            }
            if self.at_punct("{") {
                self.skip_group();
            }
            return Type::Dyn;
        }

        if self.eat("(") {
            let ty = self.expr();
            let _ = self.eat(")");
            return ty;
        }

        if self.eat("[") {
            let mut elements = Vec::new();
            while !self.eat("]") && self.peek().is_some() {
                elements.push(self.expr());
                if !self.eat(",") && !self.at_punct("]") {
                    return Type::Dyn;
                }
            }
            return Type::List(Box::new(unify(elements)));
        }

        if self.eat("{") {
            let mut keys = Vec::new();
            let mut values = Vec::new();
            while !self.eat("}") && self.peek().is_some() {
                keys.push(self.expr());
                if !self.eat(":") {
                    return Type::Dyn;
                }
                values.push(self.expr());
                if !self.eat(",") && !self.at_punct("}") {
                    return Type::Dyn;
                }
            }
            return Type::Map(Box::new(unify(keys)), Box::new(unify(values)));
        }

        self.pos += 1;
        Type::Dyn
    }

    /// Skips a bracketed group starting at the opening bracket.
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            match &token.kind {
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                TokenKind::Punct(")" | "]" | "}") => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}

fn combine(op: &str, left: Type, right: Type) -> Type {
    match op {
        "||" | "&&" | "==" | "!=" | "<" | "<=" | ">" | ">=" | "in" => Type::Bool,
        "+" => match (left, right) {
            (Type::List(a), Type::List(b)) => Type::List(Box::new(unify(vec![*a, *b]))),
            (l, r) if l == r && (l.is_numeric() || matches!(l, Type::String | Type::Bytes)) => l,
            _ => Type::Dyn,
        },
        _ if left == right && left.is_numeric() => left,
        _ => Type::Dyn,
    }
}

/// The common element type of an aggregate, `Dyn` when empty or mixed.
fn unify(types: Vec<Type>) -> Type {
    let mut common: Option<Type> = None;
    for ty in types {
        if ty == Type::Dyn {
            continue;
        }
        match &common {
            None => common = Some(ty),
            Some(c) if c.agrees_with(&ty) => {}
            Some(_) => return Type::Dyn,
        }
    }
    common.unwrap_or(Type::Dyn)
}

/// Splits the comma-separated elements of the aggregate opened at `open`.
fn split_elements(tokens: &[Token], open: usize) -> Vec<&[Token]> {
    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut start = open + 1;

    for (i, token) in tokens.iter().enumerate().skip(open + 1) {
        match &token.kind {
            TokenKind::Punct("(" | "[" | "{") => depth += 1,
            TokenKind::Punct(")" | "]" | "}") if depth == 0 => {
                push_element(&mut elements, tokens, start, i);
                return elements;
            }
            TokenKind::Punct(")" | "]" | "}") => depth -= 1,
            TokenKind::Punct(",") if depth == 0 => {
                push_element(&mut elements, tokens, start, i);
                start = i + 1;
            }
            _ => {}
        }
    }

    push_element(&mut elements, tokens, start, tokens.len());
    elements
}

fn push_element<'a>(elements: &mut Vec<&'a [Token]>, tokens: &'a [Token], start: usize, end: usize) {
    if let Some(element) = tokens.get(start..end)
        && !element.is_empty()
    {
        elements.push(element);
    }
}

/// Splits a map entry at its key/value colon, skipping colons that close a ternary.
fn split_entry(entry: &[Token]) -> (&[Token], Option<&[Token]>) {
    let mut depth = 0usize;
    let mut pending_ternaries = 0usize;

    for (i, token) in entry.iter().enumerate() {
        match &token.kind {
            TokenKind::Punct("(" | "[" | "{") => depth += 1,
            TokenKind::Punct(")" | "]" | "}") => depth = depth.saturating_sub(1),
            TokenKind::Punct("?") if depth == 0 => pending_ternaries += 1,
            TokenKind::Punct(":") if depth == 0 && pending_ternaries > 0 => pending_ternaries -= 1,
            TokenKind::Punct(":") if depth == 0 => {
                let (key, rest) = entry.split_at(i);
                return (key, rest.get(1..));
            }
            _ => {}
        }
    }

    (entry, None)
}

fn format_issue(source: &str, offset: usize, message: &str) -> String {
    let (line, col) = line_col(source, offset);
    format!("ERROR: <input>:{line}:{col}: {message}")
}
