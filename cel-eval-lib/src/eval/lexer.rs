//! Token scanner used by the checks that run after the engine has parsed an expression
//!
//! The engine only hands back an opaque program, so the literal, reference and regex
//! checks work on this token stream instead. Input has already been accepted by the
//! engine's parser, so the scanner never reports errors and skips anything it does not
//! recognize.

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int,
    Uint,
    Double,
    String(String),
    Bytes,
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,

    /// Byte offset of the first character of the token.
    pub offset: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(q) if q == p)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// The CEL type of a literal token, if the token is a literal.
    pub fn literal_type(&self) -> Option<&'static str> {
        match &self.kind {
            TokenKind::Int => Some("int"),
            TokenKind::Uint => Some("uint"),
            TokenKind::Double => Some("double"),
            TokenKind::String(_) => Some("string"),
            TokenKind::Bytes => Some("bytes"),
            TokenKind::Ident(name) => match name.as_str() {
                "true" | "false" => Some("bool"),
                "null" => Some("null_type"),
                _ => None,
            },
            TokenKind::Punct(_) => None,
        }
    }

    /// Whether the token can be the last token of an operand.
    pub fn ends_operand(&self) -> bool {
        match &self.kind {
            TokenKind::Ident(name) => name != "in",
            TokenKind::Punct(p) => matches!(*p, ")" | "]" | "}"),
            _ => true,
        }
    }
}

const TWO_CHAR_PUNCT: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_PUNCT: [&str; 19] = [
    "+", "-", "*", "/", "%", "!", "<", ">", "(", ")", "[", "]", "{", "}", ",", ".", ":", "?", "=",
];

pub fn tokenize(source: &str) -> Vec<Token> {
    let mut scanner = Scanner {
        source,
        chars: source.char_indices().collect(),
        pos: 0,
        tokens: Vec::new(),
    };
    scanner.run();
    scanner.tokens
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

struct Scanner<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    tokens: Vec<Token>,
}

impl Scanner<'_> {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.source.len(), |&(i, _)| i)
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        self.tokens.push(Token { kind, offset });
    }

    fn run(&mut self) {
        while let Some(c) = self.peek(0) {
            let offset = self.offset();

            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '/' && self.peek(1) == Some('/') {
                while self.peek(0).is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else if c == '_' || c.is_ascii_alphabetic() {
                self.ident_or_prefixed_literal(offset);
            } else if c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|d| d.is_ascii_digit()) && !self.after_operand()) {
                self.number(offset);
            } else if c == '"' || c == '\'' {
                let value = self.quoted(false);
                self.push(TokenKind::String(value), offset);
            } else if let Some(p) = self.punct() {
                self.push(TokenKind::Punct(p), offset);
            } else {
                self.pos += 1;
            }
        }
    }

    fn after_operand(&self) -> bool {
        self.tokens.last().is_some_and(Token::ends_operand)
    }

    fn ident_or_prefixed_literal(&mut self, offset: usize) {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c == '_' || c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();

        if matches!(self.peek(0), Some('"' | '\'')) {
            let lower = word.to_ascii_lowercase();
            let raw = lower.contains('r');
            let bytes = lower.contains('b');
            if matches!(lower.as_str(), "r" | "b" | "rb" | "br") {
                let value = self.quoted(raw);
                let kind = if bytes { TokenKind::Bytes } else { TokenKind::String(value) };
                self.push(kind, offset);
                return;
            }
        }

        self.push(TokenKind::Ident(word), offset);
    }

    fn number(&mut self, offset: usize) {
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X')) {
            self.pos += 2;
            while self.peek(0).is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let kind = if self.unsigned_suffix() { TokenKind::Uint } else { TokenKind::Int };
            self.push(kind, offset);
            return;
        }

        let mut double = false;
        self.digits();
        if self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            double = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(0), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek(1), Some('+' | '-')));
            if self.peek(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                double = true;
                self.pos += 1 + sign;
                self.digits();
            }
        }

        let kind = if double {
            TokenKind::Double
        } else if self.unsigned_suffix() {
            TokenKind::Uint
        } else {
            TokenKind::Int
        };
        self.push(kind, offset);
    }

    fn digits(&mut self) {
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn unsigned_suffix(&mut self) -> bool {
        if matches!(self.peek(0), Some('u' | 'U')) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes a quoted literal starting at the opening quote and returns its value.
    fn quoted(&mut self, raw: bool) -> String {
        let Some(quote) = self.peek(0) else {
            return String::new();
        };
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        while let Some(c) = self.peek(0) {
            if c == quote && (!triple || (self.peek(1) == Some(quote) && self.peek(2) == Some(quote))) {
                self.pos += if triple { 3 } else { 1 };
                break;
            }

            if c == '\\' && !raw {
                self.pos += 1;
                self.escape(&mut value);
            } else {
                value.push(c);
                self.pos += 1;
            }
        }
        value
    }

    fn escape(&mut self, value: &mut String) {
        let Some(c) = self.peek(0) else {
            value.push('\\');
            return;
        };
        self.pos += 1;

        let simple = match c {
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'a' => Some('\u{7}'),
            'b' => Some('\u{8}'),
            'f' => Some('\u{c}'),
            'v' => Some('\u{b}'),
            '\\' | '\'' | '"' | '`' | '?' => Some(c),
            _ => None,
        };
        if let Some(s) = simple {
            value.push(s);
            return;
        }

        let (radix, width) = match c {
            'x' | 'X' => (16, 2),
            'u' => (16, 4),
            'U' => (16, 8),
            '0'..='7' => {
                self.pos -= 1;
                (8, 3)
            }
            _ => {
                value.push('\\');
                value.push(c);
                return;
            }
        };

        let digits: String = (0..width).filter_map(|i| self.peek(i)).collect();
        match u32::from_str_radix(&digits, radix).ok().and_then(char::from_u32) {
            Some(decoded) if digits.len() == width => {
                value.push(decoded);
                self.pos += width;
            }
            _ => {
                value.push('\\');
                value.push(c);
            }
        }
    }

    fn punct(&mut self) -> Option<&'static str> {
        let first = self.peek(0)?;
        if let Some(second) = self.peek(1) {
            let pair: String = [first, second].iter().collect();
            if let Some(p) = TWO_CHAR_PUNCT.iter().copied().find(|p| *p == pair) {
                self.pos += 2;
                return Some(p);
            }
        }

        let single = first.to_string();
        let p = ONE_CHAR_PUNCT.iter().copied().find(|p| *p == single)?;
        self.pos += 1;
        Some(p)
    }
}
