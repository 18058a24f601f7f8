//! Source rewriting applied after an expression has been checked
//!
//! The engine resolves `list[i]` past the end, and `map[key]` for a missing key, to `null`.
//! Each index expression is rewritten into a call of the checked indexing function, so
//! `a.b[0]` compiles as `__index__(a.b, 0)` and fails when the element does not exist.

use super::extensions::INDEX_FUNCTION;
use super::lexer::{Token, TokenKind};
use core::cmp::Reverse;

struct Edit {
    offset: usize,
    removed: usize,
    text: String,
    order: Reverse<usize>,
}

/// Rewrites every index expression, or returns `None` when the expression has none.
pub fn checked_indexing(source: &str, tokens: &[Token]) -> Option<String> {
    let mut edits = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if !token.is_punct("[") || i == 0 || !tokens[i - 1].ends_operand() {
            continue;
        }
        let Some(close) = matching_close(tokens, i) else {
            continue;
        };

        let start = operand_start(tokens, i - 1);
        edits.push(Edit {
            offset: tokens[start].offset,
            removed: 0,
            text: format!("{INDEX_FUNCTION}("),
            order: Reverse(i),
        });
        edits.push(Edit {
            offset: token.offset,
            removed: 1,
            text: ", ".to_string(),
            order: Reverse(i),
        });
        edits.push(Edit {
            offset: tokens[close].offset,
            removed: 1,
            text: ")".to_string(),
            order: Reverse(i),
        });
    }

    if edits.is_empty() {
        return None;
    }

    // Calls opening at the same offset nest with the outermost index first.
    edits.sort_by_key(|edit| (edit.offset, edit.order));

    let mut out = String::with_capacity(source.len() + edits.len() * INDEX_FUNCTION.len());
    let mut copied = 0;
    for edit in edits {
        out.push_str(source.get(copied..edit.offset).unwrap_or_default());
        out.push_str(&edit.text);
        copied = edit.offset + edit.removed;
    }
    out.push_str(source.get(copied..).unwrap_or_default());

    Some(out)
}

/// Index of the first token of the operand that ends at `last`.
///
/// Walks back over the postfix chain: field selections, calls, indexes and message
/// construction all belong to the operand.
fn operand_start(tokens: &[Token], last: usize) -> usize {
    let mut i = last;

    loop {
        match &tokens[i].kind {
            TokenKind::Punct(closer @ (")" | "]" | "}")) => {
                let Some(open) = matching_open(tokens, i) else {
                    return i;
                };
                let prev = open.checked_sub(1).map(|p| &tokens[p]);
                let continues = match *closer {
                    "]" => prev.is_some_and(Token::ends_operand),
                    _ => prev.is_some_and(|p| p.ident().is_some_and(|name| name != "in")),
                };
                if !continues {
                    return open;
                }
                i = open - 1;
                if *closer == "]" {
                    continue;
                }
            }
            TokenKind::Ident(_) => {}
            _ => return i,
        }

        // `i` is an identifier; a preceding dot continues the chain.
        match i.checked_sub(1) {
            Some(dot) if tokens[dot].is_punct(".") => match dot.checked_sub(1) {
                Some(before) if tokens[before].ends_operand() => i = before,
                _ => return dot,
            },
            _ => return i,
        }
    }
}

fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match &token.kind {
            TokenKind::Punct("(" | "[" | "{") => depth += 1,
            TokenKind::Punct(")" | "]" | "}") => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn matching_open(tokens: &[Token], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match &tokens[i].kind {
            TokenKind::Punct(")" | "]" | "}") => depth += 1,
            TokenKind::Punct("(" | "[" | "{") => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::lexer::tokenize;

    fn rewrite(source: &str) -> String {
        checked_indexing(source, &tokenize(source)).unwrap_or_else(|| source.to_string())
    }

    #[test]
    fn test_no_indexing_is_left_alone() {
        assert_eq!(checked_indexing("[1, 2] + x.y", &tokenize("[1, 2] + x.y")), None);
        assert_eq!(checked_indexing("'a' in ['a']", &tokenize("'a' in ['a']")), None);
    }

    #[test]
    fn test_operands() {
        assert_eq!(rewrite("[1, 2][5]"), "__index__([1, 2], 5)");
        assert_eq!(rewrite("x[0]"), "__index__(x, 0)");
        assert_eq!(rewrite("a.b.c['k']"), "__index__(a.b.c, 'k')");
        assert_eq!(rewrite("{'a': 1}['a']"), "__index__({'a': 1}, 'a')");
        assert_eq!(rewrite("f(x)[1]"), "__index__(f(x), 1)");
        assert_eq!(rewrite("s.split(',')[1]"), "__index__(s.split(','), 1)");
        assert_eq!(rewrite("(a + b)[0]"), "__index__((a + b), 0)");
        assert_eq!(rewrite("'[ab]'[0]"), "__index__('[ab]', 0)");
    }

    #[test]
    fn test_chains_nest() {
        assert_eq!(rewrite("m[1][0]"), "__index__(__index__(m, 1), 0)");
        assert_eq!(rewrite("a[0].b[1]"), "__index__(__index__(a, 0).b, 1)");
        assert_eq!(rewrite("a[b[0]]"), "__index__(a, __index__(b, 0))");
    }

    #[test]
    fn test_surrounding_operators_are_kept() {
        assert_eq!(rewrite("-x[0] + y[1] * 2"), "-__index__(x, 0) + __index__(y, 1) * 2");
        assert_eq!(rewrite("x[0] in [1, 2]"), "__index__(x, 0) in [1, 2]");
        assert_eq!(rewrite("items.all(i, i[0] > 0)"), "items.all(i, __index__(i, 0) > 0)");
    }
}
