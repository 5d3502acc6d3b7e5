//! Stage 1: placeholder numbering (spec.md §4.2.1).

use super::token::Token;

pub struct PlaceholderResult {
    pub tokens: Vec<Token>,
    /// One entry per distinct parameter, in first-appearance order.
    /// `None` for a positional `?` slot, `Some(name)` for a named one.
    pub param_names: Vec<Option<String>>,
}

pub fn apply(tokens: Vec<Token>) -> PlaceholderResult {
    let mut out = Vec::with_capacity(tokens.len());
    let mut param_names: Vec<Option<String>> = Vec::new();
    let mut name_to_index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for tok in tokens {
        match tok {
            Token::QuestionMark => {
                param_names.push(None);
                out.push(Token::Word(format!("${}", param_names.len())));
            }
            Token::NamedPlaceholder { name, .. } => {
                let idx = *name_to_index.entry(name.clone()).or_insert_with(|| {
                    param_names.push(Some(name.clone()));
                    param_names.len() - 1
                });
                out.push(Token::Word(format!("${}", idx + 1)));
            }
            other => out.push(other),
        }
    }

    PlaceholderResult {
        tokens: out,
        param_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::token::{render, tokenize};

    #[test]
    fn positional_numbered_in_order() {
        let r = apply(tokenize("a=? AND b=?"));
        assert_eq!(render(&r.tokens), "a=$1 AND b=$2");
        assert_eq!(r.param_names, vec![None, None]);
    }

    #[test]
    fn named_reuse_shares_slot() {
        let r = apply(tokenize("a=:x OR b=:x"));
        assert_eq!(render(&r.tokens), "a=$1 OR b=$1");
        assert_eq!(r.param_names, vec![Some("x".to_string())]);
    }

    #[test]
    fn placeholder_inside_string_untouched() {
        let r = apply(tokenize("a = '?' AND b = ?"));
        assert_eq!(render(&r.tokens), "a = '?' AND b = $1");
    }
}
