//! Stage 3: DDL type rewrites (spec.md §4.2.3). Rare at runtime — most
//! redirected traffic is DML — but cheap to keep token-based like the rest
//! of the pipeline.

use super::token::Token;

pub fn apply(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0usize;
    let n = tokens.len();

    while i < n {
        if match_phrase(
            &tokens,
            i,
            &["integer", "primary", "key", "autoincrement"],
        ) {
            out.push(Token::Word("SERIAL".to_string()));
            out.push(Token::Whitespace(" ".to_string()));
            out.push(Token::Word("PRIMARY".to_string()));
            out.push(Token::Whitespace(" ".to_string()));
            out.push(Token::Word("KEY".to_string()));
            i = skip_phrase(&tokens, i, 4);
            continue;
        }
        if tokens[i].word_eq_ignore_case("blob") {
            out.push(Token::Word("BYTEA".to_string()));
            i += 1;
            continue;
        }
        if match_phrase(&tokens, i, &["default"]) {
            out.push(tokens[i].clone());
            let mut j = i + 1;
            while j < n && tokens[j].is_whitespace() {
                out.push(tokens[j].clone());
                j += 1;
            }
            if j < n {
                if let Token::SingleQuoted(s) = &tokens[j] {
                    let inner = &s[1..s.len() - 1];
                    if inner == "t" {
                        out.push(Token::Word("TRUE".to_string()));
                        i = j + 1;
                        continue;
                    } else if inner == "f" {
                        out.push(Token::Word("FALSE".to_string()));
                        i = j + 1;
                        continue;
                    }
                }
            }
            i += 1;
            continue;
        }
        out.push(tokens[i].clone());
        i += 1;
    }

    out
}

/// True if, starting at `start`, the non-whitespace words spell out `words`
/// case-insensitively and in order.
fn match_phrase(tokens: &[Token], start: usize, words: &[&str]) -> bool {
    let mut idx = start;
    for w in words {
        while idx < tokens.len() && tokens[idx].is_whitespace() {
            idx += 1;
        }
        if idx >= tokens.len() || !tokens[idx].word_eq_ignore_case(w) {
            return false;
        }
        idx += 1;
    }
    true
}

fn skip_phrase(tokens: &[Token], start: usize, word_count: usize) -> usize {
    let mut idx = start;
    let mut seen = 0;
    while idx < tokens.len() && seen < word_count {
        if tokens[idx].is_whitespace() {
            idx += 1;
            continue;
        }
        idx += 1;
        seen += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::token::{render, tokenize};

    #[test]
    fn autoincrement_becomes_serial_primary_key() {
        let out = apply(tokenize("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert_eq!(render(&out), "id SERIAL PRIMARY KEY");
    }

    #[test]
    fn blob_becomes_bytea() {
        assert_eq!(render(&apply(tokenize("data BLOB"))), "data BYTEA");
    }

    #[test]
    fn boolean_default_literals_rewritten() {
        assert_eq!(
            render(&apply(tokenize("watched INTEGER DEFAULT 't'"))),
            "watched INTEGER DEFAULT TRUE"
        );
        assert_eq!(
            render(&apply(tokenize("watched INTEGER DEFAULT 'f'"))),
            "watched INTEGER DEFAULT FALSE"
        );
    }
}
