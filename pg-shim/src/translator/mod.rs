//! SQL translator: a fixed pipeline of token-stream rewrites (spec.md §4.2).
//! Each stage consumes a token stream and produces one; no stage holds
//! state across calls to [`translate`].

mod functions;
mod keywords;
mod placeholders;
pub mod token;
mod types;

use token::{render, tokenize};

#[derive(Debug, Clone)]
pub struct Translated {
    pub sql: String,
    pub param_names: Vec<Option<String>>,
    pub param_count: usize,
}

#[derive(Debug, Clone)]
pub struct TranslateError {
    pub message: String,
}

pub type TranslateResult = Result<Translated, TranslateError>;

/// Run the full pipeline: placeholders, functions, types, keywords/quoting.
/// Order matters — see spec.md §4.2's preamble.
pub fn translate(sql: &str) -> TranslateResult {
    let tokens = tokenize(sql);
    let placeholder_result = placeholders::apply(tokens);
    let tokens = functions::apply(placeholder_result.tokens);
    let tokens = types::apply(tokens);
    let tokens = keywords::apply(tokens);

    Ok(Translated {
        sql: render(&tokens),
        param_count: placeholder_result.param_names.len(),
        param_names: placeholder_result.param_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_parameter_reuse_end_to_end() {
        let r = translate("SELECT * FROM t WHERE a=:x OR b=:x").unwrap();
        assert_eq!(r.sql, "SELECT * FROM t WHERE a=$1 OR b=$1");
        assert_eq!(r.param_count, 1);
    }

    #[test]
    fn insert_with_positional_params() {
        let r = translate("INSERT INTO foo(x) VALUES (?)").unwrap();
        assert_eq!(r.sql, "INSERT INTO foo(x) VALUES ($1)");
        assert_eq!(r.param_count, 1);
    }

    #[test]
    fn empty_in_list_end_to_end() {
        let r = translate("SELECT 1 FROM t WHERE id IN ()").unwrap();
        assert_eq!(r.sql, "SELECT 1 FROM t WHERE id IN (NULL)");
    }

    #[test]
    fn idempotent_on_placeholder_and_quoting_rules() {
        let once = translate("SELECT `a` FROM t WHERE x=?").unwrap();
        let twice = translate(&once.sql).unwrap();
        assert_eq!(once.sql, twice.sql);
    }

    #[test]
    fn identifiers_and_literals_preserved() {
        let r = translate("SELECT name, 'literal value' FROM my_table WHERE id = ?").unwrap();
        assert!(r.sql.contains("my_table"));
        assert!(r.sql.contains("'literal value'"));
    }
}
