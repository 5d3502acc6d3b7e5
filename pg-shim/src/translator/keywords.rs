//! Stage 4: keyword and quoting rewrites (spec.md §4.2.4).

use super::token::Token;

const SQLITE_MASTER_VIEW: &str = "(SELECT 'table' AS type, c.relname AS name, c.relname AS tbl_name, 0 AS rootpage, '' AS sql FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace WHERE c.relkind = 'r' AND n.nspname = current_schema() UNION ALL SELECT 'index' AS type, c.relname AS name, t.relname AS tbl_name, 0 AS rootpage, '' AS sql FROM pg_class c JOIN pg_index i ON i.indexrelid = c.oid JOIN pg_class t ON t.oid = i.indrelid JOIN pg_namespace n ON n.oid = c.relnamespace WHERE n.nspname = current_schema())";

pub fn apply(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0usize;
    let n = tokens.len();

    while i < n {
        // BEGIN IMMEDIATE|DEFERRED|EXCLUSIVE -> BEGIN
        if tokens[i].word_eq_ignore_case("begin") {
            out.push(tokens[i].clone());
            let mut j = i + 1;
            let ws_start = j;
            while j < n && tokens[j].is_whitespace() {
                j += 1;
            }
            if j < n
                && (tokens[j].word_eq_ignore_case("immediate")
                    || tokens[j].word_eq_ignore_case("deferred")
                    || tokens[j].word_eq_ignore_case("exclusive"))
            {
                i = j + 1;
            } else {
                i = ws_start;
            }
            continue;
        }

        // REPLACE INTO / INSERT OR REPLACE INTO / INSERT OR IGNORE INTO -> INSERT INTO
        if tokens[i].word_eq_ignore_case("replace") && word_follows(&tokens, i, "into") {
            out.push(Token::Word("INSERT".to_string()));
            i += 1;
            continue;
        }
        if tokens[i].word_eq_ignore_case("insert") {
            if let Some(after_or) = match_insert_or(&tokens, i) {
                out.push(Token::Word("INSERT".to_string()));
                i = after_or;
                continue;
            }
        }

        // GLOB -> LIKE
        if tokens[i].word_eq_ignore_case("glob") {
            out.push(Token::Word("LIKE".to_string()));
            i += 1;
            continue;
        }

        // Backtick-quoted identifier -> double-quoted identifier.
        if let Token::Backtick(s) = &tokens[i] {
            let inner = &s[1..s.len() - 1];
            out.push(Token::DoubleQuoted(format!("\"{inner}\"")));
            i += 1;
            continue;
        }

        // AS 'alias' -> AS "alias"; tbl.'col' -> tbl."col"
        if tokens[i].word_eq_ignore_case("as") {
            out.push(tokens[i].clone());
            let mut j = i + 1;
            while j < n && tokens[j].is_whitespace() {
                out.push(tokens[j].clone());
                j += 1;
            }
            if j < n {
                if let Token::SingleQuoted(s) = &tokens[j] {
                    let inner = unescape_single(s);
                    out.push(Token::DoubleQuoted(format!("\"{}\"", escape_double(&inner))));
                    i = j + 1;
                    continue;
                }
            }
            i += 1;
            continue;
        }
        if tokens[i] == Token::Punct('.') {
            out.push(tokens[i].clone());
            if i + 1 < n {
                if let Token::SingleQuoted(s) = &tokens[i + 1] {
                    let inner = unescape_single(s);
                    out.push(Token::DoubleQuoted(format!("\"{}\"", escape_double(&inner))));
                    i += 2;
                    continue;
                }
            }
            i += 1;
            continue;
        }

        // COLLATE <name> removed unconditionally (spec.md §9 open question,
        // decided in DESIGN.md).
        if tokens[i].word_eq_ignore_case("collate") {
            let mut j = i + 1;
            while j < n && tokens[j].is_whitespace() {
                j += 1;
            }
            if j < n && matches!(tokens[j], Token::Word(_)) {
                i = j + 1;
                continue;
            }
        }

        // IN ( ) -> IN (NULL)
        if tokens[i].word_eq_ignore_case("in") {
            let mut j = i + 1;
            while j < n && tokens[j].is_whitespace() {
                j += 1;
            }
            if j < n && tokens[j] == Token::Punct('(') {
                let mut k = j + 1;
                while k < n && tokens[k].is_whitespace() {
                    k += 1;
                }
                if k < n && tokens[k] == Token::Punct(')') {
                    out.push(Token::Word("IN".to_string()));
                    out.push(Token::Whitespace(" ".to_string()));
                    out.push(Token::Punct('('));
                    out.push(Token::Word("NULL".to_string()));
                    out.push(Token::Punct(')'));
                    i = k + 1;
                    continue;
                }
            }
        }

        // Strip INDEXED BY <name>.
        if tokens[i].word_eq_ignore_case("indexed") && word_follows(&tokens, i, "by") {
            let mut j = i + 1;
            while j < n && tokens[j].is_whitespace() {
                j += 1;
            }
            j += 1; // "by"
            while j < n && tokens[j].is_whitespace() {
                j += 1;
            }
            if j < n && matches!(tokens[j], Token::Word(_)) {
                i = j + 1;
                continue;
            }
        }

        // sqlite_master / sqlite_schema -> synthetic catalog view.
        if tokens[i].word_eq_ignore_case("sqlite_master")
            || tokens[i].word_eq_ignore_case("sqlite_schema")
        {
            out.extend(super::token::tokenize(SQLITE_MASTER_VIEW));
            i += 1;
            continue;
        }

        out.push(tokens[i].clone());
        i += 1;
    }

    out
}

fn word_follows(tokens: &[Token], from: usize, word: &str) -> bool {
    let mut j = from + 1;
    while j < tokens.len() && tokens[j].is_whitespace() {
        j += 1;
    }
    j < tokens.len() && tokens[j].word_eq_ignore_case(word)
}

/// Matches `INSERT OR REPLACE INTO` / `INSERT OR IGNORE INTO` starting at
/// the `INSERT` token; returns the index right after `INTO` on a match.
fn match_insert_or(tokens: &[Token], start: usize) -> Option<usize> {
    let mut j = start + 1;
    while j < tokens.len() && tokens[j].is_whitespace() {
        j += 1;
    }
    if j >= tokens.len() || !tokens[j].word_eq_ignore_case("or") {
        return None;
    }
    j += 1;
    while j < tokens.len() && tokens[j].is_whitespace() {
        j += 1;
    }
    if j >= tokens.len()
        || !(tokens[j].word_eq_ignore_case("replace") || tokens[j].word_eq_ignore_case("ignore"))
    {
        return None;
    }
    j += 1;
    while j < tokens.len() && tokens[j].is_whitespace() {
        j += 1;
    }
    if j >= tokens.len() || !tokens[j].word_eq_ignore_case("into") {
        return None;
    }
    Some(j + 1)
}

fn unescape_single(quoted: &str) -> String {
    quoted[1..quoted.len() - 1].replace("''", "'")
}

fn escape_double(s: &str) -> String {
    s.replace('"', "\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::token::{render, tokenize};

    #[test]
    fn begin_immediate_becomes_begin() {
        assert_eq!(render(&apply(tokenize("BEGIN IMMEDIATE"))), "BEGIN");
        assert_eq!(render(&apply(tokenize("BEGIN DEFERRED"))), "BEGIN");
        assert_eq!(render(&apply(tokenize("BEGIN"))), "BEGIN");
    }

    #[test]
    fn replace_into_and_insert_or_variants() {
        assert_eq!(
            render(&apply(tokenize("REPLACE INTO t VALUES (1)"))),
            "INSERT INTO t VALUES (1)"
        );
        assert_eq!(
            render(&apply(tokenize("INSERT OR REPLACE INTO t VALUES (1)"))),
            "INSERT INTO t VALUES (1)"
        );
        assert_eq!(
            render(&apply(tokenize("INSERT OR IGNORE INTO t VALUES (1)"))),
            "INSERT INTO t VALUES (1)"
        );
    }

    #[test]
    fn glob_becomes_like() {
        assert_eq!(render(&apply(tokenize("a GLOB 'x*'"))), "a LIKE 'x*'");
    }

    #[test]
    fn backtick_identifier_becomes_double_quoted() {
        assert_eq!(render(&apply(tokenize("SELECT `col` FROM t"))), "SELECT \"col\" FROM t");
    }

    #[test]
    fn quoted_alias_becomes_double_quoted() {
        assert_eq!(
            render(&apply(tokenize("SELECT x AS 'y'"))),
            "SELECT x AS \"y\""
        );
    }

    #[test]
    fn collate_clause_removed() {
        assert_eq!(
            render(&apply(tokenize("a = b COLLATE NOCASE"))),
            "a = b "
        );
    }

    #[test]
    fn empty_in_list_becomes_null() {
        assert_eq!(
            render(&apply(tokenize("id IN ()"))),
            "id IN (NULL)"
        );
        assert_eq!(render(&apply(tokenize("id IN ( )"))), "id IN (NULL)");
    }

    #[test]
    fn indexed_by_stripped() {
        assert_eq!(
            render(&apply(tokenize("FROM t INDEXED BY t_idx WHERE x=1"))),
            "FROM t  WHERE x=1"
        );
    }
}
