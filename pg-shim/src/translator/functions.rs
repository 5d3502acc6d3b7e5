//! Stage 2: function/keyword rewrites that are scoped to a call site
//! (spec.md §4.2.2).

use super::token::Token;

/// Find the index of a `(` at position `open` (already known to be a
/// `Punct('(')`) and return the index of its matching `)`, depth-aware.
fn match_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        match t {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
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

/// Split `tokens[start..end]` (exclusive of the enclosing parens) into
/// top-level comma-separated argument token slices.
fn split_args(tokens: &[Token]) -> Vec<&[Token]> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, t) in tokens.iter().enumerate() {
        match t {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => depth -= 1,
            Token::Punct(',') if depth == 0 => {
                args.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&tokens[start..]);
    args
}

fn trim_ws<'a>(tokens: &'a [Token]) -> &'a [Token] {
    let mut s = 0;
    let mut e = tokens.len();
    while s < e && tokens[s].is_whitespace() {
        s += 1;
    }
    while e > s && tokens[e - 1].is_whitespace() {
        e -= 1;
    }
    &tokens[s..e]
}

/// Keywords that can follow a `FROM (subquery)` without being an alias.
fn is_reserved_after_subquery(word: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "where", "group", "order", "having", "limit", "offset", "join", "inner", "left",
        "right", "full", "cross", "on", "union", "intersect", "except", ";",
    ];
    KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

fn is_all_whitespace(tokens: &[Token]) -> bool {
    tokens.iter().all(Token::is_whitespace)
}

fn push_words(out: &mut Vec<Token>, s: &str) {
    out.push(Token::Word(s.to_string()));
}

/// strftime format-string translation table (subset used by the host).
fn strftime_format_to_to_char(fmt: &str) -> String {
    fmt.replace("%Y", "YYYY")
        .replace("%m", "MM")
        .replace("%d", "DD")
        .replace("%H", "HH24")
        .replace("%M", "MI")
        .replace("%S", "SS")
}

fn is_real_literal(t: &Token) -> bool {
    matches!(t, Token::SingleQuoted(s) if s.eq_ignore_ascii_case("'real'"))
}

/// Length of the comparison operator starting at `i`, or 0 if none is there.
fn comparator_len(tokens: &[Token], i: usize) -> usize {
    match tokens.get(i) {
        Some(Token::Punct('=')) => 1,
        Some(Token::Punct('!')) if tokens.get(i + 1) == Some(&Token::Punct('=')) => 2,
        Some(Token::Punct('<')) if tokens.get(i + 1) == Some(&Token::Punct('>')) => 2,
        _ => 0,
    }
}

/// Paired with the `typeof` → `pg_typeof(...)::text` rewrite (spec.md
/// §4.2.2): a `'real'` literal compared against the call becomes `'double
/// precision'`, since `pg_typeof` never spells the source dialect's `real`.
/// Handles the literal written before the call, e.g. `'real' = typeof(x)`;
/// `out` already holds everything up to (not including) the call.
fn rewrite_preceding_real_literal(out: &mut [Token]) {
    let mut k = out.len();
    while k > 0 && out[k - 1].is_whitespace() {
        k -= 1;
    }
    let op_start = if k >= 1 && out[k - 1] == Token::Punct('=') {
        Some(k - 1)
    } else if k >= 2 && out[k - 2] == Token::Punct('!') && out[k - 1] == Token::Punct('=') {
        Some(k - 2)
    } else if k >= 2 && out[k - 2] == Token::Punct('<') && out[k - 1] == Token::Punct('>') {
        Some(k - 2)
    } else {
        None
    };
    let Some(op_start) = op_start else { return };
    let mut m = op_start;
    while m > 0 && out[m - 1].is_whitespace() {
        m -= 1;
    }
    if m > 0 && is_real_literal(&out[m - 1]) {
        out[m - 1] = Token::SingleQuoted("'double precision'".to_string());
    }
}

/// Mirror of [`rewrite_preceding_real_literal`] for the literal written
/// after the call, e.g. `typeof(x) = 'real'`. `i` is the index just past the
/// call's closing paren in `tokens`; returns the index to resume scanning
/// from, past the consumed literal when one was rewritten.
fn consume_following_real_literal(tokens: &[Token], i: usize, out: &mut Vec<Token>) -> usize {
    let n = tokens.len();
    let mut k = i;
    while k < n && tokens[k].is_whitespace() {
        k += 1;
    }
    let op_len = comparator_len(tokens, k);
    if op_len == 0 {
        return i;
    }
    let mut m = k + op_len;
    while m < n && tokens[m].is_whitespace() {
        m += 1;
    }
    if m < n && is_real_literal(&tokens[m]) {
        out.extend(tokens[i..m].iter().cloned());
        out.push(Token::SingleQuoted("'double precision'".to_string()));
        return m + 1;
    }
    i
}

/// `CASE … THEN 0 ELSE 1 END` and its `1`/`0` mirror tighten to `THEN FALSE
/// ELSE TRUE END` (spec.md §4.2.2): the target rejects integer literals in
/// boolean contexts. Only matches the direct `THEN <0|1> ELSE <1|0> END`
/// span with no intervening `WHEN`, the shape this rule targets; `then_idx`
/// is the index of the `THEN` token itself.
fn rewrite_case_boolean(tokens: &[Token], then_idx: usize) -> Option<(Vec<Token>, usize)> {
    let n = tokens.len();
    let mut i = then_idx + 1;
    while i < n && tokens[i].is_whitespace() {
        i += 1;
    }
    let then_num = match tokens.get(i)? {
        Token::Number(s) if s == "0" || s == "1" => s.clone(),
        _ => return None,
    };
    let then_num_idx = i;
    i += 1;

    let mut j = i;
    while j < n && tokens[j].is_whitespace() {
        j += 1;
    }
    if !tokens.get(j)?.word_eq_ignore_case("else") {
        return None;
    }
    let else_kw_idx = j;
    j += 1;

    let mut k = j;
    while k < n && tokens[k].is_whitespace() {
        k += 1;
    }
    let else_num = match tokens.get(k)? {
        Token::Number(s) if s == "0" || s == "1" => s.clone(),
        _ => return None,
    };
    let else_num_idx = k;
    k += 1;

    let mut m = k;
    while m < n && tokens[m].is_whitespace() {
        m += 1;
    }
    if !tokens.get(m)?.word_eq_ignore_case("end") {
        return None;
    }
    if !((then_num == "0" && else_num == "1") || (then_num == "1" && else_num == "0")) {
        return None;
    }

    let bool_word = |v: &str| -> Token { Token::Word(if v == "0" { "FALSE" } else { "TRUE" }.to_string()) };

    let mut out = Vec::new();
    out.push(tokens[then_idx].clone());
    out.extend(tokens[then_idx + 1..then_num_idx].iter().cloned());
    out.push(bool_word(&then_num));
    out.extend(tokens[then_num_idx + 1..else_kw_idx].iter().cloned());
    out.push(tokens[else_kw_idx].clone());
    out.extend(tokens[else_kw_idx + 1..else_num_idx].iter().cloned());
    out.push(bool_word(&else_num));
    out.extend(tokens[else_num_idx + 1..m].iter().cloned());
    out.push(tokens[m].clone());

    Some((out, m + 1))
}

pub fn apply(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0usize;
    let n = tokens.len();
    let mut subq_counter = 0u32;

    while i < n {
        // Alias-less subquery in FROM ( ... ).
        if tokens[i].word_eq_ignore_case("from") {
            out.push(tokens[i].clone());
            i += 1;
            while i < n && tokens[i].is_whitespace() {
                out.push(tokens[i].clone());
                i += 1;
            }
            if i < n && tokens[i] == Token::Punct('(') {
                if let Some(close) = match_paren(&tokens, i) {
                    for t in &tokens[i..=close] {
                        out.push(t.clone());
                    }
                    let mut j = close + 1;
                    let mut has_alias = false;
                    let save = j;
                    while j < n && tokens[j].is_whitespace() {
                        j += 1;
                    }
                    if j < n {
                        if tokens[j].word_eq_ignore_case("as") {
                            has_alias = true;
                        } else if let Token::Word(w) = &tokens[j] {
                            has_alias = !is_reserved_after_subquery(w);
                        }
                    }
                    let _ = save;
                    if !has_alias {
                        subq_counter += 1;
                        out.push(Token::Whitespace(" ".to_string()));
                        push_words(&mut out, "AS");
                        out.push(Token::Whitespace(" ".to_string()));
                        push_words(&mut out, &format!("subq{subq_counter}"));
                    }
                    i = close + 1;
                    continue;
                }
            }
            continue;
        }

        if let Token::Word(w) = &tokens[i] {
            let lname = w.to_ascii_lowercase();

            if lname == "then" {
                if let Some((replacement, next_i)) = rewrite_case_boolean(&tokens, i) {
                    out.extend(replacement);
                    i = next_i;
                    continue;
                }
            }

            let mut j = i + 1;
            while j < n && tokens[j].is_whitespace() {
                j += 1;
            }
            if j < n && tokens[j] == Token::Punct('(') {
                if let Some(close) = match_paren(&tokens, j) {
                    let inner = &tokens[j + 1..close];
                    let args = if is_all_whitespace(inner) {
                        Vec::new()
                    } else {
                        split_args(inner)
                    };
                    let rewritten = rewrite_call(&lname, &args);
                    if let Some(new_tokens) = rewritten {
                        if lname == "typeof" {
                            rewrite_preceding_real_literal(&mut out);
                        }
                        out.extend(new_tokens);
                        i = close + 1;
                        if lname == "typeof" {
                            i = consume_following_real_literal(&tokens, i, &mut out);
                        }
                        continue;
                    }
                }
            }
        }

        out.push(tokens[i].clone());
        i += 1;
    }

    out
}

fn rewrite_call(lname: &str, args: &[&[Token]]) -> Option<Vec<Token>> {
    match lname {
        "iif" if args.len() == 3 => {
            let mut out = Vec::new();
            push_words(&mut out, "CASE WHEN ");
            out.extend(trim_ws(args[0]).iter().cloned());
            push_words(&mut out, " THEN ");
            out.extend(trim_ws(args[1]).iter().cloned());
            push_words(&mut out, " ELSE ");
            out.extend(trim_ws(args[2]).iter().cloned());
            push_words(&mut out, " END");
            Some(out)
        }
        "typeof" if args.len() == 1 => {
            let mut out = Vec::new();
            push_words(&mut out, "pg_typeof(");
            out.extend(trim_ws(args[0]).iter().cloned());
            push_words(&mut out, ")::text");
            Some(out)
        }
        "strftime" if args.len() >= 2 => {
            let fmt = literal_text(args[0]);
            let expr = trim_ws(args[1]);
            let mut out = Vec::new();
            if fmt.as_deref() == Some("%s") {
                push_words(&mut out, "EXTRACT(EPOCH FROM ");
                out.extend(expr.iter().cloned());
                push_words(&mut out, ")::bigint");
            } else if let Some(fmt) = fmt {
                let pg_fmt = strftime_format_to_to_char(&fmt);
                push_words(&mut out, "TO_CHAR(");
                out.extend(expr.iter().cloned());
                push_words(&mut out, &format!(", '{pg_fmt}')"));
            } else {
                return None;
            }
            Some(out)
        }
        "unixepoch" if !args.is_empty() => {
            let first = literal_text(args[0]);
            if first.as_deref() != Some("now") {
                return None;
            }
            let mut out = Vec::new();
            push_words(&mut out, "EXTRACT(EPOCH FROM NOW()");
            if args.len() > 1 {
                if let Some(delta) = literal_text(args[1]) {
                    if let Some(rest) = delta.strip_prefix('+') {
                        push_words(&mut out, &format!(" + INTERVAL '{rest}'"));
                    }
                }
            }
            push_words(&mut out, ")::bigint");
            Some(out)
        }
        "datetime" if args.len() == 1 && literal_text(args[0]).as_deref() == Some("now") => {
            Some(vec![Token::Word("NOW()".to_string())])
        }
        "ifnull" => {
            let mut out = Vec::new();
            push_words(&mut out, "coalesce(");
            join_args(&mut out, args);
            out.push(Token::Punct(')'));
            Some(out)
        }
        "substr" => {
            let mut out = Vec::new();
            push_words(&mut out, "substring(");
            join_args(&mut out, args);
            out.push(Token::Punct(')'));
            Some(out)
        }
        "max" if args.len() >= 2 => {
            let mut out = Vec::new();
            push_words(&mut out, "GREATEST(");
            join_args(&mut out, args);
            out.push(Token::Punct(')'));
            Some(out)
        }
        "min" if args.len() >= 2 => {
            let mut out = Vec::new();
            push_words(&mut out, "LEAST(");
            join_args(&mut out, args);
            out.push(Token::Punct(')'));
            Some(out)
        }
        _ => None,
    }
}

fn join_args(out: &mut Vec<Token>, args: &[&[Token]]) {
    for (idx, a) in args.iter().enumerate() {
        if idx > 0 {
            out.push(Token::Punct(','));
        }
        out.extend(trim_ws(a).iter().cloned());
    }
}

fn literal_text(tokens: &[Token]) -> Option<String> {
    let t = trim_ws(tokens);
    if t.len() != 1 {
        return None;
    }
    match &t[0] {
        Token::SingleQuoted(s) => Some(s[1..s.len() - 1].replace("''", "'")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::token::{render, tokenize};

    #[test]
    fn iif_becomes_case_when() {
        let out = apply(tokenize("iif(a > 1, 'y', 'n')"));
        assert_eq!(render(&out), "CASE WHEN a > 1 THEN 'y' ELSE 'n' END");
    }

    #[test]
    fn typeof_becomes_pg_typeof_cast() {
        let out = apply(tokenize("typeof(x)"));
        assert_eq!(render(&out), "pg_typeof(x)::text");
    }

    #[test]
    fn strftime_seconds_becomes_extract_epoch() {
        let out = apply(tokenize("strftime('%s', created_at)"));
        assert_eq!(render(&out), "EXTRACT(EPOCH FROM created_at)::bigint");
    }

    #[test]
    fn unixepoch_now_with_delta() {
        let out = apply(tokenize("unixepoch('now', '+1 hour')"));
        assert_eq!(
            render(&out),
            "EXTRACT(EPOCH FROM NOW() + INTERVAL '1 hour')::bigint"
        );
    }

    #[test]
    fn datetime_now_becomes_now() {
        assert_eq!(render(&apply(tokenize("datetime('now')"))), "NOW()");
    }

    #[test]
    fn ifnull_and_substr_renamed() {
        assert_eq!(render(&apply(tokenize("ifnull(a,b)"))), "coalesce(a,b)");
        assert_eq!(render(&apply(tokenize("substr(a,1,2)"))), "substring(a,1,2)");
    }

    #[test]
    fn multi_arg_max_min_rewritten_single_arg_untouched() {
        assert_eq!(render(&apply(tokenize("max(a,b)"))), "GREATEST(a,b)");
        assert_eq!(render(&apply(tokenize("min(a,b,c)"))), "LEAST(a,b,c)");
        assert_eq!(render(&apply(tokenize("max(a)"))), "max(a)");
    }

    #[test]
    fn unaliased_from_subquery_gets_alias() {
        let out = apply(tokenize("SELECT * FROM (SELECT 1)"));
        assert_eq!(render(&out), "SELECT * FROM (SELECT 1) AS subq1");
    }

    #[test]
    fn aliased_from_subquery_untouched() {
        let out = apply(tokenize("SELECT * FROM (SELECT 1) AS t"));
        assert_eq!(render(&out), "SELECT * FROM (SELECT 1) AS t");
    }

    #[test]
    fn typeof_real_literal_comparison_rewritten() {
        let out = apply(tokenize("typeof(x) = 'real'"));
        assert_eq!(render(&out), "pg_typeof(x)::text = 'double precision'");
    }

    #[test]
    fn real_literal_preceding_typeof_also_rewritten() {
        let out = apply(tokenize("'real' = typeof(x)"));
        assert_eq!(render(&out), "'double precision' = pg_typeof(x)::text");
    }

    #[test]
    fn typeof_other_literal_comparison_untouched() {
        let out = apply(tokenize("typeof(x) = 'text'"));
        assert_eq!(render(&out), "pg_typeof(x)::text = 'text'");
    }

    #[test]
    fn case_then_zero_else_one_becomes_false_true() {
        let out = apply(tokenize("CASE WHEN a THEN 0 ELSE 1 END"));
        assert_eq!(render(&out), "CASE WHEN a THEN FALSE ELSE TRUE END");
    }

    #[test]
    fn case_then_one_else_zero_becomes_true_false() {
        let out = apply(tokenize("CASE WHEN a THEN 1 ELSE 0 END"));
        assert_eq!(render(&out), "CASE WHEN a THEN TRUE ELSE FALSE END");
    }

    #[test]
    fn case_then_with_non_boolean_values_untouched() {
        let out = apply(tokenize("CASE WHEN a THEN 2 ELSE 1 END"));
        assert_eq!(render(&out), "CASE WHEN a THEN 2 ELSE 1 END");
    }
}
