//! Stable 64-bit hashing of translated SQL text, used to key the
//! prepared-statement cache (spec.md §4.4/§4.6) and as the server-side
//! prepared-statement name (`ps_<hex(hash)>`).

use std::hash::Hasher;
use twox_hash::XxHash64;

pub fn hash_sql(sql: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(sql.as_bytes());
    hasher.finish()
}

pub fn stmt_name(hash: u64) -> String {
    format!("ps_{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_calls() {
        assert_eq!(hash_sql("SELECT 1"), hash_sql("SELECT 1"));
    }

    #[test]
    fn differs_for_different_sql() {
        assert_ne!(hash_sql("SELECT 1"), hash_sql("SELECT 2"));
    }

    #[test]
    fn name_is_deterministic_hex() {
        let h = hash_sql("SELECT 1");
        assert_eq!(stmt_name(h), stmt_name(h));
        assert!(stmt_name(h).starts_with("ps_"));
    }
}
