//! Expected row counts for progress sizing.

use tracing::debug;

use crate::core::{Store, TableSpec};
use crate::error::{Result, SyncError};

/// Byte offset just past the first whole-word, case-insensitive `FROM`.
pub fn from_keyword_end(query: &str) -> Option<usize> {
    let upper = query.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'"';

    let mut start = 0;
    while let Some(found) = upper[start..].find("FROM") {
        let at = start + found;
        let end = at + 4;
        let before_ok = at == 0 || !is_word(bytes[at - 1]);
        let after_ok = end == bytes.len() || !is_word(bytes[end]);
        if before_ok && after_ok {
            return Some(end);
        }
        start = end;
    }
    None
}

/// The `count(*)` query for a table.
///
/// Without an override this is `select count(*) from <table>`. With one,
/// everything up to and including its first `FROM` is replaced, so the
/// override's predicate is counted.
pub fn count_query(spec: &TableSpec) -> Result<String> {
    match &spec.override_query {
        None => Ok(format!("select count(*) from {}", spec.name)),
        Some(query) => {
            let end = from_keyword_end(query).ok_or_else(|| {
                SyncError::Config(format!(
                    "override query for {} has no FROM clause",
                    spec.name
                ))
            })?;
            Ok(format!("select count(*) from{}", &query[end..]))
        }
    }
}

/// Expected rows for `spec`, or `None` when counting is skipped.
pub async fn estimate(store: &dyn Store, spec: &TableSpec, skip: bool) -> Result<Option<u64>> {
    if skip {
        return Ok(None);
    }
    let query = count_query(spec)?;
    debug!("{}", query);
    let rows = store.count(&query).await?;
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn test_count_query_default() {
        let spec = TableSpec::new("PARENT", 10);
        assert_eq!(count_query(&spec).unwrap(), "select count(*) from PARENT");
    }

    #[test]
    fn test_count_query_rewrites_override() {
        let spec = TableSpec::new("PARENT", 10)
            .with_override(Some("SELECT id, name From Parent where kind = 'From'".into()));
        assert_eq!(
            count_query(&spec).unwrap(),
            "select count(*) from Parent where kind = 'From'"
        );
    }

    #[test]
    fn test_from_keyword_requires_whole_word() {
        assert_eq!(from_keyword_end("select fromage from T"), Some(19));
        assert_eq!(from_keyword_end("select x_from from T"), Some(18));
        assert_eq!(from_keyword_end("select 1"), None);
    }

    #[tokio::test]
    async fn test_estimate_skip() {
        let store = MemoryStore::postgres();
        store.add_table("PARENT", &["ID"], &[]);
        let spec = TableSpec::new("PARENT", 10);
        assert_eq!(estimate(&store, &spec, true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_estimate_counts_rows() {
        let store = MemoryStore::oracle();
        store.add_table("PARENT", &["ID"], &[]);
        store.seed_rows("PARENT", vec![vec![1i64.into()], vec![2i64.into()]]);
        let spec = TableSpec::new("PARENT", 10);
        assert_eq!(estimate(&store, &spec, false).await.unwrap(), Some(2));
    }
}
