// mongovault/src/runner/diagnostics.rs
use regex::Regex;
use std::sync::LazyLock;

use crate::models::Diagnostics;

const DUPLICATE_KEY_SIGNATURE: &str = "E11000 duplicate key error";
const INDEX_CONFLICT_SIGNATURE: &str = "IndexOptionsConflict";

static COLLECTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"collection:\s*(\S+)").expect("static regex is valid"));

/// Scans utility output line by line for duplicate-key violations and
/// index-option conflicts.
///
/// The per-collection key is the token that follows `collection:` verbatim
/// (usually a `<db>.<collection>` namespace). A duplicate-key line without a
/// parseable token still counts toward `duplicate_count`.
pub fn classify(output: &str) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();

    for line in output.lines() {
        if line.contains(DUPLICATE_KEY_SIGNATURE) {
            diagnostics.duplicate_count += 1;

            if let Some(name) = COLLECTION_TOKEN
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
            {
                *diagnostics
                    .duplicate_per_collection
                    .entry(name.to_string())
                    .or_insert(0) += 1;
            }
        }

        if line.contains(INDEX_CONFLICT_SIGNATURE) {
            diagnostics.index_conflicts += 1;
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_line_counts_collection_token() {
        let d = classify("E11000 duplicate key error collection: foo.bar index: _id_ dup key: { _id: 1 }");
        assert_eq!(d.duplicate_count, 1);
        assert_eq!(d.duplicate_per_collection.get("foo.bar"), Some(&1));
        assert_eq!(d.index_conflicts, 0);
    }

    #[test]
    fn duplicate_key_without_collection_token_keeps_scanning() {
        let output = "\
2024-10-01T10:00:00.000+0000\tE11000 duplicate key error index: _id_
2024-10-01T10:00:00.001+0000\tE11000 duplicate key error collection:
2024-10-01T10:00:00.002+0000\tE11000 duplicate key error collection: shop.users index: email_1
2024-10-01T10:00:00.003+0000\tE11000 duplicate key error collection: shop.users index: _id_
2024-10-01T10:00:00.004+0000\tfinished restoring shop.users (10 documents, 2 failures)";
        let d = classify(output);
        assert_eq!(d.duplicate_count, 4);
        assert_eq!(d.duplicate_per_collection.len(), 1);
        assert_eq!(d.duplicate_per_collection["shop.users"], 2);
    }

    #[test]
    fn index_conflicts_are_counted_per_line() {
        let output = "\
Failed: shop.orders: error creating indexes: (IndexOptionsConflict) Index with name: status_1 already exists
continuing through error: IndexOptionsConflict on shop.items
done";
        let d = classify(output);
        assert_eq!(d.index_conflicts, 2);
        assert_eq!(d.duplicate_count, 0);
    }

    #[test]
    fn clean_output_has_no_diagnostics() {
        assert_eq!(classify(""), Diagnostics::default());
        assert_eq!(
            classify("writing shop.users to dump/shop/users.bson\ndone dumping shop.users (3 documents)"),
            Diagnostics::default()
        );
    }
}
