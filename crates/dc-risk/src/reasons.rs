//! Deterministic reason-code ordering: every reason list that ends up in a
//! ledger record or a caller-visible result goes through [`ordered_reasons`]
//! so re-runs against unchanged inputs produce byte-identical output.

/// Drop empty entries, dedupe, and sort lexicographically.
pub fn ordered_reasons(reasons: impl IntoIterator<Item = String>) -> Vec<String> {
    let set: std::collections::BTreeSet<String> =
        reasons.into_iter().filter(|r| !r.is_empty()).collect();
    set.into_iter().collect()
}
