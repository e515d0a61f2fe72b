//! Aggregation of per-fingerprint lookup results into a ranked list.

use std::collections::HashMap;

use kern_index::SourceCount;

use crate::types::MatchResult;

/// Sums hit counts per source across all query fingerprints and orders the
/// result by aggregated count descending, `source_id` ascending on ties.
/// One pass over the input rows plus one sort.
pub fn rank<I>(per_fingerprint: I) -> Vec<MatchResult>
where
    I: IntoIterator<Item = Vec<SourceCount>>,
{
    let mut totals: HashMap<String, u64> = HashMap::new();
    for counts in per_fingerprint {
        for count in counts {
            *totals.entry(count.source_id).or_insert(0) += count.match_count;
        }
    }

    let mut results: Vec<MatchResult> = totals
        .into_iter()
        .map(|(source_id, match_count)| MatchResult {
            source_id,
            match_count,
        })
        .collect();
    results.sort_by(|a, b| {
        b.match_count
            .cmp(&a.match_count)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    results
}
