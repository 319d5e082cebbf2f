//! Search filter for the visible projection.
//!
//! Case-insensitive substring match on the record name, ordered by id.
//! Every call is a full rescan; there is no index.

use crate::records::Record;

/// Returns the records whose name contains `query` (ignoring case), sorted
/// ascending by id. An empty query keeps every record.
pub fn filter<'a, I>(records: I, query: &str) -> Vec<Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    let needle = query.to_lowercase();
    let mut matched: Vec<Record> = records
        .into_iter()
        .filter(|record| needle.is_empty() || record.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    matched.sort_by_key(|record| record.id);
    matched
}
