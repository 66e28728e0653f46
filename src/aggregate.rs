//! Folds per-dependency query outcomes into a [`ScanResult`].

use crate::model::{Dependency, FailedQuery, QueryOutcome, ScanEntry, ScanResult};
use std::collections::HashSet;

/// Builds the scan result from `(dependency, outcome)` pairs in scan order.
///
/// Later duplicates of a dependency already seen are ignored. Successful
/// queries with no records are dropped, so `entries` only lists vulnerable
/// dependencies. Records are ordered most severe first, then by id.
pub fn aggregate<I>(outcomes: I) -> ScanResult
where
    I: IntoIterator<Item = (Dependency, QueryOutcome)>,
{
    let mut seen = HashSet::new();
    let mut result = ScanResult::default();

    for (dependency, outcome) in outcomes {
        if seen.contains(&dependency) {
            continue;
        }
        seen.insert(dependency.clone());
        result.scanned_count += 1;

        match outcome {
            QueryOutcome::Success(records) if records.is_empty() => {}
            QueryOutcome::Success(mut records) => {
                let mut ids = HashSet::new();
                records.retain(|r| ids.insert(r.id.clone()));
                records.sort_by(|a, b| a.report_order(b));
                result.vulnerable_count += 1;
                result.entries.push(ScanEntry {
                    dependency,
                    vulnerabilities: records,
                });
            }
            QueryOutcome::Failure { kind, detail } => {
                result.failed.push(FailedQuery {
                    dependency,
                    kind,
                    detail,
                });
            }
        }
    }

    result
}
