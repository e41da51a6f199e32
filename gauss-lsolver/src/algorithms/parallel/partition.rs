use std::ops::Range;

/// Splits the rows below pivot `column` into contiguous, disjoint ranges, one
/// per active worker.
///
/// With `remaining = rows - column - 1`, at most `min(workers, remaining)`
/// ranges of `ceil(remaining / active)` rows are produced; the last one may be
/// shorter, and fewer ranges come out when the ceiling covers the rows early.
/// The ranges cover `column + 1..rows` exactly once. An empty vector means
/// there is nothing left to eliminate below the pivot.
pub fn partition_rows(column: usize, rows: usize, workers: usize) -> Vec<Range<usize>> {
    let first = column + 1;
    let remaining = rows.saturating_sub(first);
    if remaining == 0 || workers == 0 {
        return Vec::new();
    }

    let active = workers.min(remaining);
    let chunk = remaining.div_ceil(active);
    (0..active)
        .map(|index| first + index * chunk)
        .take_while(|&start| start < rows)
        .map(|start| start..(start + chunk).min(rows))
        .collect()
}
