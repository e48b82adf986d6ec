use chrono::NaiveDate;

use crate::model::Stay;

// ── Free-day computation ──────────────────────────────────────────

/// Merge sorted overlapping/adjacent stays into disjoint stays.
pub fn merge_overlapping(sorted: &[Stay]) -> Vec<Stay> {
    let mut merged: Vec<Stay> = Vec::new();
    for &stay in sorted {
        if let Some(last) = merged.last_mut()
            && stay.arrival <= last.departure
        {
            last.departure = last.departure.max(stay.departure);
            continue;
        }
        merged.push(stay);
    }
    merged
}

/// `base` minus every stay in `to_remove`. Both inputs sorted by arrival,
/// `to_remove` merged.
pub fn subtract_intervals(base: &[Stay], to_remove: &[Stay]) -> Vec<Stay> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current = b.arrival;
        let end = b.departure;

        while ri < to_remove.len() && to_remove[ri].departure <= current {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].arrival < end {
            let r = &to_remove[j];
            if r.arrival > current {
                result.push(Stay { arrival: current, departure: r.arrival });
            }
            current = current.max(r.departure);
            j += 1;
        }

        if current < end {
            result.push(Stay { arrival: current, departure: end });
        }
    }

    result
}

/// Computed strategy: enumerate `window` and drop every day covered by a busy stay.
pub fn free_days_in_window(window: Stay, busy: &[Stay]) -> Vec<NaiveDate> {
    let merged = merge_overlapping(&sorted(busy));
    subtract_intervals(&[window], &merged)
        .iter()
        .flat_map(Stay::days)
        .collect()
}

/// Materialized strategy: filter an ascending slice of candidate days against
/// the busy stays in a single sweep.
pub fn free_days_among(candidates: &[NaiveDate], busy: &[Stay]) -> Vec<NaiveDate> {
    let merged = merge_overlapping(&sorted(busy));
    let mut i = 0;
    candidates
        .iter()
        .copied()
        .filter(|day| {
            while i < merged.len() && merged[i].departure <= *day {
                i += 1;
            }
            i == merged.len() || !merged[i].contains_day(*day)
        })
        .collect()
}

fn sorted(stays: &[Stay]) -> Vec<Stay> {
    let mut v = stays.to_vec();
    v.sort_by_key(|s| s.arrival);
    v
}
