use chrono::{Months, NaiveDate};

/// Precomputed universe of candidate days `[first, last)`.
///
/// Built once from the seed range recorded in the store and never mutated.
/// Availability queries scan a slice of it instead of generating dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    days: Vec<NaiveDate>,
}

impl Calendar {
    /// Every day in `[first, last)`, ascending. Empty when `first >= last`.
    pub fn materialize(first: NaiveDate, last: NaiveDate) -> Self {
        let days = first.iter_days().take_while(|d| *d < last).collect();
        Self { days }
    }

    /// Default seed range: `today` up to `today + years` (exclusive).
    pub fn seed_range(today: NaiveDate, years: u32) -> (NaiveDate, NaiveDate) {
        let last = today
            .checked_add_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MAX);
        (today, last)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.days.first().copied()
    }

    /// Last materialized day (inclusive).
    pub fn last(&self) -> Option<NaiveDate> {
        self.days.last().copied()
    }

    /// Materialized days in `from..=to`, ascending.
    pub fn range(&self, from: NaiveDate, to: NaiveDate) -> &[NaiveDate] {
        let lo = self.days.partition_point(|d| *d < from);
        let hi = self.days.partition_point(|d| *d <= to);
        if lo >= hi {
            return &[];
        }
        &self.days[lo..hi]
    }
}
