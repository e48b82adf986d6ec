use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// True iff `[arrival, departure)` is a non-empty stay.
pub fn valid_range(arrival: NaiveDate, departure: NaiveDate) -> bool {
    arrival < departure
}

/// Half-open date range `[arrival, departure)`.
///
/// The departure day is not covered: a guest checking out on day N and a guest
/// checking in on day N do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
}

impl Stay {
    /// Returns `None` unless `arrival < departure`.
    pub fn new(arrival: NaiveDate, departure: NaiveDate) -> Option<Self> {
        valid_range(arrival, departure).then_some(Self { arrival, departure })
    }

    /// The stay covering exactly the days `first..=last`.
    pub fn covering(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        Self::new(first, last.succ_opt()?)
    }

    pub fn nights(&self) -> i64 {
        (self.departure - self.arrival).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        overlaps(self, other)
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.arrival <= day && day < self.departure
    }

    /// Every covered day, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let departure = self.departure;
        self.arrival.iter_days().take_while(move |d| *d < departure)
    }
}

/// `[a1, d1)` and `[a2, d2)` overlap iff `d1 > a2 && d2 > a1`.
pub fn overlaps(a: &Stay, b: &Stay) -> bool {
    a.departure > b.arrival && b.departure > a.arrival
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Active,
    /// Terminal.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub guest_email: String,
    pub guest_name: String,
    pub stay: Stay,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }
}

/// Caller-supplied fields for a new booking. Id and timestamps come from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub guest_email: String,
    pub guest_name: String,
    pub stay: Stay,
}

/// Merge-patch for an existing booking: `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPatch {
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub arrival: Option<NaiveDate>,
    pub departure: Option<NaiveDate>,
}

impl BookingPatch {
    pub fn touches_dates(&self) -> bool {
        self.arrival.is_some() || self.departure.is_some()
    }

    /// Candidate `(arrival, departure)` after applying the patch. Not validated.
    pub fn merged_range(&self, current: &Stay) -> (NaiveDate, NaiveDate) {
        (
            self.arrival.unwrap_or(current.arrival),
            self.departure.unwrap_or(current.departure),
        )
    }
}

/// The event types, flat. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CalendarSeeded {
        first: NaiveDate,
        last: NaiveDate,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingUpdated {
        id: Ulid,
        guest_email: String,
        guest_name: String,
        stay: Stay,
        updated_at: DateTime<Utc>,
    },
    BookingCancelled {
        id: Ulid,
        updated_at: DateTime<Utc>,
    },
}

#[cfg(test)]
pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[cfg(test)]
pub(crate) fn stay(arrival: &str, departure: &str) -> Stay {
    Stay::new(date(arrival), date(departure)).unwrap()
}
