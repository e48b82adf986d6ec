use std::collections::HashMap;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

/// In-memory state rebuilt from the WAL: every booking ever made plus an
/// arrival-sorted index of the active ones.
#[derive(Debug, Default)]
pub struct Ledger {
    bookings: HashMap<Ulid, Booking>,
    /// Active stays, sorted by `arrival`. Pairwise non-overlapping.
    active: Vec<(Stay, Ulid)>,
    calendar: Option<(NaiveDate, NaiveDate)>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn get(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.get(id)
    }

    pub fn calendar(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.calendar
    }

    /// All bookings ordered by arrival, then id.
    pub fn sorted(&self) -> Vec<Booking> {
        let mut all: Vec<Booking> = self.bookings.values().cloned().collect();
        all.sort_by(|a, b| {
            a.stay
                .arrival
                .cmp(&b.stay.arrival)
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    /// Ids of active bookings overlapping `query`, ascending by arrival.
    /// Binary search skips everything arriving at or after `query.departure`.
    pub fn overlapping(
        &self,
        query: &Stay,
        exclude: Option<Ulid>,
    ) -> impl Iterator<Item = Ulid> + '_ {
        let right_bound = self
            .active
            .partition_point(|(s, _)| s.arrival < query.departure);
        let query = *query;
        self.active[..right_bound]
            .iter()
            .filter(move |(s, id)| Some(*id) != exclude && s.overlaps(&query))
            .map(|(_, id)| *id)
    }

    /// Active stays intersecting `query`, ascending by arrival.
    pub fn active_stays(&self, query: &Stay) -> Vec<Stay> {
        let right_bound = self
            .active
            .partition_point(|(s, _)| s.arrival < query.departure);
        self.active[..right_bound]
            .iter()
            .filter(|(s, _)| s.overlaps(query))
            .map(|(s, _)| *s)
            .collect()
    }

    fn index(&mut self, stay: Stay, id: Ulid) {
        let pos = self
            .active
            .binary_search_by_key(&stay.arrival, |(s, _)| s.arrival)
            .unwrap_or_else(|e| e);
        self.active.insert(pos, (stay, id));
    }

    fn unindex(&mut self, id: Ulid) {
        if let Some(pos) = self.active.iter().position(|(_, i)| *i == id) {
            self.active.remove(pos);
        }
    }

    /// Apply a committed event. No validation: the caller already checked the
    /// guard (live writes) or the event came from the log (replay).
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::CalendarSeeded { first, last } => {
                if self.calendar.is_none() {
                    self.calendar = Some((*first, *last));
                }
            }
            Event::BookingCreated { booking } => {
                if booking.is_active() {
                    self.index(booking.stay, booking.id);
                }
                self.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingUpdated {
                id,
                guest_email,
                guest_name,
                stay,
                updated_at,
            } => {
                let Some(booking) = self.bookings.get_mut(id) else {
                    return;
                };
                booking.guest_email = guest_email.clone();
                booking.guest_name = guest_name.clone();
                booking.updated_at = *updated_at;
                let moved = booking.stay != *stay;
                booking.stay = *stay;
                if moved && booking.is_active() {
                    self.unindex(*id);
                    self.index(*stay, *id);
                }
            }
            Event::BookingCancelled { id, updated_at } => {
                let Some(booking) = self.bookings.get_mut(id) else {
                    return;
                };
                if booking.is_active() {
                    booking.status = BookingStatus::Cancelled;
                    booking.updated_at = *updated_at;
                    self.unindex(*id);
                }
            }
        }
    }

    /// Minimal event list that recreates this ledger.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.bookings.len() + 1);
        if let Some((first, last)) = self.calendar {
            events.push(Event::CalendarSeeded { first, last });
        }
        events.extend(
            self.sorted()
                .into_iter()
                .map(|booking| Event::BookingCreated { booking }),
        );
        events
    }
}
