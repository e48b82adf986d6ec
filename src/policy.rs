use chrono::{Months, NaiveDate};
use thiserror::Error;
use validator::Validate;

use crate::limits::{MAX_EMAIL_LEN, MAX_NAME_LEN};
use crate::model::{BookingPatch, Stay};

/// Guest-facing reservation rules, enforced by the transport before a request
/// reaches the engine. The engine itself accepts any valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    pub min_nights: i64,
    pub max_nights: i64,
    /// Earliest arrival, in days from today.
    pub min_lead_days: i64,
    /// Latest arrival, in calendar months from today.
    pub max_lead_months: u32,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            min_nights: 1,
            max_nights: 3,
            min_lead_days: 1,
            max_lead_months: 1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("{0}")]
    InvalidContact(String),
    #[error("stay must be between {min} and {max} nights")]
    StayLength { min: i64, max: i64 },
    #[error("arrival must be between {earliest} and {latest}")]
    LeadTime {
        earliest: NaiveDate,
        latest: NaiveDate,
    },
    #[error("availability window must lie after {today}")]
    PastWindow { today: NaiveDate },
}

#[derive(Debug, Validate)]
struct Contact {
    #[validate(
        email(message = "guest email must be a valid email address"),
        length(max = MAX_EMAIL_LEN, message = "guest email too long")
    )]
    guest_email: Option<String>,
    #[validate(length(min = 1, max = MAX_NAME_LEN, message = "guest name must not be blank"))]
    guest_name: Option<String>,
}

impl Contact {
    fn check(self) -> Result<(), PolicyViolation> {
        if self.guest_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PolicyViolation::InvalidContact(
                "guest name must not be blank".into(),
            ));
        }
        self.validate()
            .map_err(|e| PolicyViolation::InvalidContact(e.to_string()))
    }
}

impl ReservationPolicy {
    pub fn check_new(
        &self,
        guest_email: &str,
        guest_name: &str,
        arrival: NaiveDate,
        departure: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), PolicyViolation> {
        Contact {
            guest_email: Some(guest_email.to_string()),
            guest_name: Some(guest_name.to_string()),
        }
        .check()?;
        self.check_dates(arrival, departure, today)
    }

    /// Supplied contact fields must be well-formed. A patch that touches either
    /// date is checked as the stay it would produce over `current`, so a
    /// half-supplied range cannot slip past the stay rules. `current` is `None`
    /// when the booking cannot be modified anyway.
    pub fn check_update(
        &self,
        patch: &BookingPatch,
        current: Option<&Stay>,
        today: NaiveDate,
    ) -> Result<(), PolicyViolation> {
        Contact {
            guest_email: patch.guest_email.clone(),
            guest_name: patch.guest_name.clone(),
        }
        .check()?;
        match current {
            Some(current) if patch.touches_dates() => {
                let (arrival, departure) = patch.merged_range(current);
                self.check_dates(arrival, departure, today)
            }
            _ => Ok(()),
        }
    }

    /// Availability may only be asked for days after today.
    pub fn check_window(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), PolicyViolation> {
        if from <= today || to <= today {
            return Err(PolicyViolation::PastWindow { today });
        }
        Ok(())
    }

    fn check_dates(
        &self,
        arrival: NaiveDate,
        departure: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), PolicyViolation> {
        let nights = (departure - arrival).num_days();
        if nights < self.min_nights || nights > self.max_nights {
            return Err(PolicyViolation::StayLength {
                min: self.min_nights,
                max: self.max_nights,
            });
        }

        let earliest = today + chrono::Duration::days(self.min_lead_days);
        let latest = today
            .checked_add_months(Months::new(self.max_lead_months))
            .unwrap_or(NaiveDate::MAX);
        if arrival < earliest || arrival > latest {
            return Err(PolicyViolation::LeadTime { earliest, latest });
        }
        Ok(())
    }
}
