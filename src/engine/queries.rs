use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{free_days_among, free_days_in_window};
use super::{DayUniverse, Engine, EngineError};

impl Engine {
    pub async fn get(&self, id: Ulid) -> Result<Booking, EngineError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn list_by_guest_email(&self, email: &str) -> Result<Vec<Booking>, EngineError> {
        Ok(self.store.list_by_guest_email(email).await?)
    }

    /// True iff no active booking other than `exclude` overlaps `[arrival, departure)`.
    pub async fn is_range_free(
        &self,
        arrival: NaiveDate,
        departure: NaiveDate,
        exclude: Option<Ulid>,
    ) -> Result<bool, EngineError> {
        let period = Stay::new(arrival, departure).ok_or(EngineError::BadRange)?;
        Ok(self.store.find_overlapping(period, exclude).await?.is_empty())
    }

    /// Days in `from..=to` not covered by any active booking, ascending.
    ///
    /// A booking's departure day is free; its arrival day is not.
    pub async fn find_available_days(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        if from > to {
            return Err(EngineError::BadRange);
        }
        if (to - from).num_days() >= MAX_QUERY_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("availability window too large"));
        }
        let window = Stay::covering(from, to).ok_or(EngineError::BadRange)?;
        let busy = self.store.active_stays(window).await?;

        Ok(match &self.universe {
            DayUniverse::Computed => free_days_in_window(window, &busy),
            DayUniverse::Materialized(calendar) => {
                free_days_among(calendar.range(from, to), &busy)
            }
        })
    }
}
