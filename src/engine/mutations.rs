use chrono::NaiveDate;
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

impl Engine {
    pub async fn create(
        &self,
        guest_email: String,
        guest_name: String,
        arrival: NaiveDate,
        departure: NaiveDate,
    ) -> Result<Booking, EngineError> {
        let stay = Stay::new(arrival, departure).ok_or(EngineError::BadRange)?;
        let new = NewBooking {
            guest_email,
            guest_name,
            stay,
        };
        match self.store.insert_if_no_overlap(new).await {
            Ok(booking) => {
                info!("created booking {} for {arrival}..{departure}", booking.id);
                metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
                Ok(booking)
            }
            Err(e) => Err(self.rejected("create", e.into())),
        }
    }

    /// Merge-patch an active booking. Fields left `None` keep their stored value.
    pub async fn update(&self, id: Ulid, patch: BookingPatch) -> Result<Booking, EngineError> {
        let current = self.store.get(id).await?;
        if !current.is_active() {
            return Err(EngineError::NotModifiable(id));
        }
        let (arrival, departure) = patch.merged_range(&current.stay);
        if !valid_range(arrival, departure) {
            return Err(EngineError::BadRange);
        }

        match self.store.update_if_no_overlap(id, patch).await {
            Ok(booking) => {
                info!("updated booking {id}: {arrival}..{departure}");
                metrics::counter!(observability::BOOKINGS_UPDATED_TOTAL).increment(1);
                Ok(booking)
            }
            Err(e) => Err(self.rejected("update", e.into())),
        }
    }

    /// Cancelling an already-cancelled booking returns it unchanged.
    pub async fn cancel(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (booking, flipped) = self
            .store
            .cancel(id)
            .await
            .map_err(|e| self.rejected("cancel", e.into()))?;
        if flipped {
            info!("cancelled booking {id}");
            metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        }
        Ok(booking)
    }

    fn rejected(&self, op: &'static str, e: EngineError) -> EngineError {
        match &e {
            EngineError::UnavailableDates { conflicting } => {
                warn!("{op} rejected: overlaps booking {conflicting}");
                metrics::counter!(observability::CONFLICTS_TOTAL, "op" => op).increment(1);
            }
            EngineError::StorageUnavailable(msg) => error!("{op} failed: {msg}"),
            _ => {}
        }
        e
    }
}
