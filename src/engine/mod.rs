mod availability;
mod error;
mod mutations;
mod queries;

pub use availability::{free_days_among, free_days_in_window, merge_overlapping, subtract_intervals};
pub use error::EngineError;

use std::sync::Arc;

use crate::calendar::Calendar;
use crate::store::BookingStore;

/// Where `find_available_days` draws its candidate days from.
#[derive(Debug, Clone)]
pub enum DayUniverse {
    /// Generate the requested date range at query time.
    Computed,
    /// Scan the precomputed calendar. Days outside it are never returned.
    Materialized(Arc<Calendar>),
}

/// Availability Engine and Booking Service over one booking store.
///
/// The engine holds no locks of its own: every check that must be atomic with
/// its write is delegated to the store's conditional operations. Pre-checks
/// done here only produce better error kinds; the store re-checks under its
/// lock before committing.
pub struct Engine {
    store: Arc<dyn BookingStore>,
    universe: DayUniverse,
}

impl Engine {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self::with_universe(store, DayUniverse::Computed)
    }

    pub fn with_universe(store: Arc<dyn BookingStore>, universe: DayUniverse) -> Self {
        Self { store, universe }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub fn universe(&self) -> &DayUniverse {
        &self.universe
    }
}
