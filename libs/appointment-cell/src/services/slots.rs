// libs/appointment-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::services::store::AppointmentStore;

/// The fixed daily grid of candidate session start times.
///
/// Configurable rather than hard-coded; the default matches the clinic's
/// half-hour grid across the morning and afternoon business windows
/// (start times 09:00-11:30 and 14:00-17:00).
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    pub slot_minutes: u32,
    pub windows: Vec<(NaiveTime, NaiveTime)>,
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self {
            slot_minutes: 30,
            windows: vec![
                (
                    NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                ),
                (
                    NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
                ),
            ],
        }
    }
}

impl SlotCatalog {
    /// Every candidate start time, in order. A slot must fit entirely inside
    /// its business window.
    pub fn slot_starts(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(self.slot_minutes as i64);
        let mut starts = Vec::new();

        for &(window_start, window_end) in &self.windows {
            let mut current = window_start;
            while current + step <= window_end {
                starts.push(current);
                current += step;
            }
        }

        starts
    }
}

/// Which catalog slots remain free on a given date, testing true interval
/// overlap against each booking's duration. An off-grid 90-minute session
/// blocks every slot it touches, not just the one sharing its start time.
pub fn free_slots(catalog: &SlotCatalog, date: NaiveDate, booked: &[Appointment]) -> Vec<NaiveTime> {
    let slot_length = Duration::minutes(catalog.slot_minutes as i64);

    catalog
        .slot_starts()
        .into_iter()
        .filter(|&slot| {
            let slot_start = date.and_time(slot).and_utc();
            let slot_end = slot_start + slot_length;
            !booked
                .iter()
                .any(|apt| apt.blocks_calendar() && apt.overlaps(slot_start, slot_end))
        })
        .collect()
}

/// Pure read over the gateway: fetch the practitioner's day, return the free
/// complement of the catalog.
pub struct SlotCalculatorService {
    store: Arc<dyn AppointmentStore>,
    catalog: SlotCatalog,
}

impl SlotCalculatorService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self::with_catalog(store, SlotCatalog::default())
    }

    pub fn with_catalog(store: Arc<dyn AppointmentStore>, catalog: SlotCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    pub async fn available_slots(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        let booked = self
            .store
            .list_for_practitioner_on(practitioner_id, date, auth_token)
            .await?;

        let free = free_slots(&self.catalog, date, &booked);
        debug!(
            "Practitioner {} has {} free of {} catalog slots on {}",
            practitioner_id,
            free.len(),
            self.catalog.slot_starts().len(),
            date
        );

        Ok(free)
    }
}
