use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus};
use appointment_cell::services::slots::{free_slots, SlotCalculatorService, SlotCatalog};
use appointment_cell::services::store::InMemoryAppointmentStore;

fn slot(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn appointment_on(
    practitioner_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    duration_minutes: i32,
    status: AppointmentStatus,
) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        practitioner_id,
        therapy: "physiotherapy".to_string(),
        start_time: date.and_time(start).and_utc(),
        duration_minutes,
        status,
        patient_notes: None,
        practitioner_notes: None,
        follow_up_required: false,
        follow_up_date: None,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn empty_calendar_returns_full_catalog() {
    let catalog = SlotCatalog::default();
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

    let free = free_slots(&catalog, date, &[]);

    assert_eq!(free, catalog.slot_starts());
    assert_eq!(free.len(), 13);
}

#[test]
fn booked_slots_are_exactly_the_complement() {
    let catalog = SlotCatalog::default();
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let practitioner = Uuid::new_v4();

    let booked_times = [slot(9, 30), slot(11, 0), slot(14, 30)];
    let booked: Vec<Appointment> = booked_times
        .iter()
        .map(|&t| appointment_on(practitioner, date, t, 30, AppointmentStatus::Scheduled))
        .collect();

    let free = free_slots(&catalog, date, &booked);

    for t in booked_times {
        assert!(!free.contains(&t), "{} should be taken", t);
    }
    let expected: Vec<NaiveTime> = catalog
        .slot_starts()
        .into_iter()
        .filter(|t| !booked_times.contains(t))
        .collect();
    assert_eq!(free, expected);
}

#[test]
fn off_grid_booking_blocks_every_overlapped_slot() {
    let catalog = SlotCatalog::default();
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let practitioner = Uuid::new_v4();

    // 90 minutes starting 09:45 covers [09:45, 11:15): collides with the
    // 09:30, 10:00, 10:30 and 11:00 slots but leaves 09:00 and 11:30 free.
    let booked = vec![appointment_on(
        practitioner,
        date,
        slot(9, 45),
        90,
        AppointmentStatus::Confirmed,
    )];

    let free = free_slots(&catalog, date, &booked);

    assert!(free.contains(&slot(9, 0)));
    assert!(!free.contains(&slot(9, 30)));
    assert!(!free.contains(&slot(10, 0)));
    assert!(!free.contains(&slot(10, 30)));
    assert!(!free.contains(&slot(11, 0)));
    assert!(free.contains(&slot(11, 30)));
    // Afternoon window untouched.
    assert!(free.contains(&slot(14, 0)));
}

#[test]
fn cancelled_appointments_free_their_slot() {
    let catalog = SlotCatalog::default();
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let practitioner = Uuid::new_v4();

    let booked = vec![
        appointment_on(practitioner, date, slot(10, 0), 30, AppointmentStatus::Cancelled),
        appointment_on(practitioner, date, slot(15, 0), 30, AppointmentStatus::NoShow),
    ];

    let free = free_slots(&catalog, date, &booked);

    assert!(free.contains(&slot(10, 0)));
    // A no-show still occupied the calendar; only cancellation frees it.
    assert!(!free.contains(&slot(15, 0)));
}

#[tokio::test]
async fn service_reads_practitioner_calendar_through_the_store() {
    use appointment_cell::models::NewAppointment;
    use appointment_cell::services::store::AppointmentStore;

    let store = Arc::new(InMemoryAppointmentStore::new());
    let practitioner = Uuid::new_v4();

    // A future date keeps booking validation happy.
    let date = (Utc::now() + Duration::days(30)).date_naive();
    let record = NewAppointment {
        patient_id: Uuid::new_v4(),
        practitioner_id: practitioner,
        therapy: "hydrotherapy".to_string(),
        start_time: date.and_time(slot(10, 0)).and_utc(),
        duration_minutes: 30,
        patient_notes: None,
    };
    store.insert(record, "token").await.unwrap();

    let service = SlotCalculatorService::new(Arc::clone(&store) as Arc<dyn AppointmentStore>);
    let free = service
        .available_slots(practitioner, date, "token")
        .await
        .unwrap();

    assert!(!free.contains(&slot(10, 0)));
    assert_eq!(free.len(), 12);

    // A practitioner with no appointments at all gets the full catalog.
    let other = Uuid::new_v4();
    let free = service.available_slots(other, date, "token").await.unwrap();
    assert_eq!(free.len(), 13);
}
