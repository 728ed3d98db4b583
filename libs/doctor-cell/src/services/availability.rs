use chrono::{Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_utils::clock;

use crate::models::{BookedInterval, DoctorError, DoctorSchedule, TimeSlot};

/// Computes the bookable slot board for a doctor and date: the weekly
/// template rows for that weekday, partitioned into fixed slots, minus
/// the intervals already held by scheduled/confirmed appointments.
pub struct AvailabilityService {
    db: PostgrestClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    /// Every slot for the date in ascending start order, each marked
    /// available or taken. No active template rows for the weekday is an
    /// empty board, not an error; an unknown doctor is.
    pub async fn get_day_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, DoctorError> {
        self.day_slots_excluding(doctor_id, date, None, auth_token)
            .await
    }

    /// Same board with one appointment ignored. Reschedule checks pass
    /// the appointment being moved so it does not block its own target.
    pub async fn day_slots_excluding(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, DoctorError> {
        self.ensure_doctor_exists(doctor_id, auth_token).await?;

        let day_of_week = clock::weekday_number(date);
        let schedules = self
            .get_active_schedules(doctor_id, day_of_week, auth_token)
            .await?;

        if schedules.is_empty() {
            debug!(%doctor_id, %date, day_of_week, "No active schedule for weekday");
            return Ok(Vec::new());
        }

        let booked = self
            .get_blocking_intervals(doctor_id, date, exclude_appointment, auth_token)
            .await?;

        debug!(
            %doctor_id,
            %date,
            blocks = schedules.len(),
            booked = booked.len(),
            "Building slot board"
        );

        Ok(build_day_slots(&schedules, &booked))
    }

    /// The generated slot starting exactly at `start_time`, if any
    /// template block covers it. Booking uses this to pin the slot end
    /// to the template's duration and to see whether it is taken.
    pub async fn find_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        exclude_appointment: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<TimeSlot>, DoctorError> {
        let slots = self
            .day_slots_excluding(doctor_id, date, exclude_appointment, auth_token)
            .await?;
        Ok(slots.into_iter().find(|slot| slot.start_time == start_time))
    }

    async fn ensure_doctor_exists(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let rows: Vec<serde_json::Value> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            return Err(DoctorError::DoctorNotFound(doctor_id));
        }
        Ok(())
    }

    async fn get_active_schedules(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Vec<DoctorSchedule>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&order=start_time.asc",
            doctor_id, day_of_week
        );
        self.db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    async fn get_blocking_intervals(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, DoctorError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=in.(scheduled,confirmed)&select=start_time,end_time&order=start_time.asc",
            doctor_id, date
        );
        if let Some(id) = exclude_appointment {
            path.push_str(&format!("&id=neq.{}", id));
        }
        self.db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }
}

/// Pure slot generation. Blocks are sorted by start time so morning and
/// afternoon rows concatenate deterministically regardless of storage
/// order.
pub fn build_day_slots(schedules: &[DoctorSchedule], booked: &[BookedInterval]) -> Vec<TimeSlot> {
    let mut ordered: Vec<&DoctorSchedule> = schedules.iter().collect();
    ordered.sort_by_key(|s| s.start_time);

    let mut slots = Vec::new();
    for schedule in ordered {
        partition_block(schedule, booked, &mut slots);
    }
    slots
}

/// Walks [start,end) in `slot_minutes` steps; a trailing window shorter
/// than one slot is discarded. A slot is taken iff its half-open
/// interval intersects a blocking appointment's, so adjacent bookings
/// never shadow their neighbors.
fn partition_block(schedule: &DoctorSchedule, booked: &[BookedInterval], slots: &mut Vec<TimeSlot>) {
    if schedule.slot_minutes <= 0 || schedule.start_time >= schedule.end_time {
        // Degenerate rows yield nothing rather than looping.
        return;
    }

    let step = Duration::minutes(schedule.slot_minutes as i64);
    let mut current = schedule.start_time;

    loop {
        let (slot_end, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 || slot_end > schedule.end_time {
            break;
        }

        let taken = booked
            .iter()
            .any(|b| current < b.end_time && b.start_time < slot_end);

        slots.push(TimeSlot {
            start_time: current,
            end_time: slot_end,
            duration_minutes: schedule.slot_minutes,
            available: !taken,
            label: slot_label(current, slot_end),
        });

        current = slot_end;
    }
}

fn slot_label(start: NaiveTime, end: NaiveTime) -> String {
    format!("{} - {}", start.format("%H:%M"), end.format("%H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_models::meta::RecordMeta;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn block(day_of_week: i32, start: NaiveTime, end: NaiveTime, slot_minutes: i32) -> DoctorSchedule {
        DoctorSchedule {
            meta: RecordMeta {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                updated_at: None,
                created_by: None,
                updated_by: None,
            },
            doctor_id: Uuid::new_v4(),
            day_of_week,
            start_time: start,
            end_time: end,
            slot_minutes,
            is_active: true,
        }
    }

    fn booked(start: NaiveTime, end: NaiveTime) -> BookedInterval {
        BookedInterval {
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_monday_morning_yields_eight_slots() {
        let slots = build_day_slots(&[block(1, t(8, 0), t(12, 0), 30)], &[]);

        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0].label, "08:00 - 08:30");
        assert_eq!(slots[7].label, "11:30 - 12:00");
        assert!(slots.iter().all(|s| s.available));
        assert!(slots.iter().all(|s| s.duration_minutes == 30));

        // Contiguous and non-overlapping.
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn test_slot_count_is_floor_of_window_over_duration() {
        // 105 minutes / 30 = 3 full slots; the trailing 15 minutes vanish.
        let slots = build_day_slots(&[block(2, t(8, 0), t(9, 45), 30)], &[]);

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2].end_time, t(9, 30));
    }

    #[test]
    fn test_booking_blocks_exactly_one_slot() {
        let schedules = [block(1, t(8, 0), t(12, 0), 30)];
        let taken = [booked(t(9, 0), t(9, 30))];

        let slots = build_day_slots(&schedules, &taken);

        assert_eq!(slots.len(), 8);
        for slot in &slots {
            if slot.start_time == t(9, 0) {
                assert!(!slot.available, "09:00 slot should be taken");
            } else {
                assert!(slot.available, "{} should stay free", slot.label);
            }
        }
    }

    #[test]
    fn test_adjacent_booking_does_not_shadow_neighbors() {
        // Half-open intervals: an appointment ending 09:30 leaves the
        // 09:30 slot free.
        let schedules = [block(1, t(9, 0), t(10, 30), 30)];
        let taken = [booked(t(9, 0), t(9, 30))];

        let slots = build_day_slots(&schedules, &taken);

        assert_eq!(slots.len(), 3);
        assert!(!slots[0].available);
        assert!(slots[1].available);
        assert!(slots[2].available);
    }

    #[test]
    fn test_straddling_booking_blocks_both_slots() {
        let schedules = [block(3, t(9, 0), t(10, 0), 30)];
        let taken = [booked(t(9, 15), t(9, 45))];

        let slots = build_day_slots(&schedules, &taken);

        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| !s.available));
    }

    #[test]
    fn test_blocks_sorted_by_start_time() {
        // Afternoon row stored first; board still comes out ascending.
        let schedules = [
            block(4, t(14, 0), t(16, 0), 60),
            block(4, t(8, 0), t(10, 0), 30),
        ];

        let slots = build_day_slots(&schedules, &[]);

        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].start_time, t(8, 0));
        assert_eq!(slots[3].start_time, t(10, 0) - Duration::minutes(30));
        assert_eq!(slots[4].start_time, t(14, 0));
        assert_eq!(slots[4].duration_minutes, 60);
        let mut sorted = slots.clone();
        sorted.sort_by_key(|s| s.start_time);
        assert_eq!(slots, sorted);
    }

    #[test]
    fn test_degenerate_rows_yield_nothing() {
        let inverted = block(5, t(12, 0), t(8, 0), 30);
        let zero_duration = block(5, t(8, 0), t(12, 0), 0);

        assert!(build_day_slots(&[inverted], &[]).is_empty());
        assert!(build_day_slots(&[zero_duration], &[]).is_empty());
    }

    #[test]
    fn test_no_schedules_means_empty_board() {
        assert!(build_day_slots(&[], &[booked(t(9, 0), t(9, 30))]).is_empty());
    }

    #[test]
    fn test_window_reaching_midnight_terminates() {
        let slots = build_day_slots(&[block(6, t(23, 0), t(23, 59), 30)], &[]);

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].label, "23:00 - 23:30");
    }
}
