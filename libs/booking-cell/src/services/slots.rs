use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::{debug, warn};

use shared_config::{AppConfig, AvailabilityFallback};
use shared_models::DoctorId;

use crate::error::{BookingError, ValidationError};
use crate::models::{AvailabilityStatus, Slot, SlotTime};
use crate::services::backend::ConsultationBackend;

/// Every slot start from `workday_start` to `workday_end - granularity`,
/// in order. Booked times are flagged unavailable, never dropped.
pub fn compute_available_slots(
    workday_start: NaiveTime,
    workday_end: NaiveTime,
    granularity_minutes: u32,
    booked: &BTreeSet<SlotTime>,
) -> Vec<Slot> {
    if granularity_minutes == 0 {
        return Vec::new();
    }

    let start = workday_start.hour() * 60 + workday_start.minute();
    let end = workday_end.hour() * 60 + workday_end.minute();
    if end < start + granularity_minutes {
        return Vec::new();
    }

    (start..=end - granularity_minutes)
        .step_by(granularity_minutes as usize)
        .filter_map(|minute| SlotTime::new(minute / 60, minute % 60))
        .map(|time| Slot {
            time,
            available: !booked.contains(&time),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSchedule {
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub granularity_minutes: u32,
}

impl SlotSchedule {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            workday_start: config.workday_start,
            workday_end: config.workday_end,
            granularity_minutes: config.slot_minutes,
        }
    }

    pub fn slots(&self, booked: &BTreeSet<SlotTime>) -> Vec<Slot> {
        compute_available_slots(self.workday_start, self.workday_end, self.granularity_minutes, booked)
    }
}

impl Default for SlotSchedule {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Slots for one doctor on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotBoard {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
    pub status: AvailabilityStatus,
    fallback: AvailabilityFallback,
}

impl SlotBoard {
    pub fn is_for(&self, doctor_id: DoctorId, date: NaiveDate) -> bool {
        self.doctor_id == doctor_id && self.date == date
    }

    /// Whether any slot may be picked at all.
    pub fn is_bookable(&self) -> bool {
        self.status == AvailabilityStatus::Known || self.fallback == AvailabilityFallback::AssumeOpen
    }

    pub fn check_selectable(&self, time: SlotTime) -> Result<(), BookingError> {
        let slot = self
            .slots
            .iter()
            .find(|slot| slot.time == time)
            .ok_or(ValidationError::InvalidTime(time))?;

        if !slot.available {
            return Err(BookingError::SlotUnavailable { time });
        }
        if !self.is_bookable() {
            return Err(BookingError::AvailabilityUnknown);
        }
        Ok(())
    }

    pub fn mark_booked(&mut self, time: SlotTime) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.time == time) {
            slot.available = false;
        }
    }

    pub fn available_times(&self) -> Vec<SlotTime> {
        self.slots
            .iter()
            .filter(|slot| slot.available)
            .map(|slot| slot.time)
            .collect()
    }
}

/// Identifies one booked-times request. Only the newest ticket may update the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityTicket {
    pub id: u64,
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
}

#[derive(Debug)]
pub struct AvailabilityResponse {
    pub ticket: AvailabilityTicket,
    pub booked: Result<BTreeSet<SlotTime>, BookingError>,
}

/// Fetches booked times keyed by doctor and date and discards responses that
/// were overtaken by a newer request.
pub struct SlotAvailabilityTracker {
    backend: Arc<dyn ConsultationBackend>,
    schedule: SlotSchedule,
    fallback: AvailabilityFallback,
    timeout: Duration,
    latest: AtomicU64,
}

impl SlotAvailabilityTracker {
    pub fn new(backend: Arc<dyn ConsultationBackend>, config: &AppConfig) -> Self {
        Self {
            backend,
            schedule: SlotSchedule::from_config(config),
            fallback: config.availability_fallback,
            timeout: Duration::from_secs(config.request_timeout_secs),
            latest: AtomicU64::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn schedule(&self) -> &SlotSchedule {
        &self.schedule
    }

    pub fn issue(&self, doctor_id: DoctorId, date: NaiveDate) -> AvailabilityTicket {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        AvailabilityTicket { id, doctor_id, date }
    }

    pub async fn fetch(&self, ticket: AvailabilityTicket) -> AvailabilityResponse {
        let booked = match tokio::time::timeout(
            self.timeout,
            self.backend.get_booked_slots(ticket.doctor_id, ticket.date),
        )
        .await
        {
            Ok(Ok(booked)) => Ok(booked),
            Ok(Err(e)) => Err(BookingError::from(e)),
            Err(_) => Err(BookingError::TransientNetwork(
                "Checking availability timed out, please retry".to_string(),
            )),
        };

        AvailabilityResponse { ticket, booked }
    }

    /// Builds the board for a response, or `None` if a newer request was issued.
    pub fn resolve(&self, response: AvailabilityResponse) -> Option<SlotBoard> {
        let ticket = response.ticket;
        if ticket.id != self.latest.load(Ordering::SeqCst) {
            debug!(
                "Discarding stale availability for doctor {} on {} (ticket {})",
                ticket.doctor_id, ticket.date, ticket.id
            );
            return None;
        }

        let (booked, status) = match response.booked {
            Ok(booked) => (booked, AvailabilityStatus::Known),
            Err(e) => {
                match self.fallback {
                    AvailabilityFallback::FailClosed => warn!(
                        "Availability for doctor {} on {} unknown, booking disabled: {}",
                        ticket.doctor_id, ticket.date, e
                    ),
                    AvailabilityFallback::AssumeOpen => warn!(
                        "Availability for doctor {} on {} unknown, offering all slots: {}",
                        ticket.doctor_id, ticket.date, e
                    ),
                }
                (BTreeSet::new(), AvailabilityStatus::Unknown)
            }
        };

        Some(SlotBoard {
            doctor_id: ticket.doctor_id,
            date: ticket.date,
            slots: self.schedule.slots(&booked),
            status,
            fallback: self.fallback,
        })
    }

    /// Issues, fetches and resolves in one step.
    pub async fn load_board(&self, doctor_id: DoctorId, date: NaiveDate) -> Option<SlotBoard> {
        let ticket = self.issue(doctor_id, date);
        let response = self.fetch(ticket).await;
        self.resolve(response)
    }
}
