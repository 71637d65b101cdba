use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use doctor_cell::DoctorSnapshot;
use shared_config::AppConfig;
use shared_models::DoctorId;

use crate::error::BookingError;
use crate::models::{BookingDraft, ConsultationType, PersistedBookingSession, ReturnRoute, SlotTime};
use crate::services::clock::{system_clock, Clock};
use crate::services::storage::SessionStorage;

pub const BOOKING_FORM_DATA_KEY: &str = "bookingFormData";
pub const PENDING_BOOKING_KEY: &str = "pendingBooking";
pub const RETURN_PATH_KEY: &str = "returnPath";

const SESSION_KEYS: [&str; 3] = [BOOKING_FORM_DATA_KEY, PENDING_BOOKING_KEY, RETURN_PATH_KEY];

/// Stored shape of `bookingFormData`. Empty strings stand for unset fields.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingFormData {
    doctor_id: DoctorId,
    doctor_data: DoctorSnapshot,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    consultation_type: String,
    #[serde(default)]
    current_path: String,
    #[serde(default)]
    search_params: BTreeMap<String, String>,
    timestamp: i64,
}

impl BookingFormData {
    fn from_session(session: &PersistedBookingSession) -> Self {
        let draft = &session.booking;
        Self {
            doctor_id: draft.doctor_id,
            doctor_data: draft.doctor.clone(),
            date: draft.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            time: draft.time.map(|t| t.label()).unwrap_or_default(),
            reason: draft.reason.clone(),
            consultation_type: draft
                .consultation_type
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
            current_path: session.return_route.path.clone(),
            search_params: session.return_route.query.clone(),
            timestamp: session.saved_at.timestamp_millis(),
        }
    }

    fn into_session(self) -> Result<PersistedBookingSession, BookingError> {
        if self.doctor_id != self.doctor_data.id {
            return Err(BookingError::SessionCorrupt(format!(
                "doctor {} does not match snapshot {}",
                self.doctor_id, self.doctor_data.id
            )));
        }

        let date = optional(&self.date, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()))?;
        let time = optional(&self.time, |s| s.parse::<SlotTime>().map_err(|e| e.to_string()))?;
        let consultation_type = optional(&self.consultation_type, |s| s.parse::<ConsultationType>())?;

        let saved_at = Utc
            .timestamp_millis_opt(self.timestamp)
            .single()
            .ok_or_else(|| BookingError::SessionCorrupt(format!("bad timestamp {}", self.timestamp)))?;

        Ok(PersistedBookingSession {
            booking: BookingDraft {
                doctor_id: self.doctor_id,
                doctor: self.doctor_data,
                date,
                time,
                reason: self.reason,
                consultation_type,
            },
            return_route: ReturnRoute {
                path: self.current_path,
                query: self.search_params,
            },
            saved_at,
        })
    }
}

fn optional<T>(raw: &str, parse: impl Fn(&str) -> Result<T, String>) -> Result<Option<T>, BookingError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse(raw).map(Some).map_err(BookingError::SessionCorrupt)
}

fn storage_error(err: anyhow::Error) -> BookingError {
    warn!("Booking session storage failed: {:#}", err);
    BookingError::Storage(err.to_string())
}

/// Keeps at most one incomplete booking across an authentication redirect.
///
/// The three storage keys are always written and removed together. Sessions
/// older than the TTL and payloads that fail to parse are removed on read and
/// reported as absent.
pub struct BookingSessionStore {
    storage: Arc<dyn SessionStorage>,
    ttl: chrono::Duration,
    clock: Clock,
}

impl BookingSessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, ttl_minutes: i64) -> Self {
        Self {
            storage,
            ttl: chrono::Duration::minutes(ttl_minutes),
            clock: system_clock(),
        }
    }

    pub fn from_config(storage: Arc<dyn SessionStorage>, config: &AppConfig) -> Self {
        Self::new(storage, config.booking_session_ttl_minutes)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Overwrites any earlier session.
    pub async fn save(
        &self,
        draft: &BookingDraft,
        return_route: &ReturnRoute,
    ) -> Result<PersistedBookingSession, BookingError> {
        let now = (self.clock)();
        let saved_at = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);

        let session = PersistedBookingSession {
            booking: draft.clone(),
            return_route: return_route.clone(),
            saved_at,
        };

        let form_data = serde_json::to_string(&BookingFormData::from_session(&session))
            .map_err(|e| BookingError::Storage(e.to_string()))?;

        self.storage
            .set_all(&[
                (BOOKING_FORM_DATA_KEY, form_data),
                (PENDING_BOOKING_KEY, "true".to_string()),
                (RETURN_PATH_KEY, return_route.to_url()),
            ])
            .await
            .map_err(storage_error)?;

        info!(
            "Saved pending booking for doctor {} (return to {})",
            draft.doctor_id,
            return_route.to_url()
        );
        Ok(session)
    }

    /// The saved session, if one exists and is still fresh. Does not remove it.
    pub async fn load(&self) -> Result<Option<PersistedBookingSession>, BookingError> {
        let form_data = self
            .storage
            .get(BOOKING_FORM_DATA_KEY)
            .await
            .map_err(storage_error)?;
        let pending = self
            .storage
            .get(PENDING_BOOKING_KEY)
            .await
            .map_err(storage_error)?;

        let raw = match (form_data, pending.as_deref()) {
            (None, None) => return Ok(None),
            (Some(raw), Some("true")) => raw,
            _ => {
                warn!("Discarding partially written booking session");
                self.clear().await?;
                return Ok(None);
            }
        };

        let session = match serde_json::from_str::<BookingFormData>(&raw)
            .map_err(|e| BookingError::SessionCorrupt(e.to_string()))
            .and_then(BookingFormData::into_session)
        {
            Ok(session) => session,
            Err(e) => {
                warn!("Discarding unreadable booking session: {}", e);
                self.clear().await?;
                return Ok(None);
            }
        };

        if session.is_expired((self.clock)(), self.ttl) {
            debug!("Booking session saved at {} has expired", session.saved_at);
            self.clear().await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Idempotent.
    pub async fn clear(&self) -> Result<(), BookingError> {
        self.storage
            .remove_all(&SESSION_KEYS)
            .await
            .map_err(storage_error)
    }

    pub async fn has_pending(&self) -> Result<bool, BookingError> {
        Ok(self.load().await?.is_some())
    }

    /// The saved draft when it belongs to `doctor_id`. A session for another
    /// doctor is dropped.
    pub async fn restore_for(&self, doctor_id: DoctorId) -> Result<Option<BookingDraft>, BookingError> {
        match self.load().await? {
            Some(session) if session.booking.doctor_id == doctor_id => {
                debug!("Restoring pending booking for doctor {}", doctor_id);
                Ok(Some(session.booking))
            }
            Some(session) => {
                debug!(
                    "Dropping pending booking for doctor {} while opening doctor {}",
                    session.booking.doctor_id, doctor_id
                );
                self.clear().await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
