use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use doctor_cell::DoctorSnapshot;
use payment_cell::PaymentConfirmation;
use shared_models::{ConsultationId, DoctorId, PatientId};

// ==============================================================================
// SLOTS
// ==============================================================================

/// Start time of a slot, always rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Drops seconds and sub-seconds.
    pub fn from_time(time: NaiveTime) -> Self {
        Self(NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    pub fn minutes_from_midnight(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }

    pub fn label(&self) -> String {
        self.0.format("%H:%M").to_string()
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self::from_time)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: SlotTime,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    /// Booked times were fetched for this doctor and date.
    Known,
    /// The lookup failed; booked slots cannot be told apart.
    Unknown,
}

// ==============================================================================
// DRAFT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsultationType {
    InPerson,
    Video,
    Home,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::InPerson => "in-person",
            ConsultationType::Video => "video",
            ConsultationType::Home => "home",
        }
    }
}

impl FromStr for ConsultationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in-person" => Ok(ConsultationType::InPerson),
            "video" => Ok(ConsultationType::Video),
            "home" => Ok(ConsultationType::Home),
            other => Err(format!("unknown consultation type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    DoctorId,
    Date,
    Time,
    Reason,
    ConsultationType,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::DoctorId => "doctorId",
            DraftField::Date => "date",
            DraftField::Time => "time",
            DraftField::Reason => "reason",
            DraftField::ConsultationType => "consultationType",
        };
        f.write_str(name)
    }
}

/// An in-progress booking. Prices are never stored here; they are derived
/// from the pricing table whenever they are needed.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
    pub doctor_id: DoctorId,
    pub doctor: DoctorSnapshot,
    pub date: Option<NaiveDate>,
    pub time: Option<SlotTime>,
    pub reason: String,
    pub consultation_type: Option<ConsultationType>,
}

impl BookingDraft {
    pub fn new(doctor: DoctorSnapshot) -> Self {
        Self {
            doctor_id: doctor.id,
            doctor,
            date: None,
            time: None,
            reason: String::new(),
            consultation_type: None,
        }
    }

    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        Some(self.date?.and_time(self.time?.time()))
    }
}

// ==============================================================================
// PERSISTED SESSION
// ==============================================================================

/// Route and query parameters to land back on after authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRoute {
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl ReturnRoute {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// `path?key=value&...` with encoded query values.
    pub fn to_url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }

    pub fn parse(url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect();

        Self {
            path: path.to_string(),
            query,
        }
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// A draft saved across an authentication redirect. Replaced wholesale, never
/// edited.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedBookingSession {
    pub booking: BookingDraft,
    pub return_route: ReturnRoute,
    pub saved_at: DateTime<Utc>,
}

impl PersistedBookingSession {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.saved_at > ttl
    }
}

// ==============================================================================
// CONSULTATIONS
// ==============================================================================

/// Read reference to a consultation owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsultationRef {
    pub consultation_id: ConsultationId,
    pub patient_id: PatientId,
}

/// Body of the create-consultation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConsultation {
    #[serde(rename = "docteurId")]
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    pub date_consultation: NaiveDateTime,
    pub reason: String,
    pub consultation_type: ConsultationType,
    pub price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRecord {
    pub id: ConsultationId,
    #[serde(deserialize_with = "local_date_time")]
    pub date_consultation: NaiveDateTime,
    #[serde(rename = "etat", default)]
    pub status: Option<String>,
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS[.fff]]`.
fn local_date_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M"))
        .map_err(serde::de::Error::custom)
}

// ==============================================================================
// WORKFLOW
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BookingState {
    Drafting,
    AwaitingAuth {
        return_route: ReturnRoute,
    },
    Creating,
    AwaitingPayment {
        consultation: ConsultationRef,
    },
    Completed {
        consultation: ConsultationRef,
        confirmation: PaymentConfirmation,
    },
    Cancelled,
}

impl BookingState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingState::Drafting => "drafting",
            BookingState::AwaitingAuth { .. } => "awaiting authentication",
            BookingState::Creating => "creating the consultation",
            BookingState::AwaitingPayment { .. } => "awaiting payment",
            BookingState::Completed { .. } => "completed",
            BookingState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingState::Completed { .. } | BookingState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The booking UI was explicitly closed. Saved state is dropped.
    Abandoned,
    /// The user navigated away; a saved session stays available.
    Navigation,
}

/// Where a successful confirm leads.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// Draft saved; send the user to log in.
    AuthRequired { return_route: ReturnRoute },
    /// Consultation created; collect payment next.
    PaymentRequired(ConsultationRef),
}
