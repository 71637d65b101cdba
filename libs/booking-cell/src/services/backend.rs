use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use tracing::{debug, info};

use shared_api::ApiClient;
use shared_config::AppConfig;
use shared_models::{AppError, DoctorId};

use crate::models::{ConsultationRecord, NewConsultation, SlotTime};

/// Consultation operations of the remote backend.
#[async_trait]
pub trait ConsultationBackend: Send + Sync {
    /// Start times already taken for `doctor_id` on `date`.
    async fn get_booked_slots(&self, doctor_id: DoctorId, date: NaiveDate) -> Result<BTreeSet<SlotTime>, AppError>;

    /// Fails with [`AppError::Conflict`] when the slot was taken in the meantime.
    async fn create_consultation(&self, request: &NewConsultation) -> Result<ConsultationRecord, AppError>;
}

pub struct HttpConsultationBackend {
    api: Arc<ApiClient>,
}

impl HttpConsultationBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ApiClient::new(config)),
        }
    }

    pub fn with_client(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ConsultationBackend for HttpConsultationBackend {
    async fn get_booked_slots(&self, doctor_id: DoctorId, date: NaiveDate) -> Result<BTreeSet<SlotTime>, AppError> {
        debug!("Fetching booked slots for doctor {} on {}", doctor_id, date);

        let path = format!("/api/consultations/doctor/{}", doctor_id);
        let consultations: Vec<ConsultationRecord> = self
            .api
            .request_optional(Method::GET, &path, None)
            .await?
            .unwrap_or_default();

        let booked: BTreeSet<SlotTime> = consultations
            .iter()
            .filter(|c| c.date_consultation.date() == date)
            .map(|c| SlotTime::from_time(c.date_consultation.time()))
            .collect();

        debug!("Doctor {} has {} booked slots on {}", doctor_id, booked.len(), date);
        Ok(booked)
    }

    async fn create_consultation(&self, request: &NewConsultation) -> Result<ConsultationRecord, AppError> {
        let body = serde_json::to_value(request)?;
        let record: ConsultationRecord = self
            .api
            .request(Method::POST, "/api/consultations", Some(body))
            .await?;

        info!(
            "Consultation {} created for patient {} with doctor {}",
            record.id, request.patient_id, request.doctor_id
        );
        Ok(record)
    }
}
