use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info};

use shared_api::ApiClient;
use shared_config::AppConfig;
use shared_models::{AppError, DoctorId};

use crate::error::DoctorError;
use crate::models::{DoctorSearchQuery, DoctorSummary};

/// Read access to the doctor directory.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn search_doctors(&self, query: &DoctorSearchQuery) -> Result<Vec<DoctorSummary>, DoctorError>;

    async fn get_doctor(&self, doctor_id: DoctorId) -> Result<DoctorSummary, DoctorError>;
}

pub struct HttpDoctorDirectory {
    api: Arc<ApiClient>,
}

impl HttpDoctorDirectory {
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
impl DoctorDirectory for HttpDoctorDirectory {
    async fn search_doctors(&self, query: &DoctorSearchQuery) -> Result<Vec<DoctorSummary>, DoctorError> {
        debug!("Searching doctors with query: {:?}", query);

        if query.specialty.trim().is_empty() {
            return Err(DoctorError::InvalidQuery("Specialty is required".to_string()));
        }

        let path = format!("/api/docteurs/search?{}", query.to_query_string());

        // The endpoint answers 204 when nothing matches.
        let doctors: Vec<DoctorSummary> = self
            .api
            .request_optional(Method::GET, &path, None)
            .await?
            .unwrap_or_default();

        info!("Found {} doctors for specialty {}", doctors.len(), query.specialty);
        Ok(doctors)
    }

    async fn get_doctor(&self, doctor_id: DoctorId) -> Result<DoctorSummary, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/api/docteurs/{}", doctor_id);
        match self.api.request(Method::GET, &path, None).await {
            Ok(doctor) => Ok(doctor),
            Err(AppError::NotFound(_)) => Err(DoctorError::NotFound(doctor_id)),
            Err(e) => Err(e.into()),
        }
    }
}
