#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use auth_cell::{AuthError, AuthProvider, SessionContext};
use booking_cell::{
    fixed_clock, BookingSessionStore, BookingWorkflowService, ConsultationBackend,
    ConsultationRecord, MemorySessionStorage, NewConsultation, SlotTime,
};
use doctor_cell::{DoctorDirectory, DoctorError, DoctorSearchQuery, DoctorSnapshot, DoctorSummary};
use payment_cell::{
    PaymentAttempt, PaymentConfirmation, PaymentCoordinator, PaymentError, PaymentMethod,
    PaymentMethodHandler,
};
use shared_config::AppConfig;
use shared_models::{AppError, AuthenticatedUser, Credentials, DoctorId};
use shared_utils::test_utils::{init_test_tracing, TestConfig, TestUser};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 19, 10, 0, 0).unwrap()
}

pub fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 20).unwrap()
}

pub fn t(label: &str) -> SlotTime {
    label.parse().unwrap()
}

pub fn doctor_summary(id: DoctorId) -> DoctorSummary {
    DoctorSummary {
        id,
        last_name: "Alaoui".to_string(),
        first_name: "Youssef".to_string(),
        specialty: "Cardiologie".to_string(),
        city: Some("Rabat".to_string()),
        hospital: Some("CHU Ibn Sina".to_string()),
        phone: Some("+212600000000".to_string()),
        rating: Some(4.6),
        consultation_count: Some(120),
    }
}

pub fn doctor(id: DoctorId) -> DoctorSnapshot {
    DoctorSnapshot::from(doctor_summary(id))
}

/// Accepts any credentials and logs in the configured user.
pub struct StaticAuthProvider {
    user: AuthenticatedUser,
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<AuthenticatedUser, AuthError> {
        Ok(self.user.clone())
    }

    async fn current_session(&self) -> Result<Option<AuthenticatedUser>, AuthError> {
        Ok(None)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

pub fn patient_credentials() -> Credentials {
    Credentials::Patient {
        email: "patient@example.com".to_string(),
        password: "secret".to_string(),
    }
}

/// In-memory consultation backend that records what it was asked.
#[derive(Default)]
pub struct FakeBackend {
    pub booked: Mutex<BTreeSet<SlotTime>>,
    pub lookup_fails: AtomicBool,
    pub lookup_delay: Mutex<Option<Duration>>,
    pub create_results: Mutex<VecDeque<Result<ConsultationRecord, AppError>>>,
    pub create_delay: Mutex<Option<Duration>>,
    pub creates: AtomicUsize,
    pub last_request: Mutex<Option<NewConsultation>>,
}

impl FakeBackend {
    pub fn with_booked(times: &[&str]) -> Self {
        let backend = Self::default();
        *backend.booked.lock().unwrap() = times.iter().map(|s| t(s)).collect();
        backend
    }

    pub fn push_create(&self, result: Result<ConsultationRecord, AppError>) {
        self.create_results.lock().unwrap().push_back(result);
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsultationBackend for FakeBackend {
    async fn get_booked_slots(&self, _doctor_id: DoctorId, _date: NaiveDate) -> Result<BTreeSet<SlotTime>, AppError> {
        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.lookup_fails.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection reset".to_string()));
        }
        Ok(self.booked.lock().unwrap().clone())
    }

    async fn create_consultation(&self, request: &NewConsultation) -> Result<ConsultationRecord, AppError> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap() = Some(request.clone());

        let scripted = self.create_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ConsultationRecord {
                id: 100 + n as i64,
                date_consultation: request.date_consultation,
                status: Some("PENDING".to_string()),
            })
        })
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub doctors: HashMap<DoctorId, DoctorSummary>,
}

impl FakeDirectory {
    pub fn with(ids: &[DoctorId]) -> Self {
        Self {
            doctors: ids.iter().map(|id| (*id, doctor_summary(*id))).collect(),
        }
    }
}

#[async_trait]
impl DoctorDirectory for FakeDirectory {
    async fn search_doctors(&self, _query: &DoctorSearchQuery) -> Result<Vec<DoctorSummary>, DoctorError> {
        Ok(self.doctors.values().cloned().collect())
    }

    async fn get_doctor(&self, doctor_id: DoctorId) -> Result<DoctorSummary, DoctorError> {
        self.doctors
            .get(&doctor_id)
            .cloned()
            .ok_or(DoctorError::NotFound(doctor_id))
    }
}

/// Card handler that plays back scripted results and records every attempt.
#[derive(Default)]
pub struct ScriptedCardPayments {
    pub results: Mutex<VecDeque<Result<(), String>>>,
    pub attempts: Mutex<Vec<PaymentAttempt>>,
}

impl ScriptedCardPayments {
    pub fn push_decline(&self, reason: &str) {
        self.results.lock().unwrap().push_back(Err(reason.to_string()));
    }

    pub fn attempts(&self) -> Vec<PaymentAttempt> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentMethodHandler for ScriptedCardPayments {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Card
    }

    async fn pay(&self, attempt: &PaymentAttempt) -> Result<PaymentConfirmation, PaymentError> {
        self.attempts.lock().unwrap().push(attempt.clone());
        let n = self.attempts.lock().unwrap().len();

        match self.results.lock().unwrap().pop_front() {
            Some(Err(reason)) => Err(PaymentError::Declined(reason)),
            _ => Ok(PaymentConfirmation {
                payment_id: format!("pay_{}", n),
                consultation_id: attempt.consultation_id,
                method: PaymentMethod::Card,
                amount: attempt.amount,
                currency: attempt.currency.clone(),
                transaction_id: None,
            }),
        }
    }
}

pub struct Harness {
    pub config: AppConfig,
    pub backend: Arc<FakeBackend>,
    pub storage: Arc<MemorySessionStorage>,
    pub store: Arc<BookingSessionStore>,
    pub session: Arc<SessionContext>,
    pub payments: Arc<ScriptedCardPayments>,
    pub service: BookingWorkflowService,
}

impl Harness {
    pub fn new(backend: FakeBackend, logged_in: bool) -> Self {
        Self::build(backend, FakeDirectory::with(&[7, 9]), logged_in, TestUser::default())
    }

    pub fn build(backend: FakeBackend, directory: FakeDirectory, logged_in: bool, user: TestUser) -> Self {
        init_test_tracing();
        let config = TestConfig::default().to_app_config();

        let backend = Arc::new(backend);
        let storage = Arc::new(MemorySessionStorage::new());
        let store = Arc::new(
            BookingSessionStore::from_config(storage.clone(), &config).with_clock(fixed_clock(now())),
        );

        let provider = Arc::new(StaticAuthProvider {
            user: user.to_authenticated_user(),
        });
        let session = Arc::new(if logged_in {
            SessionContext::with_user(provider, user.to_authenticated_user())
        } else {
            SessionContext::new(provider)
        });

        let payments = Arc::new(ScriptedCardPayments::default());
        let coordinator = Arc::new(PaymentCoordinator::new().with_handler(payments.clone()));

        let service = BookingWorkflowService::new(
            &config,
            backend.clone(),
            Arc::new(directory),
            session.clone(),
            store.clone(),
            coordinator,
        )
        .with_clock(fixed_clock(now()));

        Self {
            config,
            backend,
            storage,
            store,
            session,
            payments,
            service,
        }
    }
}
