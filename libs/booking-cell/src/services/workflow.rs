use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use auth_cell::SessionContext;
use doctor_cell::{DoctorDirectory, DoctorError, DoctorSnapshot};
use payment_cell::{PaymentAttempt, PaymentConfirmation, PaymentCoordinator, PaymentDetails, PaymentOutcome};
use shared_config::AppConfig;
use shared_models::{AppError, AuthenticatedUser};

use crate::error::{BookingError, ValidationError};
use crate::models::{
    BookingDraft, BookingState, CancelReason, ConfirmOutcome, ConsultationRef, ConsultationType,
    DraftField, NewConsultation, PersistedBookingSession, ReturnRoute, SlotTime,
};
use crate::services::backend::ConsultationBackend;
use crate::services::clock::{system_clock, Clock};
use crate::services::pricing::{PriceQuote, PricingTable};
use crate::services::session_store::BookingSessionStore;
use crate::services::slots::{SlotAvailabilityTracker, SlotBoard};
use crate::services::validation::validate;

/// Lets the UI close a workflow while one of its calls is still running.
/// Results that arrive after closing are dropped.
#[derive(Debug, Clone, Default)]
pub struct WorkflowHandle {
    closed: Arc<AtomicBool>,
}

impl WorkflowHandle {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Wires the collaborators a booking needs and opens workflows over them.
#[derive(Clone)]
pub struct BookingWorkflowService {
    config: Arc<AppConfig>,
    backend: Arc<dyn ConsultationBackend>,
    doctors: Arc<dyn DoctorDirectory>,
    session: Arc<SessionContext>,
    store: Arc<BookingSessionStore>,
    payments: Arc<PaymentCoordinator>,
    availability: Arc<SlotAvailabilityTracker>,
    pricing: Arc<PricingTable>,
    request_timeout: Duration,
    clock: Clock,
}

impl BookingWorkflowService {
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn ConsultationBackend>,
        doctors: Arc<dyn DoctorDirectory>,
        session: Arc<SessionContext>,
        store: Arc<BookingSessionStore>,
        payments: Arc<PaymentCoordinator>,
    ) -> Self {
        Self {
            config: Arc::new(config.clone()),
            availability: Arc::new(SlotAvailabilityTracker::new(backend.clone(), config)),
            pricing: Arc::new(PricingTable::from_config(config)),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            clock: system_clock(),
            backend,
            doctors,
            session,
            store,
            payments,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Applies to both the booked-slots lookup and consultation creation.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self.availability = Arc::new(
            SlotAvailabilityTracker::new(self.backend.clone(), &self.config).with_timeout(timeout),
        );
        self
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn availability(&self) -> &SlotAvailabilityTracker {
        &self.availability
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date_naive()
    }

    /// Opens the booking UI for `doctor`, pre-filled from a saved session for
    /// the same doctor.
    pub async fn open(
        &self,
        doctor: DoctorSnapshot,
        return_route: ReturnRoute,
    ) -> Result<BookingWorkflow, BookingError> {
        let doctor_id = doctor.id;
        let draft = match self.store.restore_for(doctor_id).await? {
            Some(mut saved) => {
                info!("Restored pending booking for doctor {}", doctor_id);
                saved.doctor = doctor;
                saved
            }
            None => BookingDraft::new(doctor),
        };

        let mut workflow = BookingWorkflow::new(self.clone(), draft, return_route);
        workflow.reload_restored_date().await?;
        Ok(workflow)
    }

    /// Continues a booking interrupted by login. Waits for both the current
    /// identity and the saved session, then confirms again.
    pub async fn resume_after_login(&self) -> Result<Option<ResumedBooking>, BookingError> {
        let (user, saved) = tokio::join!(self.session.current(), self.store.load());

        let (Some(user), Some(saved)) = (user, saved?) else {
            debug!("No pending booking to resume");
            return Ok(None);
        };

        let PersistedBookingSession {
            mut booking,
            return_route,
            ..
        } = saved;

        match self.doctors.get_doctor(booking.doctor_id).await {
            Ok(doctor) => booking.doctor = DoctorSnapshot::from(doctor),
            Err(DoctorError::NotFound(id)) => {
                warn!("Pending booking references unknown doctor {}, discarding it", id);
                self.store.clear().await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Resuming booking for patient {} with doctor {}",
            user.user_id, booking.doctor_id
        );

        let mut workflow = BookingWorkflow::new(self.clone(), booking, return_route.clone());
        let outcome = workflow.confirm().await;

        Ok(Some(ResumedBooking {
            workflow,
            return_route,
            outcome,
        }))
    }
}

/// A booking picked up after login, with the result of its automatic confirm.
pub struct ResumedBooking {
    pub workflow: BookingWorkflow,
    pub return_route: ReturnRoute,
    pub outcome: Result<ConfirmOutcome, BookingError>,
}

/// One booking from draft to paid consultation.
pub struct BookingWorkflow {
    service: BookingWorkflowService,
    draft: BookingDraft,
    state: BookingState,
    board: Option<SlotBoard>,
    return_route: ReturnRoute,
    handle: WorkflowHandle,
}

impl BookingWorkflow {
    fn new(service: BookingWorkflowService, draft: BookingDraft, return_route: ReturnRoute) -> Self {
        Self {
            service,
            draft,
            state: BookingState::Drafting,
            board: None,
            return_route,
            handle: WorkflowHandle::default(),
        }
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn slot_board(&self) -> Option<&SlotBoard> {
        self.board.as_ref()
    }

    pub fn return_route(&self) -> &ReturnRoute {
        &self.return_route
    }

    pub fn handle(&self) -> WorkflowHandle {
        self.handle.clone()
    }

    pub fn quote(&self) -> Option<PriceQuote> {
        self.service.pricing.quote(self.draft.consultation_type?)
    }

    pub fn consultation(&self) -> Option<ConsultationRef> {
        match &self.state {
            BookingState::AwaitingPayment { consultation } | BookingState::Completed { consultation, .. } => {
                Some(*consultation)
            }
            _ => None,
        }
    }

    fn ensure_open(&self) -> Result<(), BookingError> {
        if self.handle.is_closed() {
            debug!("Ignoring result for closed booking with doctor {}", self.draft.doctor_id);
            return Err(BookingError::WorkflowClosed);
        }
        Ok(())
    }

    fn ensure_drafting(&self, action: &'static str) -> Result<(), BookingError> {
        self.ensure_open()?;
        match &self.state {
            BookingState::Drafting => Ok(()),
            other => Err(BookingError::InvalidState {
                action,
                state: other.name(),
            }),
        }
    }

    // ==========================================================================
    // DRAFTING
    // ==========================================================================

    /// Sets the date and fetches its slots. A time chosen for another date is
    /// cleared.
    pub async fn select_date(&mut self, date: NaiveDate) -> Result<&SlotBoard, BookingError> {
        self.ensure_drafting("choose a date")?;

        let today = self.service.today();
        if date < today {
            return Err(ValidationError::InvalidDate { date, today }.into());
        }

        if self.draft.date != Some(date) {
            self.draft.time = None;
        }
        self.draft.date = Some(date);
        self.board = None;

        self.load_board(date).await
    }

    pub async fn refresh_availability(&mut self) -> Result<&SlotBoard, BookingError> {
        self.ensure_drafting("refresh availability")?;
        let date = self
            .draft
            .date
            .ok_or(ValidationError::MissingFields(vec![DraftField::Date]))?;
        self.load_board(date).await
    }

    pub fn select_time(&mut self, time: SlotTime) -> Result<(), BookingError> {
        self.ensure_drafting("choose a time")?;
        let date = self
            .draft
            .date
            .ok_or(ValidationError::MissingFields(vec![DraftField::Date]))?;

        let board = self
            .board
            .as_ref()
            .filter(|board| board.is_for(self.draft.doctor_id, date))
            .ok_or(BookingError::AvailabilityUnknown)?;
        board.check_selectable(time)?;

        self.draft.time = Some(time);
        Ok(())
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) -> Result<(), BookingError> {
        self.ensure_drafting("edit the reason")?;
        self.draft.reason = reason.into();
        Ok(())
    }

    pub fn set_consultation_type(&mut self, consultation_type: ConsultationType) -> Result<(), BookingError> {
        self.ensure_drafting("change the consultation type")?;
        self.draft.consultation_type = Some(consultation_type);
        Ok(())
    }

    async fn load_board(&mut self, date: NaiveDate) -> Result<&SlotBoard, BookingError> {
        let board = self
            .service
            .availability
            .load_board(self.draft.doctor_id, date)
            .await;
        self.ensure_open()?;

        // A newer lookup was issued while this one was running.
        let board = board.ok_or(BookingError::AvailabilityUnknown)?;

        if let Some(time) = self.draft.time {
            if matches!(
                board.check_selectable(time),
                Err(BookingError::SlotUnavailable { .. }) | Err(BookingError::Validation(_))
            ) {
                debug!("Previously chosen {} is no longer offered on {}", time, date);
                self.draft.time = None;
            }
        }

        Ok(&*self.board.insert(board))
    }

    /// Drops a restored date that is now in the past and loads slots otherwise.
    async fn reload_restored_date(&mut self) -> Result<(), BookingError> {
        let Some(date) = self.draft.date else {
            return Ok(());
        };

        if date < self.service.today() {
            debug!("Restored date {} has passed, clearing it", date);
            self.draft.date = None;
            self.draft.time = None;
            return Ok(());
        }

        self.load_board(date).await.map(|_| ())
    }

    // ==========================================================================
    // CONFIRM
    // ==========================================================================

    /// Validates the draft, then either saves it and asks for login, or creates
    /// the consultation.
    pub async fn confirm(&mut self) -> Result<ConfirmOutcome, BookingError> {
        self.ensure_drafting("confirm")?;
        validate(&self.draft, self.service.today())?;

        let (date, time) = match (self.draft.date, self.draft.time) {
            (Some(date), Some(time)) => (date, time),
            _ => {
                return Err(ValidationError::MissingFields(vec![DraftField::Date, DraftField::Time]).into())
            }
        };

        let has_board = self
            .board
            .as_ref()
            .is_some_and(|board| board.is_for(self.draft.doctor_id, date));
        if !has_board {
            self.load_board(date).await?;
        }
        self.board
            .as_ref()
            .ok_or(BookingError::AvailabilityUnknown)?
            .check_selectable(time)?;

        let user = self.service.session.current().await;
        self.ensure_open()?;

        match user {
            Some(user) if user.is_patient() => self.create_consultation(&user, date, time).await,
            Some(user) => {
                warn!("User {} is not a patient, asking for a patient login", user.user_id);
                self.await_auth().await
            }
            None => self.await_auth().await,
        }
    }

    async fn await_auth(&mut self) -> Result<ConfirmOutcome, BookingError> {
        self.service.store.save(&self.draft, &self.return_route).await?;
        self.ensure_open()?;

        info!(
            "Booking with doctor {} needs authentication, draft saved",
            self.draft.doctor_id
        );

        let return_route = self.return_route.clone();
        self.state = BookingState::AwaitingAuth {
            return_route: return_route.clone(),
        };
        Ok(ConfirmOutcome::AuthRequired { return_route })
    }

    async fn create_consultation(
        &mut self,
        user: &AuthenticatedUser,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<ConfirmOutcome, BookingError> {
        let quote = self.require_quote()?;
        let request = NewConsultation {
            doctor_id: self.draft.doctor_id,
            patient_id: user.user_id,
            date_consultation: date.and_time(time.time()),
            reason: self.draft.reason.trim().to_string(),
            consultation_type: quote.consultation_type,
            price: quote.price,
            total_price: quote.total_price,
        };

        info!(
            "Booking consultation for patient {} with doctor {} on {} at {}",
            user.user_id, request.doctor_id, date, time
        );
        self.state = BookingState::Creating;

        let result = tokio::time::timeout(
            self.service.request_timeout,
            self.service.backend.create_consultation(&request),
        )
        .await;

        // The draft now lives in the backend; a later resume must not book it
        // twice, even when this workflow was closed meanwhile.
        if let Ok(Ok(record)) = &result {
            if let Err(e) = self.service.store.clear().await {
                warn!("Consultation {} created but saved draft not cleared: {}", record.id, e);
            }
        }
        self.ensure_open()?;

        let record = match result {
            Ok(Ok(record)) => record,
            Ok(Err(AppError::Conflict(detail))) => {
                warn!(
                    "Slot {} on {} with doctor {} was taken meanwhile: {}",
                    time, date, request.doctor_id, detail
                );
                self.state = BookingState::Drafting;
                self.draft.time = None;
                if let Some(board) = self.board.as_mut() {
                    board.mark_booked(time);
                }
                return Err(BookingError::SlotConflict { time });
            }
            Ok(Err(e)) => {
                self.state = BookingState::Drafting;
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    "Creating consultation with doctor {} timed out after {:?}",
                    request.doctor_id, self.service.request_timeout
                );
                self.state = BookingState::Drafting;
                return Err(BookingError::TransientNetwork(
                    "Creating the consultation timed out, please retry".to_string(),
                ));
            }
        };

        let consultation = ConsultationRef {
            consultation_id: record.id,
            patient_id: user.user_id,
        };
        info!("Consultation {} awaiting payment", record.id);
        self.state = BookingState::AwaitingPayment { consultation };
        Ok(ConfirmOutcome::PaymentRequired(consultation))
    }

    fn require_quote(&self) -> Result<PriceQuote, BookingError> {
        let consultation_type = self
            .draft
            .consultation_type
            .ok_or(ValidationError::MissingFields(vec![DraftField::ConsultationType]))?;
        self.service.pricing.quote(consultation_type).ok_or_else(|| {
            warn!("No price configured for {} consultations", consultation_type.as_str());
            BookingError::Rejected
        })
    }

    // ==========================================================================
    // PAYMENT
    // ==========================================================================

    /// Pays for the created consultation. A failure keeps the workflow waiting
    /// for payment so another method can be tried.
    pub async fn pay(&mut self, details: PaymentDetails) -> Result<PaymentConfirmation, BookingError> {
        self.ensure_open()?;
        let consultation = match &self.state {
            BookingState::AwaitingPayment { consultation } => *consultation,
            other => {
                return Err(BookingError::InvalidState {
                    action: "pay",
                    state: other.name(),
                })
            }
        };

        let quote = self.require_quote()?;
        let user = self
            .service
            .session
            .current()
            .await
            .ok_or(BookingError::AuthRequired)?;
        self.ensure_open()?;
        let (email, name) = user.contact().ok_or(BookingError::MissingPatientContact)?;

        let attempt = PaymentAttempt {
            consultation_id: consultation.consultation_id,
            amount: quote.total_price,
            currency: quote.currency,
            customer_email: email.to_string(),
            customer_name: name.to_string(),
            details,
        };

        let outcome = self.service.payments.pay(&attempt).await;

        match outcome {
            PaymentOutcome::Succeeded(confirmation) => {
                if let Err(e) = self.service.store.clear().await {
                    warn!("Payment succeeded but saved booking not cleared: {}", e);
                }
                self.ensure_open()?;

                info!(
                    "Booking for consultation {} completed with payment {}",
                    consultation.consultation_id, confirmation.payment_id
                );
                self.state = BookingState::Completed {
                    consultation,
                    confirmation: confirmation.clone(),
                };
                Ok(confirmation)
            }
            PaymentOutcome::Failed { reason } => {
                self.ensure_open()?;
                info!(
                    "Payment for consultation {} failed, waiting for another attempt",
                    consultation.consultation_id
                );
                Err(BookingError::PaymentDeclined { reason })
            }
        }
    }

    // ==========================================================================
    // CANCEL
    // ==========================================================================

    pub async fn cancel(&mut self, reason: CancelReason) -> Result<(), BookingError> {
        match &self.state {
            BookingState::Drafting | BookingState::AwaitingAuth { .. } | BookingState::AwaitingPayment { .. } => {}
            other => {
                return Err(BookingError::InvalidState {
                    action: "cancel",
                    state: other.name(),
                })
            }
        }

        info!(
            "Booking with doctor {} cancelled ({:?})",
            self.draft.doctor_id, reason
        );
        self.handle.close();
        self.state = BookingState::Cancelled;

        if reason == CancelReason::Abandoned {
            self.service.store.clear().await?;
        }
        Ok(())
    }
}
