use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::{HttpAuthProvider, SessionContext};
use booking_cell::{
    fixed_clock, BookingSessionStore, BookingState, BookingWorkflowService, ConfirmOutcome,
    ConsultationType, HttpConsultationBackend, MemorySessionStorage, ReturnRoute, SessionStorage,
};
use doctor_cell::{DoctorDirectory, DoctorSnapshot, HttpDoctorDirectory};
use payment_cell::{
    CardConfirmation, CardNetwork, HttpPaymentGateway, PaymentCoordinator, PaymentDetails,
    PaymentError, PaymentStatus,
};
use shared_models::Credentials;
use shared_utils::test_utils::{init_test_tracing, MockApiResponses, TestConfig, TestUser};

struct ApprovingCardNetwork;

#[async_trait]
impl CardNetwork for ApprovingCardNetwork {
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        _card_token: &str,
    ) -> Result<CardConfirmation, PaymentError> {
        Ok(CardConfirmation {
            payment_intent_id: client_secret.trim_end_matches("_secret").to_string(),
            status: PaymentStatus::Succeeded,
            error_message: None,
        })
    }
}

async fn mount_backend(server: &MockServer, user: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/api/docteurs/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::doctor_response(
            7,
            "Alaoui",
            "Youssef",
            "Cardiologie",
            "Rabat",
        )))
        .mount(server)
        .await;

    // 10:00 is taken on the booking day; the 09:00 entry is another day.
    Mock::given(method("GET"))
        .and(path("/api/consultations/doctor/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "dateConsultation": "2025-08-20T10:00:00", "etat": "ACCEPTED" },
            { "id": 2, "dateConsultation": "2025-08-21T09:00", "etat": "PENDING" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/patients/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::patient_response(user)))
        .expect(1)
        .mount(server)
        .await;

    let slot = NaiveDate::from_ymd_opt(2025, 8, 20)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap();
    Mock::given(method("POST"))
        .and(path("/api/consultations"))
        .and(body_partial_json(json!({
            "docteurId": 7,
            "patientId": user.id,
            "dateConsultation": "2025-08-20T14:30:00",
            "consultationType": "in-person",
            "price": 300.0,
            "totalPrice": 320.0
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(MockApiResponses::consultation_response(501, 7, user.id, slot)),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/payments/create-payment-intent"))
        .and(body_partial_json(json!({
            "consultationId": 501,
            "amount": 320.0,
            "currency": "MAD",
            "paymentMethod": "credit_card"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockApiResponses::payment_intent_response("pi_501", "pi_501_secret", 320.0),
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/payments/confirm-payment"))
        .and(query_param("paymentIntentId", "pi_501"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::payment_response(
            "pi_501",
            "succeeded",
            "card",
            320.0,
        )))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_guest_booking_through_login_and_card_payment() {
    init_test_tracing();
    let server = MockServer::start().await;
    let user = TestUser::default();
    mount_backend(&server, &user).await;

    let config = TestConfig::with_server(&server.uri()).to_app_config();
    let clock = fixed_clock(Utc.with_ymd_and_hms(2025, 8, 19, 10, 0, 0).unwrap());

    let storage = Arc::new(MemorySessionStorage::new());
    let store = Arc::new(BookingSessionStore::from_config(storage.clone(), &config).with_clock(clock.clone()));
    let session = Arc::new(SessionContext::new(Arc::new(HttpAuthProvider::new(&config))));
    let directory = Arc::new(HttpDoctorDirectory::new(&config));
    let payments = Arc::new(PaymentCoordinator::standard(
        Arc::new(HttpPaymentGateway::new(&config)),
        Arc::new(ApprovingCardNetwork),
    ));
    let service = BookingWorkflowService::new(
        &config,
        Arc::new(HttpConsultationBackend::new(&config)),
        directory.clone(),
        session.clone(),
        store.clone(),
        payments,
    )
    .with_clock(clock);

    // A guest picks a doctor from the search results.
    let doctor = DoctorSnapshot::from(directory.get_doctor(7).await.unwrap());
    let route = ReturnRoute::new("/response-search").with_param("specialite", "Cardiologie");
    let mut workflow = service.open(doctor, route.clone()).await.unwrap();

    let date = NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();
    let board = workflow.select_date(date).await.unwrap();
    assert_eq!(board.slots.len(), 16);
    let booked: Vec<String> = board
        .slots
        .iter()
        .filter(|s| !s.available)
        .map(|s| s.time.label())
        .collect();
    assert_eq!(booked, vec!["10:00"]);

    workflow.select_time("14:30".parse().unwrap()).unwrap();
    workflow.set_reason("Douleurs thoraciques").unwrap();
    workflow.set_consultation_type(ConsultationType::InPerson).unwrap();
    assert_eq!(workflow.quote().unwrap().total_price, 320.0);

    let outcome = workflow.confirm().await.unwrap();
    assert_eq!(outcome, ConfirmOutcome::AuthRequired { return_route: route.clone() });
    assert_eq!(
        storage.keys().await,
        vec!["bookingFormData", "pendingBooking", "returnPath"]
    );
    assert_eq!(
        storage.get("returnPath").await.unwrap().as_deref(),
        Some("/response-search?specialite=Cardiologie")
    );
    drop(workflow);

    // The guest logs in and lands back on the booking.
    session
        .login(&Credentials::Patient {
            email: user.email.clone(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();

    let resumed = service.resume_after_login().await.unwrap().expect("booking should resume");
    assert_eq!(resumed.return_route, route);
    let consultation = match resumed.outcome {
        Ok(ConfirmOutcome::PaymentRequired(consultation)) => consultation,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(consultation.consultation_id, 501);
    assert_eq!(consultation.patient_id, user.id);

    let mut workflow = resumed.workflow;
    let confirmation = workflow
        .pay(PaymentDetails::Card {
            card_token: "tok_visa".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(confirmation.payment_id, "pi_501");
    assert_eq!(confirmation.amount, 320.0);
    assert_matches!(workflow.state(), BookingState::Completed { consultation: c, .. } if c.consultation_id == 501);
    assert!(storage.is_empty().await);
}
