pub mod backend;
pub mod clock;
pub mod pricing;
pub mod session_store;
pub mod slots;
pub mod storage;
pub mod validation;
pub mod workflow;

pub use backend::{ConsultationBackend, HttpConsultationBackend};
pub use clock::{fixed_clock, system_clock, Clock};
pub use pricing::{PriceQuote, PricingRule, PricingTable};
pub use session_store::BookingSessionStore;
pub use slots::{
    compute_available_slots, AvailabilityResponse, AvailabilityTicket, SlotAvailabilityTracker,
    SlotBoard, SlotSchedule,
};
pub use storage::{MemorySessionStorage, RedisSessionStorage, SessionStorage};
pub use validation::validate;
pub use workflow::{BookingWorkflow, BookingWorkflowService, ResumedBooking, WorkflowHandle};
