pub mod coordinator;
pub mod gateway;
pub mod methods;

pub use coordinator::PaymentCoordinator;
pub use gateway::{HttpPaymentGateway, PaymentGateway};
pub use methods::{
    CardNetwork, CardPaymentMethod, MobileMoneyPaymentMethod, PaymentMethodHandler,
    WalletPaymentMethod,
};
