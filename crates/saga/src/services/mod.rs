//! External collaborators the saga calls.

pub mod payment;

pub use payment::{
    ChargeOutcome, InMemoryPaymentService, PaymentError, PaymentMethod, PaymentService,
};
