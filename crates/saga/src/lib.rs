//! Order fulfillment saga.
//!
//! Coordinates an order across independently owned resources — stock,
//! order records, and payment — without a shared transaction:
//! 1. Reserve inventory (cheap to compensate).
//! 2. Request payment.
//! 3. Confirm, or release the reservation and cancel.
//!
//! Reservation happens before payment because a reservation is undone by an
//! idempotent release, while a charged-but-unfulfilled payment is the
//! failure mode to avoid. Collaborator calls go through per-collaborator
//! circuit breakers; compensation is retried until it lands.

pub mod coordinator;
pub mod error;
pub mod order;
pub mod repository;
pub mod services;
pub mod status;

pub use coordinator::OrderSagaCoordinator;
pub use error::SagaError;
pub use order::{OrderItem, OrderSagaState};
pub use repository::{InMemorySagaRepository, SagaRepository};
pub use services::{ChargeOutcome, InMemoryPaymentService, PaymentError, PaymentMethod, PaymentService};
pub use status::OrderStatus;
