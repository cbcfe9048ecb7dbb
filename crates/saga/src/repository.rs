//! Saga state persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::error::SagaError;
use crate::order::OrderSagaState;

/// Storage for order saga state.
///
/// The coordinator writes through this after every step so an operator can
/// see where a stuck order stands.
#[async_trait]
pub trait SagaRepository: Send + Sync {
    /// Inserts a new saga. Fails with `DuplicateOrder` if the order ID is
    /// already taken.
    async fn insert(&self, state: OrderSagaState) -> Result<(), SagaError>;

    /// Replaces the state of an existing saga.
    async fn update(&self, state: OrderSagaState) -> Result<(), SagaError>;

    /// Loads a saga by order ID.
    async fn get(&self, order_id: OrderId) -> Result<Option<OrderSagaState>, SagaError>;
}

/// In-memory saga repository.
#[derive(Clone, Default)]
pub struct InMemorySagaRepository {
    sagas: Arc<RwLock<HashMap<OrderId, OrderSagaState>>>,
}

impl InMemorySagaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SagaRepository for InMemorySagaRepository {
    async fn insert(&self, state: OrderSagaState) -> Result<(), SagaError> {
        let mut sagas = self.sagas.write().await;
        if sagas.contains_key(&state.order_id) {
            return Err(SagaError::DuplicateOrder {
                order_id: state.order_id,
            });
        }
        sagas.insert(state.order_id, state);
        Ok(())
    }

    async fn update(&self, state: OrderSagaState) -> Result<(), SagaError> {
        let mut sagas = self.sagas.write().await;
        if !sagas.contains_key(&state.order_id) {
            return Err(SagaError::OrderNotFound(state.order_id));
        }
        sagas.insert(state.order_id, state);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<OrderSagaState>, SagaError> {
        Ok(self.sagas.read().await.get(&order_id).cloned())
    }
}
