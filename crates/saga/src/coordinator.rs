//! The order saga coordinator.
//!
//! Drives one order through reserve → charge → confirm, compensating with
//! a stock release when a later step fails. Collaborator calls go through
//! per-collaborator guards; compensation bypasses the guard and retries
//! until the release lands, because a release against a recorded hold is
//! idempotent and must eventually happen.

use common::OrderId;
use inventory::{InventoryLedger, InventoryStore};
use notify::{Notification, NotificationChannel, NotificationEmitter};
use resilience::{CircuitBreaker, CollaboratorGuard, GuardError, ResilienceConfig, RetryPolicy};
use tokio::time::sleep;

use crate::error::SagaError;
use crate::order::{OrderItem, OrderSagaState};
use crate::repository::SagaRepository;
use crate::services::{PaymentMethod, PaymentService};
use crate::status::OrderStatus;

/// Coordinates order sagas across the inventory ledger and the payment
/// collaborator, persisting state after every step.
pub struct OrderSagaCoordinator<S, C, P, R> {
    ledger: InventoryLedger<S, C>,
    payment: P,
    repository: R,
    emitter: NotificationEmitter<C>,
    inventory_guard: CollaboratorGuard,
    payment_guard: CollaboratorGuard,
    compensation_backoff: RetryPolicy,
}

impl<S, C, P, R> OrderSagaCoordinator<S, C, P, R>
where
    S: InventoryStore,
    C: NotificationChannel,
    P: PaymentService,
    R: SagaRepository,
{
    /// Creates a coordinator with one guard per collaborator.
    pub fn new(
        ledger: InventoryLedger<S, C>,
        payment: P,
        repository: R,
        emitter: NotificationEmitter<C>,
        config: &ResilienceConfig,
    ) -> Self {
        Self {
            ledger,
            payment,
            repository,
            emitter,
            inventory_guard: CollaboratorGuard::new("inventory", config),
            payment_guard: CollaboratorGuard::new("payment", config),
            compensation_backoff: config.retry.clone(),
        }
    }

    /// The breaker guarding inventory calls.
    pub fn inventory_breaker(&self) -> &CircuitBreaker {
        self.inventory_guard.breaker()
    }

    /// The breaker guarding payment calls.
    pub fn payment_breaker(&self) -> &CircuitBreaker {
        self.payment_guard.breaker()
    }

    /// Runs the full saga for a new order.
    ///
    /// Returns the final saga state on every completed path, confirmed or
    /// compensated: a declined payment ends in `Cancelled`, not in an error,
    /// because the saga itself ran to completion. Errors are reserved for
    /// orders that never took hold (validation, duplicate, no stock,
    /// collaborator unreachable before reservation).
    #[tracing::instrument(skip(self, items, shipping_address), fields(item_count = items.len()))]
    pub async fn submit_order(
        &self,
        order_id: OrderId,
        items: Vec<OrderItem>,
        shipping_address: impl Into<String>,
        method: PaymentMethod,
    ) -> Result<OrderSagaState, SagaError> {
        validate_items(&items)?;
        metrics::counter!("saga_executions_total").increment(1);
        let started = std::time::Instant::now();

        let mut state = OrderSagaState::new(order_id, items, shipping_address);
        self.repository.insert(state.clone()).await?;

        // Step 1: reserve stock. Nothing is held yet, so any failure here
        // fails the saga outright with no compensation to run.
        let lines = state.stock_lines();
        if let Err(err) = self
            .inventory_guard
            .call(|| self.ledger.reserve(order_id, &lines))
            .await
        {
            state.fail(err.to_string())?;
            self.repository.update(state).await?;
            metrics::counter!("saga_failures_total", "step" => "reserve").increment(1);
            return Err(err.into());
        }
        state.mark_reserved()?;
        self.repository.update(state.clone()).await?;

        // Step 2: charge the customer.
        state.mark_payment_requested()?;
        self.repository.update(state.clone()).await?;

        let charge = self
            .payment_guard
            .call(|| self.payment.charge(order_id, state.total_amount, method))
            .await;

        match charge {
            Ok(outcome) => {
                state.confirm(outcome.transaction_id)?;
                self.repository.update(state.clone()).await?;

                metrics::counter!("saga_completions_total").increment(1);
                metrics::histogram!("saga_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(%order_id, total = %state.total_amount, "order confirmed");

                self.emitter
                    .publish(Notification::OrderConfirmed {
                        order_id,
                        total: state.total_amount,
                    })
                    .await;
                Ok(state)
            }
            Err(GuardError::Inner(e)) => {
                tracing::info!(%order_id, error = %e, "payment declined, compensating");
                self.compensate(&mut state, e.to_string()).await?;
                Ok(state)
            }
            Err(err @ GuardError::Unavailable { .. }) => {
                tracing::warn!(%order_id, error = %err, "payment unreachable, compensating");
                self.compensate(&mut state, err.to_string()).await?;
                Ok(state)
            }
        }
    }

    /// Loads the current state of an order saga.
    pub async fn get_order_state(&self, order_id: OrderId) -> Result<OrderSagaState, SagaError> {
        self.repository
            .get(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))
    }

    /// Cancels an order on customer request.
    ///
    /// A pending order is cancelled in place; an order holding stock is
    /// compensated first. Orders already compensating or terminal reject
    /// the cancellation.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: impl Into<String>,
    ) -> Result<OrderSagaState, SagaError> {
        let mut state = self.get_order_state(order_id).await?;
        let reason = reason.into();

        if state.status == OrderStatus::Pending {
            state.cancel()?;
            state.failure_reason = Some(reason);
            self.repository.update(state.clone()).await?;
            return Ok(state);
        }
        if !state.status.holds_stock() {
            return Err(SagaError::InvalidTransition {
                from: state.status,
                to: OrderStatus::Cancelled,
            });
        }

        self.compensate(&mut state, reason).await?;
        Ok(state)
    }

    /// Reserves stock for an order without running the payment steps.
    pub async fn reserve_stock(
        &self,
        order_id: OrderId,
        lines: &[inventory::StockLine],
    ) -> Result<(), SagaError> {
        self.inventory_guard
            .call(|| self.ledger.reserve(order_id, lines))
            .await
            .map_err(Into::into)
    }

    /// Releases an order's hold.
    pub async fn release_stock(
        &self,
        order_id: OrderId,
        lines: &[inventory::StockLine],
    ) -> Result<(), SagaError> {
        self.inventory_guard
            .call(|| self.ledger.release(order_id, lines))
            .await
            .map_err(Into::into)
    }

    /// Consumes an order's hold on shipment.
    pub async fn confirm_stock(
        &self,
        order_id: OrderId,
        lines: &[inventory::StockLine],
    ) -> Result<(), SagaError> {
        self.inventory_guard
            .call(|| self.ledger.confirm(order_id, lines))
            .await
            .map_err(Into::into)
    }

    /// Releases the order's hold and settles the saga as cancelled.
    ///
    /// The release goes straight to the ledger rather than through the
    /// guard: an open inventory breaker must not strand a hold, and the
    /// release is idempotent, so it is simply retried until it lands.
    async fn compensate(
        &self,
        state: &mut OrderSagaState,
        reason: String,
    ) -> Result<(), SagaError> {
        state.begin_compensation(reason)?;
        self.repository.update(state.clone()).await?;

        if let Some(payment_ref) = &state.payment_ref {
            // The charge already landed; releasing stock does not refund it.
            tracing::warn!(
                order_id = %state.order_id,
                payment_ref = %payment_ref,
                "cancelling a paid order, refund needs manual reconciliation"
            );
        }

        let lines = state.stock_lines();
        let mut attempt = 0u32;
        loop {
            match self.ledger.release(state.order_id, &lines).await {
                Ok(()) => break,
                Err(e) => {
                    attempt += 1;
                    metrics::counter!("compensation_retries_total").increment(1);
                    tracing::warn!(
                        order_id = %state.order_id,
                        attempt,
                        error = %e,
                        "stock release failed, retrying"
                    );
                    sleep(self.compensation_backoff.delay_for(attempt)).await;
                }
            }
        }

        state.cancel()?;
        self.repository.update(state.clone()).await?;
        metrics::counter!("saga_compensations_total").increment(1);
        tracing::info!(order_id = %state.order_id, "order cancelled");

        self.emitter
            .publish(Notification::OrderCancelled {
                order_id: state.order_id,
                reason: state.failure_reason.clone().unwrap_or_default(),
            })
            .await;
        Ok(())
    }
}

fn validate_items(items: &[OrderItem]) -> Result<(), SagaError> {
    if items.is_empty() {
        return Err(SagaError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    for item in items {
        if item.quantity == 0 {
            return Err(SagaError::Validation(format!(
                "zero quantity for product {}",
                item.product_id
            )));
        }
        if item.unit_price.is_negative() {
            return Err(SagaError::Validation(format!(
                "negative unit price for product {}",
                item.product_id
            )));
        }
    }
    Ok(())
}
