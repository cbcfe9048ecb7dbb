//! Domain notification payloads.

use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// A domain notification published to the external channel.
///
/// Notifications describe facts that already happened; consumers must not
/// treat them as commands. Delivery is at-least-once and best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    /// Stock was reserved against an order.
    StockReserved {
        order_id: OrderId,
        product_ids: Vec<ProductId>,
    },

    /// A product's available quantity dropped to or below its reorder threshold.
    LowStock {
        product_id: ProductId,
        available: u32,
        reorder_quantity: u32,
    },

    /// A product's on-hand quantity reached zero.
    OutOfStock { product_id: ProductId },

    /// An order completed the fulfillment saga.
    OrderConfirmed { order_id: OrderId, total: Money },

    /// An order was cancelled and its reservations released.
    OrderCancelled { order_id: OrderId, reason: String },
}

impl Notification {
    /// Returns the event type name for this notification.
    pub fn event_type(&self) -> &'static str {
        match self {
            Notification::StockReserved { .. } => "StockReserved",
            Notification::LowStock { .. } => "LowStock",
            Notification::OutOfStock { .. } => "OutOfStock",
            Notification::OrderConfirmed { .. } => "OrderConfirmed",
            Notification::OrderCancelled { .. } => "OrderCancelled",
        }
    }
}
