use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::entities::account::AccountKind;
use crate::errors::ServiceError;

/// Domain events emitted after a transaction commits.
///
/// Events are observability signals, not workflow participants: no ledger or
/// inventory state depends on their delivery, and a full channel never blocks
/// or aborts the operation that produced them (`send_or_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Inventory events
    ItemCreated {
        item_id: Uuid,
        serial_code: String,
    },
    ItemCountAdjusted {
        item_id: Uuid,
        delta: i32,
        new_count: i32,
    },
    StockReceived {
        account_id: Uuid,
        entry_id: Uuid,
        total_value: Decimal,
        line_count: usize,
    },

    // Account events
    AccountCreated {
        account_id: Uuid,
        kind: AccountKind,
    },
    OpeningBalanceSet {
        account_id: Uuid,
        balance: Decimal,
    },

    // Consignment events
    ConsignmentIssued {
        consignment_id: Uuid,
        account_id: Uuid,
        number: String,
        total_issued: Decimal,
    },
    ConsignmentSettled {
        consignment_id: Uuid,
        total_sold: Decimal,
        total_returned: Decimal,
    },
    ConsignmentClosed(Uuid),
    ConsignmentsMarkedOverdue {
        count: u64,
    },
}

/// Cloneable handle for publishing events onto the relay channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, failing if the channel is closed or full past its
    /// buffering.
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event and logs instead of propagating a delivery failure.
    ///
    /// Services call this after commit: the data change already happened, so
    /// a lost event must not turn a successful operation into an error.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

/// Receives events and relays them to the log until the channel closes.
///
/// Spawned once at startup by [`crate::AppState::initialize`].
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ItemCreated {
                item_id,
                serial_code,
            } => {
                info!(%item_id, serial_code, "item created");
            }
            Event::ItemCountAdjusted {
                item_id,
                delta,
                new_count,
            } => {
                debug!(%item_id, delta, new_count, "item count adjusted");
            }
            Event::StockReceived {
                account_id,
                total_value,
                line_count,
                ..
            } => {
                info!(%account_id, %total_value, line_count, "stock received from dealer");
            }
            Event::AccountCreated { account_id, kind } => {
                info!(%account_id, ?kind, "account created");
            }
            Event::OpeningBalanceSet {
                account_id,
                balance,
            } => {
                info!(%account_id, %balance, "opening balance set");
            }
            Event::ConsignmentIssued {
                consignment_id,
                number,
                total_issued,
                ..
            } => {
                info!(%consignment_id, number, %total_issued, "consignment issued");
            }
            Event::ConsignmentSettled {
                consignment_id,
                total_sold,
                total_returned,
            } => {
                info!(%consignment_id, %total_sold, %total_returned, "consignment settled");
            }
            Event::ConsignmentClosed(consignment_id) => {
                info!(%consignment_id, "consignment closed");
            }
            Event::ConsignmentsMarkedOverdue { count } => {
                if *count > 0 {
                    info!(count, "consignments marked overdue");
                }
            }
        }
    }

    info!("Event processing loop stopped");
}
