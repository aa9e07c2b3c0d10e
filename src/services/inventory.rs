//! Inventory counter: per-item fungible counts.
//!
//! The decrement path is a guarded single-statement UPDATE
//! (`current_count = current_count - qty WHERE current_count >= qty`), so a
//! count can never go negative regardless of concurrency. Every
//! workflow-driven count change pairs with exactly one ledger entry written
//! by the owning transaction.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::account::{self, AccountKind};
use crate::entities::item;
use crate::entities::ledger_entry::{self, LedgerEntryKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::accounts::{self, FindOrCreateAccountInput};
use crate::services::ledger::{self, BreakdownLine, NewLedgerEntry};
use crate::{PageRequest, PaginatedResponse};

/// Parameters for [`InventoryService::create_item`].
#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub serial_code: String,
    pub name: String,
    pub unit_price: Decimal,
    /// Stock already on hand when the item is registered; counts as
    /// purchased.
    pub initial_count: i32,
}

/// One line of a dealer stock intake.
#[derive(Debug, Clone)]
pub struct ReceiveStockLine {
    pub item_id: Uuid,
    pub qty: i32,
    /// Per-unit value override; the item's sale price when absent.
    pub unit_value: Option<Decimal>,
}

/// Parameters for [`InventoryService::receive_stock`].
#[derive(Debug, Clone)]
pub struct ReceiveStockInput {
    pub dealer_name: String,
    pub phone: Option<String>,
    pub lines: Vec<ReceiveStockLine>,
    pub effective_on: Option<NaiveDate>,
}

/// Guarded stock decrement on the caller's connection.
///
/// Zero rows affected means the guard rejected the decrement: the item is
/// missing or lacks quantity.
pub(crate) async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    qty: i32,
) -> Result<(), ServiceError> {
    if qty <= 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "decrement quantity must be positive, got {}",
            qty
        )));
    }

    let updated = item::Entity::update_many()
        .col_expr(
            item::Column::CurrentCount,
            Expr::col(item::Column::CurrentCount).sub(qty),
        )
        .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(item::Column::Id.eq(item_id))
        .filter(item::Column::CurrentCount.gte(qty))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        let existing = item::Entity::find_by_id(item_id).one(conn).await?;
        return match existing {
            None => Err(ServiceError::ItemNotFound(item_id.to_string())),
            Some(item) => {
                warn!(
                    serial_code = %item.serial_code,
                    requested = qty,
                    on_hand = item.current_count,
                    "insufficient stock"
                );
                Err(ServiceError::InsufficientStock(format!(
                    "item {}: requested {}, on hand {}",
                    item.serial_code, qty, item.current_count
                )))
            }
        };
    }

    Ok(())
}

/// Unconditional stock increment on the caller's connection.
pub(crate) async fn increment_stock<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    qty: i32,
) -> Result<(), ServiceError> {
    if qty <= 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "increment quantity must be positive, got {}",
            qty
        )));
    }

    let updated = item::Entity::update_many()
        .col_expr(
            item::Column::CurrentCount,
            Expr::col(item::Column::CurrentCount).add(qty),
        )
        .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(item::Column::Id.eq(item_id))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(ServiceError::ItemNotFound(item_id.to_string()));
    }

    Ok(())
}

/// Dealer-intake increment: bumps both the on-hand count and the cumulative
/// purchase count.
pub(crate) async fn receive_into_stock<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    qty: i32,
) -> Result<(), ServiceError> {
    if qty <= 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "received quantity must be positive, got {}",
            qty
        )));
    }

    let updated = item::Entity::update_many()
        .col_expr(
            item::Column::CurrentCount,
            Expr::col(item::Column::CurrentCount).add(qty),
        )
        .col_expr(
            item::Column::PurchaseCount,
            Expr::col(item::Column::PurchaseCount).add(qty),
        )
        .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(item::Column::Id.eq(item_id))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(ServiceError::ItemNotFound(item_id.to_string()));
    }

    Ok(())
}

/// Service facade over stock-keeping units.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    config: Arc<AppConfig>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Registers a new stock-keeping unit.
    #[instrument(skip(self))]
    pub async fn create_item(&self, input: CreateItemInput) -> Result<item::Model, ServiceError> {
        let serial_code = input.serial_code.trim().to_string();
        if serial_code.is_empty() {
            return Err(ServiceError::ValidationError(
                "serial code must not be empty".to_string(),
            ));
        }
        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "item name must not be empty".to_string(),
            ));
        }
        if input.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit price must not be negative".to_string(),
            ));
        }
        if input.initial_count < 0 {
            return Err(ServiceError::InvalidQuantity(format!(
                "initial count must not be negative, got {}",
                input.initial_count
            )));
        }

        let existing = item::Entity::find()
            .filter(item::Column::SerialCode.eq(serial_code.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateSerial(serial_code));
        }

        let model = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            serial_code: Set(serial_code.clone()),
            name: Set(input.name.trim().to_string()),
            current_count: Set(input.initial_count),
            purchase_count: Set(input.initial_count),
            unit_price: Set(input.unit_price),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let created = match model.insert(&*self.db).await {
            Ok(created) => created,
            // Unique-index backstop for a create that raced the pre-check.
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(ServiceError::DuplicateSerial(serial_code));
            }
            Err(err) => return Err(err.into()),
        };

        info!(item_id = %created.id, serial_code = %created.serial_code, "item created");
        self.event_sender
            .send_or_log(Event::ItemCreated {
                item_id: created.id,
                serial_code: created.serial_code.clone(),
            })
            .await;

        Ok(created)
    }

    /// Adjusts an item's on-hand count by a signed delta.
    ///
    /// Negative deltas go through the guarded decrement and fail with
    /// `InsufficientStock` rather than driving the count negative.
    #[instrument(skip(self))]
    pub async fn adjust_item_count(
        &self,
        item_id: Uuid,
        delta: i32,
    ) -> Result<item::Model, ServiceError> {
        if delta == 0 {
            return Err(ServiceError::InvalidQuantity(
                "adjustment delta must not be zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        if delta > 0 {
            increment_stock(&txn, item_id, delta).await?;
        } else {
            decrement_stock(&txn, item_id, -delta).await?;
        }

        let item = item::Entity::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ItemCountAdjusted {
                item_id,
                delta,
                new_count: item.current_count,
            })
            .await;

        Ok(item)
    }

    /// Dealer purchase intake: stock in, dealer credited, one `StockIn`
    /// ledger entry. One transaction.
    #[instrument(skip(self, input), fields(dealer = %input.dealer_name))]
    pub async fn receive_stock(
        &self,
        input: ReceiveStockInput,
    ) -> Result<(account::Model, ledger_entry::Model), ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "stock intake requires at least one line".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let mut total = Decimal::ZERO;
        let mut breakdown = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            if line.qty <= 0 {
                return Err(ServiceError::InvalidQuantity(format!(
                    "received quantity must be positive, got {}",
                    line.qty
                )));
            }
            let item = item::Entity::find_by_id(line.item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::ItemNotFound(line.item_id.to_string()))?;

            receive_into_stock(&txn, line.item_id, line.qty).await?;

            let unit_value = line.unit_value.unwrap_or(item.unit_price);
            let value = unit_value * Decimal::from(line.qty);
            total += value;
            breakdown.push(BreakdownLine {
                item_id: item.id,
                serial_code: item.serial_code,
                qty: line.qty,
                unit_value,
                value,
            });
        }

        let (dealer, created) = accounts::find_or_create_on(
            &txn,
            FindOrCreateAccountInput::lookup(&input.dealer_name, input.phone.clone(), AccountKind::Dealer),
        )
        .await?;

        // Goods arrive on credit: the business now owes the dealer.
        let dealer = accounts::adjust_balance_on(&txn, dealer.id, -total, None).await?;

        let entry = ledger::append_entry_on(
            &txn,
            NewLedgerEntry {
                account_id: dealer.id,
                kind: LedgerEntryKind::StockIn,
                amount: total,
                balance_after: dealer.balance,
                effective_on: input.effective_on.unwrap_or_else(|| Utc::now().date_naive()),
                reference_id: None,
                breakdown: Some(breakdown),
                note: None,
            },
        )
        .await?;

        txn.commit().await?;

        if created {
            self.event_sender
                .send_or_log(Event::AccountCreated {
                    account_id: dealer.id,
                    kind: dealer.kind,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::StockReceived {
                account_id: dealer.id,
                entry_id: entry.id,
                total_value: total,
                line_count: input.lines.len(),
            })
            .await;

        Ok((dealer, entry))
    }

    /// Fetches one item by id.
    pub async fn get_item(&self, item_id: Uuid) -> Result<item::Model, ServiceError> {
        item::Entity::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))
    }

    /// Fetches one item by its serial code.
    pub async fn get_item_by_serial(&self, serial_code: &str) -> Result<item::Model, ServiceError> {
        item::Entity::find()
            .filter(item::Column::SerialCode.eq(serial_code))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::ItemNotFound(serial_code.to_string()))
    }

    /// Lists items ordered by serial code.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        page: PageRequest,
    ) -> Result<PaginatedResponse<item::Model>, ServiceError> {
        let (page_number, per_page) = page.resolve(&self.config);
        let paginator = item::Entity::find()
            .order_by_asc(item::Column::SerialCode)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page_number - 1).await?;

        Ok(PaginatedResponse::new(items, total, page_number, per_page))
    }
}
