//! Consignment workflow: issue, lazy overdue detection, settlement, close.
//!
//! Status walks `Issued → Overdue → {Settled, Closed}` (or straight from
//! `Issued`). Every transition into a terminal state is fenced by a
//! conditional UPDATE on the status column, so two concurrent settlements of
//! the same consignment cannot both apply their stock and balance effects:
//! the loser gets zero rows affected and a `Conflict`.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::account::AccountKind;
use crate::entities::consignment::{self, ConsignmentStatus};
use crate::entities::ledger_entry::LedgerEntryKind;
use crate::entities::{consignment_line, item, settlement_sale};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::accounts::{self, FindOrCreateAccountInput};
use crate::services::inventory;
use crate::services::ledger::{self, BreakdownLine, NewLedgerEntry};
use crate::services::sequences;
use crate::{PageRequest, PaginatedResponse};

/// One requested line at issuance.
#[derive(Debug, Clone)]
pub struct IssueLineInput {
    pub item_id: Uuid,
    pub qty: i32,
}

/// Parameters for [`ConsignmentService::issue_consignment`].
#[derive(Debug, Clone)]
pub struct IssueConsignmentInput {
    pub person_name: String,
    pub phone: Option<String>,
    pub lines: Vec<IssueLineInput>,
    /// Business date of the issuance; today when absent.
    pub issued_on: Option<NaiveDate>,
    pub expected_return_on: NaiveDate,
}

/// One line of a settlement call.
///
/// An `item_id` not on the consignment is a manual addition: it settles with
/// `issued_qty = 0` and its sale comes straight from on-hand stock.
#[derive(Debug, Clone)]
pub struct SettleLineInput {
    pub item_id: Uuid,
    pub sold_qty: i32,
    /// Explicit returned-value override; `returned_qty × unit_price` when
    /// absent.
    pub returned_value: Option<Decimal>,
}

/// Optional narrowing of [`ConsignmentService::list_consignments`].
#[derive(Debug, Clone, Default)]
pub struct ConsignmentFilter {
    pub status: Option<ConsignmentStatus>,
    /// Case-sensitive substring match on the person's name.
    pub person_name: Option<String>,
}

/// A consignment together with its owned line items.
#[derive(Debug, Clone)]
pub struct ConsignmentWithLines {
    pub consignment: consignment::Model,
    pub lines: Vec<consignment_line::Model>,
}

/// Service running the consignment state machine.
#[derive(Clone)]
pub struct ConsignmentService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    config: Arc<AppConfig>,
}

impl ConsignmentService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Hands a batch of items to a person for resale.
    ///
    /// Decrements stock per line (all-or-nothing), credits the agent's
    /// account with the issued value, appends a `ConsignmentIssue` ledger
    /// entry, and inserts the consignment under the next sequential number.
    /// One transaction.
    #[instrument(skip(self, input), fields(person = %input.person_name))]
    pub async fn issue_consignment(
        &self,
        input: IssueConsignmentInput,
    ) -> Result<ConsignmentWithLines, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "consignment requires at least one line".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for line in &input.lines {
            if line.qty <= 0 {
                return Err(ServiceError::InvalidQuantity(format!(
                    "issued quantity must be positive, got {}",
                    line.qty
                )));
            }
            if !seen.insert(line.item_id) {
                return Err(ServiceError::ValidationError(format!(
                    "item {} appears more than once",
                    line.item_id
                )));
            }
        }

        let issued_on = input.issued_on.unwrap_or_else(|| Utc::now().date_naive());
        let consignment_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let mut total_issued = Decimal::ZERO;
        let mut line_models = Vec::with_capacity(input.lines.len());
        let mut breakdown = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let item = item::Entity::find_by_id(line.item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::ItemNotFound(line.item_id.to_string()))?;

            inventory::decrement_stock(&txn, line.item_id, line.qty).await?;

            let issued_value = item.unit_price * Decimal::from(line.qty);
            total_issued += issued_value;
            breakdown.push(BreakdownLine {
                item_id: item.id,
                serial_code: item.serial_code,
                qty: line.qty,
                unit_value: item.unit_price,
                value: issued_value,
            });
            line_models.push(consignment_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                consignment_id: Set(consignment_id),
                item_id: Set(line.item_id),
                issued_qty: Set(line.qty),
                sold_qty: Set(0),
                returned_qty: Set(0),
                unit_price: Set(item.unit_price),
                issued_value: Set(issued_value),
                sold_value: Set(Decimal::ZERO),
                returned_value: Set(Decimal::ZERO),
                created_at: Set(now),
                updated_at: Set(now),
            });
        }

        let (account, account_created) = accounts::find_or_create_on(
            &txn,
            FindOrCreateAccountInput::lookup(
                &input.person_name,
                input.phone.clone(),
                AccountKind::ConsignmentAgent,
            ),
        )
        .await?;

        // The agent now owes the full issued value.
        let account = accounts::adjust_balance_on(&txn, account.id, total_issued, None).await?;

        let number = sequences::next_consignment_number(&txn).await?;

        let created = consignment::ActiveModel {
            id: Set(consignment_id),
            number: Set(number.clone()),
            person_name: Set(input.person_name.trim().to_string()),
            phone: Set(input.phone.clone()),
            account_id: Set(account.id),
            issued_on: Set(issued_on),
            expected_return_on: Set(input.expected_return_on),
            status: Set(ConsignmentStatus::Issued),
            total_issued_value: Set(total_issued),
            total_sold_value: Set(Decimal::ZERO),
            total_returned_value: Set(Decimal::ZERO),
            settled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut lines = Vec::with_capacity(line_models.len());
        for model in line_models {
            lines.push(model.insert(&txn).await?);
        }

        ledger::append_entry_on(
            &txn,
            NewLedgerEntry {
                account_id: account.id,
                kind: LedgerEntryKind::ConsignmentIssue,
                amount: total_issued,
                balance_after: account.balance,
                effective_on: issued_on,
                reference_id: Some(consignment_id),
                breakdown: Some(breakdown),
                note: Some(format!("consignment {} issued", number)),
            },
        )
        .await?;

        txn.commit().await?;

        if account_created {
            self.event_sender
                .send_or_log(Event::AccountCreated {
                    account_id: account.id,
                    kind: account.kind,
                })
                .await;
        }
        info!(consignment_id = %consignment_id, number = %number, %total_issued, "consignment issued");
        self.event_sender
            .send_or_log(Event::ConsignmentIssued {
                consignment_id,
                account_id: account.id,
                number,
                total_issued,
            })
            .await;

        Ok(ConsignmentWithLines {
            consignment: created,
            lines,
        })
    }

    /// Reconciles sold vs. returned quantities and settles the consignment.
    ///
    /// Returned goods restock through the guarded increment/decrement
    /// helpers, the agent's balance drops by the total returned value, and a
    /// `ConsignmentSettle` ledger entry is appended. Settling an
    /// already-settled consignment re-applies value overrides only, with no
    /// stock or balance effect.
    #[instrument(skip(self, lines))]
    pub async fn settle_consignment(
        &self,
        consignment_id: Uuid,
        lines: Vec<SettleLineInput>,
    ) -> Result<ConsignmentWithLines, ServiceError> {
        let mut by_item: HashMap<Uuid, SettleLineInput> = HashMap::with_capacity(lines.len());
        for line in lines {
            if by_item.insert(line.item_id, line.clone()).is_some() {
                return Err(ServiceError::ValidationError(format!(
                    "item {} appears more than once",
                    line.item_id
                )));
            }
        }

        let txn = self.db.begin().await?;

        let header = consignment::Entity::find_by_id(consignment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Consignment {} not found", consignment_id))
            })?;
        let stored_lines = consignment_line::Entity::find()
            .filter(consignment_line::Column::ConsignmentId.eq(consignment_id))
            .order_by_asc(consignment_line::Column::CreatedAt)
            .all(&txn)
            .await?;

        if header.status.is_terminal() {
            let result = reapply_overrides(&txn, header, stored_lines, &by_item).await?;
            txn.commit().await?;
            return Ok(result);
        }

        // Validate before taking the fence so a rejected call leaves the
        // status untouched.
        let mut manual_items: Vec<item::Model> = Vec::new();
        for (item_id, input) in &by_item {
            if input.sold_qty < 0 {
                return Err(ServiceError::InvalidQuantity(format!(
                    "sold quantity must not be negative, got {}",
                    input.sold_qty
                )));
            }
            match stored_lines.iter().find(|l| l.item_id == *item_id) {
                Some(line) => {
                    if input.sold_qty > line.issued_qty {
                        warn!(
                            %consignment_id,
                            item_id = %item_id,
                            sold = input.sold_qty,
                            issued = line.issued_qty,
                            "over-sale rejected"
                        );
                        return Err(ServiceError::OverSale(format!(
                            "item {}: sold {} exceeds issued {}",
                            item_id, input.sold_qty, line.issued_qty
                        )));
                    }
                }
                None => {
                    let item = item::Entity::find_by_id(*item_id)
                        .one(&txn)
                        .await?
                        .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))?;
                    manual_items.push(item);
                }
            }
        }

        let now = Utc::now();
        let today = now.date_naive();

        // The optimistic fence: exactly one caller wins the transition.
        let fenced = consignment::Entity::update_many()
            .set(consignment::ActiveModel {
                status: Set(ConsignmentStatus::Settled),
                settled_at: Set(Some(now)),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(consignment::Column::Id.eq(consignment_id))
            .filter(consignment::Column::Status.is_in([
                ConsignmentStatus::Issued,
                ConsignmentStatus::Overdue,
            ]))
            .exec(&txn)
            .await?;
        if fenced.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "consignment {} was already settled or closed",
                consignment_id
            )));
        }

        let mut total_sold = Decimal::ZERO;
        let mut total_returned = Decimal::ZERO;
        let mut breakdown = Vec::new();
        let mut settled_lines = Vec::with_capacity(stored_lines.len() + manual_items.len());

        for line in stored_lines {
            let input = by_item.get(&line.item_id);
            let sold_qty = input.map(|i| i.sold_qty).unwrap_or(0);
            let returned_qty = line.issued_qty - sold_qty;

            if returned_qty > 0 {
                inventory::increment_stock(&txn, line.item_id, returned_qty).await?;
            }

            let sold_value = line.unit_price * Decimal::from(sold_qty);
            let returned_value = input
                .and_then(|i| i.returned_value)
                .unwrap_or_else(|| line.unit_price * Decimal::from(returned_qty));
            total_sold += sold_value;
            total_returned += returned_value;

            if sold_qty > 0 {
                insert_sale(&txn, consignment_id, line.item_id, sold_qty, line.unit_price, today)
                    .await?;
            }

            let serial_code = serial_for(&txn, line.item_id).await?;
            breakdown.push(BreakdownLine {
                item_id: line.item_id,
                serial_code,
                qty: returned_qty,
                unit_value: line.unit_price,
                value: returned_value,
            });

            let mut active: consignment_line::ActiveModel = line.into();
            active.sold_qty = Set(sold_qty);
            active.returned_qty = Set(returned_qty);
            active.sold_value = Set(sold_value);
            active.returned_value = Set(returned_value);
            active.updated_at = Set(now);
            settled_lines.push(active.update(&txn).await?);
        }

        for item in manual_items {
            let input = &by_item[&item.id];
            let sold_qty = input.sold_qty;
            if sold_qty == 0 && input.returned_value.is_none() {
                continue;
            }
            // Never issued, so the sale comes straight off the shelf; the
            // guarded decrement keeps the count non-negative.
            let returned_qty = -sold_qty;
            if sold_qty > 0 {
                inventory::decrement_stock(&txn, item.id, sold_qty).await?;
            }

            let sold_value = item.unit_price * Decimal::from(sold_qty);
            let returned_value = input
                .returned_value
                .unwrap_or_else(|| item.unit_price * Decimal::from(returned_qty));
            total_sold += sold_value;
            total_returned += returned_value;

            if sold_qty > 0 {
                insert_sale(&txn, consignment_id, item.id, sold_qty, item.unit_price, today)
                    .await?;
            }

            breakdown.push(BreakdownLine {
                item_id: item.id,
                serial_code: item.serial_code.clone(),
                qty: returned_qty,
                unit_value: item.unit_price,
                value: returned_value,
            });

            let manual_line = consignment_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                consignment_id: Set(consignment_id),
                item_id: Set(item.id),
                issued_qty: Set(0),
                sold_qty: Set(sold_qty),
                returned_qty: Set(returned_qty),
                unit_price: Set(item.unit_price),
                issued_value: Set(Decimal::ZERO),
                sold_value: Set(sold_value),
                returned_value: Set(returned_value),
                created_at: Set(now),
                updated_at: Set(now),
            };
            settled_lines.push(manual_line.insert(&txn).await?);
        }

        // Settling removes the returned portion from what the agent owes.
        let account =
            accounts::adjust_balance_on(&txn, header.account_id, -total_returned, None).await?;

        ledger::append_entry_on(
            &txn,
            NewLedgerEntry {
                account_id: account.id,
                kind: LedgerEntryKind::ConsignmentSettle,
                amount: total_returned,
                balance_after: account.balance,
                effective_on: today,
                reference_id: Some(consignment_id),
                breakdown: Some(breakdown),
                note: Some(format!("consignment {} settled", header.number)),
            },
        )
        .await?;

        let mut active: consignment::ActiveModel = header.into();
        active.status = Set(ConsignmentStatus::Settled);
        active.settled_at = Set(Some(now));
        active.total_sold_value = Set(total_sold);
        active.total_returned_value = Set(total_returned);
        active.updated_at = Set(now);
        let settled = active.update(&txn).await?;

        txn.commit().await?;

        info!(%consignment_id, %total_sold, %total_returned, "consignment settled");
        self.event_sender
            .send_or_log(Event::ConsignmentSettled {
                consignment_id,
                total_sold,
                total_returned,
            })
            .await;

        Ok(ConsignmentWithLines {
            consignment: settled,
            lines: settled_lines,
        })
    }

    /// Administratively closes a consignment without touching stock or
    /// balances. Fails with `Conflict` when it is already terminal.
    #[instrument(skip(self))]
    pub async fn close_consignment(
        &self,
        consignment_id: Uuid,
    ) -> Result<consignment::Model, ServiceError> {
        consignment::Entity::find_by_id(consignment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Consignment {} not found", consignment_id))
            })?;

        let now = Utc::now();
        let fenced = consignment::Entity::update_many()
            .set(consignment::ActiveModel {
                status: Set(ConsignmentStatus::Closed),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(consignment::Column::Id.eq(consignment_id))
            .filter(consignment::Column::Status.is_in([
                ConsignmentStatus::Issued,
                ConsignmentStatus::Overdue,
            ]))
            .exec(&*self.db)
            .await?;
        if fenced.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "consignment {} was already settled or closed",
                consignment_id
            )));
        }

        self.event_sender
            .send_or_log(Event::ConsignmentClosed(consignment_id))
            .await;

        consignment::Entity::find_by_id(consignment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Consignment {} not found", consignment_id))
            })
    }

    /// Flips every `Issued` consignment past its expected return date to
    /// `Overdue`. Returns how many rows flipped.
    pub async fn mark_overdue(&self) -> Result<u64, ServiceError> {
        let today = Utc::now().date_naive();
        let swept = consignment::Entity::update_many()
            .set(consignment::ActiveModel {
                status: Set(ConsignmentStatus::Overdue),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(consignment::Column::Status.eq(ConsignmentStatus::Issued))
            .filter(consignment::Column::ExpectedReturnOn.lt(today))
            .exec(&*self.db)
            .await?;

        if swept.rows_affected > 0 {
            self.event_sender
                .send_or_log(Event::ConsignmentsMarkedOverdue {
                    count: swept.rows_affected,
                })
                .await;
        }

        Ok(swept.rows_affected)
    }

    /// Fetches a consignment with its lines.
    pub async fn get_consignment(
        &self,
        consignment_id: Uuid,
    ) -> Result<ConsignmentWithLines, ServiceError> {
        let header = consignment::Entity::find_by_id(consignment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Consignment {} not found", consignment_id))
            })?;
        let lines = consignment_line::Entity::find()
            .filter(consignment_line::Column::ConsignmentId.eq(consignment_id))
            .order_by_asc(consignment_line::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(ConsignmentWithLines {
            consignment: header,
            lines,
        })
    }

    /// Lists consignments newest first, after running the overdue sweep.
    #[instrument(skip(self))]
    pub async fn list_consignments(
        &self,
        filter: ConsignmentFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<consignment::Model>, ServiceError> {
        self.mark_overdue().await?;

        let mut query =
            consignment::Entity::find().order_by_desc(consignment::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(consignment::Column::Status.eq(status));
        }
        if let Some(person) = filter.person_name.as_deref() {
            query = query.filter(consignment::Column::PersonName.contains(person));
        }

        let (page_number, per_page) = page.resolve(&self.config);
        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page_number - 1).await?;

        Ok(PaginatedResponse::new(items, total, page_number, per_page))
    }
}

/// Terminal-state settlement call: re-applies requested value overrides to
/// the stored lines and totals, with no stock, balance, or ledger effect.
async fn reapply_overrides(
    txn: &sea_orm::DatabaseTransaction,
    header: consignment::Model,
    stored_lines: Vec<consignment_line::Model>,
    by_item: &HashMap<Uuid, SettleLineInput>,
) -> Result<ConsignmentWithLines, ServiceError> {
    let now = Utc::now();
    let mut lines = Vec::with_capacity(stored_lines.len());
    let mut changed = false;

    for line in stored_lines {
        let override_value = by_item.get(&line.item_id).and_then(|i| i.returned_value);
        match override_value {
            Some(value) if value != line.returned_value => {
                let mut active: consignment_line::ActiveModel = line.into();
                active.returned_value = Set(value);
                active.updated_at = Set(now);
                lines.push(active.update(txn).await?);
                changed = true;
            }
            _ => lines.push(line),
        }
    }

    if !changed {
        return Ok(ConsignmentWithLines {
            consignment: header,
            lines,
        });
    }

    let total_returned: Decimal = lines.iter().map(|l| l.returned_value).sum();
    let mut active: consignment::ActiveModel = header.into();
    active.total_returned_value = Set(total_returned);
    active.updated_at = Set(now);
    let updated = active.update(txn).await?;

    Ok(ConsignmentWithLines {
        consignment: updated,
        lines,
    })
}

async fn insert_sale(
    txn: &sea_orm::DatabaseTransaction,
    consignment_id: Uuid,
    item_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    sold_on: NaiveDate,
) -> Result<settlement_sale::Model, ServiceError> {
    let sale = settlement_sale::ActiveModel {
        id: Set(Uuid::new_v4()),
        invoice_number: Set(sequences::generate_invoice_number()),
        consignment_id: Set(consignment_id),
        item_id: Set(item_id),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        total_value: Set(unit_price * Decimal::from(quantity)),
        sold_on: Set(sold_on),
        created_at: Set(Utc::now()),
    };
    Ok(sale.insert(txn).await?)
}

async fn serial_for(
    txn: &sea_orm::DatabaseTransaction,
    item_id: Uuid,
) -> Result<String, ServiceError> {
    let item = item::Entity::find_by_id(item_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))?;
    Ok(item.serial_code)
}
