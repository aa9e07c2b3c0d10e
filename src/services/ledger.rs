//! Append-only transaction log.
//!
//! Every balance-affecting event gets exactly one entry carrying a snapshot
//! of the account balance after the event. The snapshot is supplied by the
//! caller, which applied the balance mutation inside the same transaction;
//! the log never recomputes it. Nothing in this crate updates or deletes an
//! entry once written.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::{account, ledger_entry};
use crate::errors::ServiceError;
use crate::{PageRequest, PaginatedResponse};

/// One item position inside an entry's JSON breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub item_id: Uuid,
    pub serial_code: String,
    pub qty: i32,
    pub unit_value: Decimal,
    pub value: Decimal,
}

/// Input for [`append_entry_on`]; `balance_after` is the caller's snapshot.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: Uuid,
    pub kind: ledger_entry::LedgerEntryKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub effective_on: NaiveDate,
    pub reference_id: Option<Uuid>,
    pub breakdown: Option<Vec<BreakdownLine>>,
    pub note: Option<String>,
}

/// Writes one immutable entry on the caller's connection.
pub(crate) async fn append_entry_on<C: ConnectionTrait>(
    conn: &C,
    entry: NewLedgerEntry,
) -> Result<ledger_entry::Model, ServiceError> {
    let breakdown = entry
        .breakdown
        .map(|lines| serde_json::to_value(lines))
        .transpose()?;

    let model = ledger_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(entry.account_id),
        kind: Set(entry.kind),
        amount: Set(entry.amount),
        balance_after: Set(entry.balance_after),
        effective_on: Set(entry.effective_on),
        recorded_at: Set(Utc::now()),
        reference_id: Set(entry.reference_id),
        breakdown: Set(breakdown),
        note: Set(entry.note),
    };

    Ok(model.insert(conn).await?)
}

/// `balance_after` of the account's most recent entry strictly before the
/// cutoff date; zero if the account has no entry that old.
pub(crate) async fn balance_as_of_on<C: ConnectionTrait>(
    conn: &C,
    account_id: Uuid,
    cutoff: NaiveDate,
) -> Result<Decimal, ServiceError> {
    let latest = ledger_entry::Entity::find()
        .filter(ledger_entry::Column::AccountId.eq(account_id))
        .filter(ledger_entry::Column::EffectiveOn.lt(cutoff))
        .order_by_desc(ledger_entry::Column::EffectiveOn)
        .order_by_desc(ledger_entry::Column::RecordedAt)
        .one(conn)
        .await?;

    Ok(latest.map(|e| e.balance_after).unwrap_or(Decimal::ZERO))
}

/// Read access to the transaction log.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DbPool>,
    config: Arc<AppConfig>,
}

impl LedgerService {
    pub fn new(db: Arc<DbPool>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Lists an account's entries, newest first.
    #[instrument(skip(self))]
    pub async fn entries_for_account(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<PaginatedResponse<ledger_entry::Model>, ServiceError> {
        account::Entity::find_by_id(account_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AccountNotFound(account_id.to_string()))?;

        let (page_number, per_page) = page.resolve(&self.config);
        let paginator = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::AccountId.eq(account_id))
            .order_by_desc(ledger_entry::Column::EffectiveOn)
            .order_by_desc(ledger_entry::Column::RecordedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page_number - 1).await?;

        Ok(PaginatedResponse::new(items, total, page_number, per_page))
    }
}
