use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One immutable record of a balance-affecting event.
///
/// Entries are append-only: nothing in this crate updates or deletes a row
/// once written. `balance_after` snapshots the account balance immediately
/// after the event was applied by the same transaction that wrote the entry;
/// point-in-time queries order by `(effective_on, recorded_at)` and read the
/// snapshot instead of re-summing deltas.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: LedgerEntryKind,
    /// Signed value of the event (see [`Model::signed_delta`] for how each
    /// kind moves the balance).
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    /// Account balance right after this event.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_after: Decimal,
    /// Business date the event belongs to (may be backdated by the caller).
    pub effective_on: NaiveDate,
    /// Wall-clock write time; tiebreaker for same-day ordering.
    pub recorded_at: DateTime<Utc>,
    /// Originating consignment, when the event came from one.
    #[sea_orm(nullable)]
    pub reference_id: Option<Uuid>,
    /// Per-item breakdown of the event, for display.
    #[sea_orm(column_type = "Json", nullable)]
    pub breakdown: Option<Json>,
    #[sea_orm(nullable)]
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The balance-affecting events the ledger records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum LedgerEntryKind {
    /// Manual opening balance; `balance_after` is the absolute value set.
    #[sea_orm(string_value = "opening_balance")]
    OpeningBalance,
    /// Goods received from a dealer on credit.
    #[sea_orm(string_value = "stock_in")]
    StockIn,
    /// Goods issued on consignment; the agent now owes their value.
    #[sea_orm(string_value = "consignment_issue")]
    ConsignmentIssue,
    /// Consignment settled; the returned portion no longer owed.
    #[sea_orm(string_value = "consignment_settle")]
    ConsignmentSettle,
}

impl Model {
    /// How this entry moved the balance, or `None` for kinds that set it
    /// absolutely rather than applying a delta.
    pub fn signed_delta(&self) -> Option<Decimal> {
        match self.kind {
            LedgerEntryKind::OpeningBalance => None,
            LedgerEntryKind::ConsignmentIssue => Some(self.amount),
            LedgerEntryKind::StockIn | LedgerEntryKind::ConsignmentSettle => Some(-self.amount),
        }
    }
}
