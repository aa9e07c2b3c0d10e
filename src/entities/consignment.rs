use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A batch of items handed to a person for resale.
///
/// Owns its line items exclusively (see [`super::consignment_line`]).
/// Status walks `Issued → Overdue → {Settled, Closed}`; `Overdue` is applied
/// lazily by list queries, never by a background job.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable sequential number, `LS-0001` style.
    pub number: String,
    pub person_name: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    /// The consignment agent's ledger account.
    pub account_id: Uuid,
    pub issued_on: NaiveDate,
    pub expected_return_on: NaiveDate,
    pub status: ConsignmentStatus,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_issued_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_sold_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_returned_value: Decimal,
    #[sea_orm(nullable)]
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consignment_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::settlement_sale::Entity")]
    Sales,
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::consignment_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::settlement_sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Consignment lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ConsignmentStatus {
    #[sea_orm(string_value = "issued")]
    Issued,
    /// Past its expected return date without settlement.
    #[sea_orm(string_value = "overdue")]
    Overdue,
    #[sea_orm(string_value = "settled")]
    Settled,
    /// Administratively closed without settlement.
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl ConsignmentStatus {
    /// Terminal states accept no further stock or balance mutations.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConsignmentStatus::Settled | ConsignmentStatus::Closed)
    }
}
