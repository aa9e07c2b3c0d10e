use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One external party with a running credit/debit relationship.
///
/// Identity is `(normalized_name, kind)` — enforced by a unique index, so two
/// concurrent creates for the same party collapse into one row. `balance` is
/// signed; its sign always agrees with `direction` (positive balances are
/// owed *to* the business).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// Trimmed and lowercased `name`, the lookup key.
    pub normalized_name: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    pub kind: AccountKind,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance: Decimal,
    pub direction: BalanceDirection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// What kind of external party the account represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum AccountKind {
    /// Supplying dealer the business buys stock from.
    #[sea_orm(string_value = "dealer")]
    Dealer,
    /// Person goods are consigned to for resale (a "line stocker").
    #[sea_orm(string_value = "consignment_agent")]
    ConsignmentAgent,
}

/// Which party owes which; fixes the sign convention of `balance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum BalanceDirection {
    #[sea_orm(string_value = "they_owe_us")]
    TheyOweUs,
    #[sea_orm(string_value = "we_owe_them")]
    WeOweThem,
}

impl BalanceDirection {
    /// Direction implied by a balance: positive means the party owes the
    /// business, zero and negative mean the business owes the party.
    pub fn from_balance(balance: Decimal) -> Self {
        if balance > Decimal::ZERO {
            BalanceDirection::TheyOweUs
        } else {
            BalanceDirection::WeOweThem
        }
    }

    /// Applies this direction's sign to an absolute amount.
    pub fn signed(self, magnitude: Decimal) -> Decimal {
        match self {
            BalanceDirection::TheyOweUs => magnitude.abs(),
            BalanceDirection::WeOweThem => -magnitude.abs(),
        }
    }
}
