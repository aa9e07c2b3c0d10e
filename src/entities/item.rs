use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fungible stock-keeping unit.
///
/// `current_count` is the on-hand quantity and never goes negative;
/// `purchase_count` accumulates every unit ever received from a dealer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub serial_code: String,
    pub name: String,
    pub current_count: i32,
    pub purchase_count: i32,
    /// Per-unit sale price used for consignment valuation.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consignment_line::Entity")]
    ConsignmentLines,
}

impl Related<super::consignment_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsignmentLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
