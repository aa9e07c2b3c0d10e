use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One item position on a consignment.
///
/// `unit_price` is captured from the item at issue time so later price edits
/// do not reprice an open consignment. After settlement the quantities obey
/// `issued_qty = sold_qty + returned_qty`; manual additions (items sold at
/// settlement that were never issued) keep the identity by carrying
/// `issued_qty = 0` and a negative `returned_qty`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consignment_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consignment_id: Uuid,
    pub item_id: Uuid,
    pub issued_qty: i32,
    pub sold_qty: i32,
    pub returned_qty: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub issued_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub sold_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub returned_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consignment::Entity",
        from = "Column::ConsignmentId",
        to = "super::consignment::Column::Id"
    )]
    Consignment,
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::consignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consignment.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Quantity not yet accounted for by a sale or return. Zero once the
    /// consignment settles.
    pub fn outstanding_qty(&self) -> i32 {
        self.issued_qty - self.sold_qty - self.returned_qty
    }
}
