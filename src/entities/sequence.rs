use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Named atomic counter backing human-readable sequential numbers.
///
/// Incremented with a single conditional UPDATE inside the caller's
/// transaction, so concurrent issuers cannot observe the same value and an
/// aborted operation rolls its increment back.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub current: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
