//! Point-in-time balance resolver for reporting.
//!
//! Reads only: historical balances come from ledger-entry snapshots, never
//! from replaying deltas or mutating state.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::account::{self, AccountKind};
use crate::errors::ServiceError;
use crate::services::ledger;

/// One account's balance as presented to reporting.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub account_id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    pub balance: Decimal,
}

impl AccountBalance {
    fn new(account: &account::Model, balance: Decimal) -> Self {
        Self {
            account_id: account.id,
            name: account.name.clone(),
            kind: account.kind,
            balance,
        }
    }
}

/// Accounts split into what is owed to the business vs. what it owes.
#[derive(Debug, Clone, Serialize)]
pub struct BalancePartition {
    /// Balances `≥ 0`: parties owing the business, largest first.
    pub receivable: Vec<AccountBalance>,
    /// Balances `< 0`: parties the business owes, most negative first.
    pub payable: Vec<AccountBalance>,
    pub total_receivable: Decimal,
    pub total_payable: Decimal,
}

impl BalancePartition {
    fn build(mut balances: Vec<AccountBalance>) -> Self {
        balances.sort_by(|a, b| b.balance.cmp(&a.balance));
        let (receivable, payable): (Vec<_>, Vec<_>) = balances
            .into_iter()
            .partition(|b| b.balance >= Decimal::ZERO);
        let mut payable = payable;
        payable.reverse();

        let total_receivable = receivable.iter().map(|b| b.balance).sum();
        let total_payable = payable.iter().map(|b| b.balance).sum();
        Self {
            receivable,
            payable,
            total_receivable,
            total_payable,
        }
    }
}

/// Read-only reporting over accounts and the transaction log.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// The account's balance just before the cutoff date, reconstructed from
    /// its latest ledger-entry snapshot strictly before that date.
    #[instrument(skip(self))]
    pub async fn balance_as_of(
        &self,
        account_id: Uuid,
        cutoff: NaiveDate,
    ) -> Result<Decimal, ServiceError> {
        account::Entity::find_by_id(account_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AccountNotFound(account_id.to_string()))?;

        ledger::balance_as_of_on(&*self.db, account_id, cutoff).await
    }

    /// Every account's balance just before the cutoff date, partitioned into
    /// receivable and payable buckets.
    #[instrument(skip(self))]
    pub async fn balances_as_of(
        &self,
        cutoff: NaiveDate,
    ) -> Result<BalancePartition, ServiceError> {
        let accounts = account::Entity::find().all(&*self.db).await?;

        let mut balances = Vec::with_capacity(accounts.len());
        for acct in &accounts {
            let balance = ledger::balance_as_of_on(&*self.db, acct.id, cutoff).await?;
            balances.push(AccountBalance::new(acct, balance));
        }

        Ok(BalancePartition::build(balances))
    }

    /// Accounts currently owing the business, largest balance first.
    #[instrument(skip(self))]
    pub async fn list_receivables(&self) -> Result<Vec<AccountBalance>, ServiceError> {
        let accounts = account::Entity::find()
            .filter(account::Column::Balance.gte(Decimal::ZERO))
            .order_by_desc(account::Column::Balance)
            .all(&*self.db)
            .await?;

        Ok(accounts
            .iter()
            .map(|a| AccountBalance::new(a, a.balance))
            .collect())
    }

    /// Accounts the business currently owes, most negative balance first.
    #[instrument(skip(self))]
    pub async fn list_payables(&self) -> Result<Vec<AccountBalance>, ServiceError> {
        let accounts = account::Entity::find()
            .filter(account::Column::Balance.lt(Decimal::ZERO))
            .order_by_asc(account::Column::Balance)
            .all(&*self.db)
            .await?;

        Ok(accounts
            .iter()
            .map(|a| AccountBalance::new(a, a.balance))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(name: &str, value: i64) -> AccountBalance {
        AccountBalance {
            account_id: Uuid::new_v4(),
            name: name.to_string(),
            kind: AccountKind::Dealer,
            balance: Decimal::from(value),
        }
    }

    #[test]
    fn partition_splits_on_sign_and_orders_by_magnitude() {
        let partition = BalancePartition::build(vec![
            balance("a", -50),
            balance("b", 200),
            balance("c", 0),
            balance("d", -300),
            balance("e", 75),
        ]);

        let receivable: Vec<i64> = partition
            .receivable
            .iter()
            .map(|b| b.balance.try_into().unwrap())
            .collect();
        let payable: Vec<i64> = partition
            .payable
            .iter()
            .map(|b| b.balance.try_into().unwrap())
            .collect();

        assert_eq!(receivable, vec![200, 75, 0]);
        assert_eq!(payable, vec![-300, -50]);
        assert_eq!(partition.total_receivable, Decimal::from(275));
        assert_eq!(partition.total_payable, Decimal::from(-350));
    }
}
