//! Account ledger: one signed running balance per external party.
//!
//! Identity is the unique `(normalized_name, kind)` index; concurrent
//! find-or-create calls for a new party race into the index and the loser
//! retries as a lookup. Balance sign always agrees with `direction`.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::account::{self, AccountKind, BalanceDirection};
use crate::entities::ledger_entry::{self, LedgerEntryKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::ledger::{self, NewLedgerEntry};
use crate::{PageRequest, PaginatedResponse};

/// Parameters for [`AccountService::find_or_create`].
#[derive(Debug, Clone)]
pub struct FindOrCreateAccountInput {
    pub name: String,
    pub phone: Option<String>,
    pub kind: AccountKind,
    /// Magnitude of the starting balance for a new account; ignored when the
    /// account already exists.
    pub initial_balance: Decimal,
    /// Explicit direction. On create it signs `initial_balance`; on an
    /// existing account it re-signs the stored balance.
    pub direction: Option<BalanceDirection>,
}

impl FindOrCreateAccountInput {
    /// Lookup-only input: zero starting balance, no direction override.
    pub fn lookup(name: &str, phone: Option<String>, kind: AccountKind) -> Self {
        Self {
            name: name.to_string(),
            phone,
            kind,
            initial_balance: Decimal::ZERO,
            direction: None,
        }
    }
}

/// Trimmed, lowercased form of a party name; the identity key.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolves an account by `(normalized_name, kind)` or creates it, on the
/// caller's connection. Returns the model and whether a row was created.
pub(crate) async fn find_or_create_on<C: ConnectionTrait>(
    conn: &C,
    input: FindOrCreateAccountInput,
) -> Result<(account::Model, bool), ServiceError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "account name must not be empty".to_string(),
        ));
    }
    let normalized = normalize_name(name);

    if let Some(existing) = account::Entity::find()
        .filter(account::Column::NormalizedName.eq(normalized.clone()))
        .filter(account::Column::Kind.eq(input.kind))
        .one(conn)
        .await?
    {
        let updated = update_existing(conn, existing, input.phone, input.direction).await?;
        return Ok((updated, false));
    }

    let direction = input
        .direction
        .unwrap_or_else(|| BalanceDirection::from_balance(input.initial_balance));
    let balance = direction.signed(input.initial_balance);

    let candidate = account::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        normalized_name: Set(normalized.clone()),
        phone: Set(input.phone.clone()),
        kind: Set(input.kind),
        balance: Set(balance),
        direction: Set(direction),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    };

    match candidate.insert(conn).await {
        Ok(created) => Ok((created, true)),
        // Lost the unique-index race: another caller created the party
        // between our lookup and insert. Retry as a lookup + update.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            let existing = account::Entity::find()
                .filter(account::Column::NormalizedName.eq(normalized))
                .filter(account::Column::Kind.eq(input.kind))
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::AccountNotFound(name.to_string()))?;
            let updated = update_existing(conn, existing, input.phone, input.direction).await?;
            Ok((updated, false))
        }
        Err(err) => Err(err.into()),
    }
}

async fn update_existing<C: ConnectionTrait>(
    conn: &C,
    existing: account::Model,
    phone: Option<String>,
    direction: Option<BalanceDirection>,
) -> Result<account::Model, ServiceError> {
    let phone_changed = phone.is_some() && phone != existing.phone;
    let direction_changed = direction.is_some_and(|d| d != existing.direction);
    if !phone_changed && !direction_changed {
        return Ok(existing);
    }

    let balance = existing.balance;
    let mut active: account::ActiveModel = existing.into();
    if phone_changed {
        active.phone = Set(phone);
    }
    if let Some(direction) = direction {
        // A declared direction re-signs the stored balance so the sign
        // invariant holds through the update.
        active.direction = Set(direction);
        active.balance = Set(direction.signed(balance));
    }
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Applies a signed delta to the account balance on the caller's connection.
///
/// Direction is re-derived from the resulting sign unless the caller passes
/// an explicit hint. Returns the updated account.
pub(crate) async fn adjust_balance_on<C: ConnectionTrait>(
    conn: &C,
    account_id: Uuid,
    delta: Decimal,
    direction_hint: Option<BalanceDirection>,
) -> Result<account::Model, ServiceError> {
    let existing = account::Entity::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::AccountNotFound(account_id.to_string()))?;

    let new_balance = existing.balance + delta;
    let direction = direction_hint.unwrap_or_else(|| BalanceDirection::from_balance(new_balance));

    let mut active: account::ActiveModel = existing.into();
    active.balance = Set(new_balance);
    active.direction = Set(direction);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Sets the balance to `±absolute` per the declared direction.
pub(crate) async fn set_balance_on<C: ConnectionTrait>(
    conn: &C,
    account_id: Uuid,
    absolute: Decimal,
    direction: BalanceDirection,
) -> Result<account::Model, ServiceError> {
    let existing = account::Entity::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::AccountNotFound(account_id.to_string()))?;

    let mut active: account::ActiveModel = existing.into();
    active.balance = Set(direction.signed(absolute));
    active.direction = Set(direction);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Service facade over party accounts.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    config: Arc<AppConfig>,
}

impl AccountService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Case-insensitive lookup by `(name, kind)`, creating the account when
    /// no row matches.
    #[instrument(skip(self))]
    pub async fn find_or_create(
        &self,
        input: FindOrCreateAccountInput,
    ) -> Result<account::Model, ServiceError> {
        let (model, created) = find_or_create_on(&*self.db, input).await?;

        if created {
            info!(account_id = %model.id, name = %model.name, "account created");
            self.event_sender
                .send_or_log(Event::AccountCreated {
                    account_id: model.id,
                    kind: model.kind,
                })
                .await;
        }

        Ok(model)
    }

    /// Manual opening-balance entry: sets the balance to `±absolute` per
    /// direction and appends the matching `OpeningBalance` ledger entry, in
    /// one transaction.
    #[instrument(skip(self))]
    pub async fn set_opening_balance(
        &self,
        account_id: Uuid,
        absolute: Decimal,
        direction: BalanceDirection,
        effective_on: Option<NaiveDate>,
    ) -> Result<(account::Model, ledger_entry::Model), ServiceError> {
        if absolute < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "opening balance magnitude must not be negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let account = set_balance_on(&txn, account_id, absolute, direction).await?;
        let entry = ledger::append_entry_on(
            &txn,
            NewLedgerEntry {
                account_id,
                kind: LedgerEntryKind::OpeningBalance,
                amount: absolute,
                balance_after: account.balance,
                effective_on: effective_on.unwrap_or_else(|| Utc::now().date_naive()),
                reference_id: None,
                breakdown: None,
                note: None,
            },
        )
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OpeningBalanceSet {
                account_id,
                balance: account.balance,
            })
            .await;

        Ok((account, entry))
    }

    /// Fetches one account by id.
    pub async fn get_account(&self, account_id: Uuid) -> Result<account::Model, ServiceError> {
        account::Entity::find_by_id(account_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AccountNotFound(account_id.to_string()))
    }

    /// Lists accounts ordered by name, optionally filtered by kind.
    #[instrument(skip(self))]
    pub async fn list_accounts(
        &self,
        kind: Option<AccountKind>,
        page: PageRequest,
    ) -> Result<PaginatedResponse<account::Model>, ServiceError> {
        let mut query = account::Entity::find().order_by_asc(account::Column::Name);
        if let Some(kind) = kind {
            query = query.filter(account::Column::Kind.eq(kind));
        }

        let (page_number, per_page) = page.resolve(&self.config);
        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page_number - 1).await?;

        Ok(PaginatedResponse::new(items, total, page_number, per_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_name("  Ravi Kumar "), "ravi kumar");
        assert_eq!(normalize_name("RAVI"), "ravi");
    }

    proptest! {
        #[test]
        fn signed_balance_agrees_with_direction(magnitude in 0i64..1_000_000) {
            let magnitude = Decimal::from(magnitude);
            prop_assert!(BalanceDirection::TheyOweUs.signed(magnitude) >= Decimal::ZERO);
            prop_assert!(BalanceDirection::WeOweThem.signed(magnitude) <= Decimal::ZERO);
        }

        #[test]
        fn derived_direction_matches_sign(cents in -1_000_000i64..1_000_000) {
            let balance = Decimal::new(cents, 2);
            let direction = BalanceDirection::from_balance(balance);
            if balance > Decimal::ZERO {
                prop_assert_eq!(direction, BalanceDirection::TheyOweUs);
            } else {
                prop_assert_eq!(direction, BalanceDirection::WeOweThem);
            }
        }
    }
}
