//! Human-readable identifier generation.
//!
//! Consignment numbers come from a named counter row incremented with one
//! conditional UPDATE inside the caller's transaction, so concurrent issuers
//! never observe the same value and an aborted issue rolls its increment
//! back. Invoice numbers are timestamp-based and only probabilistically
//! unique.

use chrono::Utc;
use rand::Rng;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entities::sequence;
use crate::errors::ServiceError;

/// Name of the counter row backing consignment numbers, seeded by migration.
pub const CONSIGNMENT_SEQUENCE: &str = "consignment";

/// Atomically increments the named counter and returns its new value.
pub(crate) async fn next_value<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<i64, ServiceError> {
    let updated = sequence::Entity::update_many()
        .col_expr(
            sequence::Column::Current,
            Expr::col(sequence::Column::Current).add(1),
        )
        .filter(sequence::Column::Name.eq(name))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "Sequence {} not found",
            name
        )));
    }

    let row = sequence::Entity::find_by_id(name.to_owned())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Sequence {} not found", name)))?;

    Ok(row.current)
}

/// Draws the next `LS-0001`-style consignment number.
pub(crate) async fn next_consignment_number<C: ConnectionTrait>(
    conn: &C,
) -> Result<String, ServiceError> {
    let value = next_value(conn, CONSIGNMENT_SEQUENCE).await?;
    Ok(format_consignment_number(value))
}

/// Zero-pads to four digits; wider numbers keep all their digits.
pub fn format_consignment_number(value: i64) -> String {
    format!("LS-{:04}", value)
}

/// `INV-LS-YYYYMMDDHHMMSS-NNNN` settlement invoice number.
///
/// Unique with overwhelming probability, not guaranteed; it is a display
/// identifier, not a key.
pub fn generate_invoice_number() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("INV-LS-{}-{:04}", stamp, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn consignment_numbers_are_zero_padded() {
        assert_eq!(format_consignment_number(1), "LS-0001");
        assert_eq!(format_consignment_number(42), "LS-0042");
        assert_eq!(format_consignment_number(9999), "LS-9999");
        assert_eq!(format_consignment_number(10000), "LS-10000");
    }

    #[test]
    fn invoice_numbers_carry_prefix_and_suffix() {
        let invoice = generate_invoice_number();
        assert!(invoice.starts_with("INV-LS-"));
        let suffix = invoice.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    proptest! {
        #[test]
        fn formatted_numbers_sort_like_their_values(a in 1i64..9999, b in 1i64..9999) {
            let (fa, fb) = (format_consignment_number(a), format_consignment_number(b));
            prop_assert_eq!(a.cmp(&b), fa.cmp(&fb));
        }

        #[test]
        fn formatted_numbers_round_trip(value in 1i64..1_000_000) {
            let formatted = format_consignment_number(value);
            let parsed: i64 = formatted.strip_prefix("LS-").unwrap().parse().unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
