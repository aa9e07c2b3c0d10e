mod common;

use assert_matches::assert_matches;
use aurum_ledger::{
    entities::{
        account,
        consignment::{self, ConsignmentStatus},
        ledger_entry::{self, LedgerEntryKind},
        settlement_sale,
    },
    errors::ServiceError,
    services::consignments::{
        ConsignmentFilter, IssueConsignmentInput, IssueLineInput, SettleLineInput,
    },
    PageRequest,
};
use chrono::{Duration, NaiveDate, Utc};
use common::TestContext;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

fn in_days(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

fn issue_input(item_id: Uuid, qty: i32) -> IssueConsignmentInput {
    IssueConsignmentInput {
        person_name: "Ravi".to_string(),
        phone: Some("98765".to_string()),
        lines: vec![IssueLineInput { item_id, qty }],
        issued_on: None,
        expected_return_on: in_days(30),
    }
}

fn sold(item_id: Uuid, sold_qty: i32) -> SettleLineInput {
    SettleLineInput {
        item_id,
        sold_qty,
        returned_value: None,
    }
}

#[tokio::test]
async fn issuing_moves_stock_to_the_agents_balance() {
    // Scenario A: count 5 issued in full.
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(item.id, 5))
        .await
        .unwrap();

    assert_eq!(issued.consignment.number, "LS-0001");
    assert_eq!(issued.consignment.status, ConsignmentStatus::Issued);
    assert_eq!(issued.consignment.total_issued_value, dec!(500));
    assert_eq!(issued.lines.len(), 1);
    assert_eq!(issued.lines[0].issued_qty, 5);
    assert_eq!(issued.lines[0].unit_price, dec!(100));
    assert_eq!(issued.lines[0].issued_value, dec!(500));

    let item = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item.current_count, 0);

    let agent = services
        .accounts
        .get_account(issued.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(500));

    let entries = ledger_entry::Entity::find()
        .filter(ledger_entry::Column::AccountId.eq(agent.id))
        .all(&*ctx.state.db)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LedgerEntryKind::ConsignmentIssue);
    assert_eq!(entries[0].amount, dec!(500));
    assert_eq!(entries[0].balance_after, dec!(500));
    assert_eq!(entries[0].reference_id, Some(issued.consignment.id));
}

#[tokio::test]
async fn consignment_numbers_are_sequential() {
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 10).await;
    let consignments = &ctx.state.services.consignments;

    let first = consignments
        .issue_consignment(issue_input(item.id, 2))
        .await
        .unwrap();
    let second = consignments
        .issue_consignment(issue_input(item.id, 3))
        .await
        .unwrap();
    assert_eq!(first.consignment.number, "LS-0001");
    assert_eq!(second.consignment.number, "LS-0002");
}

#[tokio::test]
async fn settlement_returns_stock_and_reduces_the_balance() {
    // Scenario B: issue 5 at 100, sell 3.
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(item.id, 5))
        .await
        .unwrap();

    let settled = services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, 3)])
        .await
        .unwrap();

    assert_eq!(settled.consignment.status, ConsignmentStatus::Settled);
    assert!(settled.consignment.settled_at.is_some());
    assert_eq!(settled.consignment.total_sold_value, dec!(300));
    assert_eq!(settled.consignment.total_returned_value, dec!(200));

    // Conservation: issued = sold + returned.
    let line = &settled.lines[0];
    assert_eq!(line.issued_qty, line.sold_qty + line.returned_qty);
    assert_eq!(line.sold_qty, 3);
    assert_eq!(line.returned_qty, 2);
    assert_eq!(line.sold_value, dec!(300));
    assert_eq!(line.returned_value, dec!(200));

    let item = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item.current_count, 2);

    let agent = services
        .accounts
        .get_account(settled.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(300));

    let sales = settlement_sale::Entity::find()
        .filter(settlement_sale::Column::ConsignmentId.eq(settled.consignment.id))
        .all(&*ctx.state.db)
        .await
        .unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].quantity, 3);
    assert_eq!(sales[0].unit_price, dec!(100));
    assert_eq!(sales[0].total_value, dec!(300));
    assert!(sales[0].invoice_number.starts_with("INV-LS-"));

    let entries = ledger_entry::Entity::find()
        .filter(ledger_entry::Column::AccountId.eq(agent.id))
        .all(&*ctx.state.db)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    let settle_entry = entries
        .iter()
        .find(|e| e.kind == LedgerEntryKind::ConsignmentSettle)
        .unwrap();
    assert_eq!(settle_entry.amount, dec!(200));
    assert_eq!(settle_entry.balance_after, dec!(300));
}

#[tokio::test]
async fn repeated_settlement_is_a_no_op() {
    // Scenario C: the same settlement call twice.
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(item.id, 5))
        .await
        .unwrap();
    services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, 3)])
        .await
        .unwrap();

    let again = services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, 3)])
        .await
        .unwrap();
    assert_eq!(again.consignment.status, ConsignmentStatus::Settled);
    assert_eq!(again.consignment.total_returned_value, dec!(200));

    let item = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item.current_count, 2);
    let agent = services
        .accounts
        .get_account(again.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(300));

    let entries = ledger_entry::Entity::find().all(&*ctx.state.db).await.unwrap();
    assert_eq!(entries.len(), 2);
    let sales = settlement_sale::Entity::find().all(&*ctx.state.db).await.unwrap();
    assert_eq!(sales.len(), 1);
}

#[tokio::test]
async fn repeated_settlement_reapplies_value_overrides_only() {
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(item.id, 5))
        .await
        .unwrap();
    services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, 3)])
        .await
        .unwrap();

    // Second call overrides the returned value; stock and balance stay put.
    let corrected = services
        .consignments
        .settle_consignment(
            issued.consignment.id,
            vec![SettleLineInput {
                item_id: item.id,
                sold_qty: 3,
                returned_value: Some(dec!(180)),
            }],
        )
        .await
        .unwrap();
    assert_eq!(corrected.lines[0].returned_value, dec!(180));
    assert_eq!(corrected.consignment.total_returned_value, dec!(180));

    let item = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item.current_count, 2);
    let agent = services
        .accounts
        .get_account(corrected.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(300));
}

#[tokio::test]
async fn failed_issue_leaves_no_partial_state() {
    // Atomicity: the second line lacks stock, so nothing applies.
    let ctx = TestContext::new().await;
    let plenty = ctx.seed_item("RING-01", dec!(100), 10).await;
    let scarce = ctx.seed_item("RING-02", dec!(200), 1).await;
    let services = &ctx.state.services;

    let err = services
        .consignments
        .issue_consignment(IssueConsignmentInput {
            person_name: "Ravi".to_string(),
            phone: None,
            lines: vec![
                IssueLineInput {
                    item_id: plenty.id,
                    qty: 4,
                },
                IssueLineInput {
                    item_id: scarce.id,
                    qty: 2,
                },
            ],
            issued_on: None,
            expected_return_on: in_days(30),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let plenty = services.inventory.get_item(plenty.id).await.unwrap();
    assert_eq!(plenty.current_count, 10);
    let scarce = services.inventory.get_item(scarce.id).await.unwrap();
    assert_eq!(scarce.current_count, 1);

    let accounts = account::Entity::find().all(&*ctx.state.db).await.unwrap();
    assert!(accounts.is_empty());
    let consignments = consignment::Entity::find().all(&*ctx.state.db).await.unwrap();
    assert!(consignments.is_empty());
    let entries = ledger_entry::Entity::find().all(&*ctx.state.db).await.unwrap();
    assert!(entries.is_empty());

    // The sequence increment rolled back with the transaction.
    let issued = services
        .consignments
        .issue_consignment(issue_input(plenty.id, 1))
        .await
        .unwrap();
    assert_eq!(issued.consignment.number, "LS-0001");
}

#[tokio::test]
async fn over_sale_is_rejected_before_any_effect() {
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(item.id, 5))
        .await
        .unwrap();

    let err = services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, 6)])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OverSale(_));

    let unchanged = services
        .consignments
        .get_consignment(issued.consignment.id)
        .await
        .unwrap();
    assert_eq!(unchanged.consignment.status, ConsignmentStatus::Issued);
    let item = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item.current_count, 0);

    let err = services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, -1)])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidQuantity(_));

    let err = services
        .consignments
        .settle_consignment(Uuid::new_v4(), vec![])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn overdue_consignments_flip_lazily_on_list() {
    // Scenario D: expected return already past.
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(IssueConsignmentInput {
            person_name: "Ravi".to_string(),
            phone: None,
            lines: vec![IssueLineInput {
                item_id: item.id,
                qty: 2,
            }],
            issued_on: Some(in_days(-10)),
            expected_return_on: in_days(-3),
        })
        .await
        .unwrap();
    assert_eq!(issued.consignment.status, ConsignmentStatus::Issued);

    let page = services
        .consignments
        .list_consignments(ConsignmentFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].status, ConsignmentStatus::Overdue);

    // Overdue consignments can still settle.
    let settled = services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, 1)])
        .await
        .unwrap();
    assert_eq!(settled.consignment.status, ConsignmentStatus::Settled);
}

#[tokio::test]
async fn list_filters_by_status_and_person() {
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 10).await;
    let services = &ctx.state.services;

    let ravi = services
        .consignments
        .issue_consignment(issue_input(item.id, 2))
        .await
        .unwrap();
    services
        .consignments
        .issue_consignment(IssueConsignmentInput {
            person_name: "Meena".to_string(),
            phone: None,
            lines: vec![IssueLineInput {
                item_id: item.id,
                qty: 3,
            }],
            issued_on: None,
            expected_return_on: in_days(15),
        })
        .await
        .unwrap();
    services
        .consignments
        .settle_consignment(ravi.consignment.id, vec![sold(item.id, 2)])
        .await
        .unwrap();

    let settled = services
        .consignments
        .list_consignments(
            ConsignmentFilter {
                status: Some(ConsignmentStatus::Settled),
                person_name: None,
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(settled.total, 1);
    assert_eq!(settled.items[0].person_name, "Ravi");

    let meena = services
        .consignments
        .list_consignments(
            ConsignmentFilter {
                status: None,
                person_name: Some("Meena".to_string()),
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(meena.total, 1);
    assert_eq!(meena.items[0].status, ConsignmentStatus::Issued);
}

#[tokio::test]
async fn manual_additions_settle_from_on_hand_stock() {
    let ctx = TestContext::new().await;
    let issued_item = ctx.seed_item("RING-01", dec!(100), 2).await;
    let extra_item = ctx.seed_item("CHAIN-01", dec!(50), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(issued_item.id, 2))
        .await
        .unwrap();

    let settled = services
        .consignments
        .settle_consignment(
            issued.consignment.id,
            vec![sold(issued_item.id, 1), sold(extra_item.id, 2)],
        )
        .await
        .unwrap();

    assert_eq!(settled.lines.len(), 2);
    let manual = settled
        .lines
        .iter()
        .find(|l| l.item_id == extra_item.id)
        .unwrap();
    assert_eq!(manual.issued_qty, 0);
    assert_eq!(manual.sold_qty, 2);
    assert_eq!(manual.returned_qty, -2);
    assert_eq!(manual.sold_value, dec!(100));
    assert_eq!(manual.returned_value, dec!(-100));
    // Conservation holds for manual additions too.
    assert_eq!(manual.issued_qty, manual.sold_qty + manual.returned_qty);

    // The manual sale came straight off the shelf.
    let extra_item = services.inventory.get_item(extra_item.id).await.unwrap();
    assert_eq!(extra_item.current_count, 3);
    let issued_item = services.inventory.get_item(issued_item.id).await.unwrap();
    assert_eq!(issued_item.current_count, 1);

    // Balance: issued 200, returned (100 − 100) = 0, so the agent still
    // owes the full issued value plus the manual sale.
    let agent = services
        .accounts
        .get_account(settled.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(200));

    let sales = settlement_sale::Entity::find().all(&*ctx.state.db).await.unwrap();
    assert_eq!(sales.len(), 2);
}

#[tokio::test]
async fn manual_addition_without_stock_aborts_the_settlement() {
    let ctx = TestContext::new().await;
    let issued_item = ctx.seed_item("RING-01", dec!(100), 2).await;
    let scarce = ctx.seed_item("CHAIN-01", dec!(50), 1).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(issued_item.id, 2))
        .await
        .unwrap();

    let err = services
        .consignments
        .settle_consignment(
            issued.consignment.id,
            vec![sold(issued_item.id, 1), sold(scarce.id, 3)],
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // The status fence rolled back with everything else.
    let unchanged = services
        .consignments
        .get_consignment(issued.consignment.id)
        .await
        .unwrap();
    assert_eq!(unchanged.consignment.status, ConsignmentStatus::Issued);
    assert_eq!(unchanged.lines[0].sold_qty, 0);

    let scarce = services.inventory.get_item(scarce.id).await.unwrap();
    assert_eq!(scarce.current_count, 1);
    let agent = services
        .accounts
        .get_account(issued.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(200));
}

#[tokio::test]
async fn settlement_value_overrides_shape_the_balance_delta() {
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(item.id, 5))
        .await
        .unwrap();

    // Return 2 units but credit only 150 (e.g. damaged goods).
    let settled = services
        .consignments
        .settle_consignment(
            issued.consignment.id,
            vec![SettleLineInput {
                item_id: item.id,
                sold_qty: 3,
                returned_value: Some(dec!(150)),
            }],
        )
        .await
        .unwrap();
    assert_eq!(settled.lines[0].returned_value, dec!(150));
    assert_eq!(settled.consignment.total_returned_value, dec!(150));

    let agent = services
        .accounts
        .get_account(settled.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(350));

    let item = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item.current_count, 2);
}

#[tokio::test]
async fn unlisted_lines_settle_as_fully_returned() {
    let ctx = TestContext::new().await;
    let ring = ctx.seed_item("RING-01", dec!(100), 3).await;
    let chain = ctx.seed_item("CHAIN-01", dec!(50), 4).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(IssueConsignmentInput {
            person_name: "Ravi".to_string(),
            phone: None,
            lines: vec![
                IssueLineInput {
                    item_id: ring.id,
                    qty: 3,
                },
                IssueLineInput {
                    item_id: chain.id,
                    qty: 4,
                },
            ],
            issued_on: None,
            expected_return_on: in_days(30),
        })
        .await
        .unwrap();

    // Only the ring line is mentioned; the chain comes back in full.
    let settled = services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(ring.id, 2)])
        .await
        .unwrap();

    let chain_line = settled.lines.iter().find(|l| l.item_id == chain.id).unwrap();
    assert_eq!(chain_line.sold_qty, 0);
    assert_eq!(chain_line.returned_qty, 4);
    assert_eq!(chain_line.returned_value, dec!(200));

    let chain = services.inventory.get_item(chain.id).await.unwrap();
    assert_eq!(chain.current_count, 4);

    // Issued 500, returned 100 + 200: the agent owes the 200 sold.
    let agent = services
        .accounts
        .get_account(settled.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(200));
}

#[tokio::test]
async fn close_is_terminal_and_fence_protected() {
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let issued = services
        .consignments
        .issue_consignment(issue_input(item.id, 2))
        .await
        .unwrap();

    let closed = services
        .consignments
        .close_consignment(issued.consignment.id)
        .await
        .unwrap();
    assert_eq!(closed.status, ConsignmentStatus::Closed);

    // Closing touches neither stock nor balance.
    let item_after = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item_after.current_count, 3);
    let agent = services
        .accounts
        .get_account(issued.consignment.account_id)
        .await
        .unwrap();
    assert_eq!(agent.balance, dec!(200));

    let err = services
        .consignments
        .close_consignment(issued.consignment.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // A settlement call against a closed consignment skips all mutations.
    let skipped = services
        .consignments
        .settle_consignment(issued.consignment.id, vec![sold(item.id, 2)])
        .await
        .unwrap();
    assert_eq!(skipped.consignment.status, ConsignmentStatus::Closed);
    let item_after = services.inventory.get_item(item.id).await.unwrap();
    assert_eq!(item_after.current_count, 3);

    let err = services
        .consignments
        .close_consignment(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn issue_validates_its_lines() {
    let ctx = TestContext::new().await;
    let item = ctx.seed_item("RING-01", dec!(100), 5).await;
    let services = &ctx.state.services;

    let err = services
        .consignments
        .issue_consignment(IssueConsignmentInput {
            person_name: "Ravi".to_string(),
            phone: None,
            lines: vec![],
            issued_on: None,
            expected_return_on: in_days(30),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = services
        .consignments
        .issue_consignment(issue_input(item.id, 0))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidQuantity(_));

    let err = services
        .consignments
        .issue_consignment(issue_input(Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ItemNotFound(_));

    let err = services
        .consignments
        .issue_consignment(IssueConsignmentInput {
            person_name: "Ravi".to_string(),
            phone: None,
            lines: vec![
                IssueLineInput {
                    item_id: item.id,
                    qty: 1,
                },
                IssueLineInput {
                    item_id: item.id,
                    qty: 2,
                },
            ],
            issued_on: None,
            expected_return_on: in_days(30),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // None of the rejected calls created an account.
    let accounts = account::Entity::find().all(&*ctx.state.db).await.unwrap();
    assert!(accounts.is_empty());
}
