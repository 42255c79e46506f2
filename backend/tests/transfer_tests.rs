//! Shop-to-shop transfer tests
//!
//! Tests for the transfer workflow including:
//! - Reservation at creation and settlement on accept/decline
//! - Stock conservation and no negative batches
//! - Idempotent resolution and request keys

mod common;

use common::{clerk, transfer_input, Harness};
use proptest::prelude::*;
use shared::{
    BatchEntry, BatchKey, CreateTransferInput, Metric, NotificationKind, QuantityEntry,
    RecordSaleInput, RegisterItemInput, TransferListQuery, TransferStatus,
};
use shop_stock_backend::error::AppError;
use shop_stock_backend::store::BatchLedger;
use uuid::Uuid;

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_transfer_above_batch_quantity_is_rejected() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());

    let item = h
        .ledger()
        .register_item(
            "Eggs (Grade)",
            RegisterItemInput {
                metric: Metric::Count,
                pack_size: Some(30),
                pack_label: None,
            },
        )
        .await
        .unwrap();
    h.stock(shop_a, "Eggs (Grade)", "B1", 45, Metric::Count).await;

    let display = item.to_display(45);
    assert_eq!((display.primary_count, display.remainder_count), (1, 15));

    let err = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Eggs (Grade)", "B1", 50))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 50,
            available: 45,
            ..
        }
    ));
    assert_eq!(h.available(shop_a, "Eggs (Grade)", "B1").await, 45);
}

#[tokio::test]
async fn test_decline_returns_reserved_quantity_to_source() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;

    let created = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "F-01", 40))
        .await
        .unwrap();
    assert!(created.created);
    assert_eq!(created.transfer.status, TransferStatus::Pending);
    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 60);

    let outcome = h
        .transfers()
        .decline(&clerk(shop_b), created.transfer.id, "wrong item")
        .await
        .unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.transfer.status, TransferStatus::Declined);
    assert_eq!(outcome.transfer.decline_note.as_deref(), Some("wrong item"));

    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 100);
    assert_eq!(h.available(shop_b, "Flour", "F-01").await, 0);

    let notices = h.notifications().shop_notifications(&clerk(shop_a)).await.unwrap();
    assert_eq!(notices.declines.len(), 1);
    assert_eq!(notices.declines[0].kind, NotificationKind::Decline);
    assert_eq!(notices.declines[0].id(), created.transfer.id);
}

#[tokio::test]
async fn test_concurrent_accepts_credit_once() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;

    let transfer = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "F-01", 40))
        .await
        .unwrap()
        .transfer;

    let destination = clerk(shop_b);
    let (first, second) = (h.transfers(), h.transfers());
    let (r1, r2) = tokio::join!(
        first.accept(&destination, transfer.id),
        second.accept(&destination, transfer.id),
    );
    let (r1, r2) = (r1.unwrap(), r2.unwrap());

    assert_eq!(u8::from(r1.applied) + u8::from(r2.applied), 1);
    assert_eq!(r1.transfer.status, TransferStatus::Accepted);
    assert_eq!(r2.transfer.status, TransferStatus::Accepted);
    assert_eq!(h.available(shop_b, "Flour", "F-01").await, 40);
    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 60);
}

#[tokio::test]
async fn test_concurrent_transfers_cannot_oversell_a_batch() {
    let h = Harness::new();
    let (shop_a, shop_b, shop_c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;

    let source = clerk(shop_a);
    let (first, second) = (h.transfers(), h.transfers());
    let (r1, r2) = tokio::join!(
        first.create(&source, transfer_input(shop_b, "Flour", "F-01", 60)),
        second.create(&source, transfer_input(shop_c, "Flour", "F-01", 60)),
    );

    let results = [r1, r2];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(AppError::InsufficientStock {
            requested: 60,
            available: 40,
            ..
        })
    )));
    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 40);
}

#[tokio::test]
async fn test_transfer_and_sale_race_for_the_same_batch() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;

    let source = clerk(shop_a);
    let sale = RecordSaleInput {
        entry: BatchEntry {
            item_name: "Flour".to_string(),
            batch_number: "F-01".to_string(),
            quantity: QuantityEntry::Canonical { quantity: 60 },
        },
        unit_price: None,
    };
    let (transfers, ledger) = (h.transfers(), h.ledger());
    let (transfer, sold) = tokio::join!(
        transfers.create(&source, transfer_input(shop_b, "Flour", "F-01", 60)),
        ledger.record_sale(&source, sale),
    );

    match (transfer, sold) {
        (Ok(_), Err(AppError::InsufficientStock { .. })) => {}
        (Err(AppError::InsufficientStock { .. }), Ok(_)) => {}
        (transfer, sold) => panic!("expected exactly one debit, got {:?} and {:?}", transfer, sold),
    }
    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 40);
}

#[tokio::test]
async fn test_transfer_from_unknown_batch_has_nothing_available() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;

    let err = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "NO-SUCH", 10))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 10,
            available: 0,
            ..
        }
    ));
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 100);
}

#[tokio::test]
async fn test_padded_batch_number_is_rejected() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;

    let err = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", " F-01", 10))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 100);
}

// ============================================================================
// Workflow rules
// ============================================================================

#[tokio::test]
async fn test_resolving_a_resolved_transfer_is_a_no_op() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Milk", "M-7", 20, Metric::Volume).await;

    let id = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Milk", "M-7", 5))
        .await
        .unwrap()
        .transfer
        .id;

    h.transfers().accept(&clerk(shop_b), id).await.unwrap();
    let again = h
        .transfers()
        .decline(&clerk(shop_b), id, "changed my mind")
        .await
        .unwrap();

    assert!(!again.applied);
    assert_eq!(again.transfer.status, TransferStatus::Accepted);
    assert_eq!(h.available(shop_a, "Milk", "M-7").await, 15);
    assert_eq!(h.available(shop_b, "Milk", "M-7").await, 5);
}

#[tokio::test]
async fn test_only_destination_may_resolve() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 10, Metric::Weight).await;

    let id = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "F-01", 4))
        .await
        .unwrap()
        .transfer
        .id;

    let err = h.transfers().accept(&clerk(shop_a), id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = h
        .transfers()
        .accept(&clerk(shop_b), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_decline_requires_a_note() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 10, Metric::Weight).await;

    let id = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "F-01", 4))
        .await
        .unwrap()
        .transfer
        .id;

    let err = h
        .transfers()
        .decline(&clerk(shop_b), id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "note"));

    let transfer = h.transfers().get(&clerk(shop_a), id).await.unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);
}

#[tokio::test]
async fn test_transfer_to_own_shop_is_rejected() {
    let h = Harness::new();
    let shop = Uuid::new_v4();
    h.stock(shop, "Flour", "F-01", 10, Metric::Weight).await;

    let err = h
        .transfers()
        .create(&clerk(shop), transfer_input(shop, "Flour", "F-01", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidDestination));
}

#[tokio::test]
async fn test_batch_is_chosen_only_when_unambiguous() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Sugar", "S-1", 10, Metric::Weight).await;

    let mut input = transfer_input(shop_b, "Sugar", "S-1", 3);
    input.batch_number = None;
    let created = h.transfers().create(&clerk(shop_a), input.clone()).await.unwrap();
    assert_eq!(created.transfer.batch_number, "S-1");

    h.stock(shop_a, "Sugar", "S-2", 10, Metric::Weight).await;
    let err = h.transfers().create(&clerk(shop_a), input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "batch_number"));
}

#[tokio::test]
async fn test_repeated_request_key_debits_once() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;

    let input = CreateTransferInput {
        request_key: Some(Uuid::new_v4()),
        ..transfer_input(shop_b, "Flour", "F-01", 30)
    };

    let first = h.transfers().create(&clerk(shop_a), input.clone()).await.unwrap();
    let second = h.transfers().create(&clerk(shop_a), input.clone()).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.transfer.id, second.transfer.id);
    assert_eq!(h.available(shop_a, "Flour", "F-01").await, 70);

    // Another shop cannot claim the key
    let shop_c = Uuid::new_v4();
    h.stock(shop_c, "Flour", "F-01", 100, Metric::Weight).await;
    let err = h.transfers().create(&clerk(shop_c), input).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(h.available(shop_c, "Flour", "F-01").await, 100);
}

#[tokio::test]
async fn test_decline_recreates_a_removed_source_batch() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Butter", "BT-3", 40, Metric::Weight).await;

    let id = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Butter", "BT-3", 40))
        .await
        .unwrap()
        .transfer
        .id;

    let key = BatchKey::new(shop_a, "Butter", "BT-3");
    let removed = h.store.remove_batch(&key).await.unwrap();
    assert_eq!(removed.quantity, 0);

    h.transfers()
        .decline(&clerk(shop_b), id, "not ordered")
        .await
        .unwrap();

    let batches = h.store.list_batches(shop_a, "Butter").await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].quantity, 40);
    assert_eq!(batches[0].metric, Metric::Weight);
}

#[tokio::test]
async fn test_clerks_list_only_their_own_transfers() {
    let h = Harness::new();
    let (shop_a, shop_b, shop_c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 10, Metric::Weight).await;
    h.stock(shop_c, "Flour", "F-09", 10, Metric::Weight).await;

    h.transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "F-01", 1))
        .await
        .unwrap();
    h.transfers()
        .create(&clerk(shop_c), transfer_input(shop_b, "Flour", "F-09", 1))
        .await
        .unwrap();

    let seen_by_a = h
        .transfers()
        .list(&clerk(shop_a), Default::default())
        .await
        .unwrap();
    assert_eq!(seen_by_a.len(), 1);

    let pending_for_b = h
        .transfers()
        .list(&clerk(shop_b), TransferListQuery::pending_for(shop_b))
        .await
        .unwrap();
    assert_eq!(pending_for_b.len(), 2);
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Create(i64),
    Accept(usize),
    Decline(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1i64..60).prop_map(Step::Create),
        (0usize..8).prop_map(Step::Accept),
        (0usize..8).prop_map(Step::Decline),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever happens, stock at both shops plus pending reservations equals the initial stock,
    /// and no batch ever goes negative
    #[test]
    fn test_stock_is_conserved(
        initial in 1i64..200,
        steps in prop::collection::vec(step_strategy(), 1..20),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let h = Harness::new();
            let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
            h.stock(shop_a, "Rice", "R-1", initial, Metric::Weight).await;

            let mut created = Vec::new();
            for step in steps {
                match step {
                    Step::Create(quantity) => {
                        let available = h.available(shop_a, "Rice", "R-1").await;
                        match h
                            .transfers()
                            .create(&clerk(shop_a), transfer_input(shop_b, "Rice", "R-1", quantity))
                            .await
                        {
                            Ok(outcome) => {
                                prop_assert!(quantity <= available);
                                created.push(outcome.transfer.id);
                            }
                            Err(AppError::InsufficientStock { .. }) => prop_assert!(quantity > available),
                            Err(e) => prop_assert!(false, "unexpected error: {}", e),
                        }
                    }
                    Step::Accept(i) if !created.is_empty() => {
                        let id = created[i % created.len()];
                        h.transfers().accept(&clerk(shop_b), id).await.unwrap();
                    }
                    Step::Decline(i) if !created.is_empty() => {
                        let id = created[i % created.len()];
                        h.transfers().decline(&clerk(shop_b), id, "no room").await.unwrap();
                    }
                    _ => {}
                }

                let at_a = h.available(shop_a, "Rice", "R-1").await;
                let at_b = h.available(shop_b, "Rice", "R-1").await;
                prop_assert!(at_a >= 0 && at_b >= 0);

                let pending: i64 = h
                    .transfers()
                    .list(&clerk(shop_a), TransferListQuery {
                        status: Some(TransferStatus::Pending),
                        ..Default::default()
                    })
                    .await
                    .unwrap()
                    .iter()
                    .map(|t| t.quantity)
                    .sum();
                prop_assert_eq!(at_a + at_b + pending, initial);
                prop_assert_eq!(h.store.total_quantity("Rice").await + pending, initial);
            }
            Ok(())
        })?;
    }
}
