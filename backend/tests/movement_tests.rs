//! Stock movement and ledger adjustment tests
//!
//! Tests for the movement history including:
//! - Transfer direction relative to the queried shop
//! - Independent degradation of each section
//! - Visibility rules and inclusive date ranges

mod common;

use async_trait::async_trait;
use chrono::{Days, Utc};
use common::{clerk, transfer_input, Harness};
use shared::{
    BatchEntry, DateRange, Distribution, Metric, QuantityEntry, RecordDistributionInput,
    RecordReturnInput, RecordSaleInput, RecordSpoilageInput, RegisterItemInput, ReturnKind,
    ReturnRecord, SaleRecord, ShopRole, SpoilageRecord, TransferDirection,
};
use shop_stock_backend::{
    error::{AppError, AppResult},
    services::MovementService,
    store::{MemoryStore, MovementStore, Stores},
};
use std::sync::Arc;
use uuid::Uuid;

fn today() -> DateRange {
    let day = Utc::now().date_naive();
    DateRange::new(day, day).unwrap()
}

fn entry(item: &str, batch: &str, quantity: QuantityEntry) -> BatchEntry {
    BatchEntry {
        item_name: item.to_string(),
        batch_number: batch.to_string(),
        quantity,
    }
}

fn canonical(quantity: i64) -> QuantityEntry {
    QuantityEntry::Canonical { quantity }
}

// ============================================================================
// Ledger adjustments
// ============================================================================

#[tokio::test]
async fn test_adjustments_move_the_ledger() {
    let h = Harness::new();
    let shop = Uuid::new_v4();
    let session = clerk(shop);

    h.ledger()
        .record_distribution(
            &session,
            RecordDistributionInput {
                entry: entry("Flour", "F-01", canonical(100)),
                metric: Some(Metric::Weight),
                unit_cost: None,
            },
        )
        .await
        .unwrap();

    h.ledger()
        .record_sale(
            &session,
            RecordSaleInput {
                entry: entry("Flour", "F-01", canonical(30)),
                unit_price: None,
            },
        )
        .await
        .unwrap();

    h.ledger()
        .record_spoilage(
            &session,
            RecordSpoilageInput {
                entry: entry("Flour", "F-01", canonical(5)),
                reason: "water damage".to_string(),
            },
        )
        .await
        .unwrap();

    h.ledger()
        .record_return(
            &session,
            RecordReturnInput {
                entry: entry("Flour", "F-01", canonical(2)),
                kind: ReturnKind::FromCustomer,
                counterparty: None,
                note: Some("unopened".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(h.available(shop, "Flour", "F-01").await, 67);

    let err = h
        .ledger()
        .record_sale(
            &session,
            RecordSaleInput {
                entry: entry("Flour", "F-01", canonical(68)),
                unit_price: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(h.available(shop, "Flour", "F-01").await, 67);
}

#[tokio::test]
async fn test_blank_spoilage_reason_is_rejected() {
    let h = Harness::new();
    let shop = Uuid::new_v4();
    h.stock(shop, "Eggs", "E-1", 30, Metric::Count).await;

    let err = h
        .ledger()
        .record_spoilage(
            &clerk(shop),
            RecordSpoilageInput {
                entry: entry("Eggs", "E-1", canonical(3)),
                reason: "   ".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(h.available(shop, "Eggs", "E-1").await, 30);
}

#[tokio::test]
async fn test_combined_entry_uses_pack_size() {
    let h = Harness::new();
    let shop = Uuid::new_v4();
    h.ledger()
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

    let record = h
        .ledger()
        .record_distribution(
            &clerk(shop),
            RecordDistributionInput {
                entry: entry(
                    "Eggs (Grade)",
                    "E-1",
                    QuantityEntry::Combined {
                        packs: "2".to_string(),
                        pieces: "5".to_string(),
                    },
                ),
                metric: None,
                unit_cost: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(record.quantity, 65);

    let details = h
        .ledger()
        .item_details(&clerk(shop), shop, "Eggs (Grade)")
        .await
        .unwrap();
    assert_eq!(details.batch_number.as_deref(), Some("E-1"));
    assert_eq!(details.quantity, 65);
    assert_eq!(details.display.to_string(), "2 trays + 5 pieces");
}

// ============================================================================
// Movement history
// ============================================================================

#[tokio::test]
async fn test_shop_transfers_are_tagged_by_direction() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.stock(shop_a, "Flour", "F-01", 100, Metric::Weight).await;
    h.stock(shop_b, "Flour", "F-02", 100, Metric::Weight).await;

    let outgoing = h
        .transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "F-01", 10))
        .await
        .unwrap()
        .transfer
        .id;
    let incoming = h
        .transfers()
        .create(&clerk(shop_b), transfer_input(shop_a, "Flour", "F-02", 20))
        .await
        .unwrap()
        .transfer
        .id;
    // Never resolved, so not a movement yet
    h.transfers()
        .create(&clerk(shop_a), transfer_input(shop_b, "Flour", "F-01", 1))
        .await
        .unwrap();

    h.transfers().accept(&clerk(shop_b), outgoing).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    h.transfers()
        .decline(&clerk(shop_a), incoming, "no space")
        .await
        .unwrap();

    let movements = h.movements().query(&clerk(shop_a), shop_a, today()).await.unwrap();
    let shop_transfers = movements.shop_transfers.items;
    assert_eq!(shop_transfers.len(), 2);

    // Most recently resolved first
    assert_eq!(shop_transfers[0].transfer.id, incoming);
    assert_eq!(shop_transfers[0].direction, TransferDirection::In);
    assert_eq!(shop_transfers[0].counterpart_shop_id, shop_b);
    assert_eq!(shop_transfers[1].transfer.id, outgoing);
    assert_eq!(shop_transfers[1].direction, TransferDirection::Out);
}

#[tokio::test]
async fn test_query_honours_visibility_and_range() {
    let h = Harness::new();
    let (shop_a, shop_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.ledger()
        .record_distribution(
            &clerk(shop_a),
            RecordDistributionInput {
                entry: entry("Milk", "M-1", canonical(12)),
                metric: Some(Metric::Volume),
                unit_cost: None,
            },
        )
        .await
        .unwrap();

    let err = h
        .movements()
        .query(&clerk(shop_b), shop_a, today())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let admin = clerk(shop_b).with_role(ShopRole::Admin);
    let movements = h.movements().query(&admin, shop_a, today()).await.unwrap();
    assert_eq!(movements.transfers.items.len(), 1);

    let tomorrow = Utc::now().date_naive().checked_add_days(Days::new(1)).unwrap();
    let future = DateRange::new(tomorrow, tomorrow).unwrap();
    let movements = h.movements().query(&admin, shop_a, future).await.unwrap();
    assert!(movements.transfers.items.is_empty());
    assert!(movements.transfers.error.is_none());
}

/// Movement store whose spoilage source is down
struct SpoilageDown {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl MovementStore for SpoilageDown {
    async fn record_distribution(&self, record: Distribution) -> AppResult<Distribution> {
        self.inner.record_distribution(record).await
    }

    async fn record_sale(&self, record: SaleRecord) -> AppResult<SaleRecord> {
        self.inner.record_sale(record).await
    }

    async fn record_spoilage(&self, record: SpoilageRecord) -> AppResult<SpoilageRecord> {
        self.inner.record_spoilage(record).await
    }

    async fn record_return(&self, record: ReturnRecord, metric: Metric) -> AppResult<ReturnRecord> {
        self.inner.record_return(record, metric).await
    }

    async fn list_distributions(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<Distribution>> {
        self.inner.list_distributions(shop_id, range).await
    }

    async fn list_spoilage(&self, _shop_id: Uuid, _range: &DateRange) -> AppResult<Vec<SpoilageRecord>> {
        Err(AppError::Internal("spoilage source unavailable".to_string()))
    }

    async fn list_returns(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<ReturnRecord>> {
        self.inner.list_returns(shop_id, range).await
    }
}

#[tokio::test]
async fn test_failing_section_degrades_alone() {
    let h = Harness::new();
    let shop = Uuid::new_v4();
    h.ledger()
        .record_distribution(
            &clerk(shop),
            RecordDistributionInput {
                entry: entry("Flour", "F-01", canonical(10)),
                metric: Some(Metric::Weight),
                unit_cost: None,
            },
        )
        .await
        .unwrap();

    let stores = Stores {
        movements: Arc::new(SpoilageDown {
            inner: h.store.clone(),
        }),
        ..h.state.stores.clone()
    };
    let movements = MovementService::new(stores)
        .query(&clerk(shop), shop, today())
        .await
        .unwrap();

    assert!(movements.spoilt_items.is_failed());
    assert!(movements.spoilt_items.items.is_empty());
    assert!(!movements.transfers.is_failed());
    assert_eq!(movements.transfers.items.len(), 1);
    assert!(!movements.returns.is_failed());
    assert!(!movements.shop_transfers.is_failed());
}
