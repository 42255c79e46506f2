//! PostgreSQL store
//!
//! Ledger mutations run inside one transaction each. Debits are conditional
//! updates (`quantity >= amount`), so two transfers racing for the same
//! batch cannot both succeed. Resolution locks the request row first and
//! runs the shared state machine against it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    BatchKey, BatchStock, DateRange, DisplayStrategy, Distribution, Item, Metric, NewTransfer,
    Resolution, ReturnKind, ReturnRecord, SaleRecord, SpoilageRecord, TransferRequest, Transition,
};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{
    ensure_positive, BatchLedger, CreateOutcome, ItemCatalog, MovementStore, ResolveOutcome,
    TransferAcknowledgment, TransferFilter, TransferStore,
};
use crate::error::{AppError, AppResult};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Row for batch_stock queries
#[derive(Debug, FromRow)]
struct BatchRow {
    shop_id: Uuid,
    item_name: String,
    batch_number: String,
    quantity: i64,
    metric: String,
    unit_cost: Option<Decimal>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for BatchStock {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(BatchStock {
            metric: parse_column(&row.metric)?,
            shop_id: row.shop_id,
            item_name: row.item_name,
            batch_number: row.batch_number,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

/// Row for items queries
#[derive(Debug, FromRow)]
struct ItemRow {
    name: String,
    metric: String,
    pack_size: Option<i32>,
    display_strategy: Json<DisplayStrategy>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            metric: parse_column(&row.metric)?,
            pack_size: row.pack_size.and_then(|size| u32::try_from(size).ok()),
            name: row.name,
            display_strategy: row.display_strategy.0,
            updated_at: row.updated_at,
        })
    }
}

/// Row for transfer_requests queries
#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    request_key: Option<Uuid>,
    from_shop_id: Uuid,
    to_shop_id: Uuid,
    item_name: String,
    batch_number: String,
    quantity: i64,
    metric: String,
    status: String,
    decline_note: Option<String>,
    created_by: Option<Uuid>,
    resolved_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    acknowledged_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransferRow> for TransferRequest {
    type Error = AppError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(TransferRequest {
            metric: parse_column(&row.metric)?,
            status: parse_column(&row.status)?,
            id: row.id,
            request_key: row.request_key,
            from_shop_id: row.from_shop_id,
            to_shop_id: row.to_shop_id,
            item_name: row.item_name,
            batch_number: row.batch_number,
            quantity: row.quantity,
            decline_note: row.decline_note,
            created_by: row.created_by,
            resolved_by: row.resolved_by,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
            acknowledged_at: row.acknowledged_at,
        })
    }
}

/// Row for stock_distributions queries
#[derive(Debug, FromRow)]
struct DistributionRow {
    id: Uuid,
    shop_id: Uuid,
    item_name: String,
    batch_number: String,
    quantity: i64,
    metric: String,
    unit_cost: Option<Decimal>,
    recorded_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DistributionRow> for Distribution {
    type Error = AppError;

    fn try_from(row: DistributionRow) -> Result<Self, Self::Error> {
        Ok(Distribution {
            metric: parse_column(&row.metric)?,
            id: row.id,
            shop_id: row.shop_id,
            item_name: row.item_name,
            batch_number: row.batch_number,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            recorded_by: row.recorded_by,
            created_at: row.created_at,
        })
    }
}

/// Row for stock_returns queries
#[derive(Debug, FromRow)]
struct ReturnRow {
    id: Uuid,
    shop_id: Uuid,
    item_name: String,
    batch_number: String,
    quantity: i64,
    kind: String,
    counterparty: Option<String>,
    note: Option<String>,
    recorded_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReturnRow> for ReturnRecord {
    type Error = AppError;

    fn try_from(row: ReturnRow) -> Result<Self, Self::Error> {
        Ok(ReturnRecord {
            kind: parse_column(&row.kind)?,
            id: row.id,
            shop_id: row.shop_id,
            item_name: row.item_name,
            batch_number: row.batch_number,
            quantity: row.quantity,
            counterparty: row.counterparty,
            note: row.note,
            recorded_by: row.recorded_by,
            created_at: row.created_at,
        })
    }
}

/// Row for stock_spoilage queries
#[derive(Debug, FromRow)]
struct SpoilageRow {
    id: Uuid,
    shop_id: Uuid,
    item_name: String,
    batch_number: String,
    quantity: i64,
    reason: String,
    recorded_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<SpoilageRow> for SpoilageRecord {
    fn from(row: SpoilageRow) -> Self {
        SpoilageRecord {
            id: row.id,
            shop_id: row.shop_id,
            item_name: row.item_name,
            batch_number: row.batch_number,
            quantity: row.quantity,
            reason: row.reason,
            recorded_by: row.recorded_by,
            created_at: row.created_at,
        }
    }
}

fn parse_column<T>(value: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| AppError::Internal(format!("Corrupt column value: {}", e)))
}

async fn debit_batch(conn: &mut PgConnection, key: &BatchKey, amount: i64) -> AppResult<BatchStock> {
    ensure_positive(amount)?;

    let row = sqlx::query_as::<_, BatchRow>(
        r#"
        UPDATE batch_stock
        SET quantity = quantity - $4, version = version + 1, updated_at = now()
        WHERE shop_id = $1 AND item_name = $2 AND batch_number = $3 AND quantity >= $4
        RETURNING shop_id, item_name, batch_number, quantity, metric, unit_cost, version, updated_at
        "#,
    )
    .bind(key.shop_id)
    .bind(&key.item_name)
    .bind(&key.batch_number)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => row.try_into(),
        None => {
            let available = sqlx::query_scalar::<_, i64>(
                "SELECT quantity FROM batch_stock WHERE shop_id = $1 AND item_name = $2 AND batch_number = $3",
            )
            .bind(key.shop_id)
            .bind(&key.item_name)
            .bind(&key.batch_number)
            .fetch_optional(&mut *conn)
            .await?
            .unwrap_or(0);

            Err(AppError::InsufficientStock {
                batch: key.to_string(),
                requested: amount,
                available,
            })
        }
    }
}

async fn credit_batch(
    conn: &mut PgConnection,
    key: &BatchKey,
    amount: i64,
    metric: Metric,
) -> AppResult<BatchStock> {
    ensure_positive(amount)?;

    let row = sqlx::query_as::<_, BatchRow>(
        r#"
        INSERT INTO batch_stock (shop_id, item_name, batch_number, quantity, metric, version)
        VALUES ($1, $2, $3, $4, $5, 1)
        ON CONFLICT (shop_id, item_name, batch_number) DO UPDATE
        SET quantity = batch_stock.quantity + EXCLUDED.quantity,
            version = batch_stock.version + 1,
            updated_at = now()
        RETURNING shop_id, item_name, batch_number, quantity, metric, unit_cost, version, updated_at
        "#,
    )
    .bind(key.shop_id)
    .bind(&key.item_name)
    .bind(&key.batch_number)
    .bind(amount)
    .bind(metric.as_str())
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

async fn lock_transfer(conn: &mut PgConnection, id: Uuid) -> AppResult<TransferRequest> {
    sqlx::query_as::<_, TransferRow>(
        r#"
        SELECT id, request_key, from_shop_id, to_shop_id, item_name, batch_number, quantity,
               metric, status, decline_note, created_by, resolved_by, created_at, resolved_at,
               acknowledged_at
        FROM transfer_requests
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?
    .try_into()
}

#[async_trait]
impl BatchLedger for PgStore {
    async fn get_available(
        &self,
        shop_id: Uuid,
        item_name: &str,
        batch_number: Option<&str>,
    ) -> AppResult<i64> {
        let available = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM batch_stock
            WHERE shop_id = $1 AND item_name = $2 AND ($3::TEXT IS NULL OR batch_number = $3)
            "#,
        )
        .bind(shop_id)
        .bind(item_name)
        .bind(batch_number)
        .fetch_one(&self.db)
        .await?;

        Ok(available)
    }

    async fn list_batches(&self, shop_id: Uuid, item_name: &str) -> AppResult<Vec<BatchStock>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT shop_id, item_name, batch_number, quantity, metric, unit_cost, version, updated_at
            FROM batch_stock
            WHERE shop_id = $1 AND item_name = $2
            ORDER BY batch_number
            "#,
        )
        .bind(shop_id)
        .bind(item_name)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn reserve_and_debit(&self, key: &BatchKey, amount: i64) -> AppResult<BatchStock> {
        let mut conn = self.db.acquire().await?;
        debit_batch(&mut conn, key, amount).await
    }

    async fn credit(&self, key: &BatchKey, amount: i64, metric: Metric) -> AppResult<BatchStock> {
        let mut conn = self.db.acquire().await?;
        credit_batch(&mut conn, key, amount, metric).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl ItemCatalog for PgStore {
    async fn get_item(&self, name: &str) -> AppResult<Option<Item>> {
        sqlx::query_as::<_, ItemRow>(
            "SELECT name, metric, pack_size, display_strategy, updated_at FROM items WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn upsert_item(&self, item: Item) -> AppResult<Item> {
        let pack_size = item.pack_size.and_then(|size| i32::try_from(size).ok());

        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO items (name, metric, pack_size, display_strategy, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET metric = EXCLUDED.metric,
                pack_size = EXCLUDED.pack_size,
                display_strategy = EXCLUDED.display_strategy,
                updated_at = EXCLUDED.updated_at
            RETURNING name, metric, pack_size, display_strategy, updated_at
            "#,
        )
        .bind(&item.name)
        .bind(item.metric.as_str())
        .bind(pack_size)
        .bind(Json(&item.display_strategy))
        .bind(item.updated_at)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }
}

#[async_trait]
impl TransferStore for PgStore {
    async fn create_transfer(&self, new: NewTransfer) -> AppResult<CreateOutcome> {
        if let Some(key) = new.request_key {
            if let Some(transfer) = self.find_by_request_key(key).await? {
                return Ok(CreateOutcome {
                    transfer,
                    created: false,
                });
            }
        }

        let mut tx = self.db.begin().await?;

        debit_batch(&mut tx, &new.source_key(), new.quantity).await?;

        let inserted = sqlx::query_as::<_, TransferRow>(
            r#"
            INSERT INTO transfer_requests (
                id, request_key, from_shop_id, to_shop_id, item_name, batch_number, quantity,
                metric, status, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10)
            RETURNING id, request_key, from_shop_id, to_shop_id, item_name, batch_number, quantity,
                      metric, status, decline_note, created_by, resolved_by, created_at,
                      resolved_at, acknowledged_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.request_key)
        .bind(new.from_shop_id)
        .bind(new.to_shop_id)
        .bind(&new.item_name)
        .bind(&new.batch_number)
        .bind(new.quantity)
        .bind(new.metric.as_str())
        .bind(new.created_by)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            // Same request key committed by a concurrent call; ours rolls back
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tx.rollback().await?;
                let key = new.request_key.ok_or_else(|| {
                    AppError::Internal("Unique violation on a transfer without request key".to_string())
                })?;
                let transfer = self
                    .find_by_request_key(key)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;
                return Ok(CreateOutcome {
                    transfer,
                    created: false,
                });
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;

        Ok(CreateOutcome {
            transfer: row.try_into()?,
            created: true,
        })
    }

    async fn get_transfer(&self, id: Uuid) -> AppResult<Option<TransferRequest>> {
        sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, request_key, from_shop_id, to_shop_id, item_name, batch_number, quantity,
                   metric, status, decline_note, created_by, resolved_by, created_at, resolved_at,
                   acknowledged_at
            FROM transfer_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn find_by_request_key(&self, request_key: Uuid) -> AppResult<Option<TransferRequest>> {
        sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, request_key, from_shop_id, to_shop_id, item_name, batch_number, quantity,
                   metric, status, decline_note, created_by, resolved_by, created_at, resolved_at,
                   acknowledged_at
            FROM transfer_requests
            WHERE request_key = $1
            "#,
        )
        .bind(request_key)
        .fetch_optional(&self.db)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn resolve_transfer(
        &self,
        id: Uuid,
        resolution: &Resolution,
        resolved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> AppResult<ResolveOutcome> {
        let mut tx = self.db.begin().await?;
        let mut transfer = lock_transfer(&mut tx, id).await?;

        let transition = transfer.apply(resolution, resolved_by, at)?;
        if !transition.applied() {
            return Ok(ResolveOutcome {
                transfer,
                transition,
            });
        }

        sqlx::query(
            r#"
            UPDATE transfer_requests
            SET status = $2, decline_note = $3, resolved_by = $4, resolved_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(transfer.status.as_str())
        .bind(&transfer.decline_note)
        .bind(transfer.resolved_by)
        .bind(transfer.resolved_at)
        .execute(&mut *tx)
        .await?;

        if let Some(key) = transfer.settlement_key() {
            credit_batch(&mut tx, &key, transfer.quantity, transfer.metric).await?;
        }

        tx.commit().await?;

        Ok(ResolveOutcome {
            transfer,
            transition,
        })
    }

    async fn acknowledge_decline(
        &self,
        id: Uuid,
        acknowledged_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> AppResult<(TransferRequest, Transition)> {
        let mut tx = self.db.begin().await?;
        let mut transfer = lock_transfer(&mut tx, id).await?;

        let transition = transfer.acknowledge(at)?;
        if !transition.applied() {
            return Ok((transfer, transition));
        }

        sqlx::query("UPDATE transfer_requests SET acknowledged_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO transfer_acknowledgments (transfer_id, shop_id, acknowledged_by, acknowledged_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (transfer_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(transfer.from_shop_id)
        .bind(acknowledged_by)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((transfer, transition))
    }

    async fn list_acknowledgments(&self, transfer_id: Uuid) -> AppResult<Vec<TransferAcknowledgment>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Option<Uuid>, DateTime<Utc>)>(
            r#"
            SELECT transfer_id, shop_id, acknowledged_by, acknowledged_at
            FROM transfer_acknowledgments
            WHERE transfer_id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(transfer_id, shop_id, acknowledged_by, acknowledged_at)| TransferAcknowledgment {
                transfer_id,
                shop_id,
                acknowledged_by,
                acknowledged_at,
            })
            .collect())
    }

    async fn list_transfers(&self, filter: &TransferFilter) -> AppResult<Vec<TransferRequest>> {
        let (resolved_from, resolved_until) = match filter.resolved_within {
            Some(range) => {
                let (start, end) = range.bounds();
                (Some(start), Some(end))
            }
            None => (None, None),
        };

        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, request_key, from_shop_id, to_shop_id, item_name, batch_number, quantity,
                   metric, status, decline_note, created_by, resolved_by, created_at, resolved_at,
                   acknowledged_at
            FROM transfer_requests
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR from_shop_id = $2)
              AND ($3::UUID IS NULL OR to_shop_id = $3)
              AND ($4::UUID IS NULL OR from_shop_id = $4 OR to_shop_id = $4)
              AND ($5::BOOLEAN IS NULL OR (acknowledged_at IS NOT NULL) = $5)
              AND ($6::TIMESTAMPTZ IS NULL OR (resolved_at >= $6 AND resolved_at < $7))
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from_shop_id)
        .bind(filter.to_shop_id)
        .bind(filter.involving_shop_id)
        .bind(filter.acknowledged)
        .bind(resolved_from)
        .bind(resolved_until)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl MovementStore for PgStore {
    async fn record_distribution(&self, record: Distribution) -> AppResult<Distribution> {
        let mut tx = self.db.begin().await?;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());

        credit_batch(&mut tx, &key, record.quantity, record.metric).await?;

        if let Some(cost) = record.unit_cost {
            sqlx::query(
                "UPDATE batch_stock SET unit_cost = $4 WHERE shop_id = $1 AND item_name = $2 AND batch_number = $3",
            )
            .bind(key.shop_id)
            .bind(&key.item_name)
            .bind(&key.batch_number)
            .bind(cost)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO stock_distributions (
                id, shop_id, item_name, batch_number, quantity, metric, unit_cost, recorded_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.shop_id)
        .bind(&record.item_name)
        .bind(&record.batch_number)
        .bind(record.quantity)
        .bind(record.metric.as_str())
        .bind(record.unit_cost)
        .bind(record.recorded_by)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn record_sale(&self, record: SaleRecord) -> AppResult<SaleRecord> {
        let mut tx = self.db.begin().await?;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());

        debit_batch(&mut tx, &key, record.quantity).await?;

        sqlx::query(
            r#"
            INSERT INTO stock_sales (
                id, shop_id, item_name, batch_number, quantity, unit_price, recorded_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.shop_id)
        .bind(&record.item_name)
        .bind(&record.batch_number)
        .bind(record.quantity)
        .bind(record.unit_price)
        .bind(record.recorded_by)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn record_spoilage(&self, record: SpoilageRecord) -> AppResult<SpoilageRecord> {
        let mut tx = self.db.begin().await?;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());

        debit_batch(&mut tx, &key, record.quantity).await?;

        sqlx::query(
            r#"
            INSERT INTO stock_spoilage (
                id, shop_id, item_name, batch_number, quantity, reason, recorded_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.shop_id)
        .bind(&record.item_name)
        .bind(&record.batch_number)
        .bind(record.quantity)
        .bind(&record.reason)
        .bind(record.recorded_by)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn record_return(&self, record: ReturnRecord, metric: Metric) -> AppResult<ReturnRecord> {
        let mut tx = self.db.begin().await?;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());

        match record.kind {
            ReturnKind::ToSupplier => debit_batch(&mut tx, &key, record.quantity).await?,
            ReturnKind::FromCustomer => credit_batch(&mut tx, &key, record.quantity, metric).await?,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_returns (
                id, shop_id, item_name, batch_number, quantity, kind, counterparty, note,
                recorded_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.shop_id)
        .bind(&record.item_name)
        .bind(&record.batch_number)
        .bind(record.quantity)
        .bind(record.kind.as_str())
        .bind(&record.counterparty)
        .bind(&record.note)
        .bind(record.recorded_by)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn list_distributions(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<Distribution>> {
        let (start, end) = range.bounds();
        let rows = sqlx::query_as::<_, DistributionRow>(
            r#"
            SELECT id, shop_id, item_name, batch_number, quantity, metric, unit_cost, recorded_by, created_at
            FROM stock_distributions
            WHERE shop_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(shop_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_spoilage(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<SpoilageRecord>> {
        let (start, end) = range.bounds();
        let rows = sqlx::query_as::<_, SpoilageRow>(
            r#"
            SELECT id, shop_id, item_name, batch_number, quantity, reason, recorded_by, created_at
            FROM stock_spoilage
            WHERE shop_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(shop_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_returns(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<ReturnRecord>> {
        let (start, end) = range.bounds();
        let rows = sqlx::query_as::<_, ReturnRow>(
            r#"
            SELECT id, shop_id, item_name, batch_number, quantity, kind, counterparty, note,
                   recorded_by, created_at
            FROM stock_returns
            WHERE shop_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(shop_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
