//! Item reference data and ledger adjustments outside the transfer workflow

use chrono::Utc;
use shared::{
    BatchEntry, BatchStock, DisplayStrategy, Distribution, Item, ItemDetails, Metric,
    RecordDistributionInput, RecordReturnInput, RecordSaleInput, RecordSpoilageInput,
    RegisterItemInput, ReturnRecord, SaleRecord, ShopSession, SpoilageRecord,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::Stores;

/// Ledger service
#[derive(Clone)]
pub struct LedgerService {
    stores: Stores,
}

impl LedgerService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Register or update an item, resolving its display strategy once
    pub async fn register_item(&self, name: &str, input: RegisterItemInput) -> AppResult<Item> {
        input.validate()?;

        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "Item name is required"));
        }

        let item = Item::new(name, input.metric, input.pack_size, input.pack_label.as_deref());
        let item = self.stores.items.upsert_item(item).await?;
        tracing::info!(item = %item.name, strategy = ?item.display_strategy, "Item registered");
        Ok(item)
    }

    pub async fn get_item(&self, name: &str) -> AppResult<Item> {
        self.stores
            .items
            .get_item(name)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    /// Current availability of an item at a shop.
    ///
    /// The current batch is the only batch with stock, or else the most
    /// recently updated one; every batch is listed so callers can choose.
    pub async fn item_details(
        &self,
        session: &ShopSession,
        shop_id: Uuid,
        item_name: &str,
    ) -> AppResult<ItemDetails> {
        if !session.can_view_shop(shop_id) {
            return Err(AppError::Forbidden(
                "Cannot view stock of another shop".to_string(),
            ));
        }

        let batches = self.stores.ledger.list_batches(shop_id, item_name).await?;
        let item = self.stores.items.get_item(item_name).await?;

        let metric = match (&item, batches.first()) {
            (Some(item), _) => item.metric,
            (None, Some(batch)) => batch.metric,
            (None, None) => return Err(AppError::NotFound("Item stock".to_string())),
        };
        let strategy = item
            .map(|item| item.display_strategy)
            .unwrap_or_else(|| DisplayStrategy::for_metric(metric));

        let current = current_batch(&batches);
        let quantity = current.map_or(0, |b| b.quantity);
        let batch_number = current.map(|b| b.batch_number.clone());

        Ok(ItemDetails {
            item_name: item_name.to_string(),
            metric,
            batch_number,
            quantity,
            display: shared::to_display(&strategy, quantity),
            batches,
        })
    }

    /// Credit a delivery into the session shop
    pub async fn record_distribution(
        &self,
        session: &ShopSession,
        input: RecordDistributionInput,
    ) -> AppResult<Distribution> {
        input.validate()?;

        let (metric, strategy) = match self.reference(session.shop_id, &input.entry).await? {
            Some(found) => found,
            None => {
                let metric = input.metric.ok_or_else(|| {
                    AppError::validation("metric", "Metric is required for an unregistered item")
                })?;
                (metric, DisplayStrategy::for_metric(metric))
            }
        };
        let quantity = canonical_quantity(&input.entry, &strategy)?;

        let record = Distribution {
            id: Uuid::new_v4(),
            shop_id: session.shop_id,
            item_name: input.entry.item_name,
            batch_number: input.entry.batch_number,
            quantity,
            metric,
            unit_cost: input.unit_cost,
            recorded_by: Some(session.employee_id),
            created_at: Utc::now(),
        };

        let record = self.stores.movements.record_distribution(record).await?;
        tracing::info!(item = %record.item_name, batch = %record.batch_number, quantity, "Distribution recorded");
        Ok(record)
    }

    /// Debit a sale from the session shop
    pub async fn record_sale(&self, session: &ShopSession, input: RecordSaleInput) -> AppResult<SaleRecord> {
        input.validate()?;

        let (_, strategy) = self.existing_reference(session.shop_id, &input.entry).await?;
        let quantity = canonical_quantity(&input.entry, &strategy)?;

        let record = SaleRecord {
            id: Uuid::new_v4(),
            shop_id: session.shop_id,
            item_name: input.entry.item_name,
            batch_number: input.entry.batch_number,
            quantity,
            unit_price: input.unit_price,
            recorded_by: Some(session.employee_id),
            created_at: Utc::now(),
        };

        let record = self.stores.movements.record_sale(record).await?;
        tracing::info!(item = %record.item_name, batch = %record.batch_number, quantity, "Sale recorded");
        Ok(record)
    }

    /// Write spoilt or broken stock off the session shop
    pub async fn record_spoilage(
        &self,
        session: &ShopSession,
        input: RecordSpoilageInput,
    ) -> AppResult<SpoilageRecord> {
        input.validate()?;

        let (_, strategy) = self.existing_reference(session.shop_id, &input.entry).await?;
        let quantity = canonical_quantity(&input.entry, &strategy)?;

        let record = SpoilageRecord {
            id: Uuid::new_v4(),
            shop_id: session.shop_id,
            item_name: input.entry.item_name,
            batch_number: input.entry.batch_number,
            quantity,
            reason: input.reason.trim().to_string(),
            recorded_by: Some(session.employee_id),
            created_at: Utc::now(),
        };

        let record = self.stores.movements.record_spoilage(record).await?;
        tracing::info!(item = %record.item_name, batch = %record.batch_number, quantity, "Spoilage recorded");
        Ok(record)
    }

    /// Record a supplier or customer return at the session shop
    pub async fn record_return(
        &self,
        session: &ShopSession,
        input: RecordReturnInput,
    ) -> AppResult<ReturnRecord> {
        input.validate()?;

        let (metric, strategy) = self.existing_reference(session.shop_id, &input.entry).await?;
        let quantity = canonical_quantity(&input.entry, &strategy)?;

        let record = ReturnRecord {
            id: Uuid::new_v4(),
            shop_id: session.shop_id,
            item_name: input.entry.item_name,
            batch_number: input.entry.batch_number,
            quantity,
            kind: input.kind,
            counterparty: input.counterparty,
            note: input.note,
            recorded_by: Some(session.employee_id),
            created_at: Utc::now(),
        };

        let record = self.stores.movements.record_return(record, metric).await?;
        tracing::info!(item = %record.item_name, kind = record.kind.as_str(), quantity, "Return recorded");
        Ok(record)
    }

    /// Metric and display strategy from reference data, falling back to the batch row
    async fn reference(
        &self,
        shop_id: Uuid,
        entry: &BatchEntry,
    ) -> AppResult<Option<(Metric, DisplayStrategy)>> {
        if let Some(item) = self.stores.items.get_item(&entry.item_name).await? {
            return Ok(Some((item.metric, item.display_strategy)));
        }

        let batches = self.stores.ledger.list_batches(shop_id, &entry.item_name).await?;
        Ok(batches
            .iter()
            .find(|b| b.batch_number == entry.batch_number)
            .or_else(|| batches.first())
            .map(|b| (b.metric, DisplayStrategy::for_metric(b.metric))))
    }

    async fn existing_reference(
        &self,
        shop_id: Uuid,
        entry: &BatchEntry,
    ) -> AppResult<(Metric, DisplayStrategy)> {
        self.reference(shop_id, entry).await?.ok_or_else(|| {
            AppError::NotFound(format!("Batch {} of {}", entry.batch_number, entry.item_name))
        })
    }
}

fn canonical_quantity(entry: &BatchEntry, strategy: &DisplayStrategy) -> AppResult<i64> {
    let quantity = entry.quantity.resolve(strategy)?;
    shared::validate_quantity(quantity).map_err(|msg| AppError::validation("quantity", msg))?;
    Ok(quantity)
}

fn current_batch(batches: &[BatchStock]) -> Option<&BatchStock> {
    let stocked: Vec<&BatchStock> = batches.iter().filter(|b| b.quantity > 0).collect();
    if stocked.is_empty() {
        batches.iter().max_by_key(|b| b.updated_at)
    } else {
        stocked.into_iter().max_by_key(|b| b.updated_at)
    }
}
