//! Shop-to-shop transfer workflow
//!
//! Creation reserves the quantity at the source right away. The destination
//! then accepts (quantity lands at the destination) or declines (quantity
//! goes back to the source). Resolution is idempotent: resolving an already
//! resolved transfer succeeds without touching the ledger again.

use chrono::Utc;
use shared::{
    BatchKey, BatchStock, ConfirmOutcome, ConfirmTransferInput, CreateTransferInput, NewTransfer, Resolution,
    ShopSession, TransferListQuery, TransferRequest,
};
use uuid::Uuid;
use validator::Validate;

use super::events::{TransferEvent, TransferEventBus, TransferEventKind};
use crate::config::TransferConfig;
use crate::error::{AppError, AppResult};
use crate::store::{CreateOutcome, Stores, TransferFilter};

/// Transfer service for creating, resolving and listing transfers
#[derive(Clone)]
pub struct TransferService {
    stores: Stores,
    events: TransferEventBus,
    max_conflict_retries: u32,
}

impl TransferService {
    pub fn new(stores: Stores, events: TransferEventBus, config: &TransferConfig) -> Self {
        Self {
            stores,
            events,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Create a transfer from the session shop, reserving the quantity at the source
    pub async fn create(
        &self,
        session: &ShopSession,
        input: CreateTransferInput,
    ) -> AppResult<CreateOutcome> {
        input.validate()?;

        if input.to_shop_id == session.shop_id {
            return Err(AppError::InvalidDestination);
        }

        if let Some(key) = input.request_key {
            if let Some(transfer) = self.stores.transfers.find_by_request_key(key).await? {
                if transfer.from_shop_id != session.shop_id {
                    return Err(AppError::Conflict {
                        resource: "request_key".to_string(),
                        message: "Request key already used by another shop".to_string(),
                    });
                }
                tracing::debug!(transfer_id = %transfer.id, "Replayed transfer creation");
                return Ok(CreateOutcome {
                    transfer,
                    created: false,
                });
            }
        }

        let mut attempt = 0;
        loop {
            // Availability is re-read on every attempt
            let batch = self
                .resolve_batch(session, &input.item_name, input.batch_number.as_deref(), input.quantity)
                .await?;

            shared::validate_within_available(input.quantity, batch.quantity).map_err(|_| {
                AppError::InsufficientStock {
                    batch: batch.key().to_string(),
                    requested: input.quantity,
                    available: batch.quantity,
                }
            })?;

            let new = NewTransfer {
                request_key: input.request_key,
                from_shop_id: session.shop_id,
                to_shop_id: input.to_shop_id,
                item_name: batch.item_name.clone(),
                batch_number: batch.batch_number.clone(),
                quantity: input.quantity,
                metric: batch.metric,
                created_by: Some(session.employee_id),
            };

            match self.stores.transfers.create_transfer(new).await {
                Ok(outcome) => {
                    if outcome.created {
                        tracing::info!(
                            transfer_id = %outcome.transfer.id,
                            from = %outcome.transfer.from_shop_id,
                            to = %outcome.transfer.to_shop_id,
                            quantity = outcome.transfer.quantity,
                            "Transfer created"
                        );
                        self.events
                            .publish(TransferEvent::new(TransferEventKind::Created, &outcome.transfer));
                    }
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, "Transfer creation lost a race, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Pick the batch a transfer draws from.
    ///
    /// A named batch the shop does not hold has nothing available. Without a
    /// batch number, the item must have exactly one batch with stock; several
    /// are ambiguous.
    async fn resolve_batch(
        &self,
        session: &ShopSession,
        item_name: &str,
        batch_number: Option<&str>,
        requested: i64,
    ) -> AppResult<BatchStock> {
        let batches = self
            .stores
            .ledger
            .list_batches(session.shop_id, item_name)
            .await?;

        if let Some(number) = batch_number {
            return batches
                .into_iter()
                .find(|b| b.batch_number == number)
                .ok_or_else(|| AppError::InsufficientStock {
                    batch: BatchKey::new(session.shop_id, item_name, number).to_string(),
                    requested,
                    available: 0,
                });
        }

        let mut stocked: Vec<BatchStock> = batches.into_iter().filter(|b| b.quantity > 0).collect();
        match stocked.len() {
            0 => Err(AppError::InsufficientStock {
                batch: item_name.to_string(),
                requested,
                available: 0,
            }),
            1 => Ok(stocked.remove(0)),
            _ => Err(AppError::validation(
                "batch_number",
                "Item has several batches in stock, choose a batch number",
            )),
        }
    }

    pub async fn accept(&self, session: &ShopSession, id: Uuid) -> AppResult<ConfirmOutcome> {
        self.resolve(session, id, Resolution::Accept).await
    }

    pub async fn decline(
        &self,
        session: &ShopSession,
        id: Uuid,
        note: &str,
    ) -> AppResult<ConfirmOutcome> {
        let resolution = ConfirmTransferInput::decline(note).into_resolution()?;
        self.resolve(session, id, resolution).await
    }

    /// Handle `POST /confirm-transfer/{id}`
    pub async fn confirm(
        &self,
        session: &ShopSession,
        id: Uuid,
        input: ConfirmTransferInput,
    ) -> AppResult<ConfirmOutcome> {
        let resolution = input.into_resolution()?;
        self.resolve(session, id, resolution).await
    }

    async fn resolve(
        &self,
        session: &ShopSession,
        id: Uuid,
        resolution: Resolution,
    ) -> AppResult<ConfirmOutcome> {
        let transfer = self
            .stores
            .transfers
            .get_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        if transfer.to_shop_id != session.shop_id {
            return Err(AppError::Forbidden(
                "Only the destination shop can accept or decline a transfer".to_string(),
            ));
        }

        let mut attempt = 0;
        let outcome = loop {
            match self
                .stores
                .transfers
                .resolve_transfer(id, &resolution, Some(session.employee_id), Utc::now())
                .await
            {
                Ok(outcome) => break outcome,
                Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(%id, attempt, "Transfer resolution lost a race, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        let applied = outcome.transition.applied();
        if applied {
            let kind = match resolution {
                Resolution::Accept => TransferEventKind::Accepted,
                Resolution::Decline { .. } => TransferEventKind::Declined,
            };
            tracing::info!(%id, status = %outcome.transfer.status, "Transfer resolved");
            self.events.publish(TransferEvent::new(kind, &outcome.transfer));
        } else {
            tracing::debug!(%id, status = %outcome.transfer.status, "Transfer already resolved");
        }

        Ok(ConfirmOutcome {
            transfer: outcome.transfer,
            applied,
        })
    }

    /// A transfer the session shop takes part in
    pub async fn get(&self, session: &ShopSession, id: Uuid) -> AppResult<TransferRequest> {
        let transfer = self
            .stores
            .transfers
            .get_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        let involved = transfer.from_shop_id == session.shop_id || transfer.to_shop_id == session.shop_id;
        if !involved && !session.is_admin() {
            return Err(AppError::Forbidden(
                "Transfer belongs to other shops".to_string(),
            ));
        }

        Ok(transfer)
    }

    /// Transfers matching the query, oldest first. Clerks only see their own shop's.
    pub async fn list(
        &self,
        session: &ShopSession,
        query: TransferListQuery,
    ) -> AppResult<Vec<TransferRequest>> {
        let filter = TransferFilter {
            status: query.status,
            from_shop_id: query.from_shop_id,
            to_shop_id: query.to_shop_id,
            involving_shop_id: (!session.is_admin()).then_some(session.shop_id),
            acknowledged: query.acknowledged,
            resolved_within: None,
        };

        self.stores.transfers.list_transfers(&filter).await
    }
}
