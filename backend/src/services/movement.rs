//! Stock movement history of a shop
//!
//! Read-only. The four sections load concurrently and fail independently:
//! a section whose source errors comes back empty with its error set while
//! the others are still returned.

use shared::{
    DateRange, MovementCategory, ShopSession, ShopTransferMovement, StockMovements, TransferRequest,
};
use std::fmt::Display;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{Stores, TransferFilter};

/// Movement ledger service
#[derive(Clone)]
pub struct MovementService {
    stores: Stores,
}

impl MovementService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Movements of `shop_id` within `range`, each section most recent first
    pub async fn query(
        &self,
        session: &ShopSession,
        shop_id: Uuid,
        range: DateRange,
    ) -> AppResult<StockMovements> {
        if !session.can_view_shop(shop_id) {
            return Err(AppError::Forbidden(
                "Cannot view stock movements of another shop".to_string(),
            ));
        }

        let (transfers, spoilt_items, returns, shop_transfers) = tokio::join!(
            self.stores.movements.list_distributions(shop_id, &range),
            self.stores.movements.list_spoilage(shop_id, &range),
            self.stores.movements.list_returns(shop_id, &range),
            self.shop_transfers(shop_id, range),
        );

        Ok(StockMovements {
            shop_id,
            transfers: category("transfers", transfers),
            spoilt_items: category("spoilt_items", spoilt_items),
            returns: category("returns", returns),
            shop_transfers: category("shop_transfers", shop_transfers),
        })
    }

    /// Transfers resolved within the range, tagged relative to `shop_id`
    async fn shop_transfers(
        &self,
        shop_id: Uuid,
        range: DateRange,
    ) -> AppResult<Vec<ShopTransferMovement>> {
        let filter = TransferFilter {
            involving_shop_id: Some(shop_id),
            resolved_within: Some(range),
            ..Default::default()
        };

        let mut transfers = self.stores.transfers.list_transfers(&filter).await?;
        transfers.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));

        Ok(transfers
            .into_iter()
            .filter_map(|transfer| movement_for(shop_id, transfer))
            .collect())
    }
}

fn movement_for(shop_id: Uuid, transfer: TransferRequest) -> Option<ShopTransferMovement> {
    let direction = transfer.direction_for(shop_id)?;
    let counterpart_shop_id = if transfer.to_shop_id == shop_id {
        transfer.from_shop_id
    } else {
        transfer.to_shop_id
    };
    Some(ShopTransferMovement {
        direction,
        counterpart_shop_id,
        transfer,
    })
}

fn category<T, E: Display>(name: &str, result: Result<Vec<T>, E>) -> MovementCategory<T> {
    match result {
        Ok(items) => MovementCategory::loaded(items),
        Err(e) => {
            tracing::warn!(category = name, error = %e, "Movement section unavailable");
            MovementCategory::failed(e.to_string())
        }
    }
}
