//! Shop-to-shop transfer requests and their state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::{BatchKey, Metric};
use crate::types::UnknownVariant;
use crate::validation::batch_number_field;

/// Lifecycle status of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Declined,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Accepted => "accepted",
            TransferStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "accepted" => Ok(TransferStatus::Accepted),
            "declined" => Ok(TransferStatus::Declined),
            _ => Err(UnknownVariant::new("transfer status", s)),
        }
    }
}

/// Direction of a transfer relative to one shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    In,
    Out,
}

/// How the destination shop resolves a pending transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Accept,
    Decline { note: String },
}

impl Resolution {
    pub fn status(&self) -> TransferStatus {
        match self {
            Resolution::Accept => TransferStatus::Accepted,
            Resolution::Decline { .. } => TransferStatus::Declined,
        }
    }
}

/// Outcome of applying a resolution or acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The request was already in its final state; nothing changed
    AlreadyResolved,
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Rejected state transitions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("a note is required to decline a transfer")]
    MissingDeclineNote,

    #[error("only declined transfers can be acknowledged (status is {0})")]
    NotDeclined(TransferStatus),
}

/// A request to move quantity of one batch from one shop to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: Uuid,
    /// Client idempotency key
    pub request_key: Option<Uuid>,
    pub from_shop_id: Uuid,
    pub to_shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
    /// Canonical units
    pub quantity: i64,
    pub metric: Metric,
    pub status: TransferStatus,
    pub decline_note: Option<String>,
    pub created_by: Option<Uuid>,
    pub resolved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl TransferRequest {
    pub fn pending(new: &NewTransfer, id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            request_key: new.request_key,
            from_shop_id: new.from_shop_id,
            to_shop_id: new.to_shop_id,
            item_name: new.item_name.clone(),
            batch_number: new.batch_number.clone(),
            quantity: new.quantity,
            metric: new.metric,
            status: TransferStatus::Pending,
            decline_note: None,
            created_by: new.created_by,
            resolved_by: None,
            created_at,
            resolved_at: None,
            acknowledged_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// When the transfer last changed state: resolution, or creation while pending
    pub fn notified_at(&self) -> DateTime<Utc> {
        self.resolved_at.unwrap_or(self.created_at)
    }

    pub fn source_key(&self) -> BatchKey {
        BatchKey::new(self.from_shop_id, self.item_name.clone(), self.batch_number.clone())
    }

    pub fn destination_key(&self) -> BatchKey {
        BatchKey::new(self.to_shop_id, self.item_name.clone(), self.batch_number.clone())
    }

    /// Batch that receives the reserved quantity once the request is resolved
    pub fn settlement_key(&self) -> Option<BatchKey> {
        match self.status {
            TransferStatus::Pending => None,
            TransferStatus::Accepted => Some(self.destination_key()),
            TransferStatus::Declined => Some(self.source_key()),
        }
    }

    pub fn direction_for(&self, shop_id: Uuid) -> Option<TransferDirection> {
        if self.to_shop_id == shop_id {
            Some(TransferDirection::In)
        } else if self.from_shop_id == shop_id {
            Some(TransferDirection::Out)
        } else {
            None
        }
    }

    /// Resolve a pending request.
    ///
    /// A request that already reached a terminal state is left untouched and
    /// reported as [`Transition::AlreadyResolved`], so duplicate submissions
    /// are harmless.
    pub fn apply(
        &mut self,
        resolution: &Resolution,
        resolved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        if self.is_terminal() {
            return Ok(Transition::AlreadyResolved);
        }

        if let Resolution::Decline { note } = resolution {
            let note = crate::validation::validate_decline_note(note)
                .map_err(|_| TransitionError::MissingDeclineNote)?;
            self.decline_note = Some(note);
        }

        self.status = resolution.status();
        self.resolved_by = resolved_by;
        self.resolved_at = Some(at);
        Ok(Transition::Applied)
    }

    /// Mark a decline as seen by the originating shop
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> Result<Transition, TransitionError> {
        if self.status != TransferStatus::Declined {
            return Err(TransitionError::NotDeclined(self.status));
        }
        if self.acknowledged_at.is_some() {
            return Ok(Transition::AlreadyResolved);
        }
        self.acknowledged_at = Some(at);
        Ok(Transition::Applied)
    }
}

/// Data required to persist a new pending transfer
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransfer {
    pub request_key: Option<Uuid>,
    pub from_shop_id: Uuid,
    pub to_shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
    pub quantity: i64,
    pub metric: Metric,
    pub created_by: Option<Uuid>,
}

impl NewTransfer {
    pub fn source_key(&self) -> BatchKey {
        BatchKey::new(self.from_shop_id, self.item_name.clone(), self.batch_number.clone())
    }
}

/// Body of `POST /stock-transfer`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTransferInput {
    pub to_shop_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub item_name: String,
    /// Required whenever the item has more than one batch with stock
    #[validate(
        length(min = 1, max = 100, message = "Batch number cannot be empty"),
        custom = "batch_number_field"
    )]
    pub batch_number: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i64,
    pub request_key: Option<Uuid>,
}

/// Response of `POST /stock-transfer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTransfer {
    pub transfer_id: Uuid,
    pub transfer: TransferRequest,
}

/// Action submitted to `POST /confirm-transfer/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmAction {
    Accept,
    Decline,
}

/// Body of `POST /confirm-transfer/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmTransferInput {
    pub action: ConfirmAction,
    pub note: Option<String>,
}

impl ConfirmTransferInput {
    pub fn accept() -> Self {
        Self {
            action: ConfirmAction::Accept,
            note: None,
        }
    }

    pub fn decline(note: impl Into<String>) -> Self {
        Self {
            action: ConfirmAction::Decline,
            note: Some(note.into()),
        }
    }

    pub fn into_resolution(self) -> Result<Resolution, TransitionError> {
        match self.action {
            ConfirmAction::Accept => Ok(Resolution::Accept),
            ConfirmAction::Decline => {
                let note = self.note.unwrap_or_default();
                let note = crate::validation::validate_decline_note(&note)
                    .map_err(|_| TransitionError::MissingDeclineNote)?;
                Ok(Resolution::Decline { note })
            }
        }
    }
}

/// Result of accepting or declining
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmOutcome {
    pub transfer: TransferRequest,
    /// False when the request had already been resolved and this call changed nothing
    pub applied: bool,
}

/// Query of `GET /shop-to-shop-transfers`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferListQuery {
    pub status: Option<TransferStatus>,
    pub from_shop_id: Option<Uuid>,
    pub to_shop_id: Option<Uuid>,
    pub acknowledged: Option<bool>,
}

impl TransferListQuery {
    pub fn pending_for(shop_id: Uuid) -> Self {
        Self {
            status: Some(TransferStatus::Pending),
            to_shop_id: Some(shop_id),
            ..Default::default()
        }
    }
}
