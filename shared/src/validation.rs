//! Validation utilities for stock movements and transfers

use chrono::NaiveDate;
use validator::ValidationError;

/// Maximum length of a decline note
pub const MAX_DECLINE_NOTE_LEN: usize = 500;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate a canonical movement quantity
pub fn validate_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate that a requested quantity fits the available stock
pub fn validate_within_available(requested: i64, available: i64) -> Result<(), &'static str> {
    validate_quantity(requested)?;
    if requested > available {
        return Err("Requested quantity exceeds available stock");
    }
    Ok(())
}

// ============================================================================
// Transfer Validations
// ============================================================================

/// Validate and normalize a decline note
pub fn validate_decline_note(note: &str) -> Result<String, &'static str> {
    let note = note.trim();
    if note.is_empty() {
        return Err("A note is required to decline a transfer");
    }
    if note.chars().count() > MAX_DECLINE_NOTE_LEN {
        return Err("Decline note must be at most 500 characters");
    }
    Ok(note.to_string())
}

/// Validate a batch number as typed by a clerk
pub fn validate_batch_number(batch_number: &str) -> Result<(), &'static str> {
    let trimmed = batch_number.trim();
    if trimmed.is_empty() {
        return Err("Batch number cannot be empty");
    }
    if trimmed.len() != batch_number.len() {
        return Err("Batch number cannot start or end with whitespace");
    }
    Ok(())
}

/// Validate a free-text reason once surrounding whitespace is dropped
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("A reason is required");
    }
    Ok(())
}

// ============================================================================
// Form Field Validators
// ============================================================================

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn batch_number_field(batch_number: &str) -> Result<(), ValidationError> {
    validate_batch_number(batch_number).map_err(|message| field_error("batch_number", message))
}

pub fn reason_field(reason: &str) -> Result<(), ValidationError> {
    validate_reason(reason).map_err(|message| field_error("reason", message))
}

// ============================================================================
// Query Validations
// ============================================================================

/// Validate a date range for history queries
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), &'static str> {
    if start > end {
        return Err("Start date must not be after end date");
    }
    Ok(())
}
