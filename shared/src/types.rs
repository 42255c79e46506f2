//! Common types used across the platform

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a stored or submitted string does not name a known variant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Role of the employee behind a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShopRole {
    #[default]
    Clerk,
    Admin,
}

/// Explicit shop context handed to every operation.
///
/// Replaces the ambient shop/session lookup of the dashboard: whoever acts on
/// a transfer does so as a particular employee of a particular shop, and the
/// bearer credential travels with that identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopSession {
    pub shop_id: Uuid,
    pub employee_id: Uuid,
    pub role: ShopRole,
    pub credential: String,
}

impl ShopSession {
    pub fn new(shop_id: Uuid, employee_id: Uuid, credential: impl Into<String>) -> Self {
        Self {
            shop_id,
            employee_id,
            role: ShopRole::Clerk,
            credential: credential.into(),
        }
    }

    pub fn with_role(mut self, role: ShopRole) -> Self {
        self.role = role;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == ShopRole::Admin
    }

    /// Whether this session may read data belonging to `shop_id`
    pub fn can_view_shop(&self, shop_id: Uuid) -> bool {
        self.is_admin() || self.shop_id == shop_id
    }
}

/// Inclusive date range for queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, &'static str> {
        crate::validation::validate_date_range(start, end)?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let (from, until) = self.bounds();
        at >= from && at < until
    }

    /// UTC bounds as a half-open interval `[start 00:00, end + 1 day 00:00)`
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = Utc.from_utc_datetime(&self.start.and_time(chrono::NaiveTime::MIN));
        let until = Utc.from_utc_datetime(&self.end.and_time(chrono::NaiveTime::MIN)) + Duration::days(1);
        (from, until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_includes_whole_end_day() {
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 2)).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();

        assert!(range.contains(late));
        assert!(!range.contains(next));
    }

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        assert!(DateRange::new(date(2024, 3, 2), date(2024, 3, 1)).is_err());
    }

    #[test]
    fn test_session_visibility() {
        let shop = Uuid::new_v4();
        let clerk = ShopSession::new(shop, Uuid::new_v4(), "token");
        let admin = clerk.clone().with_role(ShopRole::Admin);

        assert!(clerk.can_view_shop(shop));
        assert!(!clerk.can_view_shop(Uuid::new_v4()));
        assert!(admin.can_view_shop(Uuid::new_v4()));
    }
}
