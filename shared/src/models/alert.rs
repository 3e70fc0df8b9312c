//! Low-stock alert models and lifecycle rules

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ParseEnumError, Product};

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Active,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "dismissed" => Ok(AlertStatus::Dismissed),
            other => Err(ParseEnumError::new("alert status", other)),
        }
    }
}

/// A low-stock alert for one product of one owner
///
/// At most one alert per (product, owner) may be `Active` at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockAlert {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    /// Product quantity when the alert was raised
    pub current_quantity: i64,
    /// Reorder level when the alert was raised
    pub reorder_level: i64,
    pub is_read: bool,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockAlert {
    /// Snapshot a new active alert from the product's current state
    pub fn raise(product: &Product) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            product_id: product.id,
            user_id: product.user_id,
            current_quantity: product.quantity,
            reorder_level: product.reorder_level,
            is_read: false,
            status: AlertStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// What the alert engine should do after a quantity change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    /// Create a new active alert
    Raise,
    /// Dismiss every active alert for the product
    DismissActive,
    /// Leave alerts untouched
    Keep,
}

/// Decide the alert action after the quantity went down
pub fn action_after_decrease(quantity: i64, reorder_level: i64, has_active: bool) -> AlertAction {
    if quantity <= reorder_level && !has_active {
        AlertAction::Raise
    } else {
        AlertAction::Keep
    }
}

/// Decide the alert action after the quantity went up
///
/// Never raises: a product still at or below its threshold keeps whatever
/// alert it already has.
pub fn action_after_increase(quantity: i64, reorder_level: i64) -> AlertAction {
    if quantity > reorder_level {
        AlertAction::DismissActive
    } else {
        AlertAction::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decrease_raises_only_without_active_alert() {
        assert_eq!(action_after_decrease(3, 10, false), AlertAction::Raise);
        assert_eq!(action_after_decrease(3, 10, true), AlertAction::Keep);
        assert_eq!(action_after_decrease(10, 10, false), AlertAction::Raise);
        assert_eq!(action_after_decrease(11, 10, false), AlertAction::Keep);
    }

    #[test]
    fn test_increase_dismisses_only_above_threshold() {
        assert_eq!(action_after_increase(11, 10), AlertAction::DismissActive);
        assert_eq!(action_after_increase(10, 10), AlertAction::Keep);
        assert_eq!(action_after_increase(0, 10), AlertAction::Keep);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("active".parse::<AlertStatus>().unwrap(), AlertStatus::Active);
        assert_eq!("dismissed".parse::<AlertStatus>().unwrap(), AlertStatus::Dismissed);
        assert!("closed".parse::<AlertStatus>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_increase_never_raises(quantity in 0i64..1000, level in 0i64..1000) {
            prop_assert_ne!(action_after_increase(quantity, level), AlertAction::Raise);
        }

        #[test]
        fn prop_decrease_never_dismisses(
            quantity in 0i64..1000,
            level in 0i64..1000,
            has_active in any::<bool>()
        ) {
            let action = action_after_decrease(quantity, level, has_active);
            prop_assert_ne!(action, AlertAction::DismissActive);
            if has_active {
                prop_assert_eq!(action, AlertAction::Keep);
            }
        }
    }
}
