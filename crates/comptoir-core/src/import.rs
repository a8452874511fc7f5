//! # Import Cost Estimator Contract
//!
//! Request and response shapes for the external landed-cost service, plus
//! the rules the dashboard applies around it. The cost formula itself lives
//! in that service.
//!
//! ```text
//! ┌──────────────────────┐   estimate   ┌──────────────────────────────┐
//! │ ImportEstimateRequest│ ───────────► │ external estimator           │
//! │ mode, price, weight, │              │ transport + duty + VAT +     │
//! │ warehouse, volume?   │ ◄─────────── │ handling, suggested price    │
//! └──────────────────────┘ ImportEstimate└──────────────────────────────┘
//!            │
//!            ▼ to_line_item()
//!   LineItem (PRODUCT if weight > 0, else SERVICE) at suggested_price
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::LineItem;
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::ItemKind;
use crate::validation::{validate_name, ValidationResult};

/// Freight mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Air,
    /// Requires a volume.
    Sea,
}

/// What the estimator needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ImportEstimateRequest {
    /// Only used locally for validation and the resulting cart line; not
    /// sent to the estimator.
    #[serde(default, skip_serializing)]
    pub product_name: String,
    pub mode: TransportMode,
    /// In minor units of `supplier_currency`.
    pub supplier_price: Money,
    pub supplier_currency: String,
    pub weight: f64,
    pub warehouse: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl ImportEstimateRequest {
    /// Checks everything the estimator would otherwise reject.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("productName", &self.product_name)?;
        if !self.supplier_price.is_positive() {
            return Err(ValidationError::must_be_positive("supplierPrice"));
        }
        if self.supplier_currency.trim().is_empty() {
            return Err(ValidationError::required("supplierCurrency"));
        }
        if self.warehouse.trim().is_empty() {
            return Err(ValidationError::required("warehouse"));
        }
        match self.mode {
            TransportMode::Air if !(self.weight > 0.0) => {
                Err(ValidationError::must_be_positive("weight"))
            }
            TransportMode::Sea if !self.volume.is_some_and(|v| v > 0.0) => {
                Err(ValidationError::must_be_positive("volume"))
            }
            _ => Ok(()),
        }
    }

    /// The estimator only sees volume for sea freight.
    pub fn for_estimator(&self) -> Self {
        let mut request = self.clone();
        if self.mode == TransportMode::Air {
            request.volume = None;
        }
        request
    }
}

/// Whether the dashboard should fire an estimate on its own.
///
/// True once price and weight are positive, and for sea freight once volume
/// is positive as well.
pub fn should_auto_estimate(mode: TransportMode, supplier_price: Money, weight: f64, volume: Option<f64>) -> bool {
    let base = supplier_price.is_positive() && weight > 0.0;
    match mode {
        TransportMode::Air => base,
        TransportMode::Sea => base && volume.is_some_and(|v| v > 0.0),
    }
}

/// Cost breakdown returned by the estimator, in local currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ImportEstimate {
    pub transport_cost: Money,
    pub customs_duty: Money,
    pub vat: Money,
    pub handling_fee: Money,
    pub total_cost_local: Money,
    pub suggested_price: Money,
    pub margin_percent: f64,
    /// Free text, e.g. "5-7 days".
    pub transit_time: String,
}

impl ImportEstimate {
    /// Cart line for a confirmed estimate.
    pub fn to_line_item(&self, name: &str, weight: f64) -> LineItem {
        let kind = if weight > 0.0 {
            ItemKind::Product
        } else {
            ItemKind::Service
        };
        LineItem::new(kind, None, name, self.suggested_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: TransportMode) -> ImportEstimateRequest {
        ImportEstimateRequest {
            product_name: "Switch 24 ports".to_string(),
            mode,
            supplier_price: Money::from_minor(12_000),
            supplier_currency: "USD".to_string(),
            weight: 3.5,
            warehouse: "shenzhen".to_string(),
            volume: None,
        }
    }

    #[test]
    fn test_air_ignores_volume() {
        let req = request(TransportMode::Air);
        assert!(req.validate().is_ok());

        let with_volume = ImportEstimateRequest {
            volume: Some(0.2),
            ..req
        };
        assert_eq!(with_volume.for_estimator().volume, None);
    }

    #[test]
    fn test_sea_requires_volume() {
        let req = request(TransportMode::Sea);
        assert!(matches!(
            req.validate(),
            Err(ValidationError::MustBePositive { ref field }) if field == "volume"
        ));
        let ok = ImportEstimateRequest {
            volume: Some(0.05),
            ..req
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.for_estimator().volume, Some(0.05));
    }

    #[test]
    fn test_name_and_price_required() {
        let mut req = request(TransportMode::Air);
        req.product_name = " ".to_string();
        assert!(matches!(req.validate(), Err(ValidationError::Required { .. })));

        let mut req = request(TransportMode::Air);
        req.supplier_price = Money::zero();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_auto_estimate_trigger() {
        let price = Money::from_minor(500);
        assert!(should_auto_estimate(TransportMode::Air, price, 1.0, None));
        assert!(!should_auto_estimate(TransportMode::Air, price, 0.0, None));
        assert!(!should_auto_estimate(TransportMode::Air, Money::zero(), 1.0, None));
        assert!(!should_auto_estimate(TransportMode::Sea, price, 1.0, None));
        assert!(!should_auto_estimate(TransportMode::Sea, price, 1.0, Some(0.0)));
        assert!(should_auto_estimate(TransportMode::Sea, price, 1.0, Some(0.3)));
    }

    #[test]
    fn test_product_name_not_sent() {
        let json = serde_json::to_value(request(TransportMode::Air)).unwrap();
        assert!(json.get("productName").is_none());
        assert!(json.get("volume").is_none());
        assert_eq!(json["supplierPrice"], 12_000);
    }
}
