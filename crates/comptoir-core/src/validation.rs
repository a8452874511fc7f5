//! # Validation Module
//!
//! Boundary checks run before anything reaches the calculators or the
//! database.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Dashboard (TypeScript)                                       │
//! │  ├── Disabled buttons (stock ≤ 0, empty cart)                          │
//! │  └── Inline messages                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: admin-api handlers (Rust)                                    │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0)                                                │
//! │  ├── UNIQUE ticket codes                                               │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The calculators in [`crate::discount`] are total and never call in here;
//! callers validate first.

use chrono::NaiveDate;

use crate::discount::{DiscountDescriptor, DiscountKind};
use crate::error::ValidationError;
use crate::money::{Money, FULL_BPS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest code accepted into the pool.
pub const MAX_CODE_LENGTH: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (catalog item, import product, customer).
///
/// ```rust
/// use comptoir_core::validation::validate_name;
///
/// assert!(validate_name("name", "Clé USB 64 Go").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a ticket duration label ("1h", "24h", "1 semaine").
pub fn validate_duration_label(duration: &str) -> ValidationResult<()> {
    let duration = duration.trim();
    if duration.is_empty() {
        return Err(ValidationError::required("duration"));
    }
    if duration.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "duration".to_string(),
            max: 50,
        });
    }
    Ok(())
}

/// Validates one ticket code before it enters the pool.
///
/// Codes are printed on vouchers and typed back by customers, so no
/// whitespace is allowed inside them.
pub fn validate_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }
    if code.len() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }
    if code.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a strictly positive count (stock added, history quantity).
pub fn validate_positive_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

/// Validates a price. Zero is allowed (free items).
///
/// ```rust
/// use comptoir_core::money::Money;
/// use comptoir_core::validation::validate_price;
///
/// assert!(validate_price("price", Money::from_minor(1099)).is_ok());
/// assert!(validate_price("price", Money::zero()).is_ok());
/// assert!(validate_price("price", Money::from_minor(-100)).is_err());
/// ```
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a discount descriptor.
///
/// ## Rules
/// - Value must be non-negative
/// - Percentage must be within 0..=10000 bps (0% to 100%)
pub fn validate_discount(discount: &DiscountDescriptor) -> ValidationResult<()> {
    if discount.value < 0 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    if discount.kind == DiscountKind::Percentage && discount.value > FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: FULL_BPS,
        });
    }
    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Parses a business day `YYYY-MM-DD`.
pub fn parse_business_date(raw: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidFormat {
        field: "date".to_string(),
        reason: "expected YYYY-MM-DD".to_string(),
    })
}

/// Parses a month `YYYY-MM` into `(year, month)`.
///
/// ```rust
/// use comptoir_core::validation::parse_month;
///
/// assert_eq!(parse_month("2024-03").unwrap(), (2024, 3));
/// assert!(parse_month("2024-13").is_err());
/// ```
pub fn parse_month(raw: &str) -> ValidationResult<(i32, u32)> {
    let invalid = || ValidationError::InvalidFormat {
        field: "month".to_string(),
        reason: "expected YYYY-MM".to_string(),
    };
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    Ok((year, month))
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
