//! # Validation Module
//!
//! Field validators for checkout and warehouse input.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extraction (serde)                                      │
//! │  └── Shape and type of the JSON body                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Lengths, formats, ranges. Runs before any transaction starts      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (total identity)                        │
//! │  └── UNIQUE / FOREIGN KEY constraints                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Length limits count characters, not bytes: Vietnamese names and
//! addresses are mostly multi-byte.

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Helpers
// =============================================================================

fn trimmed_length(field: &str, value: &str, min: usize, max: usize) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value.to_string())
}

// =============================================================================
// Checkout Fields
// =============================================================================

/// Recipient name: 2 to 100 characters after trimming.
///
/// ```rust
/// use emporia_core::validation::validate_recipient_name;
///
/// assert_eq!(validate_recipient_name("  Nguyễn An ").unwrap(), "Nguyễn An");
/// assert!(validate_recipient_name("A").is_err());
/// ```
pub fn validate_recipient_name(name: &str) -> ValidationResult<String> {
    trimmed_length("recipientName", name, 2, 100)
}

/// Phone number: a leading `0` followed by 9 or 10 digits, with nothing
/// around them.
///
/// ```rust
/// use emporia_core::validation::validate_phone;
///
/// assert!(validate_phone("0901234567").is_ok());
/// assert!(validate_phone("09012345678").is_ok());
/// assert!(validate_phone("+84901234567").is_err());
/// assert!(validate_phone(" 0901234567").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    if phone.trim().is_empty() {
        return Err(ValidationError::required("phone"));
    }
    let well_formed = phone.starts_with('0')
        && (10..=11).contains(&phone.len())
        && phone.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(ValidationError::invalid_format(
            "phone",
            "must be 10 or 11 digits starting with 0",
        ));
    }
    Ok(phone.to_string())
}

/// Shipping address: 10 to 500 characters after trimming.
pub fn validate_address(address: &str) -> ValidationResult<String> {
    trimmed_length("address", address, 10, 500)
}

/// Optional note: at most 1000 characters; blank becomes `None`.
pub fn validate_note(note: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if note.chars().count() > 1000 {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: 1000,
        });
    }
    Ok(Some(note.to_string()))
}

/// Idempotency key: 1 to 128 printable ASCII characters, otherwise opaque.
///
/// A blank key is treated as "no key".
pub fn validate_idempotency_key(key: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return Ok(None);
    };
    if key.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "idempotencyKey".to_string(),
            max: 128,
        });
    }
    if !key.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ValidationError::invalid_format(
            "idempotencyKey",
            "must contain only printable ASCII characters",
        ));
    }
    Ok(Some(key.to_string()))
}

/// Client-claimed discount must not be negative.
pub fn validate_claimed_discount(amount: Money) -> ValidationResult<Money> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "discountAmount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(amount)
}

// =============================================================================
// Warehouse Fields
// =============================================================================

/// A non-empty identifier (product id, order id, actor id).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(id.to_string())
}

/// Quantity moved by an import or export: strictly positive.
///
/// ```rust
/// use emporia_core::validation::validate_movement_quantity;
///
/// assert!(validate_movement_quantity(5).is_ok());
/// assert!(validate_movement_quantity(0).is_err());
/// ```
pub fn validate_movement_quantity(quantity: i64) -> ValidationResult<i64> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(quantity)
}

/// Quantity of one product on an order line: 1 to [`MAX_LINE_QUANTITY`].
pub fn validate_line_quantity(quantity: i64) -> ValidationResult<i64> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(quantity)
}

/// Target of a stocktake adjustment: zero or more.
pub fn validate_stock_level(stock: i64) -> ValidationResult<i64> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "newStock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(stock)
}

// =============================================================================
// Unit Tests
// =============================================================================
