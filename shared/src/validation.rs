//! Input validation for the Inventory Manager

use rust_decimal::Decimal;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SKU_LEN: usize = 64;
pub const MAX_NOTE_LEN: usize = 1000;

/// Largest stock quantity, reorder level or single movement
pub const MAX_QUANTITY: i64 = 1_000_000_000_000;

/// Largest unit price or cost (`NUMERIC(14, 4)`)
pub fn max_unit_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 4)
}

/// Largest line or sale total (`NUMERIC(16, 4)`)
pub fn max_sale_amount() -> Decimal {
    Decimal::new(9_999_999_999_999_999, 4)
}

// ============================================================================
// Product Validations
// ============================================================================

/// Validate a product or customer display name
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name must not be empty");
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err("Name must be at most 200 characters");
    }
    Ok(())
}

/// Validate SKU format (1-64 characters of letters, digits, '-', '_' or '.')
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.is_empty() {
        return Err("SKU must not be empty");
    }
    if sku.len() > MAX_SKU_LEN {
        return Err("SKU must be at most 64 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("SKU may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

/// Validate a stock quantity or reorder level
pub fn validate_non_negative(value: i64) -> Result<(), &'static str> {
    if value < 0 {
        return Err("Value cannot be negative");
    }
    if value > MAX_QUANTITY {
        return Err("Value must be at most 1000000000000");
    }
    Ok(())
}

/// Validate a quantity that must move stock (sale lines, restocks)
pub fn validate_positive_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    if quantity > MAX_QUANTITY {
        return Err("Quantity must be at most 1000000000000");
    }
    Ok(())
}

/// Validate a price or cost
pub fn validate_money(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount.scale() > 4 {
        return Err("Amount supports at most 4 decimal places");
    }
    if amount > max_unit_amount() {
        return Err("Amount must be at most 9999999999.9999");
    }
    Ok(())
}

/// Validate a computed line or sale total
pub fn validate_sale_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount > max_sale_amount() {
        return Err("Total exceeds 999999999999.9999");
    }
    Ok(())
}

/// Validate free-text notes
pub fn validate_note(note: &str) -> Result<(), &'static str> {
    if note.chars().count() > MAX_NOTE_LEN {
        return Err("Note must be at most 1000 characters");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Normalize a free-text search term; blank terms mean "no filter"
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
