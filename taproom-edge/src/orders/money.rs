//! Money calculation and line-item validation
//!
//! Totals are computed with `Decimal` and converted back to `f64`
//! (2 decimal places, half away from zero) for storage and the wire.

use rust_decimal::prelude::*;
use shared::models::OrderItem;

use crate::utils::{AppError, AppResult};

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed price per item (€1,000,000)
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per item
const MAX_QUANTITY: i32 = 9999;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> AppResult<()> {
    if !value.is_finite() {
        return Err(AppError::validation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Validate a single line item
///
/// A zero price is valid (house pour, comped drink).
pub fn validate_item(item: &OrderItem) -> AppResult<()> {
    if item.id.trim().is_empty() {
        return Err(AppError::validation("item id must not be empty"));
    }

    validate_price(item.price)?;

    if item.quantity <= 0 {
        return Err(AppError::validation(format!(
            "quantity must be positive, got {}",
            item.quantity
        )));
    }
    if item.quantity > MAX_QUANTITY {
        return Err(AppError::validation(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, item.quantity
        )));
    }

    Ok(())
}

/// Validate a unit price (menu item or order line)
pub fn validate_price(price: f64) -> AppResult<()> {
    require_finite(price, "price")?;
    if price < 0.0 {
        return Err(AppError::validation(format!(
            "price must be non-negative, got {}",
            price
        )));
    }
    if price > MAX_PRICE {
        return Err(AppError::validation(format!(
            "price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, price
        )));
    }
    Ok(())
}

/// Validate a full item list (non-empty, every line valid)
pub fn validate_items(items: &[OrderItem]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::validation("order must contain at least one item"));
    }
    items.iter().try_for_each(validate_item)
}

/// Validate a caller-supplied total override
pub fn validate_total(total: f64) -> AppResult<()> {
    require_finite(total, "total")?;
    if total < 0.0 {
        return Err(AppError::validation(format!(
            "total must be non-negative, got {}",
            total
        )));
    }
    Ok(())
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Σ price × quantity
pub fn subtotal(items: &[OrderItem]) -> f64 {
    let sum: Decimal = items
        .iter()
        .map(|item| to_decimal(item.price) * Decimal::from(item.quantity))
        .sum();
    to_f64(sum)
}

/// Append add-on lines, folding lines with the same item id and unit price
pub fn merge_items(existing: &[OrderItem], added: &[OrderItem]) -> Vec<OrderItem> {
    let mut merged = existing.to_vec();
    for item in added {
        match merged
            .iter_mut()
            .find(|line| line.id == item.id && to_decimal(line.price) == to_decimal(item.price))
        {
            Some(line) => line.quantity += item.quantity,
            None => merged.push(item.clone()),
        }
    }
    merged
}
