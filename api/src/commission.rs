//! Per-line commission math.
//!
//! `price_line` is the only place commission figures come from; the order
//! store calls it at item creation and at every pre-payment edit. It is pure
//! and side-effect-free, so recomputing on an edited order always gives the
//! same result for the same inputs.
//!
//! Two pricing modes exist:
//! - **Dropshipping**: the platform's cut comes out of the supplier cost
//!   margin, not the seller's sale price. The supplier grants a discount of
//!   `commission_rate`% on the cost price; the seller pays the discounted
//!   vendor cost and keeps the spread.
//! - **Stock** (seller-owned inventory): the platform takes a straight
//!   percentage of line revenue.

use rust_decimal::Decimal;

use payloads::{CommissionBreakdown, ItemType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommissionError {
    #[error("Commission rate {0} is outside [0, 100]")]
    InvalidRate(Decimal),
    #[error("Dropshipping item has no cost price to base commission on")]
    MissingCostBasis,
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i32),
    #[error("Unit price must not be negative, got {0}")]
    InvalidPrice(Decimal),
}

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Compute commission, seller revenue, and (for dropshipping) supplier cost
/// for one order line.
pub fn price_line(
    unit_price: Decimal,
    quantity: i32,
    commission_rate: Decimal,
    item_type: ItemType,
    cost_price: Option<Decimal>,
) -> Result<CommissionBreakdown, CommissionError> {
    if commission_rate < Decimal::ZERO || commission_rate > HUNDRED {
        return Err(CommissionError::InvalidRate(commission_rate));
    }
    if quantity <= 0 {
        return Err(CommissionError::InvalidQuantity(quantity));
    }
    if unit_price < Decimal::ZERO {
        return Err(CommissionError::InvalidPrice(unit_price));
    }

    let qty = Decimal::from(quantity);
    let gross = unit_price * qty;

    match item_type {
        ItemType::Dropshipping => {
            let cost = cost_price.ok_or(CommissionError::MissingCostBasis)?;
            let discount = cost * commission_rate / HUNDRED;
            let vendor_cost = cost - discount;
            Ok(CommissionBreakdown {
                commission_rate,
                commission_amount: discount * qty,
                seller_revenue: gross - vendor_cost * qty,
                supplier_cost: Some(vendor_cost * qty),
            })
        }
        ItemType::Stock => {
            let commission_amount = gross * commission_rate / HUNDRED;
            Ok(CommissionBreakdown {
                commission_rate,
                commission_amount,
                seller_revenue: gross - commission_amount,
                supplier_cost: None,
            })
        }
    }
}
