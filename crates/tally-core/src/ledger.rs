//! # Ledger Rules
//!
//! The bill return state machine and the stock arithmetic behind returns
//! and deletions. Pure functions: the repositories in tally-db load the
//! rows, ask this module what should change, then write it inside one
//! transaction.
//!
//! ## Bill Status Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │     save_bill                                                           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │    ┌─────────┐  return_bill_item   ┌─────────┐                         │
//! │    │  PAID   │────(some units)────►│ PARTIAL │──┐ return_bill_item      │
//! │    └────┬────┘                     └────┬────┘◄─┘ (more units)         │
//! │         │                               │                               │
//! │         │ return_bill_full              │ return_bill_full, or the      │
//! │         │ or last units returned        │ last outstanding units        │
//! │         ▼                               ▼                               │
//! │    ┌──────────────────────────────────────────┐                        │
//! │    │                RETURNED                  │  (terminal)            │
//! │    └──────────────────────────────────────────┘                        │
//! │                                                                         │
//! │  Status never moves backwards: nothing re-sells units on a bill.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{Bill, BillItem, BillStatus};
use crate::validation::validate_return_quantity;

// =============================================================================
// Status Recompute
// =============================================================================

/// Recomputes a bill's status from its items after a return.
///
/// - every item fully returned → `Returned`
/// - any item with returned units → `Partial`
/// - otherwise the current status is kept
///
/// ## Example
/// ```rust
/// use tally_core::ledger::recompute_status;
/// use tally_core::BillStatus;
///
/// assert_eq!(recompute_status(BillStatus::Paid, &[]), BillStatus::Paid);
/// ```
pub fn recompute_status(current: BillStatus, items: &[BillItem]) -> BillStatus {
    if items.is_empty() {
        return current;
    }

    if items.iter().all(BillItem::is_fully_returned) {
        BillStatus::Returned
    } else if items.iter().any(|item| item.returned_quantity > 0) {
        BillStatus::Partial
    } else {
        current
    }
}

// =============================================================================
// Return Planning
// =============================================================================

/// Stock to put back on a product's shelf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRestore {
    pub item_id: String,
    /// `None` when the bill item was never linked to a product.
    pub product_id: Option<String>,
    pub quantity: i64,
}

/// Checks a single-line return and returns the item's new returned quantity.
///
/// ## Errors
/// - `Validation` when `return_qty <= 0`
/// - `OverReturn` when `returned_quantity + return_qty > quantity`
pub fn plan_item_return(item: &BillItem, return_qty: i64) -> CoreResult<i64> {
    validate_return_quantity(return_qty)?;

    let outstanding = item.outstanding_quantity();
    if return_qty > outstanding {
        return Err(CoreError::OverReturn {
            item_id: item.id.clone(),
            outstanding,
            requested: return_qty,
        });
    }

    Ok(item.returned_quantity + return_qty)
}

/// Lists the stock each item gets back when the whole bill is returned.
///
/// Items already fully returned contribute nothing.
///
/// ## Errors
/// - `AlreadyReturned` when the bill is already `Returned`
pub fn plan_full_return(bill: &Bill) -> CoreResult<Vec<StockRestore>> {
    if bill.status == BillStatus::Returned {
        return Err(CoreError::AlreadyReturned(bill.id.clone()));
    }
    Ok(outstanding_restores(&bill.items))
}

/// Lists the stock to restore before a bill is deleted.
///
/// A `Returned` bill already gave its stock back through the full-return
/// path, so nothing is restored twice.
pub fn plan_delete_restore(bill: &Bill) -> Vec<StockRestore> {
    if bill.status == BillStatus::Returned {
        return Vec::new();
    }
    outstanding_restores(&bill.items)
}

fn outstanding_restores(items: &[BillItem]) -> Vec<StockRestore> {
    items
        .iter()
        .filter(|item| item.outstanding_quantity() > 0)
        .map(|item| StockRestore {
            item_id: item.id.clone(),
            product_id: item.product_id.clone(),
            quantity: item.outstanding_quantity(),
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
