//! # Ledger Events
//!
//! Notifications published after a mutation commits. The presentation
//! layer subscribes and decides for itself when to refresh which view.
//!
//! ## Wire Format
//! Events serialize as an adjacently tagged enum:
//! ```json
//! { "type": "StockAdjusted", "payload": { "product_id": "...", "delta": -1, "quantity": 41 } }
//! ```
//!
//! An event is only ever published for a committed change; a rolled-back
//! transaction publishes nothing.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::BillStatus;

/// A committed change to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload")]
#[ts(export)]
pub enum LedgerEvent {
    // =========================================================================
    // Product Store
    // =========================================================================
    ProductCreated {
        product_id: String,
    },

    /// Name, manual price or absolute quantity changed.
    ProductUpdated {
        product_id: String,
    },

    StockAdjusted {
        product_id: String,
        delta: i64,
        /// Quantity after the adjustment.
        quantity: i64,
    },

    ProductDeleted {
        product_id: String,
    },

    // =========================================================================
    // Bill Ledger / Return Processor
    // =========================================================================
    BillSaved {
        bill_id: String,
        /// Products whose stock the sale decremented.
        product_ids: Vec<String>,
    },

    BillReturned {
        bill_id: String,
        product_ids: Vec<String>,
    },

    BillItemReturned {
        bill_id: String,
        item_id: String,
        quantity: i64,
        status: BillStatus,
    },

    BillDeleted {
        bill_id: String,
        product_ids: Vec<String>,
    },

    BillRenamed {
        bill_id: String,
    },

    // =========================================================================
    // Snapshot Store
    // =========================================================================
    SnapshotSaved {
        month: u32,
        year: i32,
    },
}

impl LedgerEvent {
    /// Whether product stock levels may have changed.
    pub fn touches_stock(&self) -> bool {
        matches!(
            self,
            LedgerEvent::StockAdjusted { .. }
                | LedgerEvent::ProductCreated { .. }
                | LedgerEvent::ProductUpdated { .. }
                | LedgerEvent::ProductDeleted { .. }
                | LedgerEvent::BillSaved { .. }
                | LedgerEvent::BillReturned { .. }
                | LedgerEvent::BillItemReturned { .. }
                | LedgerEvent::BillDeleted { .. }
        )
    }

    /// Whether bill listings or reports may have changed.
    pub fn touches_bills(&self) -> bool {
        matches!(
            self,
            LedgerEvent::BillSaved { .. }
                | LedgerEvent::BillReturned { .. }
                | LedgerEvent::BillItemReturned { .. }
                | LedgerEvent::BillDeleted { .. }
                | LedgerEvent::BillRenamed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = LedgerEvent::StockAdjusted {
            product_id: "p-1".to_string(),
            delta: -1,
            quantity: 41,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StockAdjusted");
        assert_eq!(json["payload"]["quantity"], 41);

        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_scopes() {
        let renamed = LedgerEvent::BillRenamed {
            bill_id: "b".to_string(),
        };
        assert!(renamed.touches_bills());
        assert!(!renamed.touches_stock());

        let snapshot = LedgerEvent::SnapshotSaved {
            month: 1,
            year: 2024,
        };
        assert!(!snapshot.touches_bills());
        assert!(!snapshot.touches_stock());
    }
}
