//! # Commands Module
//!
//! Every operation exposed to the presentation layer.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (Command enum, dispatch)
//! ├── product.rs  ◄─── Product store
//! ├── bill.rs     ◄─── Checkout, bill history, returns, deletion
//! └── report.rs   ◄─── Sales reports, monthly snapshots
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  {"command":"adjustStock","args":{"productId":"p1","delta":-2}}        │
//! │         │                                                               │
//! │         │ serde (tag = "command", content = "args")                    │
//! │         ▼                                                               │
//! │  Command::AdjustStock { product_id, delta }                            │
//! │         │                                                               │
//! │         │ dispatch(&state, command)                                     │
//! │         ▼                                                               │
//! │  product::adjust_stock(&state, "p1", -2) -> Result<ProductDto, ApiError>│
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ApiResponse { success: true, data: {...} }                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money arguments are integer cents except where a form field is passed
//! through as text (`price`, `quantity` on the product form), which accept
//! either a JSON string or number and are parsed like typed input.

pub mod bill;
pub mod product;
pub mod report;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::{MonthlySnapshotInput, NewBill, ReportPeriod};
use tracing::debug;

use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

/// Raw form input: the text the user typed, or a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Number(serde_json::Number),
}

impl FormValue {
    pub fn as_text(&self) -> String {
        match self {
            FormValue::Text(text) => text.clone(),
            FormValue::Number(number) => number.to_string(),
        }
    }
}

/// One request from the presentation layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "command",
    content = "args",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    // Product store
    ListProducts,
    GetProduct {
        product_id: String,
    },
    CreateProduct {
        name: String,
        quantity: FormValue,
        price: FormValue,
        #[serde(default)]
        purchase_price: Option<FormValue>,
    },
    AdjustStock {
        product_id: String,
        delta: i64,
    },
    SetManualPrice {
        product_id: String,
        price: FormValue,
    },
    RenameProduct {
        product_id: String,
        name: String,
    },
    SetQuantity {
        product_id: String,
        quantity: FormValue,
    },
    DeleteProduct {
        product_id: String,
    },

    // Bill ledger
    SaveBill(NewBill),
    ListRecentBills,
    GetBill {
        bill_id: String,
    },
    RenameBill {
        bill_id: String,
        customer_name: String,
    },

    // Return processor
    ReturnBillFull {
        bill_id: String,
    },
    ReturnBillItem {
        item_id: String,
        quantity: i64,
    },
    DeleteBill {
        bill_id: String,
    },

    // Reports and snapshots
    GetSalesReport {
        date: NaiveDate,
        period: ReportPeriod,
    },
    SaveMonthlySnapshot {
        month: u32,
        year: i32,
        metrics: MonthlySnapshotInput,
    },
    ListSnapshots,
}

impl Command {
    /// The wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::ListProducts => "listProducts",
            Command::GetProduct { .. } => "getProduct",
            Command::CreateProduct { .. } => "createProduct",
            Command::AdjustStock { .. } => "adjustStock",
            Command::SetManualPrice { .. } => "setManualPrice",
            Command::RenameProduct { .. } => "renameProduct",
            Command::SetQuantity { .. } => "setQuantity",
            Command::DeleteProduct { .. } => "deleteProduct",
            Command::SaveBill(_) => "saveBill",
            Command::ListRecentBills => "listRecentBills",
            Command::GetBill { .. } => "getBill",
            Command::RenameBill { .. } => "renameBill",
            Command::ReturnBillFull { .. } => "returnBillFull",
            Command::ReturnBillItem { .. } => "returnBillItem",
            Command::DeleteBill { .. } => "deleteBill",
            Command::GetSalesReport { .. } => "getSalesReport",
            Command::SaveMonthlySnapshot { .. } => "saveMonthlySnapshot",
            Command::ListSnapshots => "listSnapshots",
        }
    }
}

/// Runs a command and wraps its outcome in the result envelope.
pub async fn dispatch(state: &AppState, command: Command) -> ApiResponse<Value> {
    debug!(command = command.name(), "Dispatching command");

    match command {
        Command::ListProducts => respond(product::list_products(state).await),
        Command::GetProduct { product_id } => {
            respond(product::get_product(state, &product_id).await)
        }
        Command::CreateProduct {
            name,
            quantity,
            price,
            purchase_price,
        } => respond(
            product::create_product(state, &name, &quantity, &price, purchase_price.as_ref())
                .await,
        ),
        Command::AdjustStock { product_id, delta } => {
            respond(product::adjust_stock(state, &product_id, delta).await)
        }
        Command::SetManualPrice { product_id, price } => {
            respond(product::set_manual_price(state, &product_id, &price).await)
        }
        Command::RenameProduct { product_id, name } => {
            respond(product::rename_product(state, &product_id, &name).await)
        }
        Command::SetQuantity {
            product_id,
            quantity,
        } => respond(product::set_quantity(state, &product_id, &quantity).await),
        Command::DeleteProduct { product_id } => {
            respond(product::delete_product(state, &product_id).await)
        }

        Command::SaveBill(input) => respond(bill::save_bill(state, &input).await),
        Command::ListRecentBills => respond(bill::list_recent_bills(state).await),
        Command::GetBill { bill_id } => respond(bill::get_bill(state, &bill_id).await),
        Command::RenameBill {
            bill_id,
            customer_name,
        } => respond(bill::rename_bill(state, &bill_id, &customer_name).await),

        Command::ReturnBillFull { bill_id } => {
            respond(bill::return_bill_full(state, &bill_id).await)
        }
        Command::ReturnBillItem { item_id, quantity } => {
            respond(bill::return_bill_item(state, &item_id, quantity).await)
        }
        Command::DeleteBill { bill_id } => respond(bill::delete_bill(state, &bill_id).await),

        Command::GetSalesReport { date, period } => {
            respond(report::get_sales_report(state, date, period).await)
        }
        Command::SaveMonthlySnapshot {
            month,
            year,
            metrics,
        } => respond(report::save_monthly_snapshot(state, month, year, &metrics).await),
        Command::ListSnapshots => respond(report::list_snapshots(state).await),
    }
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> ApiResponse<Value> {
    result
        .and_then(|data| {
            serde_json::to_value(data)
                .map_err(|e| ApiError::internal(format!("Failed to encode response: {}", e)))
        })
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Command {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unit_command_without_args() {
        assert!(matches!(
            parse(json!({"command": "listProducts"})),
            Command::ListProducts
        ));
    }

    #[test]
    fn test_camel_case_args() {
        let command = parse(json!({
            "command": "returnBillItem",
            "args": {"itemId": "i1", "quantity": 4}
        }));
        match command {
            Command::ReturnBillItem { item_id, quantity } => {
                assert_eq!(item_id, "i1");
                assert_eq!(quantity, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_form_values_accept_text_or_numbers() {
        let command = parse(json!({
            "command": "createProduct",
            "args": {"name": "Pen", "quantity": "100", "price": 10.5}
        }));
        match command {
            Command::CreateProduct {
                quantity,
                price,
                purchase_price,
                ..
            } => {
                assert_eq!(quantity.as_text(), "100");
                assert_eq!(price.as_text(), "10.5");
                assert!(purchase_price.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_save_bill_args() {
        let command = parse(json!({
            "command": "saveBill",
            "args": {
                "totalAmount": 10000,
                "items": [{"productId": "p1", "name": "Pen", "quantity": 10, "price": 1000, "total": 10000}]
            }
        }));
        match command {
            Command::SaveBill(bill) => {
                assert!(bill.customer_name.is_none());
                assert_eq!(bill.items.len(), 1);
                assert_eq!(bill.total_amount.cents(), 10_000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_report_args() {
        let command = parse(json!({
            "command": "getSalesReport",
            "args": {"date": "2024-01-17", "period": "weekly"}
        }));
        assert!(matches!(
            command,
            Command::GetSalesReport {
                period: ReportPeriod::Weekly,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_command_rejected() {
        let result: Result<Command, _> =
            serde_json::from_value(json!({"command": "dropTables", "args": {}}));
        assert!(result.is_err());
    }
}
