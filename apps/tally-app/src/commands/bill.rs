//! # Bill Commands
//!
//! Checkout, bill history, returns and deletion.
//!
//! ## Bill Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  saveBill ──► PAID ──returnBillItem──► PARTIAL ──returnBillItem──┐     │
//! │                 │                         │                      │     │
//! │                 └──── returnBillFull ─────┴──────────────────► RETURNED│
//! │                                                                         │
//! │  deleteBill from any state: restores outstanding units unless RETURNED │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tally_core::{Bill, BillItem, BillStatus, NewBill};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Bill DTO for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDto {
    pub id: String,
    pub customer_name: String,
    pub total_amount_cents: i64,
    pub status: BillStatus,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<BillItemDto>,
}

/// Bill line DTO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItemDto {
    pub id: String,
    pub bill_id: String,
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub purchase_price_cents: i64,
    pub total_cents: i64,
    pub returned_quantity: i64,
    /// Units still returnable.
    pub outstanding_quantity: i64,
}

impl From<BillItem> for BillItemDto {
    fn from(item: BillItem) -> Self {
        BillItemDto {
            outstanding_quantity: item.outstanding_quantity(),
            id: item.id,
            bill_id: item.bill_id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            price_cents: item.price_cents,
            purchase_price_cents: item.purchase_price_cents,
            total_cents: item.total_cents,
            returned_quantity: item.returned_quantity,
        }
    }
}

impl From<Bill> for BillDto {
    fn from(bill: Bill) -> Self {
        BillDto {
            id: bill.id,
            customer_name: bill.customer_name,
            total_amount_cents: bill.total_amount_cents,
            status: bill.status,
            created_at: bill.created_at.to_rfc3339(),
            updated_at: bill.updated_at.to_rfc3339(),
            items: bill.items.into_iter().map(BillItemDto::from).collect(),
        }
    }
}

/// Records a sale and takes its items out of stock.
///
/// A failed save reports the underlying storage error text.
pub async fn save_bill(state: &AppState, input: &NewBill) -> Result<BillDto, ApiError> {
    let bill = state
        .db()
        .bills()
        .save_bill(input)
        .await
        .map_err(ApiError::with_storage_detail)?;
    info!(bill_id = %bill.id, items = bill.items.len(), "save_bill");
    Ok(bill.into())
}

/// The 50 most recent bills, newest first.
pub async fn list_recent_bills(state: &AppState) -> Result<Vec<BillDto>, ApiError> {
    let bills = state.db().bills().list_recent().await?;
    Ok(bills.into_iter().map(BillDto::from).collect())
}

pub async fn get_bill(state: &AppState, bill_id: &str) -> Result<BillDto, ApiError> {
    Ok(state.db().bills().get(bill_id).await?.into())
}

pub async fn rename_bill(
    state: &AppState,
    bill_id: &str,
    customer_name: &str,
) -> Result<BillDto, ApiError> {
    Ok(state
        .db()
        .bills()
        .rename(bill_id, customer_name)
        .await?
        .into())
}

pub async fn return_bill_full(state: &AppState, bill_id: &str) -> Result<BillDto, ApiError> {
    Ok(state.db().returns().return_bill_full(bill_id).await?.into())
}

pub async fn return_bill_item(
    state: &AppState,
    item_id: &str,
    quantity: i64,
) -> Result<BillDto, ApiError> {
    Ok(state
        .db()
        .returns()
        .return_bill_item(item_id, quantity)
        .await?
        .into())
}

pub async fn delete_bill(state: &AppState, bill_id: &str) -> Result<(), ApiError> {
    state.db().returns().delete_bill(bill_id).await?;
    Ok(())
}
