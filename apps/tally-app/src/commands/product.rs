//! # Product Commands
//!
//! Product store operations: listing, the add-product form, stock
//! adjustment and the inline edits of the inventory screen.

use serde::{Deserialize, Serialize};
use tally_core::validation::{parse_price, parse_quantity};
use tally_core::{NewProduct, Product};
use tracing::{debug, info};

use super::FormValue;
use crate::error::ApiError;
use crate::state::AppState;

/// Product DTO for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub purchase_price_cents: i64,
    pub manual_price_cents: Option<i64>,
    /// What the billing screen charges: manual price when set, else price.
    pub effective_price_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        ProductDto {
            effective_price_cents: p.effective_price().cents(),
            manual_price_cents: p.manual_price().map(|m| m.cents()),
            id: p.id,
            name: p.name,
            quantity: p.quantity,
            price_cents: p.price_cents,
            purchase_price_cents: p.purchase_price_cents,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

/// All products in display order.
pub async fn list_products(state: &AppState) -> Result<Vec<ProductDto>, ApiError> {
    let products = state.db().products().list().await?;
    debug!(count = products.len(), "list_products");
    Ok(products.into_iter().map(ProductDto::from).collect())
}

pub async fn get_product(state: &AppState, product_id: &str) -> Result<ProductDto, ApiError> {
    Ok(state.db().products().get(product_id).await?.into())
}

/// Creates a product from the add-product form.
pub async fn create_product(
    state: &AppState,
    name: &str,
    quantity: &FormValue,
    price: &FormValue,
    purchase_price: Option<&FormValue>,
) -> Result<ProductDto, ApiError> {
    let purchase_price = purchase_price.map(FormValue::as_text);
    let input = NewProduct::from_form(
        name,
        &quantity.as_text(),
        &price.as_text(),
        purchase_price.as_deref(),
    )?;

    let product = state.db().products().create(&input).await?;
    info!(id = %product.id, name = %product.name, "create_product");
    Ok(product.into())
}

/// Adds `delta` (may be negative) to stock. Never goes below zero.
pub async fn adjust_stock(
    state: &AppState,
    product_id: &str,
    delta: i64,
) -> Result<ProductDto, ApiError> {
    Ok(state
        .db()
        .products()
        .adjust_stock(product_id, delta)
        .await?
        .into())
}

pub async fn set_manual_price(
    state: &AppState,
    product_id: &str,
    price: &FormValue,
) -> Result<ProductDto, ApiError> {
    let price = parse_price(&price.as_text())?;
    Ok(state
        .db()
        .products()
        .set_manual_price(product_id, price)
        .await?
        .into())
}

pub async fn rename_product(
    state: &AppState,
    product_id: &str,
    name: &str,
) -> Result<ProductDto, ApiError> {
    Ok(state.db().products().rename(product_id, name).await?.into())
}

pub async fn set_quantity(
    state: &AppState,
    product_id: &str,
    quantity: &FormValue,
) -> Result<ProductDto, ApiError> {
    let quantity = parse_quantity(&quantity.as_text())?;
    Ok(state
        .db()
        .products()
        .set_quantity(product_id, quantity)
        .await?
        .into())
}

/// Deletes a product. Bills that sold it keep their copy of its details.
pub async fn delete_product(state: &AppState, product_id: &str) -> Result<(), ApiError> {
    state.db().products().delete(product_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use chrono::FixedOffset;
    use tally_db::{Database, DbConfig};

    async fn test_state() -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        AppState::new(db, FixedOffset::east_opt(0).unwrap())
    }

    fn text(s: &str) -> FormValue {
        FormValue::Text(s.to_string())
    }

    #[tokio::test]
    async fn test_create_from_form_text() {
        let state = test_state().await;
        let product = create_product(&state, "Pen", &text("100"), &text("10.5"), None)
            .await
            .unwrap();

        assert_eq!(product.quantity, 100);
        assert_eq!(product.price_cents, 1050);
        assert_eq!(product.purchase_price_cents, 0);
        assert_eq!(product.manual_price_cents, None);
        assert_eq!(product.effective_price_cents, 1050);
    }

    #[tokio::test]
    async fn test_create_rejects_non_numeric_price() {
        let state = test_state().await;
        let err = create_product(&state, "Pen", &text("100"), &text("ten"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(list_products(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_price_becomes_effective() {
        let state = test_state().await;
        let product = create_product(&state, "Pen", &text("5"), &text("10"), Some(&text("6")))
            .await
            .unwrap();

        let updated = set_manual_price(&state, &product.id, &text("8"))
            .await
            .unwrap();
        assert_eq!(updated.manual_price_cents, Some(800));
        assert_eq!(updated.effective_price_cents, 800);
        assert_eq!(updated.price_cents, 1000);
    }

    #[tokio::test]
    async fn test_set_quantity_rejects_negative() {
        let state = test_state().await;
        let product = create_product(&state, "Pen", &text("5"), &text("10"), None)
            .await
            .unwrap();

        let err = set_quantity(&state, &product.id, &text("-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(get_product(&state, &product.id).await.unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_adjust_stock_errors() {
        let state = test_state().await;
        let product = create_product(&state, "Pen", &text("2"), &text("10"), None)
            .await
            .unwrap();

        let err = adjust_stock(&state, &product.id, -3).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);

        let err = adjust_stock(&state, "missing", 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        delete_product(&state, &product.id).await.unwrap();
        let err = get_product(&state, &product.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
