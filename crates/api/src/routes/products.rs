//! Product listing and editing for the signed-in student's business

use axum::{
    extract::{Path, Query, State},
    response::Html,
    Extension, Form,
};
use mercado_shared::{limits, Business, NewProduct, Price, Product, StoreError};
use serde::Deserialize;
use uuid::Uuid;

use super::{current_business, fragments};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductForm {
    pub id: String,
    pub title: String,
    pub price: String,
    pub stock: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductIdQuery {
    pub id: String,
}

/// Validated title, price and stock
struct ProductFields {
    title: String,
    price: Price,
    stock: i32,
}

impl ProductForm {
    fn fields(&self) -> ApiResult<ProductFields> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ApiError::bad_request("Title is required"));
        }
        if limits::exceeds(title, limits::TEXT) {
            return Err(ApiError::bad_request("Title is too long"));
        }
        let price: Price = self.price.parse()?;
        let stock: i32 = self
            .stock
            .trim()
            .parse()
            .ok()
            .filter(|stock| *stock >= 0)
            .ok_or_else(|| ApiError::bad_request("Stock must be a non-negative whole number"))?;

        Ok(ProductFields {
            title: title.to_string(),
            price,
            stock,
        })
    }
}

fn parse_product_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid product id"))
}

/// Load a product and make sure it belongs to `business`.
async fn owned_product(state: &AppState, business: &Business, id: Uuid) -> ApiResult<Product> {
    let product = match state.bounded(state.store.products().get(&id)).await {
        Ok(product) => product,
        Err(StoreError::NotFound) => return Err(ApiError::not_found("Product not found")),
        Err(err) => return Err(err.into()),
    };
    if product.business_id != business.id {
        tracing::warn!(
            product_id = %id,
            business_id = %business.id,
            "product belongs to another business"
        );
        return Err(ApiError::forbidden("Unauthorized to edit this product"));
    }
    Ok(product)
}

async fn table(state: &AppState, business: &Business) -> ApiResult<Html<String>> {
    let products = state
        .bounded(state.store.products().list_by_business(business.id))
        .await?;
    Ok(fragments::products_table(&products))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Html<String>> {
    let business = current_business(&state, &auth_user).await?;
    table(&state, &business).await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(form): Form<ProductForm>,
) -> ApiResult<Html<String>> {
    let business = current_business(&state, &auth_user).await?;
    let fields = form.fields()?;

    let product = state
        .bounded(state.store.products().create(NewProduct {
            business_id: business.id,
            title: fields.title,
            price: fields.price,
            stock: fields.stock,
        }))
        .await?;
    tracing::info!(product_id = %product.id, business_id = %business.id, "product created");

    table(&state, &business).await
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(form): Form<ProductForm>,
) -> ApiResult<Html<String>> {
    let id = parse_product_id(&form.id)?;
    let fields = form.fields()?;
    let business = current_business(&state, &auth_user).await?;
    let mut product = owned_product(&state, &business, id).await?;

    product.title = fields.title;
    product.price = fields.price;
    product.stock = fields.stock;
    state.bounded(state.store.products().update(&product)).await?;
    tracing::info!(product_id = %product.id, "product updated");

    Ok(fragments::product_row(&product))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ProductIdQuery>,
) -> ApiResult<Html<String>> {
    let id = parse_product_id(&query.id)?;
    let business = current_business(&state, &auth_user).await?;
    owned_product(&state, &business, id).await?;

    state.bounded(state.store.products().delete(&id)).await?;
    tracing::info!(product_id = %id, "product deleted");

    // Empty body: htmx replaces the row with nothing
    Ok(Html(String::new()))
}

/// Editable row for one product
pub async fn edit_row(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    let id = parse_product_id(&id)?;
    let business = current_business(&state, &auth_user).await?;
    let product = owned_product(&state, &business, id).await?;
    Ok(fragments::product_edit_row(&product))
}

/// Plain row, discarding an edit in progress
pub async fn cancel_edit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    let id = parse_product_id(&id)?;
    let business = current_business(&state, &auth_user).await?;
    let product = owned_product(&state, &business, id).await?;
    Ok(fragments::product_row(&product))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str, price: &str, stock: &str) -> ProductForm {
        ProductForm {
            id: String::new(),
            title: title.to_string(),
            price: price.to_string(),
            stock: stock.to_string(),
        }
    }

    #[test]
    fn test_valid_fields() {
        let fields = form(" Taco ", "25.5", "10").fields().unwrap();
        assert_eq!(fields.title, "Taco");
        assert_eq!(fields.price.cents(), 2550);
        assert_eq!(fields.stock, 10);
    }

    #[test]
    fn test_invalid_fields() {
        assert!(matches!(
            form("", "1", "1").fields(),
            Err(ApiError::BadRequest(msg)) if msg == "Title is required"
        ));
        assert!(matches!(
            form("Taco", "1.999", "1").fields(),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            form("Taco", "1", "-3").fields(),
            Err(ApiError::BadRequest(msg)) if msg.starts_with("Stock")
        ));
        assert!(matches!(
            form("Taco", "1", "many").fields(),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            form(&"T".repeat(256), "1", "1").fields(),
            Err(ApiError::BadRequest(msg)) if msg == "Title is too long"
        ));
    }

    #[test]
    fn test_product_id_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(parse_product_id(&id.to_string()).unwrap(), id);
        assert!(parse_product_id("42").is_err());
    }
}
