use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::stream::TryStreamExt;
use metrics::counter;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use service_core::error::AppError;

use crate::dtos::{ProductPayload, ProductResponse};
use crate::models::Product;
use crate::startup::AppState;

pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 }) // Newest first
        .build();

    let mut cursor = state
        .db
        .products()
        .find(doc! {}, find_options)
        .await
        .map_err(AppError::from)?;

    let mut products = Vec::new();
    while let Some(product) = cursor.try_next().await.map_err(AppError::from)? {
        products.push(ProductResponse::from(product));
    }

    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .db
        .products()
        .find_one(doc! { "_id": &id }, None)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No product with id {}", id)))?;

    Ok(Json(ProductResponse::from(product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: ProductPayload,
) -> Result<impl IntoResponse, AppError> {
    let product = Product::new(
        payload.name,
        payload.description,
        payload.price,
        payload.in_stock,
    );

    state
        .db
        .products()
        .insert_one(&product, None)
        .await
        .map_err(AppError::from)?;

    counter!("products_created_total").increment(1);
    tracing::info!(product_id = %product.id, name = %product.name, "Product created");

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: ProductPayload,
) -> Result<impl IntoResponse, AppError> {
    let update = doc! {
        "$set": {
            "name": &payload.name,
            "description": payload.description.clone(),
            "price": payload.price,
            "in_stock": payload.in_stock,
            "updated_at": mongodb::bson::DateTime::now(),
        }
    };

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let updated = state
        .db
        .products()
        .find_one_and_update(doc! { "_id": &id }, update, options)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No product with id {}", id)))?;

    tracing::info!(product_id = %id, "Product updated");

    Ok(Json(ProductResponse::from(updated)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .db
        .products()
        .delete_one(doc! { "_id": &id }, None)
        .await
        .map_err(AppError::from)?;

    if result.deleted_count == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "No product with id {}",
            id
        )));
    }

    counter!("products_deleted_total").increment(1);
    tracing::info!(product_id = %id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}
