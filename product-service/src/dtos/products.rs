use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::models::Product;

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub in_stock: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            in_stock: product.in_stock,
            created_at: product.created_at.to_rfc3339(),
            updated_at: product.updated_at.to_rfc3339(),
        }
    }
}

/// Create/update body for a product.
///
/// Accepted as `application/json` or as `multipart/form-data` fields, the
/// two body encodings the API takes.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductPayload {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

#[async_trait]
impl<S> FromRequest<S> for ProductPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state).await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Invalid multipart body: {}", e))
            })?;
            Self::from_multipart(&mut multipart).await
        } else {
            let Json(payload) = Json::<ProductPayload>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", e)))?;
            Ok(payload)
        }
    }
}

impl ProductPayload {
    async fn from_multipart(multipart: &mut Multipart) -> Result<Self, AppError> {
        let mut name = None;
        let mut description = None;
        let mut price = None;
        let mut in_stock = None;

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })? {
            let Some(field_name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field.text().await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Failed to read field '{}': {}",
                    field_name,
                    e
                ))
            })?;

            match field_name.as_str() {
                "name" => name = Some(value),
                "description" => description = Some(value),
                "price" => {
                    price = Some(value.parse::<f64>().map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Invalid price '{}': {}", value, e))
                    })?)
                }
                "in_stock" => {
                    in_stock = Some(value.parse::<bool>().map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Invalid in_stock '{}': {}", value, e))
                    })?)
                }
                // Unknown fields are ignored.
                _ => {}
            }
        }

        Ok(Self {
            name: name
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing field 'name'")))?,
            description,
            price: price
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing field 'price'")))?,
            in_stock: in_stock.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[tokio::test]
    async fn json_body_is_accepted() {
        let req = HttpRequest::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Kettle","price":39.0}"#))
            .unwrap();

        let payload = ProductPayload::from_request(req, &())
            .await
            .expect("json body rejected");

        assert_eq!(payload.name, "Kettle");
        assert_eq!(payload.price, 39.0);
        assert!(payload.in_stock);
        assert!(payload.description.is_none());
    }

    #[tokio::test]
    async fn multipart_body_is_accepted() {
        let body = concat!(
            "--boundary\r\n",
            "content-disposition: form-data; name=\"name\"\r\n\r\n",
            "Kettle\r\n",
            "--boundary\r\n",
            "content-disposition: form-data; name=\"price\"\r\n\r\n",
            "39.5\r\n",
            "--boundary\r\n",
            "content-disposition: form-data; name=\"in_stock\"\r\n\r\n",
            "false\r\n",
            "--boundary--\r\n",
        );
        let req = HttpRequest::builder()
            .method("POST")
            .header("content-type", "multipart/form-data; boundary=boundary")
            .body(Body::from(body))
            .unwrap();

        let payload = ProductPayload::from_request(req, &())
            .await
            .expect("multipart body rejected");

        assert_eq!(payload.name, "Kettle");
        assert_eq!(payload.price, 39.5);
        assert!(!payload.in_stock);
    }

    #[tokio::test]
    async fn missing_required_field_is_rejected() {
        let req = HttpRequest::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"price":1.0}"#))
            .unwrap();

        let result = ProductPayload::from_request(req, &()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
