//! Sale commit and listing endpoints.
//!
//! ## Wire Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST body (field names are what the deployed POS clients send):       │
//! │                                                                         │
//! │  {                                                                      │
//! │    "productos": [                                                       │
//! │      { "productoTiendaId": "...", "cantidad": 2,                       │
//! │        "name": "Cola 330ml", "precio": 250 }       (or "price")        │
//! │    ],                                                                   │
//! │    "total": 500, "totalcash": 500, "totaltransfer": 0,                 │
//! │    "syncId": "device-42-000123", "createdAt": "2026-08-29T14:03:00Z",  │
//! │    "wasOffline": true, "syncAttempts": 2,                              │
//! │    "discountCodes": ["SAVE20"]                                         │
//! │  }                                                                      │
//! │                                                                         │
//! │  201 {"success": true, "duplicado": false, "venta": {...}}             │
//! │  200 {"success": true, "duplicado": true,  "venta": {...}}  (replay)   │
//! │                                                                         │
//! │  Every field is Option so a missing one becomes a named 400 instead    │
//! │  of an anonymous serde rejection.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use caja_checkout::CommitError;
use caja_core::{
    CoreError, IncomingSale, IncomingSaleLine, ValidationError, DEFAULT_OPERATOR_ID,
};

use crate::error::ApiError;
use crate::AppState;

// =============================================================================
// Request DTOs
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SaleLineDto {
    #[serde(rename = "productoTiendaId")]
    producto_tienda_id: String,

    cantidad: f64,

    /// Display name, only used for readable not-found errors.
    #[serde(default, alias = "nombre")]
    name: Option<String>,

    /// Unit price in cents. Older firmware sends "price".
    #[serde(default, alias = "price")]
    precio: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SaleRequest {
    #[serde(default)]
    productos: Option<Vec<SaleLineDto>>,

    #[serde(default)]
    total: Option<i64>,

    #[serde(default)]
    totalcash: Option<i64>,

    #[serde(default)]
    totaltransfer: Option<i64>,

    #[serde(default, rename = "transferDestinationId")]
    transfer_destination_id: Option<String>,

    #[serde(default, rename = "syncId")]
    sync_id: Option<String>,

    #[serde(default, rename = "createdAt")]
    created_at: Option<DateTime<Utc>>,

    #[serde(default, rename = "wasOffline")]
    was_offline: Option<bool>,

    #[serde(default, rename = "syncAttempts")]
    sync_attempts: Option<i64>,

    #[serde(default, rename = "discountCodes")]
    discount_codes: Option<Vec<String>>,
}

impl SaleRequest {
    /// Converts the raw request into the engine payload, collecting every
    /// missing required field into one 400.
    fn into_incoming(self) -> Result<IncomingSale, ApiError> {
        let mut missing: Vec<String> = Vec::new();
        if self.productos.is_none() {
            missing.push("productos".to_string());
        }
        if self.sync_id.is_none() {
            missing.push("syncId".to_string());
        }
        if self.created_at.is_none() {
            missing.push("createdAt".to_string());
        }
        if !missing.is_empty() {
            return Err(CommitError::Core(CoreError::Validation(
                ValidationError::MissingFields { fields: missing },
            ))
            .into());
        }

        let lines = self
            .productos
            .unwrap_or_default()
            .into_iter()
            .map(|p| IncomingSaleLine {
                product_stock_id: p.producto_tienda_id,
                quantity: p.cantidad,
                name: p.name,
                unit_price_cents: p.precio,
            })
            .collect();

        Ok(IncomingSale {
            lines,
            total_cents: self.total.unwrap_or(0),
            cash_cents: self.totalcash.unwrap_or(0),
            transfer_cents: self.totaltransfer.unwrap_or(0),
            transfer_destination_id: self.transfer_destination_id,
            sync_key: self.sync_id.unwrap_or_default(),
            client_created_at: self.created_at.unwrap_or_else(Utc::now),
            was_offline: self.was_offline.unwrap_or(false),
            sync_attempts: self.sync_attempts.unwrap_or(0),
            discount_codes: self.discount_codes.unwrap_or_default(),
        })
    }
}

/// Operator id from the `x-user-id` header the gateway injects.
///
/// Local and test deployments run without a gateway; sales still need an
/// attributable operator, so a fixed default fills in.
fn operator_id(headers: &HeaderMap) -> &str {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_OPERATOR_ID)
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/stores/{store_id}/periods/{period_id}/sales
///
/// Commits one sale. 201 on first commit, 200 with `duplicado: true` when
/// the sync key was already committed.
pub async fn commit_sale(
    State(state): State<AppState>,
    Path((store_id, period_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<SaleRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let operator = operator_id(&headers).to_string();
    let payload = body.into_incoming()?;

    let outcome = state
        .engine
        .commit_sale(&store_id, &period_id, &operator, &payload)
        .await?;

    let status = if outcome.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "duplicado": outcome.duplicate,
            "venta": outcome.sale,
        })),
    ))
}

/// GET /api/stores/{store_id}/periods/{period_id}/sales
///
/// Lists the period's sales with operator, product, supplier, discount
/// rule and transfer destination names expanded.
pub async fn list_sales(
    State(state): State<AppState>,
    Path((store_id, period_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let ventas = state.engine.list_sales(&store_id, &period_id).await?;

    Ok(Json(json!({
        "success": true,
        "ventas": ventas,
    })))
}
