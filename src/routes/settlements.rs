//! Settlement routes
//!
//! - `POST /api/v1/settlements/initiate`  - start a payment cycle
//! - `POST /api/v1/settlements/reconcile` - verify a returned token

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::{actor_from_headers, error_response, json_response, parse_json_body};
use crate::server::AppState;
use crate::settlement::InitiateSettlementRequest;
use crate::types::SettlementEntity;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateBody {
    entity: SettlementEntity,
    amount_minor: u64,
}

#[derive(Debug, Deserialize)]
struct ReconcileBody {
    pidx: String,
}

/// Handle POST /api/v1/settlements/initiate
pub async fn initiate_settlement(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let actor = match actor_from_headers(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let body: InitiateBody = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state
        .reconciler
        .initiate(
            &actor,
            InitiateSettlementRequest {
                entity: body.entity,
                amount_minor: body.amount_minor,
            },
        )
        .await
    {
        Ok(initiated) => json_response(StatusCode::CREATED, &initiated),
        Err(e) => error_response(&e),
    }
}

/// Handle POST /api/v1/settlements/reconcile
pub async fn reconcile_settlement(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let actor = match actor_from_headers(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let body: ReconcileBody = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state.reconciler.reconcile(&actor, &body.pidx).await {
        Ok(outcome) => json_response(StatusCode::OK, &outcome),
        Err(e) => error_response(&e),
    }
}
