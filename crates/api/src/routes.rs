//! Request handlers.
//!
//! Handlers decode the request, call [`workflow::ApprovalService`] and return
//! JSON. Extractor rejections are turned into [`ApiError::BadRequest`] so every
//! error body has the same `{error, message}` shape.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use orders::{
    ActorId, ApprovalStatus, InfoField, InfoSubmission, Order, OrderFilter, OrderId,
    OrderReference, StatusChange,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use workflow::{InfoRequestIssued, NewOrder, OrderView, PublicInfoRequest, Quote, QuoteRequest};

use crate::{ApiError, AppState};

/// Body of `approve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorBody {
    pub actor: ActorId,
}

/// Body of `reject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectBody {
    pub actor: ActorId,
    pub reason: String,
}

/// Body of `request-info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfoBody {
    pub actor: ActorId,
    pub fields: Vec<InfoField>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What the requester sees after submitting; no order details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSubmitResponse {
    pub order_reference: OrderReference,
    pub status: ApprovalStatus,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn order_id(path: Result<Path<OrderId>, PathRejection>) -> Result<OrderId, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

pub(crate) async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn list_orders(
    State(state): State<AppState>,
    query: Result<Query<OrderFilter>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(filter) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.service.list_orders(&filter).await?))
}

pub(crate) async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.service.create_order(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub(crate) async fn get_order(
    State(state): State<AppState>,
    path: Result<Path<OrderId>, PathRejection>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.service.get_order(order_id(path)?).await?))
}

pub(crate) async fn order_history(
    State(state): State<AppState>,
    path: Result<Path<OrderId>, PathRejection>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
    Ok(Json(state.service.history(order_id(path)?).await?))
}

pub(crate) async fn approve_order(
    State(state): State<AppState>,
    path: Result<Path<OrderId>, PathRejection>,
    payload: Result<Json<ActorBody>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let id = order_id(path)?;
    let ActorBody { actor } = body(payload)?;
    Ok(Json(state.service.approve(id, actor).await?))
}

pub(crate) async fn reject_order(
    State(state): State<AppState>,
    path: Result<Path<OrderId>, PathRejection>,
    payload: Result<Json<RejectBody>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let id = order_id(path)?;
    let RejectBody { actor, reason } = body(payload)?;
    Ok(Json(state.service.reject(id, actor, &reason).await?))
}

pub(crate) async fn request_info(
    State(state): State<AppState>,
    path: Result<Path<OrderId>, PathRejection>,
    payload: Result<Json<RequestInfoBody>, JsonRejection>,
) -> Result<Json<InfoRequestIssued>, ApiError> {
    let id = order_id(path)?;
    let RequestInfoBody {
        actor,
        fields,
        message,
    } = body(payload)?;
    Ok(Json(
        state.service.request_info(id, actor, fields, message).await?,
    ))
}

pub(crate) async fn quote(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.service.quote(&body(payload)?)?))
}

pub(crate) async fn public_info_request(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicInfoRequest>, ApiError> {
    Ok(Json(state.service.public_info_request(&token).await?))
}

pub(crate) async fn submit_info(
    State(state): State<AppState>,
    Path(token): Path<String>,
    payload: Result<Json<InfoSubmission>, JsonRejection>,
) -> Result<Json<PublicSubmitResponse>, ApiError> {
    let submission = body(payload)?;
    let order = state.service.submit_info(&token, &submission).await?;
    Ok(Json(PublicSubmitResponse {
        order_reference: order.reference,
        status: order.status,
    }))
}
