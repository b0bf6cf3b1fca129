//! Axum route handlers for the Profile API.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::profile::{IdentityDefaults, Profile};
use crate::profile::normalize::{scalar_to_string, RawProfileFields};
use crate::profile::service::{self, RecommendationsView};
use crate::state::AppState;

/// Headers the identity-provider gateway sets on forwarded requests.
pub const IDENTITY_NAME_HEADER: &str = "x-identity-name";
pub const IDENTITY_EMAIL_HEADER: &str = "x-identity-email";

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    #[serde(alias = "clerkUserId", alias = "externalUserId")]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[serde(alias = "clerkUserId")]
    pub external_user_id: Option<String>,
    pub name: Option<Value>,
    pub email: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(alias = "clerkUserId")]
    pub external_user_id: Option<String>,
    #[serde(flatten)]
    pub fields: RawProfileFields,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// The identity key is opaque: blank keys are rejected, anything else is used verbatim.
fn require_id(id: Option<String>) -> Result<String, AppError> {
    id.filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("externalUserId is required".to_string()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn identity_defaults(headers: &HeaderMap) -> IdentityDefaults {
    IdentityDefaults {
        name: header_value(headers, IDENTITY_NAME_HEADER),
        email: header_value(headers, IDENTITY_EMAIL_HEADER),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /profile?id=
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> Result<Json<Profile>, AppError> {
    let id = require_id(params.id)?;
    let profile = service::get_profile(state.store.as_ref(), &id).await?;
    Ok(Json(profile))
}

/// POST /profile
///
/// Creates the profile if absent (201), otherwise returns the existing one (200).
/// Body `name`/`email` win over the identity headers.
pub async fn handle_create_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let Json(req) = payload?;
    let id = require_id(req.external_user_id)?;
    let from_headers = identity_defaults(&headers);
    let defaults = IdentityDefaults {
        name: req
            .name
            .as_ref()
            .and_then(scalar_to_string)
            .or(from_headers.name),
        email: req
            .email
            .as_ref()
            .and_then(scalar_to_string)
            .or(from_headers.email),
    };

    let (profile, created) = service::ensure_profile(state.store.as_ref(), &id, &defaults).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(profile)))
}

/// PUT /profile
///
/// Saves the supplied fields and returns the profile after the roadmap refresh.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Profile>, AppError> {
    let Json(req) = payload?;
    let id = require_id(req.external_user_id)?;
    let defaults = identity_defaults(&headers);

    let profile = service::update_profile(
        state.store.as_ref(),
        state.engine.as_ref(),
        &id,
        &req.fields,
        &defaults,
    )
    .await?;
    Ok(Json(profile))
}

/// GET /recommendations?id=
pub async fn handle_get_recommendations(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> Result<Json<RecommendationsView>, AppError> {
    let id = require_id(params.id)?;
    let view = service::get_recommendations(state.store.as_ref(), &id).await?;
    Ok(Json(view))
}

/// GET /profile/exists?id=
///
/// Onboarding check. A missing profile answers 404 with `exists: false`.
pub async fn handle_profile_exists(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> Result<Response, AppError> {
    let id = require_id(params.id)?;
    let response = match state.store.find_by_external_id(&id).await? {
        Some(profile) => (
            StatusCode::OK,
            Json(json!({ "exists": true, "profile": profile })),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "exists": false, "message": format!("Profile {id} not found") })),
        )
            .into_response(),
    };
    Ok(response)
}
