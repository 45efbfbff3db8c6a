//! Medical profile endpoints, current and legacy.

use axum::{extract::State, Extension, Json};
use serde_json::json;
use std::sync::Arc;

use crate::auth::AuthSession;
use crate::db::{DeviceDataRequest, MedicalDataRequest, MedicalProfileResponse, SaveResponse};
use crate::AppState;

use super::error::ApiError;

/// Save (insert or overwrite) the caller's medical profile.
pub async fn save_medical_data(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Json(request): Json<MedicalDataRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    state.profiles.upsert(session.user_id, &request).await?;
    Ok(Json(SaveResponse {
        success: true,
        message: "Medical data saved".to_string(),
    }))
}

/// Fetch the caller's medical profile, or JSON `null` if none was saved yet.
pub async fn get_medical_data(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<Option<MedicalProfileResponse>>, ApiError> {
    let profile = state.profiles.get(session.user_id).await?;
    Ok(Json(profile.map(MedicalProfileResponse::from)))
}

/// Legacy save path: reduced field set, plain insert. A repeat save for the
/// same user fails with a conflict instead of updating; kept for clients of
/// the old device-data API.
pub async fn save_device_data(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Json(request): Json<DeviceDataRequest>,
) -> Result<&'static str, ApiError> {
    state
        .profiles
        .insert_reduced(session.user_id, &request)
        .await?;
    Ok("Data saved")
}

/// Legacy fetch path: the full row as stored, or `{}` when absent.
pub async fn get_device_data(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = match state.profiles.get(session.user_id).await? {
        Some(profile) => serde_json::to_value(profile)
            .map_err(|e| ApiError::internal(format!("Failed to serialize profile: {}", e)))?,
        None => json!({}),
    };
    Ok(Json(row))
}
