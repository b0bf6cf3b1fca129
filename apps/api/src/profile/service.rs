//! Profile service: lookup, idempotent create, partial update, and the roadmap
//! refresh that follows every successful update.

use serde::Serialize;
use tracing::{info, warn};

use crate::engine_client::{RoadmapEngine, RoadmapRequest};
use crate::errors::AppError;
use crate::models::profile::{
    IdentityDefaults, Profile, Recommendation, RecommendationStatus, RoadmapRecord,
};
use crate::profile::normalize::{normalize_fields, RawProfileFields};
use crate::profile::store::ProfileStore;

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationsView {
    pub recommendations: Vec<Recommendation>,
    pub roadmaps: Vec<RoadmapRecord>,
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Profile {id} not found"))
}

pub async fn get_profile(store: &dyn ProfileStore, id: &str) -> Result<Profile, AppError> {
    store
        .find_by_external_id(id)
        .await?
        .ok_or_else(|| not_found(id))
}

/// Creates the profile on first call; later calls return the stored record untouched.
/// The flag is `true` only for the call that created it.
pub async fn ensure_profile(
    store: &dyn ProfileStore,
    id: &str,
    defaults: &IdentityDefaults,
) -> Result<(Profile, bool), AppError> {
    store.upsert_on_create(id, defaults).await
}

/// Normalizes and saves the supplied fields, then refreshes roadmaps.
///
/// Field changes are committed before the refresh starts, so a refresh failure
/// surfaces as an error while the new field values stay saved.
pub async fn update_profile(
    store: &dyn ProfileStore,
    engine: &dyn RoadmapEngine,
    id: &str,
    raw: &RawProfileFields,
    defaults: &IdentityDefaults,
) -> Result<Profile, AppError> {
    let normalized = normalize_fields(raw);
    if !normalized.dropped.is_empty() {
        warn!(
            "Dropped uncoercible fields for {id}: {}",
            normalized.dropped.join(", ")
        );
    }

    let update = normalized.update.with_identity_floor(defaults);

    let profile = store
        .apply_partial_update(id, &update)
        .await?
        .ok_or_else(|| not_found(id))?;

    refresh_roadmaps(store, engine, &profile).await
}

/// Calls the engine with the profile's current fields and persists its answer.
///
/// Status moves to `pending` for the duration of the call, then `completed` on
/// success or `stale` on failure. A failure never touches stored recommendations
/// or roadmaps.
pub async fn refresh_roadmaps(
    store: &dyn ProfileStore,
    engine: &dyn RoadmapEngine,
    profile: &Profile,
) -> Result<Profile, AppError> {
    let id = profile.external_user_id.as_str();
    let request = RoadmapRequest::from_profile(profile);

    store
        .set_recommendation_status(id, RecommendationStatus::Pending)
        .await?
        .ok_or_else(|| not_found(id))?;

    let response = match engine.generate_roadmaps(&request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Roadmap refresh failed for {id}: {e}");
            if let Err(status_err) = store
                .set_recommendation_status(id, RecommendationStatus::Stale)
                .await
            {
                warn!("Could not mark {id} stale after refresh failure: {status_err}");
            }
            return Err(AppError::Upstream(e));
        }
    };

    info!(
        "Engine returned {} roadmaps for {id}",
        response.career_roadmaps.len()
    );

    store
        .store_refresh(
            id,
            &response.career_roadmaps,
            response.recommendations.as_deref(),
        )
        .await?
        .ok_or_else(|| not_found(id))
}

pub async fn get_recommendations(
    store: &dyn ProfileStore,
    id: &str,
) -> Result<RecommendationsView, AppError> {
    let profile = get_profile(store, id).await?;
    Ok(RecommendationsView {
        recommendations: profile.recommendations,
        roadmaps: profile.roadmaps,
    })
}
