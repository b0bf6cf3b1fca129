//! Profile store: one document per identity, keyed by `external_user_id`.
//!
//! `PgProfileStore` is the production backend; `MemoryProfileStore` serves local
//! runs without a database and the test suite. Both honor the same contract:
//! create never overwrites, and updates on a missing identity return `None`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{
    IdentityDefaults, Profile, ProfileRow, ProfileUpdate, Recommendation, RecommendationStatus,
    RoadmapRecord,
};

/// Carried in `AppState` as `Arc<dyn ProfileStore>`.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_external_id(&self, id: &str) -> Result<Option<Profile>, AppError>;

    /// Inserts a new profile only if none exists. Returns the stored profile and
    /// whether this call created it.
    async fn upsert_on_create(
        &self,
        id: &str,
        defaults: &IdentityDefaults,
    ) -> Result<(Profile, bool), AppError>;

    async fn apply_partial_update(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, AppError>;

    async fn set_recommendation_status(
        &self,
        id: &str,
        status: RecommendationStatus,
    ) -> Result<Option<Profile>, AppError>;

    /// Overwrites roadmaps (and recommendations when given) and marks the profile completed.
    async fn store_refresh(
        &self,
        id: &str,
        roadmaps: &[RoadmapRecord],
        recommendations: Option<&[Recommendation]>,
    ) -> Result<Option<Profile>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_profile(row: Option<ProfileRow>) -> Result<Option<Profile>, AppError> {
    row.map(Profile::try_from)
        .transpose()
        .map_err(AppError::Internal)
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_by_external_id(&self, id: &str) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT * FROM profiles WHERE external_user_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_profile(row)
    }

    async fn upsert_on_create(
        &self,
        id: &str,
        defaults: &IdentityDefaults,
    ) -> Result<(Profile, bool), AppError> {
        // ON CONFLICT DO NOTHING keeps concurrent first-saves from raising a unique violation.
        let inserted = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (id, external_user_id, name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_user_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(&defaults.name)
        .bind(&defaults.email)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(profile) = into_profile(inserted)? {
            info!("Created profile for {id}");
            return Ok((profile, true));
        }

        let existing = self.find_by_external_id(id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "profile {id} conflicted on insert but could not be read back"
            ))
        })?;
        Ok((existing, false))
    }

    async fn apply_partial_update(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, AppError> {
        let age = update
            .age
            .map(i32::try_from)
            .transpose()
            .map_err(|_| AppError::Validation("age is out of range".to_string()))?;

        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles SET
                name       = COALESCE($2, name),
                email      = COALESCE($3, email),
                age        = COALESCE($4, age),
                education  = COALESCE($5, education),
                interests  = COALESCE($6, interests),
                skills     = COALESCE($7, skills),
                experience = COALESCE($8, experience),
                updated_at = now()
            WHERE external_user_id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(age)
        .bind(&update.education)
        .bind(&update.interests)
        .bind(&update.skills)
        .bind(update.experience.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await?;

        if row.is_some() {
            info!("Updated profile fields for {id}");
        }
        into_profile(row)
    }

    async fn set_recommendation_status(
        &self,
        id: &str,
        status: RecommendationStatus,
    ) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles SET recommendation_status = $2, updated_at = now()
            WHERE external_user_id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if row.is_some() {
            info!("Recommendation status for {id} is now {status}");
        }
        into_profile(row)
    }

    async fn store_refresh(
        &self,
        id: &str,
        roadmaps: &[RoadmapRecord],
        recommendations: Option<&[Recommendation]>,
    ) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles SET
                roadmaps              = $2,
                recommendations       = COALESCE($3, recommendations),
                recommendation_status = $4,
                updated_at            = now()
            WHERE external_user_id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(roadmaps))
        .bind(recommendations.map(Json))
        .bind(RecommendationStatus::Completed.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if row.is_some() {
            info!("Stored {} roadmaps for {id}", roadmaps.len());
        }
        into_profile(row)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_by_external_id(&self, id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn upsert_on_create(
        &self,
        id: &str,
        defaults: &IdentityDefaults,
    ) -> Result<(Profile, bool), AppError> {
        let mut profiles = self.profiles.write().await;
        if let Some(existing) = profiles.get(id) {
            return Ok((existing.clone(), false));
        }

        let profile = Profile::new(id, defaults);
        profiles.insert(id.to_string(), profile.clone());
        info!("Created profile for {id}");
        Ok((profile, true))
    }

    async fn apply_partial_update(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, AppError> {
        let mut profiles = self.profiles.write().await;
        Ok(profiles.get_mut(id).map(|profile| {
            profile.apply(update);
            info!("Updated profile fields for {id}");
            profile.clone()
        }))
    }

    async fn set_recommendation_status(
        &self,
        id: &str,
        status: RecommendationStatus,
    ) -> Result<Option<Profile>, AppError> {
        let mut profiles = self.profiles.write().await;
        Ok(profiles.get_mut(id).map(|profile| {
            profile.recommendation_status = status;
            profile.updated_at = Utc::now();
            info!("Recommendation status for {id} is now {status}");
            profile.clone()
        }))
    }

    async fn store_refresh(
        &self,
        id: &str,
        roadmaps: &[RoadmapRecord],
        recommendations: Option<&[Recommendation]>,
    ) -> Result<Option<Profile>, AppError> {
        let mut profiles = self.profiles.write().await;
        Ok(profiles.get_mut(id).map(|profile| {
            profile.roadmaps = roadmaps.to_vec();
            if let Some(recommendations) = recommendations {
                profile.recommendations = recommendations.to_vec();
            }
            profile.recommendation_status = RecommendationStatus::Completed;
            profile.updated_at = Utc::now();
            info!("Stored {} roadmaps for {id}", roadmaps.len());
            profile.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(name: &str, email: &str) -> IdentityDefaults {
        IdentityDefaults {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }

    #[tokio::test]
    async fn test_upsert_on_create_is_first_write_wins() {
        let store = MemoryProfileStore::new();

        let (first, created) = store
            .upsert_on_create("u1", &defaults("Ada", "ada@example.com"))
            .await
            .unwrap();
        assert!(created);

        let (second, created_again) = store
            .upsert_on_create("u1", &defaults("Grace", "grace@example.com"))
            .await
            .unwrap();
        assert!(!created_again);
        assert_eq!(first, second);
        assert_eq!(second.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_partial_update_on_missing_profile_returns_none() {
        let store = MemoryProfileStore::new();
        let result = store
            .apply_partial_update("ghost", &ProfileUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.find_by_external_id("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_update_merges_fields() {
        let store = MemoryProfileStore::new();
        store
            .upsert_on_create("u1", &defaults("Ada", "ada@example.com"))
            .await
            .unwrap();

        let updated = store
            .apply_partial_update(
                "u1",
                &ProfileUpdate {
                    education: Some("BSc".into()),
                    skills: Some(vec!["Rust".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Ada"));
        assert_eq!(updated.education.as_deref(), Some("BSc"));
        assert_eq!(updated.skills, vec!["Rust"]);
    }

    #[tokio::test]
    async fn test_store_refresh_keeps_recommendations_when_not_supplied() {
        let store = MemoryProfileStore::new();
        store
            .upsert_on_create("u1", &IdentityDefaults::default())
            .await
            .unwrap();

        let recs = vec![Recommendation {
            title: "Data Engineer".into(),
            similarity_score: 0.9,
            description: "Pipelines".into(),
        }];
        store
            .store_refresh("u1", &[], Some(&recs))
            .await
            .unwrap();

        let roadmaps = vec![RoadmapRecord {
            role: "Data Engineer".into(),
            ..Default::default()
        }];
        let profile = store
            .store_refresh("u1", &roadmaps, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(profile.recommendations, recs);
        assert_eq!(profile.roadmaps, roadmaps);
        assert_eq!(profile.recommendation_status, RecommendationStatus::Completed);
    }
}
