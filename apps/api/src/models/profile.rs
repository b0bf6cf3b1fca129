use std::fmt;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub job_title: String,
    pub years: u32,
}

/// A ranked job match produced by the recommendation engine.
/// The capitalized aliases are the keys older engine builds emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(default, alias = "Title")]
    pub title: String,
    #[serde(default, alias = "SimilarityScore")]
    pub similarity_score: f64, // 0.0 – 1.0
    #[serde(default, alias = "JobDescription")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRoles {
    pub entry_level: Vec<String>,
    pub mid_level: Vec<String>,
    pub senior_level: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillsRequired {
    pub technical: Vec<String>,
    pub soft_skills: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Resources {
    pub online_courses: Vec<String>,
    pub certifications: Vec<String>,
    pub books: Vec<String>,
    pub project_ideas: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeline {
    pub short_term: Vec<String>,
    pub mid_term: Vec<String>,
    pub long_term: Vec<String>,
}

/// One multi-stage career roadmap, stored exactly as the engine returned it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RoadmapRecord {
    pub role: String,
    pub job_roles: JobRoles,
    pub skills_required: SkillsRequired,
    pub resources: Resources,
    pub timeline: Timeline,
    pub bridge_skills: Vec<String>,
}

/// Lifecycle of the engine-produced data on a profile:
/// `absent → pending → completed | stale`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    #[default]
    Absent,
    Pending,
    Completed,
    Stale,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Absent => "absent",
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Completed => "completed",
            RecommendationStatus::Stale => "stale",
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RecommendationStatus {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "absent" => Ok(RecommendationStatus::Absent),
            "pending" => Ok(RecommendationStatus::Pending),
            "completed" => Ok(RecommendationStatus::Completed),
            "stale" => Ok(RecommendationStatus::Stale),
            other => Err(anyhow!("unknown recommendation status '{other}'")),
        }
    }
}

/// The per-identity profile document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub external_user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub education: Option<String>,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    pub experience: Vec<Experience>,
    pub recommendations: Vec<Recommendation>,
    pub roadmaps: Vec<RoadmapRecord>,
    pub recommendation_status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A freshly onboarded profile: identity-derived fields only, empty collections.
    pub fn new(external_user_id: &str, defaults: &IdentityDefaults) -> Self {
        let now = Utc::now();
        Self {
            external_user_id: external_user_id.to_string(),
            name: defaults.name.clone(),
            email: defaults.email.clone(),
            age: None,
            education: None,
            interests: vec![],
            skills: vec![],
            experience: vec![],
            recommendations: vec![],
            roadmaps: vec![],
            recommendation_status: RecommendationStatus::Absent,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges a partial update in place. `None` fields leave the stored value untouched.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.name {
            self.name = Some(name.clone());
        }
        if let Some(email) = &update.email {
            self.email = Some(email.clone());
        }
        if let Some(age) = update.age {
            self.age = Some(age);
        }
        if let Some(education) = &update.education {
            self.education = Some(education.clone());
        }
        if let Some(interests) = &update.interests {
            self.interests = interests.clone();
        }
        if let Some(skills) = &update.skills {
            self.skills = skills.clone();
        }
        if let Some(experience) = &update.experience {
            self.experience = experience.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Name and email as known to the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityDefaults {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Canonical partial record. `None` means "not supplied"; `Some(vec![])` clears a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub education: Option<String>,
    pub interests: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub experience: Option<Vec<Experience>>,
}

impl ProfileUpdate {
    /// Fills name and email from the identity provider where the caller supplied none.
    pub fn with_identity_floor(mut self, defaults: &IdentityDefaults) -> Self {
        if self.name.is_none() {
            self.name = defaults.name.clone();
        }
        if self.email.is_none() {
            self.email = defaults.email.clone();
        }
        self
    }
}

/// Row shape of the `profiles` table. The surrogate `id` column stays internal to the
/// database and is not selected into the model.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub external_user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub education: Option<String>,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    pub experience: Json<Vec<Experience>>,
    pub recommendations: Json<Vec<Recommendation>>,
    pub roadmaps: Json<Vec<RoadmapRecord>>,
    pub recommendation_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = anyhow::Error;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let age = row
            .age
            .map(u32::try_from)
            .transpose()
            .map_err(|_| anyhow!("profile {} has a negative age", row.external_user_id))?;

        Ok(Profile {
            recommendation_status: RecommendationStatus::try_from(
                row.recommendation_status.as_str(),
            )?,
            external_user_id: row.external_user_id,
            name: row.name,
            email: row.email,
            age,
            education: row.education,
            interests: row.interests,
            skills: row.skills,
            experience: row.experience.0,
            recommendations: row.recommendations.0,
            roadmaps: row.roadmaps.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_serializes_camel_case() {
        let profile = Profile::new(
            "u1",
            &IdentityDefaults {
                name: Some("Ada".into()),
                email: None,
            },
        );
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["externalUserId"], "u1");
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["recommendationStatus"], "absent");
        assert!(json["skills"].as_array().unwrap().is_empty());
        assert!(json["roadmaps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_recommendation_accepts_legacy_keys() {
        let rec: Recommendation = serde_json::from_str(
            r#"{"Title": "Data Engineer", "SimilarityScore": 0.82, "JobDescription": "Pipelines"}"#,
        )
        .unwrap();
        assert_eq!(rec.title, "Data Engineer");
        assert!((rec.similarity_score - 0.82).abs() < f64::EPSILON);
        assert_eq!(rec.description, "Pipelines");
    }

    #[test]
    fn test_roadmap_missing_sections_default_to_empty() {
        let roadmap: RoadmapRecord =
            serde_json::from_str(r#"{"role": "Backend Engineer", "bridgeSkills": ["SQL"]}"#)
                .unwrap();
        assert_eq!(roadmap.role, "Backend Engineer");
        assert_eq!(roadmap.bridge_skills, vec!["SQL"]);
        assert!(roadmap.job_roles.entry_level.is_empty());
        assert!(roadmap.timeline.long_term.is_empty());
    }

    #[test]
    fn test_apply_leaves_omitted_fields_untouched() {
        let mut profile = Profile::new("u1", &IdentityDefaults::default());
        profile.skills = vec!["Go".into()];
        profile.education = Some("BSc".into());

        profile.apply(&ProfileUpdate {
            interests: Some(vec!["AI".into()]),
            ..Default::default()
        });

        assert_eq!(profile.skills, vec!["Go"]);
        assert_eq!(profile.education.as_deref(), Some("BSc"));
        assert_eq!(profile.interests, vec!["AI"]);
    }

    #[test]
    fn test_apply_with_empty_list_clears() {
        let mut profile = Profile::new("u1", &IdentityDefaults::default());
        profile.skills = vec!["Go".into()];

        profile.apply(&ProfileUpdate {
            skills: Some(vec![]),
            ..Default::default()
        });

        assert!(profile.skills.is_empty());
    }

    #[test]
    fn test_identity_floor_does_not_override_explicit_values() {
        let defaults = IdentityDefaults {
            name: Some("From Provider".into()),
            email: Some("provider@example.com".into()),
        };
        let update = ProfileUpdate {
            name: Some("Typed Name".into()),
            ..Default::default()
        }
        .with_identity_floor(&defaults);

        assert_eq!(update.name.as_deref(), Some("Typed Name"));
        assert_eq!(update.email.as_deref(), Some("provider@example.com"));
    }

    #[test]
    fn test_status_round_trips_through_text_column() {
        for status in [
            RecommendationStatus::Absent,
            RecommendationStatus::Pending,
            RecommendationStatus::Completed,
            RecommendationStatus::Stale,
        ] {
            assert_eq!(RecommendationStatus::try_from(status.as_str()).unwrap(), status);
        }
        assert!(RecommendationStatus::try_from("done").is_err());
    }

    fn row(age: Option<i32>, status: &str) -> ProfileRow {
        let now = Utc::now();
        ProfileRow {
            external_user_id: "u1".into(),
            name: Some("Ada".into()),
            email: None,
            age,
            education: None,
            interests: vec!["ml".into()],
            skills: vec![],
            experience: Json(vec![]),
            recommendations: Json(vec![]),
            roadmaps: Json(vec![]),
            recommendation_status: status.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_converts_into_profile() {
        let profile = Profile::try_from(row(Some(30), "stale")).unwrap();
        assert_eq!(profile.external_user_id, "u1");
        assert_eq!(profile.age, Some(30));
        assert_eq!(profile.interests, vec!["ml"]);
        assert_eq!(profile.recommendation_status, RecommendationStatus::Stale);

        assert!(Profile::try_from(row(Some(-1), "absent")).is_err());
        assert!(Profile::try_from(row(None, "done")).is_err());
    }
}
