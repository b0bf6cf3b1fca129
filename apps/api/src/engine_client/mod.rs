/// Engine client: the single point of entry for calls to the external
/// recommendation engine. No other module talks to the engine directly.
///
/// Calls are never retried. Each call is bounded by the configured timeout.
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::profile::{Profile, Recommendation, RoadmapRecord};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Recommendation engine did not respond within {secs}s")]
    Timeout { secs: u64 },

    #[error("Engine returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed engine response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Body sent to the engine's roadmap endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoadmapRequest {
    pub degree: String,
    pub skills: Vec<String>,
    pub experience: String,
    pub interests: Vec<String>,
    pub career_roles: Vec<String>,
}

impl RoadmapRequest {
    pub fn from_profile(profile: &Profile) -> Self {
        let degree = profile
            .education
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or("N/A")
            .to_string();

        let experience = if profile.experience.is_empty() {
            "None".to_string()
        } else {
            profile
                .experience
                .iter()
                .map(|exp| format!("{} ({} years)", exp.job_title, exp.years))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self {
            degree,
            skills: profile.skills.clone(),
            experience,
            interests: profile.interests.clone(),
            career_roles: vec![],
        }
    }
}

/// What the engine sends back. Missing `careerRoadmaps` decodes as an empty list;
/// `recommendations` is only present on engine builds that rank jobs.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapResponse {
    #[serde(default)]
    pub career_roadmaps: Vec<RoadmapRecord>,
    #[serde(default)]
    pub recommendations: Option<Vec<Recommendation>>,
}

/// The outbound refresh seam. Carried in `AppState` as `Arc<dyn RoadmapEngine>`.
#[async_trait]
pub trait RoadmapEngine: Send + Sync {
    async fn generate_roadmaps(
        &self,
        request: &RoadmapRequest,
    ) -> Result<RoadmapResponse, EngineError>;
}

/// Talks to the engine over HTTP with a per-call timeout.
#[derive(Clone)]
pub struct HttpRoadmapEngine {
    client: Client,
    url: String,
    timeout_secs: u64,
}

impl HttpRoadmapEngine {
    pub fn new(url: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url,
            timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            EngineError::Http(err)
        }
    }
}

#[async_trait]
impl RoadmapEngine for HttpRoadmapEngine {
    async fn generate_roadmaps(
        &self,
        request: &RoadmapRequest,
    ) -> Result<RoadmapResponse, EngineError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            warn!("Engine returned {}: {}", status, body);
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: extract_detail(&body),
            });
        }

        let parsed: RoadmapResponse = serde_json::from_str(&body)?;
        debug!(
            "Engine call succeeded: roadmaps={}, recommendations={:?}",
            parsed.career_roadmaps.len(),
            parsed.recommendations.as_ref().map(Vec::len)
        );

        Ok(parsed)
    }
}

/// Pulls `detail` out of an error body when the engine sends one, else returns the body.
fn extract_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: serde_json::Value,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{Experience, IdentityDefaults};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_profile() -> Profile {
        let mut profile = Profile::new("u1", &IdentityDefaults::default());
        profile.education = Some("BSc Computer Science".into());
        profile.skills = vec!["Go".into(), "SQL".into()];
        profile.interests = vec!["Data".into()];
        profile.experience = vec![
            Experience {
                job_title: "Engineer".into(),
                years: 2,
            },
            Experience {
                job_title: "Intern".into(),
                years: 1,
            },
        ];
        profile
    }

    fn roadmap_json() -> serde_json::Value {
        json!({
            "role": "Data Engineer",
            "jobRoles": { "entryLevel": ["Junior DE"], "midLevel": ["DE"], "seniorLevel": ["Staff DE"] },
            "skillsRequired": { "technical": ["Spark"], "softSkills": ["Communication"] },
            "resources": { "onlineCourses": ["DE Zoomcamp"], "certifications": [], "books": ["DDIA"], "projectIdeas": [] },
            "timeline": { "shortTerm": ["Learn Spark"], "midTerm": [], "longTerm": [] },
            "bridgeSkills": ["Python"]
        })
    }

    #[test]
    fn test_request_from_profile_joins_experience() {
        let request = RoadmapRequest::from_profile(&sample_profile());
        assert_eq!(request.degree, "BSc Computer Science");
        assert_eq!(request.experience, "Engineer (2 years), Intern (1 years)");
        assert_eq!(request.skills, vec!["Go", "SQL"]);
        assert!(request.career_roles.is_empty());
    }

    #[test]
    fn test_request_from_empty_profile_uses_placeholders() {
        let request = RoadmapRequest::from_profile(&Profile::new("u1", &IdentityDefaults::default()));
        assert_eq!(request.degree, "N/A");
        assert_eq!(request.experience, "None");
    }

    #[test]
    fn test_extract_detail_prefers_detail_field() {
        assert_eq!(extract_detail(r#"{"detail": "quota exceeded"}"#), "quota exceeded");
        assert_eq!(extract_detail("plain failure"), "plain failure");
    }

    #[tokio::test]
    async fn test_generate_roadmaps_success() {
        let server = MockServer::start().await;
        let request = RoadmapRequest::from_profile(&sample_profile());

        Mock::given(method("POST"))
            .and(path("/generate_roadmaps"))
            .and(body_json(json!({
                "degree": "BSc Computer Science",
                "skills": ["Go", "SQL"],
                "experience": "Engineer (2 years), Intern (1 years)",
                "interests": ["Data"],
                "career_roles": []
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "careerRoadmaps": [roadmap_json()]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let engine =
            HttpRoadmapEngine::new(format!("{}/generate_roadmaps", server.uri()), 5).unwrap();
        let response = engine.generate_roadmaps(&request).await.unwrap();

        assert_eq!(response.career_roadmaps.len(), 1);
        assert_eq!(response.career_roadmaps[0].role, "Data Engineer");
        assert_eq!(response.career_roadmaps[0].resources.books, vec!["DDIA"]);
        assert!(response.recommendations.is_none());
    }

    #[tokio::test]
    async fn test_generate_roadmaps_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/generate_roadmaps"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "detail": "Failed to generate roadmaps" })),
            )
            .mount(&server)
            .await;

        let engine =
            HttpRoadmapEngine::new(format!("{}/generate_roadmaps", server.uri()), 5).unwrap();
        let err = engine
            .generate_roadmaps(&RoadmapRequest::from_profile(&sample_profile()))
            .await
            .unwrap_err();

        match err {
            EngineError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Failed to generate roadmaps");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_roadmaps_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let engine = HttpRoadmapEngine::new(server.uri(), 5).unwrap();
        let err = engine
            .generate_roadmaps(&RoadmapRequest::from_profile(&sample_profile()))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[tokio::test]
    async fn test_generate_roadmaps_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "careerRoadmaps": [] }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let engine = HttpRoadmapEngine::new(server.uri(), 1).unwrap();
        let err = engine
            .generate_roadmaps(&RoadmapRequest::from_profile(&sample_profile()))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Timeout { secs: 1 }));
    }
}
