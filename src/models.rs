// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Placeholder for fields the source page did not expose.
pub const NOT_AVAILABLE: &str = "N/A";

fn default_status() -> String {
    "active".to_string()
}

/// Minimal listing identity scraped from a search-results card, prior to
/// detail enrichment. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStub {
    pub title: String,
    pub company: String,
    pub location: String,
    pub detail_url: String,
}

/// Output of a detail-page visit. Every field falls back to [`NOT_AVAILABLE`]
/// when the page cannot be loaded or the block is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferDetails {
    pub description: String,
    pub recruiter_name: String,
    pub email: String,
}

impl OfferDetails {
    pub fn unavailable() -> Self {
        OfferDetails {
            description: NOT_AVAILABLE.to_string(),
            recruiter_name: NOT_AVAILABLE.to_string(),
            email: NOT_AVAILABLE.to_string(),
        }
    }

    pub fn has_recruiter(&self) -> bool {
        self.recruiter_name != NOT_AVAILABLE && !self.recruiter_name.trim().is_empty()
    }
}

/// Persisted job offer. Identity for dedup is (title, company, location);
/// rows are inserted once and never updated by the pipeline.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    pub company: String,
    pub company_logo: Option<String>,
    pub company_website: Option<String>,
    pub location: String,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub salary: Option<String>,
    pub description: String,
    pub responsibilities: Json<Vec<String>>,
    pub requirements: Json<Vec<String>>,
    pub nice_to_have: Json<Vec<String>>,
    pub benefits: Json<Vec<String>>,
    pub experience_level: Option<String>,
    pub education: Option<String>,
    pub languages: Json<Vec<String>>,
    pub remote: bool,
    pub urgent: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub start_date: Option<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub views: u32,
    pub applications: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: String,
}

impl Job {
    /// Builds the persistable record from a stub plus its enrichment result.
    /// This is the single boundary where scraped text becomes a tagged
    /// entity; the source exposes nothing beyond these fields, so the
    /// optional ones start empty.
    pub fn from_scrape(stub: &JobStub, details: &OfferDetails) -> Self {
        let now = Utc::now();
        Job {
            id: 0,
            title: stub.title.clone(),
            company: stub.company.clone(),
            company_logo: None,
            company_website: None,
            location: stub.location.clone(),
            job_type: None,
            salary: None,
            description: details.description.clone(),
            responsibilities: Json(Vec::new()),
            requirements: Json(Vec::new()),
            nice_to_have: Json(Vec::new()),
            benefits: Json(Vec::new()),
            experience_level: None,
            education: None,
            languages: Json(Vec::new()),
            remote: false,
            urgent: false,
            posted_at: None,
            start_date: None,
            application_deadline: None,
            views: 0,
            applications: 0,
            created_at: now,
            updated_at: now,
            status: default_status(),
        }
    }
}

/// Recruiter discovered through detail enrichment. Best-effort identity by
/// name; first write wins.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recruiter {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub title: Option<String>,
    pub company: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recognized scrape options. Extended by adding fields, not by stuffing an
/// open map.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeFilters {
    pub job_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "running" => Ok(SessionStatus::Running),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            _ => Err(()),
        }
    }
}

/// One end-to-end pipeline run for a user and search request. Created
/// `pending`, flipped to `running` when the pipeline starts, then exactly one
/// terminal transition to `completed` or `failed`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingSession {
    pub id: String,
    pub user_id: String,
    pub search_query: String,
    pub location: Option<String>,
    #[sqlx(flatten)]
    pub filters: ScrapeFilters,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub jobs_found: u32,
    pub jobs_added: u32,
    pub error: Option<String>,
}

impl ScrapingSession {
    pub fn new(
        user_id: String,
        search_query: String,
        location: Option<String>,
        filters: ScrapeFilters,
    ) -> Self {
        ScrapingSession {
            id: Uuid::new_v4().to_string(),
            user_id,
            search_query,
            location,
            filters,
            status: SessionStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            jobs_found: 0,
            jobs_added: 0,
            error: None,
        }
    }
}

/// Body of `POST /scrape/start`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub user_id: String,
    pub search_query: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub filters: ScrapeFilters,
    #[serde(default)]
    pub max_pages: Option<u32>,
}
