// src/handlers.rs

use std::collections::HashMap;

use log::{error, info};
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::browser::{BrowserSession, Credentials, SettlePolicy};
use crate::database::Database;
use crate::models::{Job, ScrapeRequest, ScrapingSession, SessionStatus};
use crate::pipeline::{self, ScrapeParams, ScrapeStore};

const DEFAULT_LIST_LIMIT: i64 = 10;
const JOBS_PER_PAGE: i64 = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub query: Option<String>,
    pub page: i64,
    pub per_page: i64,
    pub total_jobs: i64,
    pub total_pages: i64,
}

fn plain(status: StatusCode, message: impl Into<String>) -> Response {
    warp::reply::with_status(message.into(), status).into_response()
}

/// POST /scrape/start — validates the user, records a pending session and
/// spawns the pipeline. The HTTP caller never waits on (or sees) pipeline
/// errors; they land in the session's terminal state.
pub async fn start_scrape_handler(
    request: ScrapeRequest,
    db: Database,
    credentials: Credentials,
) -> Result<Response, Rejection> {
    match db.user_exists(&request.user_id).await {
        Ok(true) => {}
        Ok(false) => return Ok(plain(StatusCode::NOT_FOUND, "user not found")),
        Err(e) => {
            return Ok(plain(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("DB error: {e}"),
            ))
        }
    }

    let session = ScrapingSession::new(
        request.user_id.clone(),
        request.search_query.clone(),
        request.location.clone(),
        request.filters.clone(),
    );
    if let Err(e) = db.create_session(&session).await {
        return Ok(plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("DB error: {e}"),
        ));
    }

    let params = ScrapeParams::from_request(&request);
    let session_id = session.id.clone();
    info!("session {session_id} accepted for user {}", session.user_id);

    tokio::spawn(async move {
        match BrowserSession::launch(credentials, SettlePolicy::default()).await {
            Ok(browser) => {
                pipeline::run_session(browser, &db, &session_id, &params).await;
            }
            Err(e) => {
                error!("session {session_id}: {e}");
                if let Err(e) = db.fail_session(&session_id, &e.to_string()).await {
                    error!("session {session_id}: could not record launch failure: {e}");
                }
            }
        }
    });

    let reply = warp::reply::json(&session);
    Ok(warp::reply::with_status(reply, StatusCode::ACCEPTED).into_response())
}

/// GET /scrape/sessions?user_id=&status=&skip=&limit=
pub async fn list_sessions_handler(
    query_map: HashMap<String, String>,
    db: Database,
) -> Result<Response, Rejection> {
    let user_id = query_map.get("user_id").map(String::as_str);
    let status = query_map
        .get("status")
        .and_then(|s| s.parse::<SessionStatus>().ok());
    let skip: i64 = query_map
        .get("skip")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
        .max(0);
    let limit: i64 = query_map
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, 100);

    match db.list_sessions(user_id, status, skip, limit).await {
        Ok(sessions) => Ok(warp::reply::json(&sessions).into_response()),
        Err(e) => Ok(plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("DB error: {e}"),
        )),
    }
}

/// GET /scrape/sessions/<id> — status polling.
pub async fn get_session_handler(
    session_id: String,
    db: Database,
) -> Result<Response, Rejection> {
    match db.get_session(&session_id).await {
        Ok(Some(session)) => Ok(warp::reply::json(&session).into_response()),
        Ok(None) => Ok(plain(StatusCode::NOT_FOUND, "scraping session not found")),
        Err(e) => Ok(plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("DB error: {e}"),
        )),
    }
}

/// GET /jobs?q=&page= — substring search over title/company/location with
/// skip/limit pagination.
pub async fn list_jobs_handler(
    query_map: HashMap<String, String>,
    db: Database,
) -> Result<Response, Rejection> {
    let query = query_map.get("q").cloned().filter(|q| !q.trim().is_empty());
    let page: i64 = query_map
        .get("page")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
        .max(1);

    let total_jobs = match db.count_jobs(query.as_deref()).await {
        Ok(n) => n,
        Err(e) => {
            return Ok(plain(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("DB error: {e}"),
            ))
        }
    };
    let total_pages = ((total_jobs + JOBS_PER_PAGE - 1) / JOBS_PER_PAGE).max(1);
    let current_page = page.min(total_pages);

    match db
        .list_jobs_paged(query.as_deref(), current_page, JOBS_PER_PAGE)
        .await
    {
        Ok(jobs) => {
            let body = JobListResponse {
                jobs,
                query,
                page: current_page,
                per_page: JOBS_PER_PAGE,
                total_jobs,
                total_pages,
            };
            Ok(warp::reply::json(&body).into_response())
        }
        Err(e) => Ok(plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("DB error: {e}"),
        )),
    }
}

/// GET /recruiters?skip=&limit=
pub async fn list_recruiters_handler(
    query_map: HashMap<String, String>,
    db: Database,
) -> Result<Response, Rejection> {
    let skip: i64 = query_map
        .get("skip")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
        .max(0);
    let limit: i64 = query_map
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, 100);

    match db.list_recruiters(skip, limit).await {
        Ok(recruiters) => Ok(warp::reply::json(&recruiters).into_response()),
        Err(e) => Ok(plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("DB error: {e}"),
        )),
    }
}

/// GET /jobs/<id>
pub async fn get_job_handler(job_id: u64, db: Database) -> Result<Response, Rejection> {
    match db.find_job(job_id).await {
        Ok(Some(job)) => Ok(warp::reply::json(&job).into_response()),
        Ok(None) => Ok(plain(StatusCode::NOT_FOUND, "job not found")),
        Err(e) => Ok(plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("DB error: {e}"),
        )),
    }
}
