// src/pipeline.rs
//
// End-to-end scraping pipeline: paginate listing pages, filter stubs, enrich
// a capped number of offers, persist with first-write-wins dedup, and drive
// the session state machine. One browser per run; the close path is shared
// by every outcome.

use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};

use crate::browser::PageSource;
use crate::error::ScrapeError;
use crate::extract::{fetch_offer_details, DetailExtractor, ListingExtractor};
use crate::filter::{filter_by_contract_type, filter_by_text};
use crate::models::{Job, JobStub, ScrapeRequest};
use crate::search::build_search_url;

/// Detail pages visited per run, at most. Caps the slowest stage.
pub const DETAIL_FETCH_CAP: usize = 10;

/// Result pages attempted when the caller does not say otherwise.
pub const DEFAULT_MAX_PAGES: u32 = 3;

/// Politeness delay between listing pages.
const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Everything the pipeline needs from one scrape request.
#[derive(Debug, Clone)]
pub struct ScrapeParams {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub contract_types: Vec<String>,
    pub max_pages: u32,
    pub page_delay: Duration,
}

impl ScrapeParams {
    pub fn from_request(request: &ScrapeRequest) -> Self {
        ScrapeParams {
            keywords: request
                .search_query
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            locations: request
                .location
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            contract_types: request
                .filters
                .job_type
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            max_pages: request.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// Persistence + session-state operations the pipeline performs. `Database`
/// is the production implementation.
#[async_trait]
pub trait ScrapeStore: Send + Sync {
    async fn mark_session_running(&self, session_id: &str) -> Result<(), ScrapeError>;

    async fn complete_session(
        &self,
        session_id: &str,
        jobs_found: u32,
        jobs_added: u32,
    ) -> Result<(), ScrapeError>;

    async fn fail_session(&self, session_id: &str, error: &str) -> Result<(), ScrapeError>;

    /// Inserts unless the (title, company, location) identity already
    /// exists. Returns whether a row was created.
    async fn insert_job(&self, job: &Job) -> Result<bool, ScrapeError>;

    /// Inserts unless a recruiter with this name already exists. Returns
    /// whether a row was created.
    async fn insert_recruiter(
        &self,
        name: &str,
        title: Option<&str>,
        company: &str,
    ) -> Result<bool, ScrapeError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeCounts {
    pub found: u32,
    pub added: u32,
}

/// Walks result pages `[0, max_pages)`, accumulating stubs. A page that
/// fails to load counts as empty; every page is always attempted, because
/// the source sometimes renders nothing on one page and results on the
/// next. Duplicates are kept; dedup belongs to persistence.
pub async fn collect_stubs<B: PageSource>(
    browser: &B,
    extractor: &ListingExtractor,
    params: &ScrapeParams,
) -> Vec<JobStub> {
    let mut stubs = Vec::new();

    for offset in 0..params.max_pages {
        let url = build_search_url(
            &params.keywords,
            &params.locations,
            &params.contract_types,
            offset,
        );
        match browser.fetch_rendered_html(&url).await {
            Ok(html) => stubs.extend(extractor.extract_stubs(&html)),
            Err(e) => warn!("listing page {offset} unavailable, treating as empty: {e}"),
        }

        if offset + 1 < params.max_pages && !params.page_delay.is_zero() {
            tokio::time::sleep(params.page_delay).await;
        }
    }

    info!(
        "collected {} stubs across {} pages",
        stubs.len(),
        params.max_pages
    );
    stubs
}

/// The fallible middle of a run: login, paginate, filter, enrich, persist.
/// Errors escaping here end the session as `failed`.
async fn execute<B, S>(
    browser: &B,
    store: &S,
    params: &ScrapeParams,
) -> Result<ScrapeCounts, ScrapeError>
where
    B: PageSource,
    S: ScrapeStore,
{
    browser.login().await?;

    let listing = ListingExtractor::new();
    let detail = DetailExtractor::new();

    let stubs = collect_stubs(browser, &listing, params).await;
    let mut offers = filter_by_text(stubs, &params.keywords, &params.locations);

    if !params.contract_types.is_empty() {
        offers =
            filter_by_contract_type(browser, &detail, offers, &params.contract_types).await;
    }

    let mut counts = ScrapeCounts {
        found: offers.len() as u32,
        added: 0,
    };

    for stub in offers.iter().take(DETAIL_FETCH_CAP) {
        let details = fetch_offer_details(browser, &detail, &stub.detail_url).await;
        let job = Job::from_scrape(stub, &details);

        if store.insert_job(&job).await? {
            counts.added += 1;
            if details.has_recruiter() {
                store
                    .insert_recruiter(&details.recruiter_name, None, &stub.company)
                    .await?;
            }
        }
    }

    Ok(counts)
}

/// Runs one scraping session to its terminal state. Owns the browser: it is
/// closed exactly once, whatever the pipeline did, before the terminal
/// status is recorded.
pub async fn run_session<B, S>(browser: B, store: &S, session_id: &str, params: &ScrapeParams)
where
    B: PageSource,
    S: ScrapeStore,
{
    if let Err(e) = store.mark_session_running(session_id).await {
        error!("session {session_id}: could not mark running: {e}");
    }

    let outcome = execute(&browser, store, params).await;
    browser.close().await;

    let recorded = match outcome {
        Ok(counts) => {
            info!(
                "session {session_id} completed: {} found, {} added",
                counts.found, counts.added
            );
            store
                .complete_session(session_id, counts.found, counts.added)
                .await
        }
        Err(e) => {
            error!("session {session_id} failed: {e}");
            store.fail_session(session_id, &e.to_string()).await
        }
    };

    if let Err(e) = recorded {
        error!("session {session_id}: could not record terminal state: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::models::{ScrapeFilters, SessionStatus};

    struct FakeBrowser {
        pages: HashMap<String, String>,
        fail_login: bool,
        closes: Arc<AtomicUsize>,
    }

    impl FakeBrowser {
        fn new(pages: HashMap<String, String>) -> Self {
            FakeBrowser {
                pages,
                fail_login: false,
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_login() -> Self {
            let mut fake = Self::new(HashMap::new());
            fake.fail_login = true;
            fake
        }
    }

    #[async_trait]
    impl PageSource for FakeBrowser {
        async fn login(&self) -> Result<(), ScrapeError> {
            if self.fail_login {
                Err(ScrapeError::Auth("marker never appeared".to_string()))
            } else {
                Ok(())
            }
        }

        async fn fetch_rendered_html(&self, url: &str) -> Result<String, ScrapeError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::Fetch(format!("no canned page for {url}")))
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, Clone, Default)]
    struct SessionState {
        status: Option<SessionStatus>,
        counts: ScrapeCounts,
        error: Option<String>,
    }

    /// Mirrors the store contract: first write wins on the job dedup tuple
    /// and on recruiter names; terminal session transitions happen once.
    #[derive(Default)]
    struct MemoryStore {
        sessions: Mutex<HashMap<String, SessionState>>,
        jobs: Mutex<Vec<Job>>,
        recruiters: Mutex<Vec<(String, String)>>,
    }

    impl MemoryStore {
        fn session(&self, id: &str) -> SessionState {
            self.sessions
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or_default()
        }

        fn job_count(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ScrapeStore for MemoryStore {
        async fn mark_session_running(&self, session_id: &str) -> Result<(), ScrapeError> {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.entry(session_id.to_string()).or_default().status =
                Some(SessionStatus::Running);
            Ok(())
        }

        async fn complete_session(
            &self,
            session_id: &str,
            jobs_found: u32,
            jobs_added: u32,
        ) -> Result<(), ScrapeError> {
            let mut sessions = self.sessions.lock().unwrap();
            let state = sessions.entry(session_id.to_string()).or_default();
            state.status = Some(SessionStatus::Completed);
            state.counts = ScrapeCounts {
                found: jobs_found,
                added: jobs_added,
            };
            Ok(())
        }

        async fn fail_session(&self, session_id: &str, error: &str) -> Result<(), ScrapeError> {
            let mut sessions = self.sessions.lock().unwrap();
            let state = sessions.entry(session_id.to_string()).or_default();
            state.status = Some(SessionStatus::Failed);
            state.error = Some(error.to_string());
            Ok(())
        }

        async fn insert_job(&self, job: &Job) -> Result<bool, ScrapeError> {
            let mut jobs = self.jobs.lock().unwrap();
            let exists = jobs.iter().any(|existing| {
                existing.title == job.title
                    && existing.company == job.company
                    && existing.location == job.location
            });
            if exists {
                return Ok(false);
            }
            jobs.push(job.clone());
            Ok(true)
        }

        async fn insert_recruiter(
            &self,
            name: &str,
            _title: Option<&str>,
            company: &str,
        ) -> Result<bool, ScrapeError> {
            let mut recruiters = self.recruiters.lock().unwrap();
            if recruiters.iter().any(|(existing, _)| existing == name) {
                return Ok(false);
            }
            recruiters.push((name.to_string(), company.to_string()));
            Ok(true)
        }
    }

    fn card(title: &str, company: &str, location: &str, link: &str) -> String {
        format!(
            r#"<div class="base-card">
                 <a class="base-card__full-link" href="{link}"></a>
                 <h3 class="base-search-card__title">{title}</h3>
                 <h4 class="base-search-card__subtitle">{company}</h4>
                 <span class="job-search-card__location">{location}</span>
               </div>"#
        )
    }

    fn listing_page(cards: &[String]) -> String {
        format!("<html><body><ul>{}</ul></body></html>", cards.join("\n"))
    }

    fn detail_page(description: &str, recruiter: &str) -> String {
        format!(
            r#"<html><body>
                 <a class="topcard__org-name-link">{recruiter}</a>
                 <div class="show-more-less-html__markup">{description}</div>
               </body></html>"#
        )
    }

    fn params(keywords: &[&str], locations: &[&str], contract_types: &[&str]) -> ScrapeParams {
        ScrapeParams {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            locations: locations.iter().map(|s| s.to_string()).collect(),
            contract_types: contract_types.iter().map(|s| s.to_string()).collect(),
            max_pages: 1,
            page_delay: Duration::ZERO,
        }
    }

    fn three_card_listing() -> String {
        listing_page(&[
            card(
                "Python Developer",
                "Acme",
                "Paris, France",
                "https://jobs.example/view/1",
            ),
            card(
                "Accountant",
                "Ledger",
                "Paris, France",
                "https://jobs.example/view/2",
            ),
            card(
                "Python Developer",
                "Acme GmbH",
                "Berlin, Germany",
                "https://jobs.example/view/3",
            ),
        ])
    }

    #[tokio::test]
    async fn collect_stubs_returns_every_card_unfiltered() {
        let p = params(&["python"], &["Paris"], &[]);
        let url = build_search_url(&p.keywords, &p.locations, &p.contract_types, 0);
        let browser = FakeBrowser::new(HashMap::from([(url, three_card_listing())]));

        let stubs = collect_stubs(&browser, &ListingExtractor::new(), &p).await;
        assert_eq!(stubs.len(), 3);
    }

    #[tokio::test]
    async fn collect_stubs_treats_unloadable_pages_as_empty() {
        let mut p = params(&["python"], &[], &[]);
        p.max_pages = 2;
        let second = build_search_url(&p.keywords, &p.locations, &p.contract_types, 1);
        let browser = FakeBrowser::new(HashMap::from([(second, three_card_listing())]));

        // Page 0 has no canned HTML and fails; page 1 still contributes.
        let stubs = collect_stubs(&browser, &ListingExtractor::new(), &p).await;
        assert_eq!(stubs.len(), 3);
    }

    #[tokio::test]
    async fn session_completes_with_post_filter_counts() {
        let p = params(&["python"], &["Paris"], &[]);
        let url = build_search_url(&p.keywords, &p.locations, &p.contract_types, 0);
        let browser = FakeBrowser::new(HashMap::from([
            (url, three_card_listing()),
            (
                "https://jobs.example/view/1".to_string(),
                detail_page("Nous construisons des pipelines.", "Marie Dupont"),
            ),
        ]));
        let closes = browser.closes.clone();
        let store = MemoryStore::default();

        run_session(browser, &store, "s1", &p).await;

        let state = store.session("s1");
        assert_eq!(state.status, Some(SessionStatus::Completed));
        assert_eq!(state.counts, ScrapeCounts { found: 1, added: 1 });
        assert_eq!(store.job_count(), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let recruiters = store.recruiters.lock().unwrap();
        assert_eq!(recruiters.len(), 1);
        assert_eq!(recruiters[0].0, "Marie Dupont");
        assert_eq!(recruiters[0].1, "Acme");
    }

    #[tokio::test]
    async fn duplicate_identity_tuples_insert_once() {
        let p = params(&["python"], &[], &[]);
        let url = build_search_url(&p.keywords, &p.locations, &p.contract_types, 0);
        let listing = listing_page(&[
            card("Python Dev", "Acme", "Paris", "https://jobs.example/view/a"),
            card("Python Dev", "Acme", "Paris", "https://jobs.example/view/b"),
        ]);
        let browser = FakeBrowser::new(HashMap::from([(url, listing)]));
        let store = MemoryStore::default();

        run_session(browser, &store, "s1", &p).await;

        let state = store.session("s1");
        assert_eq!(state.status, Some(SessionStatus::Completed));
        assert_eq!(state.counts, ScrapeCounts { found: 2, added: 1 });
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn contract_type_pass_keeps_only_matching_offers() {
        let p = params(&[], &[], &["cdi"]);
        let url = build_search_url(&p.keywords, &p.locations, &p.contract_types, 0);
        let listing = listing_page(&[
            card("Developer", "Acme", "Paris", "https://jobs.example/view/cdi"),
            card("Developer", "Beta", "Paris", "https://jobs.example/view/stage"),
        ]);
        let browser = FakeBrowser::new(HashMap::from([
            (url, listing),
            (
                "https://jobs.example/view/cdi".to_string(),
                detail_page("Poste en CDI à pourvoir immédiatement.", "Marie"),
            ),
            (
                "https://jobs.example/view/stage".to_string(),
                detail_page("Stage de six mois.", "Jean"),
            ),
        ]));
        let store = MemoryStore::default();

        run_session(browser, &store, "s1", &p).await;

        let state = store.session("s1");
        assert_eq!(state.status, Some(SessionStatus::Completed));
        assert_eq!(state.counts, ScrapeCounts { found: 1, added: 1 });
        let jobs = store.jobs.lock().unwrap();
        assert_eq!(jobs[0].company, "Acme");
    }

    #[tokio::test]
    async fn auth_failure_fails_session_and_closes_browser_once() {
        let browser = FakeBrowser::failing_login();
        let closes = browser.closes.clone();
        let store = MemoryStore::default();

        run_session(browser, &store, "s1", &params(&["python"], &[], &[])).await;

        let state = store.session("s1");
        assert_eq!(state.status, Some(SessionStatus::Failed));
        let error = state.error.expect("failure must record an error");
        assert!(!error.is_empty());
        assert!(error.contains("login failed"), "{error}");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn enrichment_failures_still_persist_placeholder_offers() {
        // No detail pages canned at all: every enrichment degrades to "N/A".
        let p = params(&["python"], &[], &[]);
        let url = build_search_url(&p.keywords, &p.locations, &p.contract_types, 0);
        let listing = listing_page(&[card(
            "Python Dev",
            "Acme",
            "Paris",
            "https://jobs.example/view/1",
        )]);
        let browser = FakeBrowser::new(HashMap::from([(url, listing)]));
        let store = MemoryStore::default();

        run_session(browser, &store, "s1", &p).await;

        let state = store.session("s1");
        assert_eq!(state.status, Some(SessionStatus::Completed));
        let jobs = store.jobs.lock().unwrap();
        assert_eq!(jobs[0].description, crate::models::NOT_AVAILABLE);
        assert!(store.recruiters.lock().unwrap().is_empty());
    }

    #[test]
    fn params_from_request_split_and_default() {
        let request = ScrapeRequest {
            user_id: "u1".to_string(),
            search_query: "python backend".to_string(),
            location: Some("Paris".to_string()),
            filters: ScrapeFilters {
                job_type: Some("cdi".to_string()),
            },
            max_pages: None,
        };
        let p = ScrapeParams::from_request(&request);
        assert_eq!(p.keywords, vec!["python", "backend"]);
        assert_eq!(p.locations, vec!["Paris"]);
        assert_eq!(p.contract_types, vec!["cdi"]);
        assert_eq!(p.max_pages, DEFAULT_MAX_PAGES);
    }

    #[test]
    fn params_from_request_drop_blank_optionals() {
        let request = ScrapeRequest {
            user_id: "u1".to_string(),
            search_query: "rust".to_string(),
            location: Some("   ".to_string()),
            filters: ScrapeFilters::default(),
            max_pages: Some(1),
        };
        let p = ScrapeParams::from_request(&request);
        assert!(p.locations.is_empty());
        assert!(p.contract_types.is_empty());
        assert_eq!(p.max_pages, 1);
    }
}
