pub mod browser;
pub mod database;
pub mod error;
pub mod extract;
pub mod filter;
pub mod handlers;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod search;

// Exporting types for convenience
pub use browser::{BrowserSession, Credentials, PageSource, SettlePolicy};
pub use error::ScrapeError;
pub use extract::{DetailExtractor, ListingExtractor};
pub use models::{Job, JobStub, OfferDetails, Recruiter, ScrapingSession, SessionStatus};
pub use pipeline::{run_session, ScrapeParams, ScrapeStore};
pub use search::build_search_url;
