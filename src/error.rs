use thiserror::Error;

/// Pipeline error taxonomy. `Fetch` is recovered locally (an unloadable
/// listing page counts as empty, an unloadable detail page yields "N/A"
/// fields); everything else escalates to the session tracker and ends the
/// session as `failed`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("login failed: {0}")]
    Auth(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("page fetch failed: {0}")]
    Fetch(String),

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
