// src/main.rs

use std::env;

use anyhow::Context;
use dotenv::dotenv;
use log::info;
use warp::Filter;

use jobscout::browser::Credentials;
use jobscout::database::Database;
use jobscout::{handlers, logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::init();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let credentials = Credentials {
        username: env::var("LINKEDIN_USERNAME").context("LINKEDIN_USERNAME must be set")?,
        password: env::var("LINKEDIN_PASSWORD").context("LINKEDIN_PASSWORD must be set")?,
    };
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3030);

    let db = Database::new(&database_url)
        .await
        .context("failed to connect to database")?;

    // Routes
    let start_scrape = warp::post()
        .and(warp::path("scrape"))
        .and(warp::path("start"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and(with_credentials(credentials.clone()))
        .and_then(|request, db, credentials| async move {
            handlers::start_scrape_handler(request, db, credentials).await
        });

    let list_sessions = warp::get()
        .and(warp::path("scrape"))
        .and(warp::path("sessions"))
        .and(warp::path::end())
        .and(warp::query::<std::collections::HashMap<String, String>>())
        .and(with_db(db.clone()))
        .and_then(|query_map, db| async move {
            handlers::list_sessions_handler(query_map, db).await
        });

    let get_session = warp::get()
        .and(warp::path("scrape"))
        .and(warp::path("sessions"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(with_db(db.clone()))
        .and_then(|session_id, db| async move {
            handlers::get_session_handler(session_id, db).await
        });

    let list_jobs = warp::get()
        .and(warp::path("jobs"))
        .and(warp::path::end())
        .and(warp::query::<std::collections::HashMap<String, String>>())
        .and(with_db(db.clone()))
        .and_then(|query_map, db| async move { handlers::list_jobs_handler(query_map, db).await });

    let get_job = warp::get()
        .and(warp::path("jobs"))
        .and(warp::path::param::<u64>())
        .and(warp::path::end())
        .and(with_db(db.clone()))
        .and_then(|job_id, db| async move { handlers::get_job_handler(job_id, db).await });

    let list_recruiters = warp::get()
        .and(warp::path("recruiters"))
        .and(warp::path::end())
        .and(warp::query::<std::collections::HashMap<String, String>>())
        .and(with_db(db.clone()))
        .and_then(|query_map, db| async move {
            handlers::list_recruiters_handler(query_map, db).await
        });

    let routes = start_scrape
        .or(list_sessions)
        .or(get_session)
        .or(list_jobs)
        .or(get_job)
        .or(list_recruiters);

    info!("server started at http://127.0.0.1:{port}");
    warp::serve(routes).run(([127, 0, 0, 1], port)).await;

    Ok(())
}

fn with_db(
    db: Database,
) -> impl Filter<Extract = (Database,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || db.clone())
}

fn with_credentials(
    credentials: Credentials,
) -> impl Filter<Extract = (Credentials,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || credentials.clone())
}
