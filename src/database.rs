// src/database.rs

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sqlx::{MySql, Pool};

use crate::error::ScrapeError;
use crate::models::{Job, Recruiter, ScrapingSession, SessionStatus};
use crate::pipeline::ScrapeStore;

#[derive(Clone)]
pub struct Database {
    pool: Pool<MySql>,
}

impl Database {
    /// Connects and applies the embedded migrations. The UNIQUE keys created
    /// there are what make the insert-if-absent paths atomic.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = Pool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Database { pool })
    }

    pub async fn user_exists(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM users WHERE id = ?"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn create_session(&self, session: &ScrapingSession) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO scrape_sessions
                (id, user_id, search_query, location, job_type, status,
                 start_time, jobs_found, jobs_added)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.search_query)
        .bind(&session.location)
        .bind(&session.filters.job_type)
        .bind(session.status)
        .bind(session.start_time)
        .bind(session.jobs_found)
        .bind(session.jobs_added)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ScrapingSession>, sqlx::Error> {
        sqlx::query_as::<_, ScrapingSession>(
            r#"SELECT * FROM scrape_sessions WHERE id = ? LIMIT 1"#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_sessions(
        &self,
        user_id: Option<&str>,
        status: Option<SessionStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<ScrapingSession>, sqlx::Error> {
        sqlx::query_as::<_, ScrapingSession>(
            r#"
            SELECT * FROM scrape_sessions
             WHERE (? IS NULL OR user_id = ?)
               AND (? IS NULL OR status = ?)
             ORDER BY start_time DESC
             LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_jobs(&self, query: Option<&str>) -> Result<i64, sqlx::Error> {
        if let Some(q) = query {
            let like = format!("%{}%", q);
            sqlx::query_scalar::<_, i64>(
                r#"SELECT COUNT(*) FROM jobs
                   WHERE title    LIKE ?
                      OR company  LIKE ?
                      OR location LIKE ?"#,
            )
            .bind(&like)
            .bind(&like)
            .bind(&like)
            .fetch_one(&self.pool)
            .await
        } else {
            sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM jobs"#)
                .fetch_one(&self.pool)
                .await
        }
    }

    pub async fn list_jobs_paged(
        &self,
        query: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let page = page.max(1);
        let offset = (page - 1) * per_page;

        if let Some(q) = query {
            let like = format!("%{}%", q);
            sqlx::query_as::<_, Job>(
                r#"
                SELECT * FROM jobs
                 WHERE title    LIKE ?
                    OR company  LIKE ?
                    OR location LIKE ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ? OFFSET ?
                "#,
            )
            .bind(&like)
            .bind(&like)
            .bind(&like)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Job>(
                r#"
                SELECT * FROM jobs
                 ORDER BY created_at DESC, id DESC
                 LIMIT ? OFFSET ?
                "#,
            )
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    pub async fn find_job(&self, id: u64) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(r#"SELECT * FROM jobs WHERE id = ? LIMIT 1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_recruiters(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Recruiter>, sqlx::Error> {
        sqlx::query_as::<_, Recruiter>(
            r#"
            SELECT * FROM recruiters
             ORDER BY name ASC
             LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl ScrapeStore for Database {
    async fn mark_session_running(&self, session_id: &str) -> Result<(), ScrapeError> {
        sqlx::query(
            r#"UPDATE scrape_sessions SET status = 'running'
                WHERE id = ? AND status = 'pending'"#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &str,
        jobs_found: u32,
        jobs_added: u32,
    ) -> Result<(), ScrapeError> {
        // Guarded on the running state so a terminal transition fires once.
        sqlx::query(
            r#"UPDATE scrape_sessions
                  SET status = 'completed', end_time = ?, jobs_found = ?, jobs_added = ?
                WHERE id = ? AND status = 'running'"#,
        )
        .bind(Utc::now())
        .bind(jobs_found)
        .bind(jobs_added)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_session(&self, session_id: &str, error: &str) -> Result<(), ScrapeError> {
        // A launch failure can fail a session that never reached `running`.
        sqlx::query(
            r#"UPDATE scrape_sessions
                  SET status = 'failed', end_time = ?, error = ?
                WHERE id = ? AND status IN ('pending', 'running')"#,
        )
        .bind(Utc::now())
        .bind(error)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_job(&self, job: &Job) -> Result<bool, ScrapeError> {
        // INSERT IGNORE against uq_jobs_identity: first write wins, the
        // existing row is never touched.
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO jobs
                (title, company, company_logo, company_website, location,
                 job_type, salary, description, responsibilities, requirements,
                 nice_to_have, benefits, experience_level, education, languages,
                 remote, urgent, posted_at, start_date, application_deadline,
                 views, applications, created_at, updated_at, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.company_logo)
        .bind(&job.company_website)
        .bind(&job.location)
        .bind(&job.job_type)
        .bind(&job.salary)
        .bind(&job.description)
        .bind(&job.responsibilities)
        .bind(&job.requirements)
        .bind(&job.nice_to_have)
        .bind(&job.benefits)
        .bind(&job.experience_level)
        .bind(&job.education)
        .bind(&job.languages)
        .bind(job.remote)
        .bind(job.urgent)
        .bind(job.posted_at)
        .bind(&job.start_date)
        .bind(job.application_deadline)
        .bind(job.views)
        .bind(job.applications)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(&job.status)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!(
                "job already present, skipping: {} / {} / {}",
                job.title, job.company, job.location
            );
        }
        Ok(inserted)
    }

    async fn insert_recruiter(
        &self,
        name: &str,
        title: Option<&str>,
        company: &str,
    ) -> Result<bool, ScrapeError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO recruiters (name, title, company, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(title)
        .bind(company)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
