//! Scrape job tracking: scheduling with per-type deduplication, the worker
//! lifecycle (claim, complete, fail) and the recent-jobs listing.

use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::database::now;
use crate::error::StoreError;
use crate::models::{Job, JobStatus, JobType, NewJob};
use crate::schema::jobs;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job {0} does not exist.")]
    NotFound(String),

    #[error("Job cannot move from {from} to {to}.")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<diesel::result::Error> for JobError {
    fn from(err: diesel::result::Error) -> Self {
        JobError::Store(StoreError::Query(err))
    }
}

#[derive(Debug, Clone)]
pub enum ScheduleOutcome {
    Created(Job),
    /// An open job of the same type already exists; nothing was inserted.
    AlreadyOpen(Job),
}

impl ScheduleOutcome {
    pub fn job(&self) -> &Job {
        match self {
            ScheduleOutcome::Created(job) | ScheduleOutcome::AlreadyOpen(job) => job,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, ScheduleOutcome::Created(_))
    }

    pub fn message(&self) -> String {
        match self {
            ScheduleOutcome::Created(job) => {
                format!("Scheduled {} job {}", job.job_type, job.id)
            }
            ScheduleOutcome::AlreadyOpen(job) => {
                format!("{} job is already pending or running", job.job_type)
            }
        }
    }
}

/// Inserts a PENDING job of `job_type` unless one is already PENDING or RUNNING.
///
/// The check and the insert share one `BEGIN IMMEDIATE` transaction, so a
/// second writer blocks until the first commits and then sees its row. The
/// partial unique index `jobs_one_open_per_type` backs this up at the schema
/// level.
pub fn schedule_job_if_not_exists(
    connection: &mut SqliteConnection,
    job_type: JobType,
) -> Result<ScheduleOutcome, StoreError> {
    let outcome = connection.immediate_transaction::<_, diesel::result::Error, _>(|connection| {
        if let Some(job) = find_open_job(connection, job_type)? {
            return Ok(ScheduleOutcome::AlreadyOpen(job));
        }

        let id = Uuid::new_v4().to_string();

        let new_job = NewJob {
            id: &id,
            job_type,
            status: JobStatus::Pending,
            created_at: now(),
        };

        diesel::insert_into(jobs::table)
            .values(&new_job)
            .execute(connection)?;

        let job = find_job(connection, &id)?;

        Ok(ScheduleOutcome::Created(job))
    });

    match outcome {
        Ok(outcome) => {
            log::info!("{}.", outcome.message());

            Ok(outcome)
        }
        Err(err @ diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            match find_open_job(connection, job_type)? {
                Some(job) => Ok(ScheduleOutcome::AlreadyOpen(job)),
                None => Err(StoreError::Query(err)),
            }
        }
        Err(err) => Err(StoreError::Query(err)),
    }
}

#[derive(Debug, Serialize)]
pub struct JobTypeReport {
    pub job_type: JobType,
    pub ok: bool,
    pub created: bool,
    pub job_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BulkScheduleReport {
    /// False when scheduling failed for at least one type.
    pub success: bool,
    pub results: Vec<JobTypeReport>,
}

/// Attempts to schedule every job type, continuing past per-type failures.
pub fn schedule_all<F>(mut schedule: F) -> BulkScheduleReport
where
    F: FnMut(JobType) -> Result<ScheduleOutcome, StoreError>,
{
    let mut results = Vec::with_capacity(JobType::ALL.len());

    for job_type in JobType::ALL.iter().copied() {
        match schedule(job_type) {
            Ok(outcome) => results.push(JobTypeReport {
                job_type,
                ok: true,
                created: outcome.created(),
                job_id: Some(outcome.job().id.clone()),
                message: outcome.message(),
            }),
            Err(e) => {
                log::error!("Failed to schedule {} job. {}", job_type, e);

                results.push(JobTypeReport {
                    job_type,
                    ok: false,
                    created: false,
                    job_id: None,
                    message: format!("Failed to schedule {} job: {}", job_type, e),
                });
            }
        }
    }

    BulkScheduleReport {
        success: results.iter().all(|report| report.ok),
        results,
    }
}

/// The most recently created jobs, newest first.
pub fn recent_jobs(connection: &mut SqliteConnection, limit: i64) -> Result<Vec<Job>, StoreError> {
    let results = jobs::table
        .select(Job::as_select())
        .order((jobs::created_at.desc(), jobs::id.desc()))
        .limit(limit)
        .load(connection)?;

    Ok(results)
}

/// Moves the oldest PENDING job (optionally of one type) to RUNNING.
pub fn claim_next_job(
    connection: &mut SqliteConnection,
    job_type: Option<JobType>,
) -> Result<Option<Job>, StoreError> {
    let claimed = connection.immediate_transaction::<_, diesel::result::Error, _>(|connection| {
        let mut query = jobs::table
            .select(Job::as_select())
            .filter(jobs::status.eq(JobStatus::Pending))
            .order((jobs::created_at.asc(), jobs::id.asc()))
            .into_boxed();

        if let Some(job_type) = job_type {
            query = query.filter(jobs::job_type.eq(job_type));
        }

        let Some(job) = query.first(connection).optional()? else {
            return Ok(None);
        };

        diesel::update(jobs::table.find(job.id.as_str()))
            .set((
                jobs::status.eq(JobStatus::Running),
                jobs::started_at.eq(Some(now())),
            ))
            .execute(connection)?;

        find_job(connection, &job.id).map(Some)
    })?;

    match &claimed {
        Some(job) => log::info!("Claimed {} job {}.", job.job_type, job.id),
        None => log::info!("There are no pending jobs to claim."),
    }

    Ok(claimed)
}

pub fn complete_job(
    connection: &mut SqliteConnection,
    id: &str,
    result: Option<&str>,
) -> Result<Job, JobError> {
    finish_job(connection, id, JobStatus::Completed, result)
}

pub fn fail_job(connection: &mut SqliteConnection, id: &str, error: &str) -> Result<Job, JobError> {
    finish_job(connection, id, JobStatus::Failed, Some(error))
}

fn finish_job(
    connection: &mut SqliteConnection,
    id: &str,
    to: JobStatus,
    result: Option<&str>,
) -> Result<Job, JobError> {
    let job = connection.immediate_transaction::<_, JobError, _>(|connection| {
        let existing_job = find_job(connection, id)
            .optional()?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if !existing_job.status.can_transition_to(to) {
            return Err(JobError::InvalidTransition {
                from: existing_job.status,
                to,
            });
        }

        diesel::update(jobs::table.find(id))
            .set((
                jobs::status.eq(to),
                jobs::ended_at.eq(Some(now())),
                jobs::result.eq(result),
            ))
            .execute(connection)?;

        Ok(find_job(connection, id)?)
    })?;

    log::info!("Updated job with id {:?} to {}.", job.id, job.status);

    Ok(job)
}

fn find_open_job(
    connection: &mut SqliteConnection,
    job_type: JobType,
) -> Result<Option<Job>, diesel::result::Error> {
    jobs::table
        .select(Job::as_select())
        .filter(jobs::job_type.eq(job_type))
        .filter(jobs::status.eq_any(JobStatus::OPEN))
        .order(jobs::created_at.asc())
        .first(connection)
        .optional()
}

pub fn find_job(connection: &mut SqliteConnection, id: &str) -> Result<Job, diesel::result::Error> {
    jobs::table
        .select(Job::as_select())
        .filter(jobs::id.eq(id))
        .first(connection)
}
