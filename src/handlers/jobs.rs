use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::jobs::{
    self, claim_next_job, complete_job, fail_job, recent_jobs, schedule_job_if_not_exists,
    BulkScheduleReport, JobError,
};
use crate::models::{Job, JobStatus, JobType};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 10;
const MAX_LIST_LIMIT: i64 = 100;

#[derive(Serialize)]
pub struct JobDto {
    id: String,
    job_type: JobType,
    status: JobStatus,
    created_at: NaiveDateTime,
    started_at: Option<NaiveDateTime>,
    ended_at: Option<NaiveDateTime>,
    result: Option<String>,
}

fn transform_job(job: Job) -> JobDto {
    JobDto {
        id: job.id,
        job_type: job.job_type,
        status: job.status,
        created_at: job.created_at,
        started_at: job.started_at,
        ended_at: job.ended_at,
        result: job.result,
    }
}

fn parse_job_type(raw: &str) -> Result<JobType, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown job type {:?}.", raw)))
}

fn job_error(err: JobError) -> ApiError {
    match err {
        JobError::NotFound(_) => ApiError::NotFound("Job does not exist.".into()),
        JobError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
        JobError::Store(e) => ApiError::internal("Failed to update job.", e),
    }
}

#[derive(Serialize)]
pub struct ScheduleJobResponse {
    created: bool,
    message: String,
    job: JobDto,
}

/// `POST /jobs/schedule/:job_type` and `POST /admin/jobs/schedule/:job_type`.
pub async fn schedule_job_handler(
    State(state): State<AppState>,
    Path(raw_job_type): Path<String>,
) -> Result<Json<ScheduleJobResponse>, ApiError> {
    let job_type = parse_job_type(&raw_job_type)?;

    let outcome = state
        .database
        .run(move |connection| schedule_job_if_not_exists(connection, job_type))
        .await
        .map_err(|e| ApiError::internal("Failed to schedule job.", e))?;

    Ok(Json(ScheduleJobResponse {
        created: outcome.created(),
        message: outcome.message(),
        job: transform_job(outcome.job().clone()),
    }))
}

/// `POST /jobs/schedule`: every job type, continuing past failures.
pub async fn schedule_all_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<BulkScheduleReport>), ApiError> {
    let database = state.database.clone();

    let report = tokio::task::spawn_blocking(move || {
        jobs::schedule_all(|job_type| {
            let connection = &mut database.establish_connection()?;

            schedule_job_if_not_exists(connection, job_type)
        })
    })
    .await
    .map_err(|e| ApiError::internal("Failed to schedule jobs.", e))?;

    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(report)))
}

#[derive(Deserialize)]
pub struct ListJobsParams {
    limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ListJobsResponse {
    jobs: Vec<JobDto>,
}

pub async fn list_jobs_handler(
    State(state): State<AppState>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let jobs = state
        .database
        .run(move |connection| recent_jobs(connection, limit))
        .await
        .map_err(|e| ApiError::internal("Failed to fetch jobs.", e))?;

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(transform_job).collect(),
    }))
}

#[derive(Deserialize, Default)]
pub struct ClaimJobInput {
    job_type: Option<String>,
}

#[derive(Serialize)]
pub struct ClaimJobResponse {
    job: Option<JobDto>,
}

pub async fn claim_job_handler(
    State(state): State<AppState>,
    input: Result<Json<ClaimJobInput>, JsonRejection>,
) -> Result<Json<ClaimJobResponse>, ApiError> {
    // A bare POST with no JSON body claims a job of any type.
    let claim_job_input = match input {
        Ok(Json(claim_job_input)) => claim_job_input,
        Err(JsonRejection::MissingJsonContentType(_)) => ClaimJobInput::default(),
        Err(e) => return Err(ApiError::BadRequest(e.body_text())),
    };

    let job_type = match claim_job_input.job_type.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_job_type(raw)?),
        _ => None,
    };

    let job = state
        .database
        .run(move |connection| claim_next_job(connection, job_type))
        .await
        .map_err(|e| ApiError::internal("Failed to claim job.", e))?;

    Ok(Json(ClaimJobResponse {
        job: job.map(transform_job),
    }))
}

#[derive(Deserialize)]
pub struct CompleteJobInput {
    id: String,
    result: Option<String>,
}

#[derive(Serialize)]
pub struct FinishJobResponse {
    job: JobDto,
}

pub async fn complete_job_handler(
    State(state): State<AppState>,
    input: Result<Json<CompleteJobInput>, JsonRejection>,
) -> Result<Json<FinishJobResponse>, ApiError> {
    let Json(complete_job_input) = input.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = complete_job_input.id.trim().to_string();
    let result = complete_job_input
        .result
        .as_deref()
        .map(str::trim)
        .filter(|result| !result.is_empty())
        .map(str::to_string);

    if id.is_empty() {
        return Err(ApiError::BadRequest("id cannot be empty.".into()));
    }

    let job = state
        .database
        .run(move |connection| complete_job(connection, &id, result.as_deref()))
        .await
        .map_err(job_error)?;

    Ok(Json(FinishJobResponse {
        job: transform_job(job),
    }))
}

#[derive(Deserialize)]
pub struct FailJobInput {
    id: String,
    error: String,
}

pub async fn fail_job_handler(
    State(state): State<AppState>,
    input: Result<Json<FailJobInput>, JsonRejection>,
) -> Result<Json<FinishJobResponse>, ApiError> {
    let Json(fail_job_input) = input.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = fail_job_input.id.trim().to_string();
    let error = fail_job_input.error.trim().to_string();

    if id.is_empty() {
        return Err(ApiError::BadRequest("id cannot be empty.".into()));
    }

    if error.is_empty() {
        return Err(ApiError::BadRequest("error cannot be empty.".into()));
    }

    let job = state
        .database
        .run(move |connection| fail_job(connection, &id, &error))
        .await
        .map_err(job_error)?;

    Ok(Json(FinishJobResponse {
        job: transform_job(job),
    }))
}
