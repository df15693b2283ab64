//! Request guards. Each is a middleware applied with `route_layer`, so a
//! handler behind it never re-checks credentials.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use diesel::prelude::*;

use crate::error::{ApiError, StoreError};
use crate::models::User;
use crate::schema::users;
use crate::state::AppState;

/// Header carrying the signed-in user's email, set by the session layer in
/// front of this service.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// The admin who passed [`require_admin`], available to handlers as an
/// `Extension`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn secrets_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }

    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Admits scheduler and worker calls that carry `Authorization: Bearer <CRON_SECRET>`.
pub async fn require_scheduler_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.cron_secret.as_deref() else {
        log::warn!("Rejected scheduler call: CRON_SECRET is not configured.");

        return ApiError::Unauthorized("Unauthorized".into()).into_response();
    };

    let authorized =
        bearer_token(request.headers()).is_some_and(|token| secrets_match(expected, token));

    if !authorized {
        log::warn!("Rejected scheduler call to {}.", request.uri().path());

        return ApiError::Unauthorized("Unauthorized".into()).into_response();
    }

    next.run(request).await
}

/// Admits requests whose forwarded user exists and has the admin flag.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let email = request
        .headers()
        .get(USER_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string);

    let Some(email) = email else {
        return ApiError::Unauthorized("Not signed in.".into()).into_response();
    };

    let user = match find_user_by_email(&state, &email).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    match user {
        None => {
            log::warn!("Rejected admin call from unknown user {}.", email);

            ApiError::Unauthorized("Not signed in.".into()).into_response()
        }
        Some(user) if !user.is_admin => {
            log::warn!("Rejected admin call from non-admin user {}.", email);

            ApiError::Forbidden("Admin access required.".into()).into_response()
        }
        Some(user) => {
            request.extensions_mut().insert(AdminUser(user));

            next.run(request).await
        }
    }
}

async fn find_user_by_email(state: &AppState, email: &str) -> Result<Option<User>, ApiError> {
    let email = email.to_string();

    state
        .database
        .run(move |connection| -> Result<Option<User>, StoreError> {
            let user = users::table
                .select(User::as_select())
                .filter(users::email.eq(email))
                .first(connection)
                .optional()?;

            Ok(user)
        })
        .await
        .map_err(|e| ApiError::internal("Failed to load user.", e))
}
