#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use diesel::prelude::*;
use log::LevelFilter;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use manoa_compass::config::Config;
use manoa_compass::database::{now, Database};
use manoa_compass::models::{ContentStatus, NewClub, NewEvent, NewUser};
use manoa_compass::router;
use manoa_compass::schema::{clubs, events, users};
use manoa_compass::state::AppState;

pub const CRON_SECRET: &str = "test-secret";
pub const ADMIN_EMAIL: &str = "admin@hawaii.edu";
pub const MEMBER_EMAIL: &str = "member@hawaii.edu";

pub struct TestApp {
    _dir: TempDir,
    pub database: Database,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_secret(Some(CRON_SECRET))
    }

    pub fn with_secret(cron_secret: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compass.db");
        let database = Database::new(path.to_str().unwrap());
        database.run_migrations().unwrap();

        let config = Config {
            database_url: database.url().to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            cron_secret: cron_secret.map(str::to_string),
            log_level: LevelFilter::Off,
        };

        let app = TestApp {
            router: router::app(AppState::new(database.clone(), config)),
            database,
            _dir: dir,
        };

        app.insert_user(ADMIN_EMAIL, true);
        app.insert_user(MEMBER_EMAIL, false);

        app
    }

    pub fn connection(&self) -> SqliteConnection {
        self.database.establish_connection().unwrap()
    }

    pub fn insert_user(&self, email: &str, is_admin: bool) {
        diesel::insert_into(users::table)
            .values(&NewUser {
                email,
                name: None,
                is_admin,
                created_at: now(),
            })
            .execute(&mut self.connection())
            .unwrap();
    }

    pub fn insert_club(&self, name: &str, status: ContentStatus) -> i32 {
        let connection = &mut self.connection();

        diesel::insert_into(clubs::table)
            .values(&NewClub {
                name,
                description: None,
                contact_email: None,
                website: None,
                status,
                created_at: now(),
            })
            .execute(connection)
            .unwrap();

        clubs::table
            .select(clubs::id)
            .order(clubs::id.desc())
            .first(connection)
            .unwrap()
    }

    pub fn insert_event(&self, title: &str, status: ContentStatus) -> i32 {
        let connection = &mut self.connection();

        diesel::insert_into(events::table)
            .values(&NewEvent {
                title,
                description: None,
                location: None,
                start_time: now(),
                end_time: None,
                club_id: None,
                status,
                created_at: now(),
            })
            .execute(connection)
            .unwrap();

        events::table
            .select(events::id)
            .order(events::id.desc())
            .first(connection)
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, body)
    }

    /// A request from the scheduler or a worker.
    pub async fn cron(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", CRON_SECRET));

        self.send(with_body(builder, body)).await
    }

    /// A request from a signed-in user.
    pub async fn as_user(
        &self,
        email: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-email", email);

        self.send(with_body(builder, body)).await
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.as_user(ADMIN_EMAIL, method, uri, body).await
    }
}

pub fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
