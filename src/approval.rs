//! Moderation of user- and import-submitted clubs and events.

use std::fmt;

use diesel::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::database::now;
use crate::error::StoreError;
use crate::models::{Club, ContentStatus, Event};
use crate::schema::{clubs, events};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Club,
    Event,
}

impl EntityKind {
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Club => "clubs",
            EntityKind::Event => "events",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Club => f.write_str("Club"),
            EntityKind::Event => f.write_str("Event"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ModeratedRow {
    Club(Club),
    Event(Event),
}

impl ModeratedRow {
    pub fn status(&self) -> ContentStatus {
        match self {
            ModeratedRow::Club(club) => club.status,
            ModeratedRow::Event(event) => event.status,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Invalid status {0:?}. Expected one of PENDING, APPROVED, REJECTED.")]
    InvalidStatus(String),

    #[error("{kind} {id} not found.")]
    NotFound { kind: EntityKind, id: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<diesel::result::Error> for ApprovalError {
    fn from(err: diesel::result::Error) -> Self {
        ApprovalError::Store(StoreError::Query(err))
    }
}

/// Moves every PENDING row of `kind` to APPROVED in one statement and
/// returns how many rows changed. Zero is not an error.
pub fn approve_all(connection: &mut SqliteConnection, kind: EntityKind) -> Result<usize, StoreError> {
    let updated_at = Some(now());

    let count = match kind {
        EntityKind::Club => diesel::update(clubs::table.filter(clubs::status.eq(ContentStatus::Pending)))
            .set((
                clubs::status.eq(ContentStatus::Approved),
                clubs::updated_at.eq(updated_at),
            ))
            .execute(connection)?,
        EntityKind::Event => {
            diesel::update(events::table.filter(events::status.eq(ContentStatus::Pending)))
                .set((
                    events::status.eq(ContentStatus::Approved),
                    events::updated_at.eq(updated_at),
                ))
                .execute(connection)?
        }
    };

    log::info!("Approved {} pending {}.", count, kind.plural());

    Ok(count)
}

/// Sets the moderation status of a single row. `raw_status` is validated
/// before the store is touched; related rows (category links, RSVPs) are
/// left alone.
pub fn set_status(
    connection: &mut SqliteConnection,
    kind: EntityKind,
    id: i32,
    raw_status: &str,
) -> Result<ModeratedRow, ApprovalError> {
    let status: ContentStatus = raw_status
        .parse()
        .map_err(|_| ApprovalError::InvalidStatus(raw_status.to_string()))?;

    let row = connection.transaction::<_, ApprovalError, _>(|connection| match kind {
        EntityKind::Club => {
            let exists = clubs::table
                .find(id)
                .select(clubs::id)
                .first::<i32>(connection)
                .optional()?;

            if exists.is_none() {
                return Err(ApprovalError::NotFound { kind, id });
            }

            diesel::update(clubs::table.find(id))
                .set((clubs::status.eq(status), clubs::updated_at.eq(Some(now()))))
                .execute(connection)?;

            let club = clubs::table
                .find(id)
                .select(Club::as_select())
                .first(connection)?;

            Ok(ModeratedRow::Club(club))
        }
        EntityKind::Event => {
            let exists = events::table
                .find(id)
                .select(events::id)
                .first::<i32>(connection)
                .optional()?;

            if exists.is_none() {
                return Err(ApprovalError::NotFound { kind, id });
            }

            diesel::update(events::table.find(id))
                .set((events::status.eq(status), events::updated_at.eq(Some(now()))))
                .execute(connection)?;

            let event = events::table
                .find(id)
                .select(Event::as_select())
                .first(connection)?;

            Ok(ModeratedRow::Event(event))
        }
    })?;

    log::info!("Set {} {} to {}.", kind, id, status);

    Ok(row)
}

/// Rows of `kind` with the given status. Clubs come back by name, events by
/// start time.
pub fn list_with_status(
    connection: &mut SqliteConnection,
    kind: EntityKind,
    status: ContentStatus,
) -> Result<Vec<ModeratedRow>, StoreError> {
    let rows = match kind {
        EntityKind::Club => clubs::table
            .select(Club::as_select())
            .filter(clubs::status.eq(status))
            .order((clubs::name.asc(), clubs::id.asc()))
            .load(connection)?
            .into_iter()
            .map(ModeratedRow::Club)
            .collect(),
        EntityKind::Event => events::table
            .select(Event::as_select())
            .filter(events::status.eq(status))
            .order((events::start_time.asc(), events::id.asc()))
            .load(connection)?
            .into_iter()
            .map(ModeratedRow::Event)
            .collect(),
    };

    Ok(rows)
}
