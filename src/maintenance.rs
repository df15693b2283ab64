//! One-off data repair scripts run through the `maintenance` binary. Each one
//! is a sequential read-modify-write inside a single transaction.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDateTime, TimeDelta};
use diesel::prelude::*;
use thiserror::Error;

use crate::approval::EntityKind;
use crate::database::now;
use crate::error::StoreError;
use crate::models::{
    Category, ClubCategory, EventCategory, NewCategory, NewClubCategory, NewEventCategory, User,
};
use crate::schema::{categories, club_categories, clubs, event_categories, events, users};

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("No user with email {0}.")]
    UserNotFound(String),

    #[error("Category name cannot be empty.")]
    EmptyCategoryName,

    #[error("Shifting by {0} days moves an event date out of range.")]
    DateOutOfRange(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<diesel::result::Error> for MaintenanceError {
    fn from(err: diesel::result::Error) -> Self {
        MaintenanceError::Store(StoreError::Query(err))
    }
}

/// Moves event start and end times by `days`. When `after` is given only
/// events starting at or after it are shifted.
pub fn shift_event_dates(
    connection: &mut SqliteConnection,
    days: i64,
    after: Option<NaiveDateTime>,
) -> Result<usize, MaintenanceError> {
    let offset = TimeDelta::try_days(days).ok_or(MaintenanceError::DateOutOfRange(days))?;
    let shift = |time: NaiveDateTime| {
        time.checked_add_signed(offset)
            .ok_or(MaintenanceError::DateOutOfRange(days))
    };

    let shifted = connection.transaction::<_, MaintenanceError, _>(|connection| {
        let mut query = events::table
            .select((events::id, events::start_time, events::end_time))
            .into_boxed();

        if let Some(after) = after {
            query = query.filter(events::start_time.ge(after));
        }

        let rows: Vec<(i32, NaiveDateTime, Option<NaiveDateTime>)> = query.load(connection)?;

        for (id, start_time, end_time) in &rows {
            let start_time = shift(*start_time)?;
            let end_time = end_time.map(shift).transpose()?;

            diesel::update(events::table.find(*id))
                .set((
                    events::start_time.eq(start_time),
                    events::end_time.eq(end_time),
                    events::updated_at.eq(Some(now())),
                ))
                .execute(connection)?;
        }

        Ok(rows.len())
    })?;

    log::info!("Shifted {} events by {} days.", shifted, days);

    Ok(shifted)
}

/// Fills NULL or blank descriptions with `placeholder`.
pub fn reset_descriptions(
    connection: &mut SqliteConnection,
    kind: EntityKind,
    placeholder: &str,
) -> Result<usize, StoreError> {
    let reset = connection.transaction::<_, diesel::result::Error, _>(|connection| {
        let rows: Vec<(i32, Option<String>)> = match kind {
            EntityKind::Club => clubs::table
                .select((clubs::id, clubs::description))
                .load(connection)?,
            EntityKind::Event => events::table
                .select((events::id, events::description))
                .load(connection)?,
        };

        let blank: Vec<i32> = rows
            .into_iter()
            .filter(|(_, description)| {
                description
                    .as_deref()
                    .map_or(true, |text| text.trim().is_empty())
            })
            .map(|(id, _)| id)
            .collect();

        if blank.is_empty() {
            return Ok(0);
        }

        let updated = match kind {
            EntityKind::Club => diesel::update(clubs::table.filter(clubs::id.eq_any(&blank)))
                .set(clubs::description.eq(placeholder))
                .execute(connection)?,
            EntityKind::Event => diesel::update(events::table.filter(events::id.eq_any(&blank)))
                .set(events::description.eq(placeholder))
                .execute(connection)?,
        };

        Ok(updated)
    })?;

    log::info!("Reset {} {} descriptions.", reset, kind.plural());

    Ok(reset)
}

/// Links every club or event without any category to `category_name`,
/// creating the category if it does not exist yet.
pub fn backfill_categories(
    connection: &mut SqliteConnection,
    kind: EntityKind,
    category_name: &str,
) -> Result<usize, MaintenanceError> {
    let category_name = category_name.trim();

    if category_name.is_empty() {
        return Err(MaintenanceError::EmptyCategoryName);
    }

    let linked = connection.transaction::<_, MaintenanceError, _>(|connection| {
        let category_id = find_or_create_category(connection, category_name)?;

        let (all_ids, linked_ids): (Vec<i32>, Vec<i32>) = match kind {
            EntityKind::Club => (
                clubs::table.select(clubs::id).load(connection)?,
                club_categories::table
                    .select(club_categories::club_id)
                    .load(connection)?,
            ),
            EntityKind::Event => (
                events::table.select(events::id).load(connection)?,
                event_categories::table
                    .select(event_categories::event_id)
                    .load(connection)?,
            ),
        };

        let linked_ids: HashSet<i32> = linked_ids.into_iter().collect();
        let missing: Vec<i32> = all_ids
            .into_iter()
            .filter(|id| !linked_ids.contains(id))
            .collect();

        for id in &missing {
            match kind {
                EntityKind::Club => diesel::insert_into(club_categories::table)
                    .values(&NewClubCategory {
                        club_id: *id,
                        category_id,
                    })
                    .execute(connection)?,
                EntityKind::Event => diesel::insert_into(event_categories::table)
                    .values(&NewEventCategory {
                        event_id: *id,
                        category_id,
                    })
                    .execute(connection)?,
            };
        }

        Ok(missing.len())
    })?;

    log::info!(
        "Linked {} {} to category {:?}.",
        linked,
        kind.plural(),
        category_name
    );

    Ok(linked)
}

/// Matches existing categories the way `cleanup_categories` groups them,
/// ignoring case and surrounding whitespace.
fn find_or_create_category(
    connection: &mut SqliteConnection,
    name: &str,
) -> Result<i32, diesel::result::Error> {
    let key = name.to_lowercase();

    let existing = categories::table
        .select(Category::as_select())
        .order(categories::id.asc())
        .load(connection)?
        .into_iter()
        .find(|category| category.name.trim().to_lowercase() == key);

    if let Some(category) = existing {
        return Ok(category.id);
    }

    diesel::insert_into(categories::table)
        .values(&NewCategory { name })
        .execute(connection)?;

    categories::table
        .select(categories::id)
        .filter(categories::name.eq(name))
        .order(categories::id.desc())
        .first(connection)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub merged_categories: usize,
    pub duplicate_links_removed: usize,
    pub orphaned_categories_removed: usize,
}

/// Merges categories whose names only differ by case or surrounding
/// whitespace, drops duplicate (entity, category) links and deletes
/// categories nothing links to.
pub fn cleanup_categories(connection: &mut SqliteConnection) -> Result<CleanupReport, StoreError> {
    let report = connection.transaction::<_, diesel::result::Error, _>(|connection| {
        let mut report = CleanupReport::default();

        let all: Vec<Category> = categories::table
            .select(Category::as_select())
            .order(categories::id.asc())
            .load(connection)?;

        let mut survivors: HashMap<String, i32> = HashMap::new();

        for category in all {
            let trimmed = category.name.trim();
            let key = trimmed.to_lowercase();

            match survivors.get(&key) {
                Some(&survivor) => {
                    diesel::update(
                        club_categories::table
                            .filter(club_categories::category_id.eq(category.id)),
                    )
                    .set(club_categories::category_id.eq(survivor))
                    .execute(connection)?;

                    diesel::update(
                        event_categories::table
                            .filter(event_categories::category_id.eq(category.id)),
                    )
                    .set(event_categories::category_id.eq(survivor))
                    .execute(connection)?;

                    diesel::delete(categories::table.find(category.id)).execute(connection)?;

                    report.merged_categories += 1;
                }
                None => {
                    if trimmed != category.name {
                        diesel::update(categories::table.find(category.id))
                            .set(categories::name.eq(trimmed))
                            .execute(connection)?;
                    }

                    survivors.insert(key, category.id);
                }
            }
        }

        let club_links: Vec<ClubCategory> = club_categories::table
            .select(ClubCategory::as_select())
            .order(club_categories::id.asc())
            .load(connection)?;
        let mut seen = HashSet::new();
        let duplicates: Vec<i32> = club_links
            .into_iter()
            .filter(|link| !seen.insert((link.club_id, link.category_id)))
            .map(|link| link.id)
            .collect();
        report.duplicate_links_removed += diesel::delete(
            club_categories::table.filter(club_categories::id.eq_any(&duplicates)),
        )
        .execute(connection)?;

        let event_links: Vec<EventCategory> = event_categories::table
            .select(EventCategory::as_select())
            .order(event_categories::id.asc())
            .load(connection)?;
        let mut seen = HashSet::new();
        let duplicates: Vec<i32> = event_links
            .into_iter()
            .filter(|link| !seen.insert((link.event_id, link.category_id)))
            .map(|link| link.id)
            .collect();
        report.duplicate_links_removed += diesel::delete(
            event_categories::table.filter(event_categories::id.eq_any(&duplicates)),
        )
        .execute(connection)?;

        let mut in_use: HashSet<i32> = club_categories::table
            .select(club_categories::category_id)
            .load::<i32>(connection)?
            .into_iter()
            .collect();
        in_use.extend(
            event_categories::table
                .select(event_categories::category_id)
                .load::<i32>(connection)?,
        );

        let orphans: Vec<i32> = categories::table
            .select(categories::id)
            .load::<i32>(connection)?
            .into_iter()
            .filter(|id| !in_use.contains(id))
            .collect();
        report.orphaned_categories_removed =
            diesel::delete(categories::table.filter(categories::id.eq_any(&orphans)))
                .execute(connection)?;

        Ok(report)
    })?;

    log::info!(
        "Merged {} categories, removed {} duplicate links and {} orphaned categories.",
        report.merged_categories,
        report.duplicate_links_removed,
        report.orphaned_categories_removed
    );

    Ok(report)
}

/// Grants the admin flag to an existing user.
pub fn promote_admin(connection: &mut SqliteConnection, email: &str) -> Result<User, MaintenanceError> {
    let email = email.trim();

    let updated = diesel::update(users::table.filter(users::email.eq(email)))
        .set(users::is_admin.eq(true))
        .execute(connection)?;

    if updated == 0 {
        return Err(MaintenanceError::UserNotFound(email.to_string()));
    }

    let user = users::table
        .select(User::as_select())
        .filter(users::email.eq(email))
        .first(connection)?;

    log::info!("Promoted {} to admin.", user.email);

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::temp_database;
    use crate::models::{ContentStatus, NewClub, NewEvent, NewUser};
    use chrono::{Duration, NaiveDate};

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, day)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
    }

    fn insert_event(connection: &mut SqliteConnection, title: &str, start: NaiveDateTime) -> i32 {
        diesel::insert_into(events::table)
            .values(&NewEvent {
                title,
                description: None,
                location: None,
                start_time: start,
                end_time: Some(start + Duration::hours(2)),
                club_id: None,
                status: ContentStatus::Approved,
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

    fn insert_club(connection: &mut SqliteConnection, name: &str, description: Option<&str>) -> i32 {
        diesel::insert_into(clubs::table)
            .values(&NewClub {
                name,
                description,
                contact_email: None,
                website: None,
                status: ContentStatus::Approved,
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

    fn insert_category(connection: &mut SqliteConnection, name: &str) -> i32 {
        diesel::insert_into(categories::table)
            .values(&NewCategory { name })
            .execute(connection)
            .unwrap();

        categories::table
            .select(categories::id)
            .order(categories::id.desc())
            .first(connection)
            .unwrap()
    }

    fn link_club(connection: &mut SqliteConnection, club_id: i32, category_id: i32) {
        diesel::insert_into(club_categories::table)
            .values(&NewClubCategory {
                club_id,
                category_id,
            })
            .execute(connection)
            .unwrap();
    }

    #[test]
    fn shift_event_dates_only_moves_events_after_the_cutoff() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        let early = insert_event(connection, "Orientation", at(1));
        let late = insert_event(connection, "Club Fair", at(10));

        let shifted = shift_event_dates(connection, -1, Some(at(5))).unwrap();
        assert_eq!(shifted, 1);

        let rows: Vec<(i32, NaiveDateTime, Option<NaiveDateTime>)> = events::table
            .select((events::id, events::start_time, events::end_time))
            .order(events::id.asc())
            .load(connection)
            .unwrap();

        assert_eq!(rows[0], (early, at(1), Some(at(1) + Duration::hours(2))));
        assert_eq!(rows[1], (late, at(9), Some(at(9) + Duration::hours(2))));
    }

    #[test]
    fn shift_event_dates_rejects_an_out_of_range_offset() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        let event = insert_event(connection, "Club Fair", at(10));

        let err = shift_event_dates(connection, 1_000_000_000, None).unwrap_err();
        assert!(matches!(err, MaintenanceError::DateOutOfRange(1_000_000_000)));

        let err = shift_event_dates(connection, 100_000_000, None).unwrap_err();
        assert!(matches!(err, MaintenanceError::DateOutOfRange(100_000_000)));

        let start_time: NaiveDateTime = events::table
            .find(event)
            .select(events::start_time)
            .first(connection)
            .unwrap();
        assert_eq!(start_time, at(10));
    }

    #[test]
    fn reset_descriptions_fills_null_and_blank_only() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        insert_club(connection, "Surf Club", None);
        insert_club(connection, "Chess Club", Some("   "));
        insert_club(connection, "Hula Club", Some("Dance with us"));

        let reset = reset_descriptions(connection, EntityKind::Club, "Description coming soon").unwrap();
        assert_eq!(reset, 2);

        let descriptions: Vec<Option<String>> = clubs::table
            .select(clubs::description)
            .order(clubs::id.asc())
            .load(connection)
            .unwrap();

        assert_eq!(
            descriptions,
            vec![
                Some("Description coming soon".to_string()),
                Some("Description coming soon".to_string()),
                Some("Dance with us".to_string()),
            ]
        );
    }

    #[test]
    fn backfill_links_only_uncategorized_rows() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        let tagged = insert_club(connection, "Surf Club", None);
        let untagged = insert_club(connection, "Chess Club", None);
        let sports = insert_category(connection, "Sports");
        link_club(connection, tagged, sports);

        let linked = backfill_categories(connection, EntityKind::Club, " Other ").unwrap();
        assert_eq!(linked, 1);

        let links: Vec<(i32, String)> = club_categories::table
            .inner_join(categories::table)
            .select((club_categories::club_id, categories::name))
            .order(club_categories::id.asc())
            .load(connection)
            .unwrap();

        assert_eq!(
            links,
            vec![(tagged, "Sports".to_string()), (untagged, "Other".to_string())]
        );

        assert_eq!(backfill_categories(connection, EntityKind::Club, "Other").unwrap(), 0);
    }

    #[test]
    fn backfill_reuses_a_category_that_differs_only_by_case() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        let club = insert_club(connection, "Chess Club", None);
        let other = insert_category(connection, "Other");

        let linked = backfill_categories(connection, EntityKind::Club, " other ").unwrap();
        assert_eq!(linked, 1);

        let count: i64 = categories::table.count().get_result(connection).unwrap();
        assert_eq!(count, 1);

        let links: Vec<(i32, i32)> = club_categories::table
            .select((club_categories::club_id, club_categories::category_id))
            .load(connection)
            .unwrap();
        assert_eq!(links, vec![(club, other)]);
    }

    #[test]
    fn backfill_rejects_an_empty_category_name() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        let err = backfill_categories(connection, EntityKind::Event, "  ").unwrap_err();

        assert!(matches!(err, MaintenanceError::EmptyCategoryName));
    }

    #[test]
    fn cleanup_merges_duplicates_and_drops_orphans() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        let club = insert_club(connection, "Surf Club", None);
        let sports = insert_category(connection, "Sports");
        let sports_dup = insert_category(connection, " sports ");
        insert_category(connection, "Unused");

        link_club(connection, club, sports);
        link_club(connection, club, sports_dup);
        link_club(connection, club, sports);

        let report = cleanup_categories(connection).unwrap();

        assert_eq!(
            report,
            CleanupReport {
                merged_categories: 1,
                duplicate_links_removed: 2,
                orphaned_categories_removed: 1,
            }
        );

        let names: Vec<String> = categories::table
            .select(categories::name)
            .load(connection)
            .unwrap();
        assert_eq!(names, vec!["Sports"]);

        let links: Vec<(i32, i32)> = club_categories::table
            .select((club_categories::club_id, club_categories::category_id))
            .load(connection)
            .unwrap();
        assert_eq!(links, vec![(club, sports)]);
    }

    #[test]
    fn promote_admin_sets_the_flag() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        diesel::insert_into(users::table)
            .values(&NewUser {
                email: "kai@hawaii.edu",
                name: Some("Kai"),
                is_admin: false,
                created_at: now(),
            })
            .execute(connection)
            .unwrap();

        let user = promote_admin(connection, "kai@hawaii.edu").unwrap();
        assert!(user.is_admin);

        let err = promote_admin(connection, "nobody@hawaii.edu").unwrap_err();
        assert!(matches!(err, MaintenanceError::UserNotFound(email) if email == "nobody@hawaii.edu"));
    }
}
