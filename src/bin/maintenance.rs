//! Manual data repair scripts for the compass database.

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};

use manoa_compass::approval::EntityKind;
use manoa_compass::config::Config;
use manoa_compass::database::Database;
use manoa_compass::logger::init_logger;
use manoa_compass::maintenance;

#[derive(Parser, Debug)]
#[command(name = "maintenance")]
#[command(about = "One-off repairs for clubs, events and categories", long_about = None)]
struct Args {
    /// Overrides DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Clubs,
    Events,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Clubs => EntityKind::Club,
            Kind::Events => EntityKind::Event,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move event start and end times by a number of days
    ShiftEventDates {
        /// Days to shift by, negative to move events earlier
        #[arg(long, allow_hyphen_values = true)]
        days: i64,

        /// Only shift events starting on or after this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        after: Option<NaiveDateTime>,
    },

    /// Give rows with an empty description a placeholder text
    ResetDescriptions {
        #[arg(long, value_enum)]
        kind: Kind,

        #[arg(long)]
        placeholder: String,
    },

    /// Link every uncategorized row to a category
    BackfillCategories {
        #[arg(long, value_enum)]
        kind: Kind,

        #[arg(long)]
        category: String,
    },

    /// Merge duplicate categories and drop unused ones
    CleanupCategories,

    /// Grant the admin flag to an existing user
    PromoteAdmin {
        #[arg(long)]
        email: String,
    },
}

fn parse_date(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("invalid date {:?}: {}", value, e))?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid date {:?}", value))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let database_url = match args.database_url {
        Some(url) => url,
        None => Config::from_env()?.database_url,
    };

    init_logger(log::LevelFilter::Info)?;

    let database = Database::new(&database_url);
    database.run_migrations()?;

    let connection = &mut database.establish_connection()?;

    match args.command {
        Command::ShiftEventDates { days, after } => {
            maintenance::shift_event_dates(connection, days, after)?;
        }
        Command::ResetDescriptions { kind, placeholder } => {
            maintenance::reset_descriptions(connection, kind.into(), &placeholder)?;
        }
        Command::BackfillCategories { kind, category } => {
            maintenance::backfill_categories(connection, kind.into(), &category)?;
        }
        Command::CleanupCategories => {
            maintenance::cleanup_categories(connection)?;
        }
        Command::PromoteAdmin { email } => {
            maintenance::promote_admin(connection, &email)?;
        }
    }

    Ok(())
}
