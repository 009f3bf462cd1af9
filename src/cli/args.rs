//! Command-line arguments.

use crate::Result;
use crate::models::{FilterGroup, Pet, Report, Tag};
use crate::query::{parse_filter_group, parse_timestamp};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Lostpets - a lost-and-found pet registry.
#[derive(Debug, Parser)]
#[command(name = "lostpets")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "LOSTPETS_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database schema and seed pet types.
    Init,

    /// List known pet types.
    Types,

    /// Lost pets.
    Postings {
        /// Posting subcommand.
        #[command(subcommand)]
        action: RecordAction,
    },

    /// Found pets.
    Sightings {
        /// Sighting subcommand.
        #[command(subcommand)]
        action: RecordAction,
    },

    /// Match bookkeeping.
    Match {
        /// Match subcommand.
        #[command(subcommand)]
        action: MatchAction,
    },

    /// Show the SQL a set of filter groups compiles to.
    Query {
        /// Record kind the field names refer to.
        #[arg(short, long, value_enum, default_value = "postings")]
        kind: KindArg,

        /// Filter group, e.g. `petcolor=brown;date>=2019-01-01`. Repeat to OR groups.
        #[arg(short, long = "group")]
        groups: Vec<String>,
    },
}

/// Record kind selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Lost pets.
    Postings,
    /// Found pets.
    Sightings,
}

/// Posting and sighting subcommands.
#[derive(Debug, Subcommand)]
pub enum RecordAction {
    /// List records, optionally filtered.
    List {
        /// Filter group, e.g. `location=park;pettype in dog,cat`. Repeat to OR groups.
        #[arg(short, long = "group")]
        groups: Vec<String>,
    },

    /// Show one record.
    Get {
        /// Private reference.
        #[arg(conflicts_with_all = ["id", "email"], required_unless_present_any = ["id", "email"])]
        guid: Option<String>,

        /// Public id.
        #[arg(long)]
        id: Option<i64>,

        /// Submitter email; may match several records.
        #[arg(long)]
        email: Option<String>,
    },

    /// File a new record and search for matches.
    Add(RecordArgs),

    /// Records of the other kind matched to the record with this reference.
    Matches {
        /// Private reference.
        guid: String,
    },
}

/// Match subcommands.
#[derive(Debug, Subcommand)]
pub enum MatchAction {
    /// Record that the parties of a match were put in touch.
    Contact {
        /// Posting id.
        posting_id: i64,
        /// Sighting id.
        sighting_id: i64,
    },

    /// Delete a match.
    Remove {
        /// Posting id.
        posting_id: i64,
        /// Sighting id.
        sighting_id: i64,
    },
}

/// Fields of a new posting or sighting.
#[derive(Debug, Clone, Args)]
pub struct RecordArgs {
    /// When the pet was lost or found (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub date: String,

    /// Where the pet was lost or found.
    #[arg(long, default_value = "")]
    pub location: String,

    /// Submitter name.
    #[arg(long, default_value = "")]
    pub name: String,

    /// Submitter email.
    #[arg(long)]
    pub email: String,

    /// Pet type, e.g. Dog.
    #[arg(long = "type", default_value = "")]
    pub pet_type: String,

    /// Pet name.
    #[arg(long, default_value = "")]
    pub pet_name: String,

    /// Pet color.
    #[arg(long, default_value = "")]
    pub color: String,

    /// Distinguishing marks.
    #[arg(long, default_value = "")]
    pub marks: String,

    /// Breed; repeat for mixes.
    #[arg(long = "breed")]
    pub breeds: Vec<String>,

    /// Picture id.
    #[arg(long)]
    pub picture_id: Option<i64>,

    /// Tag shape.
    #[arg(long, default_value = "")]
    pub tag_shape: String,

    /// Tag color.
    #[arg(long, default_value = "")]
    pub tag_color: String,

    /// Tag text.
    #[arg(long, default_value = "")]
    pub tag_text: String,

    /// The finder is holding the animal (sightings only).
    #[arg(long)]
    pub in_custody: bool,
}

impl RecordArgs {
    /// Builds the report described by the arguments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the date does not parse.
    pub fn to_report(&self) -> Result<Report> {
        let date = parse_timestamp(self.date.trim()).ok_or_else(|| {
            crate::Error::InvalidInput(format!("invalid date '{}'", self.date))
        })?;
        let mut report = Report::new(date);
        report.location.clone_from(&self.location);
        report.name.clone_from(&self.name);
        report.email.clone_from(&self.email);
        report.pet = Pet {
            picture_id: self.picture_id,
            name: self.pet_name.clone(),
            color: self.color.clone(),
            marks: self.marks.clone(),
            type_name: self.pet_type.clone(),
            breeds: self.breeds.clone(),
            tag: Tag {
                shape: self.tag_shape.clone(),
                color: self.tag_color.clone(),
                text: self.tag_text.clone(),
                ..Tag::default()
            },
            ..Pet::default()
        };
        Ok(report)
    }
}

/// Parses repeated `--group` arguments.
///
/// # Errors
///
/// Returns the first parse error.
pub fn parse_groups(groups: &[String]) -> Result<Vec<FilterGroup>> {
    groups.iter().map(|g| parse_filter_group(g)).collect()
}
