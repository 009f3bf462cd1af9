//! Command execution.

use super::args::{Commands, KindArg, MatchAction, RecordAction, parse_groups};
use super::output::{
    write_json, write_matches, write_pet_types, write_postings, write_query, write_report,
    write_sightings,
};
use crate::models::{Posting, RecordKind, Sighting};
use crate::services::RegistryService;
use crate::{Error, Result};
use serde_json::json;
use std::io::Write;

/// Runs one command against the registry, writing results to `out`.
///
/// # Errors
///
/// Returns the first error raised by parsing, the registry or output.
pub fn execute(
    service: &RegistryService,
    command: &Commands,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Commands::Init => {
            let types = service.pet_types()?;
            writeln!(out, "Registry ready ({} pet types)", types.len())
                .map_err(super::output::io_error)
        },
        Commands::Types => {
            let types = service.pet_types()?;
            if json {
                write_json(out, &types)
            } else {
                write_pet_types(out, &types)
            }
        },
        Commands::Postings { action } => run_postings(service, action, json, out),
        Commands::Sightings { action } => run_sightings(service, action, json, out),
        Commands::Match { action } => run_match(service, action, json, out),
        Commands::Query { kind, groups } => {
            let kind = match kind {
                KindArg::Postings => RecordKind::Posting,
                KindArg::Sightings => RecordKind::Sighting,
            };
            let query = service.compile(kind, &parse_groups(groups)?)?;
            if json {
                let args: Vec<String> = query.args.iter().map(ToString::to_string).collect();
                write_json(out, &json!({ "where": query.where_clause, "args": args }))
            } else {
                write_query(out, &query)
            }
        },
    }
}

fn run_postings(
    service: &RegistryService,
    action: &RecordAction,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    match action {
        RecordAction::List { groups } => {
            let postings = service.list_postings(&parse_groups(groups)?)?;
            if json {
                write_json(out, &postings)
            } else {
                write_postings(out, &postings)
            }
        },
        RecordAction::Get { guid, id, email } => {
            let postings: Vec<Posting> = match (guid, id, email) {
                (Some(guid), _, _) => service.posting_by_guid(guid)?.into_iter().collect(),
                (_, Some(id), _) => service.posting_by_id(*id)?.into_iter().collect(),
                (_, _, Some(email)) => service.postings_by_email(email)?,
                _ => Vec::new(),
            };
            if postings.is_empty() {
                return Err(Error::NotFound("posting".to_string()));
            }
            if json {
                return write_json(out, &postings);
            }
            for posting in &postings {
                write_report(out, &posting.report)?;
            }
            Ok(())
        },
        RecordAction::Add(args) => {
            let stored = service.add_posting(&Posting::new(args.to_report()?))?;
            if json {
                write_json(out, &stored)
            } else {
                writeln!(out, "Posting filed:").map_err(super::output::io_error)?;
                write_report(out, &stored.report)
            }
        },
        RecordAction::Matches { guid } => {
            let sightings = service.matching_sightings(guid)?;
            if json {
                write_json(out, &sightings)
            } else {
                write_sightings(out, &sightings)
            }
        },
    }
}

fn run_sightings(
    service: &RegistryService,
    action: &RecordAction,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    match action {
        RecordAction::List { groups } => {
            let sightings = service.list_sightings(&parse_groups(groups)?)?;
            if json {
                write_json(out, &sightings)
            } else {
                write_sightings(out, &sightings)
            }
        },
        RecordAction::Get { guid, id, email } => {
            let sightings: Vec<Sighting> = match (guid, id, email) {
                (Some(guid), _, _) => service.sighting_by_guid(guid)?.into_iter().collect(),
                (_, Some(id), _) => service.sighting_by_id(*id)?.into_iter().collect(),
                (_, _, Some(email)) => service.sightings_by_email(email)?,
                _ => Vec::new(),
            };
            if sightings.is_empty() {
                return Err(Error::NotFound("sighting".to_string()));
            }
            if json {
                return write_json(out, &sightings);
            }
            for sighting in &sightings {
                write_report(out, &sighting.report)?;
            }
            Ok(())
        },
        RecordAction::Add(args) => {
            let sighting = Sighting::new(args.to_report()?, args.in_custody);
            let stored = service.add_sighting(&sighting)?;
            if json {
                write_json(out, &stored)
            } else {
                writeln!(out, "Sighting filed:").map_err(super::output::io_error)?;
                write_report(out, &stored.report)
            }
        },
        RecordAction::Matches { guid } => {
            let postings = service.matching_postings(guid)?;
            if json {
                write_json(out, &postings)
            } else {
                write_postings(out, &postings)
            }
        },
    }
}

fn run_match(
    service: &RegistryService,
    action: &MatchAction,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let (posting_id, sighting_id) = match action {
        MatchAction::Contact {
            posting_id,
            sighting_id,
        } => {
            service.contact_match(*posting_id, *sighting_id)?;
            (*posting_id, *sighting_id)
        },
        MatchAction::Remove {
            posting_id,
            sighting_id,
        } => {
            service.remove_match(*posting_id, *sighting_id)?;
            if json {
                return write_json(out, &json!({ "removed": [posting_id, sighting_id] }));
            }
            return writeln!(out, "Match removed").map_err(super::output::io_error);
        },
    };

    let current: Vec<_> = service
        .matches_for_posting(posting_id)?
        .into_iter()
        .filter(|m| m.sighting_id == sighting_id)
        .collect();
    if json {
        write_json(out, &current)
    } else {
        write_matches(out, &current)
    }
}
