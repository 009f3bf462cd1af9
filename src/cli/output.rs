//! Result rendering for the terminal.

use crate::models::{Match, PetType, Posting, Report, Sighting};
use crate::query::CompiledQuery;
use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;

pub(crate) fn io_error(e: std::io::Error) -> Error {
    Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    }
}

/// Writes `value` as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })?;
    writeln!(out, "{text}").map_err(io_error)
}

fn summary(report: &Report) -> String {
    let pet = &report.pet;
    let mut line = format!("#{:<5} {}", report.id, report.date.format("%Y-%m-%d"));
    for part in [&pet.type_name, &pet.name, &pet.color] {
        if !part.is_empty() {
            line.push(' ');
            line.push_str(part);
        }
    }
    if !pet.breeds.is_empty() {
        line.push_str(&format!(" ({})", pet.breeds.join(", ")));
    }
    if !report.location.is_empty() {
        line.push_str(&format!(" @ {}", report.location));
    }
    line
}

/// One line per posting.
pub fn write_postings(out: &mut dyn Write, postings: &[Posting]) -> Result<()> {
    if postings.is_empty() {
        return writeln!(out, "No postings found").map_err(io_error);
    }
    for posting in postings {
        writeln!(out, "{}", summary(&posting.report)).map_err(io_error)?;
    }
    Ok(())
}

/// One line per sighting.
pub fn write_sightings(out: &mut dyn Write, sightings: &[Sighting]) -> Result<()> {
    if sightings.is_empty() {
        return writeln!(out, "No sightings found").map_err(io_error);
    }
    for sighting in sightings {
        let custody = if sighting.in_custody { " [in custody]" } else { "" };
        writeln!(out, "{}{custody}", summary(&sighting.report)).map_err(io_error)?;
    }
    Ok(())
}

/// Full record, including the private reference and contact details.
pub fn write_report(out: &mut dyn Write, report: &Report) -> Result<()> {
    let pet = &report.pet;
    let lines = [
        ("Id", report.id.to_string()),
        ("Reference", report.guid.clone()),
        ("Date", report.date.to_rfc3339()),
        ("Location", report.location.clone()),
        ("Contact", format!("{} <{}>", report.name, report.email)),
        ("Type", pet.type_name.clone()),
        ("Name", pet.name.clone()),
        ("Color", pet.color.clone()),
        ("Marks", pet.marks.clone()),
        ("Breeds", pet.breeds.join(", ")),
        (
            "Tag",
            format!("{} {} {}", pet.tag.shape, pet.tag.color, pet.tag.text)
                .trim()
                .to_string(),
        ),
    ];
    for (label, value) in lines {
        writeln!(out, "  {label:<10} {value}").map_err(io_error)?;
    }
    Ok(())
}

/// Pet type table.
pub fn write_pet_types(out: &mut dyn Write, types: &[PetType]) -> Result<()> {
    for pet_type in types {
        writeln!(out, "{:>3}  {}", pet_type.id, pet_type.name).map_err(io_error)?;
    }
    Ok(())
}

/// Match rows.
pub fn write_matches(out: &mut dyn Write, matches: &[Match]) -> Result<()> {
    for m in matches {
        let contacted = m
            .last_contacted
            .map_or_else(|| "never contacted".to_string(), |ts| ts.to_rfc3339());
        writeln!(
            out,
            "posting #{} <-> sighting #{}  ({contacted})",
            m.posting_id, m.sighting_id
        )
        .map_err(io_error)?;
    }
    Ok(())
}

/// Compiled clause and its arguments, numbered as in the clause.
pub fn write_query(out: &mut dyn Write, query: &CompiledQuery) -> Result<()> {
    if query.is_empty() {
        return writeln!(out, "(no filter: matches every record)").map_err(io_error);
    }
    writeln!(out, "WHERE {}", query.where_clause).map_err(io_error)?;
    for (i, arg) in query.args.iter().enumerate() {
        writeln!(out, "  {:>3}: {arg}", i + 1).map_err(io_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pet;
    use chrono::{TimeZone, Utc};

    fn report() -> Report {
        let mut report = Report::new(Utc.with_ymd_and_hms(2019, 3, 2, 10, 0, 0).unwrap());
        report.id = 7;
        report.location = "Riverside".to_string();
        report.pet = Pet {
            name: "Rex".to_string(),
            type_name: "Dog".to_string(),
            breeds: vec!["Beagle".to_string()],
            ..Pet::default()
        };
        report
    }

    fn render(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_summary_line() {
        let out = render(|w| write_postings(w, &[Posting::new(report())]));
        assert_eq!(out, "#7     2019-03-02 Dog Rex (Beagle) @ Riverside\n");
    }

    #[test]
    fn test_custody_flag() {
        let out = render(|w| write_sightings(w, &[Sighting::new(report(), true)]));
        assert!(out.trim_end().ends_with("[in custody]"));
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(render(|w| write_sightings(w, &[])), "No sightings found\n");
    }

    #[test]
    fn test_json_output() {
        let out = render(|w| write_json(w, &Posting::new(report())));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["location"], "Riverside");
    }
}
