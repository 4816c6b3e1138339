use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tally_core::sync::import::ImportEntry;
use tally_core::sync::import_tasks;
use tally_core::sync::window::parse_date;
use tally_core::ItemFailure;

use crate::commands::common::{remote_from_env, render_summary};
use crate::error::CliError;

/// The one required column; other known columns are description,
/// bookable, billable, valid_from, valid_to. Anything else becomes a
/// custom field.
const PATH_COLUMN: &str = "path";

pub fn run_import(file: &Path, as_json: bool) -> Result<(), CliError> {
    let (entries, mut decode_failures) = decode_entries(File::open(file)?)?;
    tracing::info!(
        entries = entries.len(),
        bad_rows = decode_failures.len(),
        file = %file.display(),
        "decoded import file"
    );

    let remote = remote_from_env()?;
    let mut summary = import_tasks(&remote, &entries)?;
    // Rows that never decoded are failures of the same pass
    summary.failures.append(&mut decode_failures);

    render_summary("import", &summary, as_json)
}

/// Decode CSV rows into import entries.
///
/// Bad rows are collected, not fatal; a file without a `path` column is
/// rejected outright.
pub fn decode_entries<R: Read>(
    reader: R,
) -> Result<(Vec<ImportEntry>, Vec<ItemFailure>), CliError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect();
    if !headers.iter().any(|header| header == PATH_COLUMN) {
        return Err(CliError::MissingColumn(PATH_COLUMN.to_string()));
    }

    let mut entries = Vec::new();
    let mut failures = Vec::new();

    for (index, row) in csv_reader.records().enumerate() {
        let line = index + 2; // header is line 1
        let row = match row {
            Ok(row) => row,
            Err(error) => {
                failures.push(ItemFailure::new(
                    format!("line {line}"),
                    error.to_string(),
                ));
                continue;
            }
        };

        match decode_row(&headers, &row) {
            Ok(entry) => entries.push(entry),
            Err(message) => failures.push(ItemFailure::new(format!("line {line}"), message)),
        }
    }

    Ok((entries, failures))
}

fn decode_row(
    headers: &[String],
    row: &csv::StringRecord,
) -> std::result::Result<ImportEntry, String> {
    let mut entry: Option<ImportEntry> = None;
    let mut custom_fields = BTreeMap::new();

    // First locate the path so the entry exists to fill in
    for (header, value) in headers.iter().zip(row.iter()) {
        if header == PATH_COLUMN {
            if value.is_empty() {
                return Err("missing task path".to_string());
            }
            entry = Some(ImportEntry::from_path(value));
        }
    }
    let mut entry = entry.ok_or_else(|| "missing task path".to_string())?;

    for (header, value) in headers.iter().zip(row.iter()) {
        if value.is_empty() || header == PATH_COLUMN {
            continue;
        }
        match header.as_str() {
            "description" => entry.description = Some(value.to_string()),
            "bookable" => entry.bookable = parse_bool_token(value)?,
            "billable" => entry.billable = parse_bool_token(value)?,
            "valid_from" => {
                entry.valid_from = Some(parse_date(value).map_err(|error| error.to_string())?);
            }
            "valid_to" => {
                entry.valid_to = Some(parse_date(value).map_err(|error| error.to_string())?);
            }
            _ => {
                custom_fields.insert(header.clone(), value.to_string());
            }
        }
    }

    entry.custom_fields = custom_fields;
    Ok(entry)
}

fn parse_bool_token(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("unparseable boolean '{other}'")),
    }
}
