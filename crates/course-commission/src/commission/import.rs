//! CSV seed import for headers and their details.
//!
//! Each row names its header; rows sharing a header name land under one header, created from
//! the first row that mentions it. Later rows may leave the header columns empty or repeat them;
//! a different value is rejected. A row with an empty `platform_rate` only declares the header.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use super::domain::{CategoryId, CommissionHeader, CourseId, HeaderId, NewDetail, NewHeader};
use super::error::CommissionError;
use super::repository::CommissionRepository;
use super::service::CommissionService;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Row { line: u64, source: CommissionError },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read commission seed: {}", err),
            ImportError::Csv(err) => write!(f, "invalid commission seed CSV: {}", err),
            ImportError::Row { line, source } => {
                write!(f, "commission seed line {} rejected: {}", line, source)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Row { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows: usize,
    pub header_ids: Vec<HeaderId>,
    pub details_created: usize,
}

impl ImportSummary {
    pub fn headers_created(&self) -> usize {
        self.header_ids.len()
    }
}

pub struct SeedImporter;

impl SeedImporter {
    pub fn from_path<P, R>(
        path: P,
        service: &CommissionService<R>,
    ) -> Result<ImportSummary, ImportError>
    where
        P: AsRef<Path>,
        R: CommissionRepository + 'static,
    {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, service)
    }

    /// Parse the whole file first so malformed CSV never leaves a partial import behind.
    pub fn from_reader<T, R>(
        reader: T,
        service: &CommissionService<R>,
    ) -> Result<ImportSummary, ImportError>
    where
        T: Read,
        R: CommissionRepository + 'static,
    {
        let rows = parse_rows(reader)?;
        let mut summary = ImportSummary {
            rows: rows.len(),
            ..ImportSummary::default()
        };
        let mut headers: HashMap<String, CommissionHeader> = HashMap::new();

        for (line, row) in rows {
            apply_row(row, service, &mut headers, &mut summary)
                .map_err(|source| ImportError::Row { line, source })?;
        }

        info!(
            rows = summary.rows,
            headers = summary.headers_created(),
            details = summary.details_created,
            "commission seed imported"
        );
        Ok(summary)
    }
}

fn apply_row<R>(
    row: SeedRow,
    service: &CommissionService<R>,
    headers: &mut HashMap<String, CommissionHeader>,
    summary: &mut ImportSummary,
) -> Result<(), CommissionError>
where
    R: CommissionRepository + 'static,
{
    let key = row.header.trim().to_string();
    let description = row.description.as_deref().map(str::trim).map(str::to_string);
    let start_date = parse_timestamp("start_date", row.start_date.as_deref())?;
    let end_date = parse_timestamp("end_date", row.end_date.as_deref())?;

    let header_id = match headers.get(&key) {
        Some(existing) => {
            ensure_consistent("description", &key, description, &existing.description)?;
            ensure_consistent("start_date", &key, start_date, &existing.start_date)?;
            ensure_consistent("end_date", &key, end_date, &existing.end_date)?;
            existing.id
        }
        None => {
            let header = service.create_header(NewHeader {
                name: row.header.clone(),
                description,
                start_date,
                end_date,
            })?;
            let id = header.id;
            headers.insert(key, header);
            summary.header_ids.push(id);
            id
        }
    };

    if let Some(platform_rate) = row.platform_rate {
        service.create_detail(
            header_id,
            NewDetail {
                course_id: row.course_id.map(CourseId),
                category_id: row.category_id.map(CategoryId),
                platform_rate,
                priority: row.priority.unwrap_or(0),
                is_active: row.is_active.unwrap_or(true),
            },
        )?;
        summary.details_created += 1;
    }

    Ok(())
}

/// A repeated header row may leave a column empty; a filled one must match the first row.
fn ensure_consistent<T: PartialEq>(
    field: &'static str,
    header: &str,
    value: Option<T>,
    first: &Option<T>,
) -> Result<(), CommissionError> {
    match value {
        Some(value) if first.as_ref() != Some(&value) => Err(CommissionError::validation(
            field,
            format!("differs from the first row for header `{header}`"),
        )),
        _ => Ok(()),
    }
}

fn parse_rows<R: Read>(reader: R) -> Result<Vec<(u64, SeedRow)>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|position| position.line()).unwrap_or(0);
        let row: SeedRow = record.deserialize(Some(&columns))?;
        rows.push((line, row));
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct SeedRow {
    header: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    start_date: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    end_date: Option<String>,
    #[serde(default)]
    course_id: Option<u64>,
    #[serde(default)]
    category_id: Option<u64>,
    #[serde(default)]
    platform_rate: Option<i32>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    is_active: Option<bool>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, CommissionError> {
    let Some(value) = value else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| {
            CommissionError::validation(field, format!("`{value}` is not a date or timestamp"))
        })
}
