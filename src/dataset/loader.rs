use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use thiserror::Error;
use tracing::debug;

use crate::dataset::Dataset;
use crate::models::{RecordError, TransactionRecord};

/// Everything that can go wrong between an input file and a validated
/// [`Dataset`]. All of it aborts the load; there is no skip-and-continue.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read input at [{path}]: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Record [{id}] is invalid: {source}")]
    Record {
        id: String,
        #[source]
        source: RecordError,
    },
    #[error("Duplicate transaction id [{id}]")]
    DuplicateId { id: String },
    #[error("Unsupported input format [{path}]; expected .csv or .json")]
    UnsupportedFormat { path: String },
}

/// Loads a batch from disk, dispatching on the file extension.
pub fn load_from_path(path: &Path) -> Result<Dataset, LoadError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);

    let open = || {
        File::open(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })
    };

    match extension.as_deref() {
        Some("csv") => from_csv_reader(BufReader::new(open()?)),
        Some("json") => from_json_reader(BufReader::new(open()?)),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

/// Reads a CSV batch. An unparsable row is a hard error, never skipped; a
/// blank `decline_reason` column deserializes to `None`.
pub fn from_csv_reader<R: Read>(reader: R) -> Result<Dataset, LoadError> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.deserialize::<TransactionRecord>() {
        records.push(result?);
    }

    debug!("Deserialized {} CSV records", records.len());

    Dataset::from_records(records)
}

/// Reads a JSON batch: an array of record objects with `null` decline
/// reasons on approved rows.
pub fn from_json_reader<R: Read>(reader: R) -> Result<Dataset, LoadError> {
    let records: Vec<TransactionRecord> = serde_json::from_reader(reader)?;

    debug!("Deserialized {} JSON records", records.len());

    Dataset::from_records(records)
}
