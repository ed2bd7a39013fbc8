use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, Trim};
use log::{info, warn};

use crate::{
    domain::transaction::Transaction,
    error::{Error, Result},
};

const REQUIRED_COLUMNS: [&str; 3] = ["Date", "Category", "Amount"];

/// Parse [`Transaction`]s from a reader.
///
/// Rows that cannot be deserialized (a bad amount, a wrong number of fields)
/// are logged and skipped, only I/O failures abort the read. Dates are parsed
/// leniently, see [`Transaction`].
pub fn read(reader: impl Read) -> Result<Vec<Transaction>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let headers = reader.headers()?.clone();
    if let Some(missing) = REQUIRED_COLUMNS
        .into_iter()
        .find(|column| !headers.iter().any(|header| header == *column))
    {
        return Err(Error::MissingColumn(missing));
    }

    let mut txns = Vec::new();
    for row in reader.deserialize::<Transaction>() {
        match row {
            Ok(tx) => txns.push(tx),
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => warn!("skipping malformed row: {err}"),
        }
    }

    Ok(txns)
}

pub fn read_path(path: &Path) -> Result<Vec<Transaction>> {
    let file = File::open(path).map_err(|source| Error::FileError {
        path: path.to_owned(),
        source,
    })?;

    let txns = read(file)?;
    info!("read {} transactions from {}", txns.len(), path.display());

    Ok(txns)
}
