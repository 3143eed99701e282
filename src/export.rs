//! CSV export of the action log.

use std::io;

use crate::model::LogDetail;

const HEADER: [&str; 7] = ["id", "time", "operator", "action", "item", "comment", "status"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Writes `logs` as CSV with a header row.
pub fn write_csv<W: io::Write>(out: W, logs: &[LogDetail]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(HEADER)?;
    for log in logs {
        wtr.write_record([
            log.id.to_string(),
            log.time.to_string(),
            log.operator.clone(),
            log.action.clone(),
            log.item.clone().unwrap_or_default(),
            log.comment.clone().unwrap_or_default(),
            log.status.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
