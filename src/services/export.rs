//! CSV export of the homogenised measurement set.
//!
//! One row per homogenised measurement: event key, agency, native scale and
//! value, native uncertainty, target value (measured or converted), the
//! propagated target uncertainty when derivable, the provenance flag, and
//! the model index used if converted.

use std::io::Write;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HomogenisedRecord, Provenance};

const HEADER: &str = "event_key,agency,native_scale,native_value,native_standard_error,\
target_value,target_standard_error,provenance,model";

/// Write `records` as CSV to `destination`, header first.
pub fn write_csv(records: &[HomogenisedRecord], destination: &mut dyn Write) -> DomainResult<()> {
    writeln!(destination, "{HEADER}")?;
    for record in records {
        let model = match record.provenance {
            Provenance::Converted(index) => index.to_string(),
            Provenance::Measured | Provenance::Unconverted => String::new(),
        };
        writeln!(
            destination,
            "{},{},{},{},{},{},{},{},{}",
            field(&record.event_key),
            field(&record.agency),
            field(&record.native_scale),
            record.native_value,
            optional(record.native_standard_error),
            record.target_value,
            optional(record.target_standard_error),
            record.provenance.as_str(),
            model,
        )?;
    }
    destination.flush()?;
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Quote a field if it contains a delimiter, quote, or newline.
fn field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
