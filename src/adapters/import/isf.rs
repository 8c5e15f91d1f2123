//! Importer for the ISF bulletin format (<http://www.isc.ac.uk/standards/isf/>).
//!
//! An ISF bulletin is line-oriented: an `Event` header opens each event,
//! followed by a fixed-width origin block (one line per reporting agency)
//! and a fixed-width magnitude block whose rows reference an origin by its
//! id. Parsing runs as a small state machine keyed on the detected line
//! type; rows that violate the format are collected as errors and the
//! parser resynchronises on the next `Event` header.

use chrono::{Duration, NaiveDateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{is_known_scale, GeoPoint, MagnitudeMeasure, Origin};
use crate::domain::ports::MeasureRepository;

use super::ImportSummary;

const ORIGIN_BLOCK_LEN: usize = 136;
const MEASURE_BLOCK_LEN: usize = 38;

// Column spans of the origin block, in byte offsets.
const ORIGIN_DATE: (usize, usize) = (0, 10);
const ORIGIN_TIME: (usize, usize) = (11, 19);
const ORIGIN_CENTISECONDS: (usize, usize) = (20, 22);
const ORIGIN_LAT: (usize, usize) = (36, 44);
const ORIGIN_LON: (usize, usize) = (45, 54);
const ORIGIN_DEPTH: (usize, usize) = (71, 76);
const ORIGIN_ID: (usize, usize) = (128, 136);

// Column spans of the magnitude block.
const MEASURE_SCALE: (usize, usize) = (0, 5);
const MEASURE_MINMAX: (usize, usize) = (5, 6);
const MEASURE_VALUE: (usize, usize) = (6, 11);
const MEASURE_ERROR: (usize, usize) = (11, 14);
const MEASURE_AGENCY: (usize, usize) = (19, 29);
const MEASURE_ORIGIN_ID: (usize, usize) = (30, 38);

const ORIGIN_HEADER_FIELDS: &[&str] = &[
    "Date", "Time", "Err", "RMS", "Latitude", "Longitude", "Smaj", "Smin", "Az", "Depth", "Err",
    "Ndef", "Nsta", "Gap", "mdist", "Mdist", "Qual", "Author", "OrigID",
];
const MEASURE_HEADER_FIELDS: &[&str] = &["Magnitude", "Err", "Nsta", "Author", "OrigID"];

/// Section of the bulletin the parser is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Before the first event header; unrecognised lines are tolerated.
    Preamble,
    /// After an `Event` header, before its origin header.
    Event,
    /// Inside an origin block.
    Origins,
    /// Inside a magnitude block.
    Measures,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IsfImporter;

impl IsfImporter {
    pub fn new() -> Self {
        Self
    }

    /// Parse the stream into measure records plus an import summary.
    ///
    /// `STOP` ends the bulletin; comment lines (parenthesised) and blank
    /// lines are skipped everywhere.
    pub fn parse<R: BufRead>(&self, reader: R) -> (Vec<MagnitudeMeasure>, ImportSummary) {
        let mut measures = Vec::new();
        let mut summary = ImportSummary::default();
        let mut events = BTreeSet::new();
        let mut agencies = BTreeSet::new();

        let mut section = Section::Preamble;
        let mut current_event: Option<String> = None;
        // Origin ids are unique across the bulletin; magnitude rows may
        // reference origins of earlier events, so the map is never cleared.
        let mut origins: BTreeMap<String, Origin> = BTreeMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let raw = match line {
                Ok(l) => l,
                Err(e) => {
                    summary.errors.push(format!("line {line_no}: {e}"));
                    continue;
                }
            };
            let line = raw.trim();

            if line == "STOP" {
                break;
            }
            if line.is_empty() || is_comment(line) || line == "ISC Bulletin" {
                continue;
            }

            if let Some(key) = parse_event_header(line) {
                events.insert(key.to_string());
                current_event = Some(key.to_string());
                section = Section::Event;
                continue;
            }

            if is_header(line, ORIGIN_HEADER_FIELDS) {
                if current_event.is_some() {
                    section = Section::Origins;
                } else {
                    summary
                        .errors
                        .push(format!("line {line_no}: origin header outside an event"));
                }
                continue;
            }

            if is_header(line, MEASURE_HEADER_FIELDS) {
                if section == Section::Origins {
                    section = Section::Measures;
                } else {
                    summary.errors.push(format!(
                        "line {line_no}: magnitude header before any origin block"
                    ));
                }
                continue;
            }

            if section == Section::Origins && line.len() == ORIGIN_BLOCK_LEN {
                match parse_origin_block(line, line_no) {
                    Ok((key, origin)) => {
                        origins.insert(key, origin);
                    }
                    Err(e) => summary.errors.push(e.to_string()),
                }
                continue;
            }

            if section == Section::Measures {
                let event_key = current_event.as_deref().unwrap_or_default();
                let parsed = if line.len() == MEASURE_BLOCK_LEN {
                    Some(parse_measure_block(line, line_no, event_key, &origins))
                } else {
                    parse_unknown_scale_block(line)
                        .map(|row| build_unknown_scale_measure(row, line_no, event_key, &origins))
                };
                if let Some(result) = parsed {
                    match result {
                        Ok(measure) => {
                            if !is_known_scale(&measure.scale) {
                                warn!(scale = %measure.scale, line = line_no, "unrecognised magnitude scale");
                            }
                            agencies.insert(measure.agency.clone());
                            summary.measures += 1;
                            measures.push(measure);
                        }
                        Err(e) => summary.errors.push(e.to_string()),
                    }
                    continue;
                }
            }

            // Junk before the first event header is tolerated; afterwards
            // it is a format violation.
            if current_event.is_some() {
                summary
                    .errors
                    .push(format!("line {line_no}: unexpected line in bulletin"));
            }
        }

        summary.events = events.len();
        summary.agencies = agencies.len();
        (measures, summary)
    }

    /// Parse the stream and store the resulting measures.
    pub async fn import<R: BufRead>(
        &self,
        reader: R,
        repo: &dyn MeasureRepository,
    ) -> DomainResult<ImportSummary> {
        let (measures, summary) = self.parse(reader);
        repo.insert_batch(&measures).await?;
        Ok(summary)
    }
}

/// `Event <id> <region name>`; the id is at most nine word characters.
fn parse_event_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("Event")?.trim_start();
    let key = rest.split_whitespace().next()?;
    let well_formed =
        key.len() <= 9 && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    well_formed.then_some(key)
}

/// Parenthesised lines are comments.
fn is_comment(line: &str) -> bool {
    line.starts_with('(') && line.ends_with(')')
}

fn is_header(line: &str, fields: &[&str]) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.len() == fields.len()
        && tokens.iter().zip(fields).all(|(tok, field)| {
            // Some bulletins abbreviate the station-count column.
            tok == field || (*field == "Nsta" && *tok == "Nst")
        })
}

fn col(line: &str, span: (usize, usize)) -> &str {
    line.get(span.0..span.1.min(line.len())).unwrap_or("").trim()
}

fn parse_origin_block(line: &str, line_no: usize) -> DomainResult<(String, Origin)> {
    let stamp = format!("{} {}", col(line, ORIGIN_DATE), col(line, ORIGIN_TIME));
    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y/%m/%d %H:%M:%S").map_err(|e| {
        DomainError::Import {
            line: line_no,
            reason: format!("bad origin time '{stamp}': {e}"),
        }
    })?;
    let mut time = Utc.from_utc_datetime(&naive);

    // Sub-second precision is centiseconds; some agencies omit it.
    let centis = col(line, ORIGIN_CENTISECONDS);
    if !centis.is_empty() {
        let cs: i64 = centis.parse().map_err(|_| DomainError::Import {
            line: line_no,
            reason: format!("bad centiseconds: '{centis}'"),
        })?;
        time += Duration::milliseconds(cs * 10);
    }

    let lat = parse_float(col(line, ORIGIN_LAT), "latitude", line_no)?;
    let lon = parse_float(col(line, ORIGIN_LON), "longitude", line_no)?;

    let key = col(line, ORIGIN_ID);
    if key.is_empty() {
        return Err(DomainError::Import {
            line: line_no,
            reason: "origin block has no origin id".to_string(),
        });
    }

    let mut origin = Origin::new(time, GeoPoint::new(lat, lon));
    let depth = col(line, ORIGIN_DEPTH);
    if !depth.is_empty() {
        origin = origin.with_depth(parse_float(depth, "depth", line_no)?);
    }
    Ok((key.to_string(), origin))
}

fn parse_measure_block(
    line: &str,
    line_no: usize,
    event_key: &str,
    origins: &BTreeMap<String, Origin>,
) -> DomainResult<MagnitudeMeasure> {
    let scale = col(line, MEASURE_SCALE);
    if scale.is_empty() {
        return Err(DomainError::Import {
            line: line_no,
            reason: "magnitude row has no scale".to_string(),
        });
    }
    if !col(line, MEASURE_MINMAX).is_empty() {
        return Err(DomainError::Import {
            line: line_no,
            reason: "min/max magnitude indicator is not supported".to_string(),
        });
    }

    let value = parse_float(col(line, MEASURE_VALUE), "magnitude value", line_no)?;
    let error = col(line, MEASURE_ERROR);
    let standard_error = if error.is_empty() {
        None
    } else {
        Some(parse_float(error, "magnitude error", line_no)?)
    };

    let agency = col(line, MEASURE_AGENCY);
    if agency.is_empty() {
        return Err(DomainError::Import {
            line: line_no,
            reason: "magnitude row has no author".to_string(),
        });
    }

    let origin_key = col(line, MEASURE_ORIGIN_ID);
    let origin = origins.get(origin_key).ok_or_else(|| DomainError::Import {
        line: line_no,
        reason: format!("magnitude row references unknown origin '{origin_key}'"),
    })?;

    Ok(MagnitudeMeasure::new(
        event_key,
        agency,
        origin.clone(),
        scale,
        value,
        standard_error,
    ))
}

/// A magnitude row without a scale: value, optional error, optional
/// station count, author, origin id, whitespace separated. Recorded under
/// the `Muk` (unknown magnitude) scale.
fn parse_unknown_scale_block(line: &str) -> Option<(f64, Option<f64>, &str, &str)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if !(3..=5).contains(&tokens.len()) {
        return None;
    }
    if !tokens[0].contains('.') {
        return None;
    }
    let value: f64 = tokens[0].parse().ok()?;

    let origin = *tokens.last()?;
    let agency = tokens[tokens.len() - 2];
    if !agency
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ';')
    {
        return None;
    }

    let mut error = None;
    for tok in &tokens[1..tokens.len() - 2] {
        if tok.contains('.') {
            error = Some(tok.parse().ok()?);
        } else {
            // Station count, not carried on the measure.
            tok.parse::<u32>().ok()?;
        }
    }
    Some((value, error, agency, origin))
}

fn build_unknown_scale_measure(
    (value, standard_error, agency, origin_key): (f64, Option<f64>, &str, &str),
    line_no: usize,
    event_key: &str,
    origins: &BTreeMap<String, Origin>,
) -> DomainResult<MagnitudeMeasure> {
    let origin = origins.get(origin_key).ok_or_else(|| DomainError::Import {
        line: line_no,
        reason: format!("magnitude row references unknown origin '{origin_key}'"),
    })?;
    Ok(MagnitudeMeasure::new(
        event_key,
        agency,
        origin.clone(),
        "Muk",
        value,
        standard_error,
    ))
}

fn parse_float(raw: &str, what: &str, line_no: usize) -> DomainResult<f64> {
    raw.parse::<f64>().map_err(|_| DomainError::Import {
        line: line_no,
        reason: format!("bad {what}: '{raw}'"),
    })
}
