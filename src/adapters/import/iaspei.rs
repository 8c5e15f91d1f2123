//! Importer for the IASPEI CSV bulletin format.
//!
//! One row per event origin: `eventid, author, date, time, lat, lon,
//! depth, depfix` followed by repeating `(author, scale, value)` magnitude
//! triples. The import stage only ever creates new measure records;
//! existing catalogue content is never touched.

use chrono::{NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use std::io::BufRead;

use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{is_known_scale, GeoPoint, MagnitudeMeasure, Origin};
use crate::domain::ports::MeasureRepository;

const EVENTID: usize = 0;
const DATE: usize = 2;
const TIME: usize = 3;
const LAT: usize = 4;
const LON: usize = 5;
const DEPTH: usize = 6;
const MAG_GROUP_START: usize = 8;
const MAG_MEASURE_ITEMS: usize = 3;

/// Counters describing one import run. Rows that fail to parse are
/// collected, not fatal: a bulletin with a few bad lines still loads.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    pub events: usize,
    pub agencies: usize,
    pub measures: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IaspeiImporter {
    /// Skip the first line of the stream.
    pub has_header: bool,
}

impl IaspeiImporter {
    pub fn new(has_header: bool) -> Self {
        Self { has_header }
    }

    /// Parse the stream into measure records plus an import summary.
    pub fn parse<R: BufRead>(&self, reader: R) -> (Vec<MagnitudeMeasure>, ImportSummary) {
        let mut measures = Vec::new();
        let mut summary = ImportSummary::default();
        let mut events = BTreeSet::new();
        let mut agencies = BTreeSet::new();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            if self.has_header && index == 0 {
                continue;
            }
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    summary.errors.push(format!("line {line_no}: {e}"));
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_row(&line, line_no) {
                Ok(row_measures) => {
                    for m in &row_measures {
                        events.insert(m.event_key.clone());
                        agencies.insert(m.agency.clone());
                        if !is_known_scale(&m.scale) {
                            warn!(scale = %m.scale, line = line_no, "unrecognised magnitude scale");
                        }
                    }
                    summary.measures += row_measures.len();
                    measures.extend(row_measures);
                }
                Err(e) => summary.errors.push(e.to_string()),
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

    fn parse_row(line: &str, line_no: usize) -> DomainResult<Vec<MagnitudeMeasure>> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < MAG_GROUP_START {
            return Err(DomainError::Import {
                line: line_no,
                reason: format!("expected at least {MAG_GROUP_START} fields, got {}", fields.len()),
            });
        }

        let magnitude_group = &fields[MAG_GROUP_START..];
        if magnitude_group.is_empty() || magnitude_group.len() % MAG_MEASURE_ITEMS != 0 {
            return Err(DomainError::Import {
                line: line_no,
                reason: "each magnitude should be defined by 3 values: author, type and value"
                    .to_string(),
            });
        }

        let origin = Self::parse_origin(&fields, line_no)?;
        let event_key = fields[EVENTID].to_string();

        let mut measures = Vec::with_capacity(magnitude_group.len() / MAG_MEASURE_ITEMS);
        for triple in magnitude_group.chunks(MAG_MEASURE_ITEMS) {
            let value = parse_float(triple[2], "magnitude value", line_no)?;
            measures.push(MagnitudeMeasure::new(
                event_key.clone(),
                triple[0],
                origin.clone(),
                triple[1],
                value,
                None,
            ));
        }
        Ok(measures)
    }

    fn parse_origin(fields: &[&str], line_no: usize) -> DomainResult<Origin> {
        let stamp = format!("{} {}", fields[DATE], fields[TIME]);
        let naive = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|e| DomainError::Import {
                line: line_no,
                reason: format!("bad origin time '{stamp}': {e}"),
            })?;
        let time = Utc.from_utc_datetime(&naive);

        let lat = parse_float(fields[LAT], "latitude", line_no)?;
        let lon = parse_float(fields[LON], "longitude", line_no)?;

        let mut origin = Origin::new(time, GeoPoint::new(lat, lon));
        if !fields[DEPTH].is_empty() {
            origin = origin.with_depth(parse_float(fields[DEPTH], "depth", line_no)?);
        }
        Ok(origin)
    }
}

fn parse_float(raw: &str, what: &str, line_no: usize) -> DomainResult<f64> {
    raw.parse::<f64>().map_err(|_| DomainError::Import {
        line: line_no,
        reason: format!("bad {what}: '{raw}'"),
    })
}
