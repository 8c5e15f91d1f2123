//! Bulletin import into the SQLite store, chained into the pipeline.

mod common;

use std::io::Cursor;
use std::sync::Arc;

use common::migrated_pool;
use magcat::adapters::import::{IaspeiImporter, IsfImporter};
use magcat::adapters::sqlite::SqliteMeasureRepository;
use magcat::domain::models::{Criteria, MissingUncertaintyPolicy, Provenance};
use magcat::domain::ports::MeasureRepository;
use magcat::services::Homogeniser;

const BULLETIN: &str = "\
eventid,author,date,time,lat,lon,depth,depfix,magnitudes
1001,ISC,1999-08-17,00:01:39.13,40.749,29.864,17.0,,ISC,Ms,7.8,NEIC,mb,6.3
1002,ISC,1999-11-12,16:57:19.55,40.758,31.161,10.0,,ISC,Ms,7.3,NEIC,mb,6.5
1003,ISC,2000-06-06,02:41:49.00,40.693,32.992,10.0,,ISC,Ms,6.1,NEIC,mb,5.9
garbage line that does not parse
1004,ISC,2000-08-23,13:41:28.00,40.681,30.710,15.0,,ISC,Ms,5.5,NEIC,mb,5.3
";

const ISF_ORIGIN_HEADER: &str = "   Date       Time        Err   RMS Latitude Longitude  Smaj  Smin  Az Depth   Err Ndef Nsta Gap  mdist  Mdist Qual   Author      OrigID";
const ISF_MEASURE_HEADER: &str = "Magnitude  Err Nsta Author      OrigID";

#[tokio::test]
async fn bulletin_lands_in_the_catalogue() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    let importer = IaspeiImporter::new(true);

    let summary = importer
        .import(Cursor::new(BULLETIN), &repo)
        .await
        .expect("import failed");
    assert_eq!(summary.events, 4);
    assert_eq!(summary.agencies, 2);
    assert_eq!(summary.measures, 8);
    assert_eq!(summary.errors.len(), 1);

    let stored = repo.summary().await.expect("summary failed");
    assert_eq!(stored.measure_count, 8);
    assert!(stored.scales.contains("Ms") && stored.scales.contains("mb"));

    let neic = repo
        .count_matching(&Criteria::with_agencies(["NEIC"]))
        .await
        .unwrap();
    assert_eq!(neic, 4);
}

#[tokio::test]
async fn imported_catalogue_feeds_the_pipeline() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    IaspeiImporter::new(true)
        .import(Cursor::new(BULLETIN), &repo)
        .await
        .expect("import failed");

    let mut h = Homogeniser::new(Arc::new(repo));
    h.set_scales("mb", "Ms");
    // Bulletin magnitudes carry no uncertainty; complete them instead of
    // discarding the whole catalogue.
    h.set_missing_uncertainty_strategy(MissingUncertaintyPolicy::SetDefault { value: 0.2 });
    h.set_default_uncertainty(0.2);

    let natives = h.selected_native_measures().await.expect("selection failed");
    assert_eq!(natives.len(), 4);

    let model = h
        .fit_model(magcat::domain::models::ModelForm::Linear)
        .await
        .expect("fit failed");
    assert_eq!(model.sample_size(), 4);

    let records = h.homogenised_measures().await.expect("pipeline failed");
    assert_eq!(records.len(), 8);
    assert_eq!(
        records
            .iter()
            .filter(|r| matches!(r.provenance, Provenance::Converted(_)))
            .count(),
        4
    );
    assert_eq!(
        records
            .iter()
            .filter(|r| r.provenance == Provenance::Measured)
            .count(),
        4
    );
}

#[tokio::test]
async fn isf_bulletin_lands_in_the_catalogue() {
    let bulletin = [
        "ISC Bulletin",
        "Event     1001 Izmit",
        ISF_ORIGIN_HEADER,
        "1999/08/17 00:01:39.13              40.749   29.864                    17.0                                           ISC       00328011",
        ISF_MEASURE_HEADER,
        "Ms    7.8  0.1     ISC        00328011",
        "mb    6.3          NEIC       00328011",
        "Event     1002 Duzce",
        ISF_ORIGIN_HEADER,
        "1999/11/12 16:57:19.55              40.758   31.161                    10.0                                           ISC       00328012",
        ISF_MEASURE_HEADER,
        "Ms    7.3  0.1     ISC        00328012",
        "garbage line that does not parse",
        "mb    6.5          NEIC       00328012",
        "STOP",
    ]
    .join("\n");

    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    let summary = IsfImporter::new()
        .import(Cursor::new(bulletin), &repo)
        .await
        .expect("import failed");

    assert_eq!(summary.events, 2);
    assert_eq!(summary.agencies, 2);
    assert_eq!(summary.measures, 4);
    assert_eq!(summary.errors.len(), 1);

    let stored = repo.summary().await.expect("summary failed");
    assert_eq!(stored.measure_count, 4);
    assert!(stored.scales.contains("Ms") && stored.scales.contains("mb"));

    let izmit = repo
        .matching(&Criteria::with_agencies(["ISC"]))
        .await
        .unwrap();
    assert_eq!(izmit.len(), 2);
    assert!(izmit.iter().any(|m| m.event_key == "1001"));
}
