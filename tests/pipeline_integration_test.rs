//! End-to-end pipeline tests over the SQLite store: filter, group,
//! complete uncertainties, select, fit, convert, export.

mod common;

use std::sync::Arc;

use common::{linear_catalogue, measure_at, migrated_pool};
use magcat::adapters::sqlite::SqliteMeasureRepository;
use magcat::domain::models::{
    Criteria, DistanceMetric, Grouper, MeasureSelector, MissingUncertaintyPolicy, ModelForm,
    Provenance,
};
use magcat::domain::ports::MeasureRepository;
use magcat::services::Homogeniser;

async fn seeded_repo() -> Arc<SqliteMeasureRepository> {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    repo.insert_batch(&linear_catalogue())
        .await
        .expect("failed to seed catalogue");
    Arc::new(repo)
}

#[tokio::test]
async fn fitted_model_recovers_linear_relation() {
    let mut h = Homogeniser::new(seeded_repo().await);
    h.set_scales("mb", "Mw");

    let model = h.fit_model(ModelForm::Linear).await.expect("fit failed");
    let coeffs = model.coefficients();
    assert!((coeffs[0] - 1.03).abs() < 1e-6, "intercept was {}", coeffs[0]);
    assert!((coeffs[1] - 0.85).abs() < 1e-6, "slope was {}", coeffs[1]);
    assert_eq!(model.sample_size(), 6);

    let records = h.homogenised_measures().await.expect("pipeline failed");
    assert_eq!(records.len(), 12);
    for record in &records {
        match record.provenance {
            Provenance::Measured => assert_eq!(record.native_scale, "Mw"),
            Provenance::Converted(0) => {
                assert_eq!(record.native_scale, "mb");
                let expected = 0.85 * record.native_value + 1.03;
                assert!((record.target_value - expected).abs() < 1e-6);
            }
            other => panic!("unexpected provenance {other:?}"),
        }
    }
}

#[tokio::test]
async fn event_maximum_policy_donates_uncertainty_within_event() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    repo.insert_batch(&[
        measure_at("izmit", "ISC", "mb", 5.0, Some(0.2), 0),
        measure_at("izmit", "NEIC", "Ms", 5.4, None, 5),
    ])
    .await
    .expect("failed to seed catalogue");

    let mut h = Homogeniser::new(Arc::new(repo));
    h.set_scales("mb", "Ms");
    h.set_missing_uncertainty_strategy(MissingUncertaintyPolicy::SetEventMaximum);
    h.set_selector(MeasureSelector::Precise);

    let targets = h.selected_target_measures().await.expect("selection failed");
    assert_eq!(targets.len(), 1);
    let selected = targets.values().next().unwrap();
    assert_eq!(selected.agency, "NEIC");
    // The missing uncertainty is completed from the event's known maximum.
    assert_eq!(selected.standard_error, Some(0.2));

    // Under the discard policy the same measure never reaches selection.
    h.set_missing_uncertainty_strategy(MissingUncertaintyPolicy::Discard);
    assert!(h.selected_target_measures().await.unwrap().is_empty());
}

#[tokio::test]
async fn clustering_grouper_joins_near_simultaneous_measures() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    // Same physical event reported under different bulletin keys, 30 s
    // apart; a second event a day later.
    repo.insert_batch(&[
        measure_at("isc-1", "ISC", "mb", 5.0, Some(0.1), 0),
        measure_at("neic-77", "NEIC", "Ms", 5.5, Some(0.2), 30),
        measure_at("isc-2", "ISC", "mb", 4.1, Some(0.1), 86_400),
    ])
    .await
    .expect("failed to seed catalogue");

    let mut h = Homogeniser::new(Arc::new(repo));
    h.set_scales("mb", "Ms");
    h.set_grouper(Grouper::HierarchicalClustering {
        threshold: 200.0,
        metric: DistanceMetric::OriginTimeSeconds,
    });

    let groups = h.grouped_measures().await.expect("grouping failed");
    assert_eq!(groups.len(), 2);
    let sizes: Vec<usize> = groups.values().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 1]);

    // Under event-key grouping the same catalogue splits three ways.
    h.set_grouper(Grouper::ByEventSourceKey);
    assert_eq!(h.grouped_measures().await.unwrap().len(), 3);
}

#[tokio::test]
async fn serialized_output_is_complete_csv() {
    let mut h = Homogeniser::new(seeded_repo().await);
    h.set_scales("mb", "Mw");
    h.fit_model(ModelForm::Linear).await.expect("fit failed");

    let mut out = Vec::new();
    h.serialize(&mut out).await.expect("serialize failed");
    let text = String::from_utf8(out).expect("CSV is UTF-8");
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 13);
    assert!(lines[0].starts_with("event_key,agency,"));
    assert_eq!(
        lines.iter().filter(|l| l.contains(",converted,")).count(),
        6
    );
    assert_eq!(lines.iter().filter(|l| l.contains(",measured,")).count(), 6);
}

#[tokio::test]
async fn criteria_narrow_the_homogenised_set() {
    let mut h = Homogeniser::new(seeded_repo().await);
    h.set_scales("mb", "Mw");
    h.add_criteria(Criteria::with_agencies(["GCMT"]));

    let records = h.homogenised_measures().await.expect("pipeline failed");
    assert_eq!(records.len(), 6);
    assert!(records
        .iter()
        .all(|r| r.provenance == Provenance::Measured && r.agency == "GCMT"));
}
