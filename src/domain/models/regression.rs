//! Empirical magnitude-scaling regression.
//!
//! A [`RegressionModel`] is a fitted conversion from a native magnitude
//! scale to a target scale, derived from paired observations of the same
//! events. The fit minimises the squared residual in the target value,
//! weighted by the target standard errors; the model remembers the native
//! value range of its fitting sample and flags predictions outside it as
//! extrapolated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::grouping::GroupKey;
use crate::domain::models::{ConvertedMeasure, MagnitudeMeasure};

/// Functional form of the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelForm {
    Linear,
    Polynomial { order: usize },
}

impl ModelForm {
    /// Number of fitted coefficients.
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Linear => 2,
            Self::Polynomial { order } => order + 1,
        }
    }
}

impl fmt::Display for ModelForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear model"),
            Self::Polynomial { order } => write!(f, "polynomial model of order {order}"),
        }
    }
}

/// One (native, target) observation pair used by a fit, tagged with the
/// group it was selected from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitPair {
    pub group: GroupKey,
    pub native: MagnitudeMeasure,
    pub target: MagnitudeMeasure,
}

/// Result of applying a model to a native value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub value: f64,
    /// True when the input lay outside the fitted domain; callers decide
    /// whether to accept extrapolated results.
    pub extrapolated: bool,
}

/// A fitted native→target conversion with its validity domain and fit
/// statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    form: ModelForm,
    /// Coefficients in ascending powers of the native value.
    coefficients: Vec<f64>,
    /// Native-value range of the fitting sample: [min, max].
    domain: (f64, f64),
    /// Weighted reduced residual variance of the fit.
    residual_variance: f64,
    sample_size: usize,
    /// Akaike information criterion, when the residual permits it.
    akaike: Option<f64>,
    /// Small-sample corrected AIC.
    akaike_corrected: Option<f64>,
    pairs: Vec<FitPair>,
}

impl RegressionModel {
    /// Pair the per-group native and target selections by shared group key,
    /// discard groups missing either side, and fit.
    pub fn make_from_measures(
        native: &BTreeMap<GroupKey, MagnitudeMeasure>,
        target: &BTreeMap<GroupKey, MagnitudeMeasure>,
        form: ModelForm,
    ) -> DomainResult<Self> {
        let pairs: Vec<FitPair> = native
            .iter()
            .filter_map(|(key, n)| {
                target.get(key).map(|t| FitPair {
                    group: key.clone(),
                    native: n.clone(),
                    target: t.clone(),
                })
            })
            .collect();
        Self::fit(pairs, form)
    }

    /// Fit a model to explicit observation pairs.
    ///
    /// # Errors
    /// [`DomainError::InsufficientData`] when fewer pairs than fitted
    /// coefficients (and always when fewer than two) are available;
    /// [`DomainError::RegressionFailed`] when the normal equations are
    /// singular, e.g. all native values identical.
    pub fn fit(pairs: Vec<FitPair>, form: ModelForm) -> DomainResult<Self> {
        let required = form.parameter_count().max(2);
        if pairs.len() < required {
            return Err(DomainError::InsufficientData {
                required,
                got: pairs.len(),
            });
        }

        let xs: Vec<f64> = pairs.iter().map(|p| p.native.value).collect();
        let ys: Vec<f64> = pairs.iter().map(|p| p.target.value).collect();
        // Weight by the target uncertainty when present; unit weight
        // otherwise, so mixed samples stay usable.
        let ws: Vec<f64> = pairs
            .iter()
            .map(|p| p.target.standard_error.map_or(1.0, |s| 1.0 / (s * s)))
            .collect();

        let coefficients = weighted_polyfit(&xs, &ys, &ws, form.parameter_count())?;

        let n = pairs.len();
        let p = form.parameter_count();
        let residual_variance = if n > p {
            let ss: f64 = xs
                .iter()
                .zip(&ys)
                .zip(&ws)
                .map(|((x, y), w)| {
                    let r = y - eval_poly(&coefficients, *x);
                    w * r * r
                })
                .sum();
            ss / (n - p) as f64
        } else {
            0.0
        };

        let (min, max) = xs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(*x), hi.max(*x))
        });

        let (akaike, akaike_corrected) = fit_criteria(residual_variance, n, p);

        Ok(Self {
            form,
            coefficients,
            domain: (min, max),
            residual_variance,
            sample_size: n,
            akaike,
            akaike_corrected,
            pairs,
        })
    }

    pub fn form(&self) -> ModelForm {
        self.form
    }

    /// Coefficients in ascending powers.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Native-value range the fit is trusted over.
    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// True when `value` lies inside the fitted domain, bounds inclusive.
    pub fn domain_contains(&self, value: f64) -> bool {
        value >= self.domain.0 && value <= self.domain.1
    }

    pub fn residual_variance(&self) -> f64 {
        self.residual_variance
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn akaike(&self) -> Option<f64> {
        self.akaike
    }

    pub fn akaike_corrected(&self) -> Option<f64> {
        self.akaike_corrected
    }

    /// The observation pairs the model was fitted on, in fitting order.
    pub fn fitting_pairs(&self) -> &[FitPair] {
        &self.pairs
    }

    /// Predict the target-scale value for a native value. Never fails;
    /// inputs outside the fitted domain are flagged instead.
    pub fn apply(&self, value: f64) -> Prediction {
        Prediction {
            value: eval_poly(&self.coefficients, value),
            extrapolated: !self.domain_contains(value),
        }
    }

    /// Convert a measure, propagating its uncertainty through the model:
    /// `sigma' = sqrt(res_var + f'(x)^2 * sigma^2)`. Measures without an
    /// uncertainty use `default_uncertainty`.
    pub fn convert(
        &self,
        measure: &MagnitudeMeasure,
        target_scale: &str,
        model_index: usize,
        default_uncertainty: f64,
    ) -> ConvertedMeasure {
        let prediction = self.apply(measure.value);
        let sigma = measure.standard_error.unwrap_or(default_uncertainty);
        let slope = eval_poly_derivative(&self.coefficients, measure.value);
        let standard_error = (self.residual_variance + slope * slope * sigma * sigma).sqrt();

        ConvertedMeasure {
            original: measure.clone(),
            scale: target_scale.to_string(),
            value: prediction.value,
            standard_error,
            model_index,
            extrapolated: prediction.extrapolated,
        }
    }
}

/// Evaluate a polynomial (ascending coefficients) by Horner's scheme.
fn eval_poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Evaluate the derivative of a polynomial given in ascending coefficients.
fn eval_poly_derivative(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(0.0, |acc, (k, c)| acc * x + c * k as f64)
}

/// Weighted least-squares polynomial fit via the normal equations.
///
/// Returns `param_count` coefficients in ascending powers. The normal
/// matrix `A^T W A` is solved with Gaussian elimination and partial
/// pivoting; a vanishing pivot means the sample cannot determine the
/// coefficients (e.g. all native values identical).
fn weighted_polyfit(
    xs: &[f64],
    ys: &[f64],
    ws: &[f64],
    param_count: usize,
) -> DomainResult<Vec<f64>> {
    let p = param_count;
    let mut ata = vec![vec![0.0; p]; p];
    let mut atb = vec![0.0; p];

    for ((x, y), w) in xs.iter().zip(ys).zip(ws) {
        let mut powers = vec![1.0; 2 * p - 1];
        for k in 1..2 * p - 1 {
            powers[k] = powers[k - 1] * x;
        }
        for i in 0..p {
            for j in 0..p {
                ata[i][j] += w * powers[i + j];
            }
            atb[i] += w * powers[i] * y;
        }
    }

    solve_linear_system(&mut ata, &mut atb)
        .ok_or_else(|| DomainError::RegressionFailed("singular normal equations".to_string()))
}

/// Solve `A x = b` in place with Gaussian elimination and partial pivoting.
fn solve_linear_system(a: &mut [Vec<f64>], b: &mut [f64]) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
        if a[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

/// AIC and small-sample corrected AIC of a fit, when the residual variance
/// and sample size permit them.
fn fit_criteria(residual_variance: f64, n: usize, p: usize) -> (Option<f64>, Option<f64>) {
    if residual_variance <= 0.0 {
        return (None, None);
    }
    let nf = n as f64;
    let pf = p as f64;
    let akaike = nf * residual_variance.ln() + 2.0 * pf;
    let corrected = if n > p + 1 {
        Some(akaike + (2.0 * pf * (pf + 1.0)) / (nf - pf - 1.0))
    } else {
        None
    };
    (Some(akaike), corrected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GeoPoint, Origin};
    use chrono::{TimeZone, Utc};

    fn pair(group: &str, native: f64, target: f64) -> FitPair {
        let origin = Origin::new(
            Utc.with_ymd_and_hms(1995, 1, 17, 5, 46, 53).unwrap(),
            GeoPoint::new(34.6, 135.0),
        );
        FitPair {
            group: GroupKey::Event(group.to_string()),
            native: MagnitudeMeasure::new(group, "ISC", origin.clone(), "mb", native, Some(0.1)),
            target: MagnitudeMeasure::new(group, "GCMT", origin, "Mw", target, Some(0.1)),
        }
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        // y = 0.85 + 1.03 x, exactly.
        let pairs: Vec<FitPair> = (0..20)
            .map(|i| {
                let x = 3.0 + f64::from(i) * 0.25;
                pair(&format!("e{i}"), x, 0.85 + 1.03 * x)
            })
            .collect();
        let model = RegressionModel::fit(pairs, ModelForm::Linear).unwrap();

        assert!((model.coefficients()[0] - 0.85).abs() < 1e-9);
        assert!((model.coefficients()[1] - 1.03).abs() < 1e-9);
        assert!(model.residual_variance() < 1e-18);
    }

    #[test]
    fn polynomial_fit_recovers_quadratic() {
        // y = 0.673 + 0.556 x + 0.046 x^2
        let pairs: Vec<FitPair> = (0..30)
            .map(|i| {
                let x = 3.0 + f64::from(i) * 0.2;
                pair(&format!("e{i}"), x, 0.673 + 0.556 * x + 0.046 * x * x)
            })
            .collect();
        let model =
            RegressionModel::fit(pairs, ModelForm::Polynomial { order: 2 }).unwrap();

        let c = model.coefficients();
        assert!((c[0] - 0.673).abs() < 1e-6);
        assert!((c[1] - 0.556).abs() < 1e-6);
        assert!((c[2] - 0.046).abs() < 1e-6);
    }

    #[test]
    fn training_point_round_trips_within_residual_tolerance() {
        let pairs = vec![
            pair("a", 1.0, 1.2),
            pair("b", 2.0, 2.3),
            pair("c", 3.0, 3.1),
        ];
        let model = RegressionModel::fit(pairs, ModelForm::Linear).unwrap();
        let predicted = model.apply(2.0);

        assert!(!predicted.extrapolated);
        let tolerance = model.residual_variance().sqrt().max(0.1);
        assert!(
            (predicted.value - 2.3).abs() <= tolerance,
            "predicted {} vs 2.3 (tolerance {tolerance})",
            predicted.value
        );
    }

    #[test]
    fn extrapolation_is_flagged_outside_domain_only() {
        let pairs = vec![
            pair("a", 3.0, 3.5),
            pair("b", 4.0, 4.4),
            pair("c", 6.0, 6.2),
        ];
        let model = RegressionModel::fit(pairs, ModelForm::Linear).unwrap();

        assert_eq!(model.domain(), (3.0, 6.0));
        assert!(!model.apply(3.0).extrapolated);
        assert!(!model.apply(6.0).extrapolated);
        assert!(!model.apply(4.5).extrapolated);
        assert!(model.apply(2.9).extrapolated);
        assert!(model.apply(6.1).extrapolated);
    }

    #[test]
    fn too_few_pairs_is_insufficient_data() {
        let err = RegressionModel::fit(vec![pair("a", 1.0, 1.0)], ModelForm::Linear)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientData { required: 2, got: 1 }
        ));
    }

    #[test]
    fn identical_native_values_fail_as_singular() {
        let pairs = vec![pair("a", 5.0, 5.1), pair("b", 5.0, 5.4)];
        let err = RegressionModel::fit(pairs, ModelForm::Linear).unwrap_err();
        assert!(matches!(err, DomainError::RegressionFailed(_)));
    }

    #[test]
    fn make_from_measures_discards_one_sided_groups() {
        let origin = Origin::new(
            Utc.with_ymd_and_hms(1995, 1, 17, 5, 46, 53).unwrap(),
            GeoPoint::new(34.6, 135.0),
        );
        let mut native = BTreeMap::new();
        let mut target = BTreeMap::new();
        for (key, x) in [("a", 4.0), ("b", 5.0), ("c", 6.0)] {
            native.insert(
                GroupKey::Event(key.to_string()),
                MagnitudeMeasure::new(key, "ISC", origin.clone(), "mb", x, Some(0.1)),
            );
        }
        for (key, y) in [("a", 4.2), ("c", 6.1)] {
            target.insert(
                GroupKey::Event(key.to_string()),
                MagnitudeMeasure::new(key, "GCMT", origin.clone(), "Mw", y, Some(0.1)),
            );
        }

        let model =
            RegressionModel::make_from_measures(&native, &target, ModelForm::Linear).unwrap();
        assert_eq!(model.sample_size(), 2);
        assert!(model
            .fitting_pairs()
            .iter()
            .all(|p| p.group != GroupKey::Event("b".to_string())));
    }

    #[test]
    fn derivative_feeds_error_propagation() {
        let pairs = vec![
            pair("a", 1.0, 2.0),
            pair("b", 2.0, 4.0),
            pair("c", 3.0, 6.0),
        ];
        let model = RegressionModel::fit(pairs, ModelForm::Linear).unwrap();
        let origin = Origin::new(
            Utc.with_ymd_and_hms(1995, 1, 17, 5, 46, 53).unwrap(),
            GeoPoint::new(34.6, 135.0),
        );
        let m = MagnitudeMeasure::new("x", "ISC", origin, "mb", 2.0, Some(0.1));
        let converted = model.convert(&m, "Mw", 0, 0.0);

        // Perfect fit: res_var ~ 0, slope = 2, so sigma' ~ 2 * 0.1.
        assert!((converted.value - 4.0).abs() < 1e-9);
        assert!((converted.standard_error - 0.2).abs() < 1e-6);
        assert_eq!(converted.model_index, 0);
        assert!(!converted.extrapolated);
    }
}
