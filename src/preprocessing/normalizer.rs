//! Range normalization of demand values
//!
//! The normalizer is fit once on a reference slice (normally the
//! training segment) and then applied to the whole series. Predictions
//! made in normalized space are mapped back with `inverse_transform`.

use crate::error::{Error, Result};
use ndarray::{Array, ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Normalization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// `(x - min) / (max - min)`, maps the reference range onto [0, 1]
    #[default]
    MinMax,
    /// `2 * (x - mean) / (max - min)`, signed and zero-centered
    MeanCenteredMinMax,
    /// `(x - mean) / std`
    ZScore,
}

impl std::fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NormalizationMethod::MinMax => "min_max",
            NormalizationMethod::MeanCenteredMinMax => "mean_centered_min_max",
            NormalizationMethod::ZScore => "z_score",
        };
        write!(f, "{}", name)
    }
}

/// Statistics captured when the normalizer is fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

impl RangeParams {
    /// Compute statistics over every finite element.
    ///
    /// NaN and infinite values are ignored.
    fn from_values<'a>(values: impl Iterator<Item = &'a f64>) -> Option<Self> {
        let finite: Vec<f64> = values.copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }

        let n = finite.len() as f64;
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = finite.iter().sum::<f64>() / n;
        let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            min,
            max,
            mean,
            std: variance.sqrt(),
        })
    }

    /// Fail if `method` would divide by zero with these statistics
    fn check_scale(&self, method: NormalizationMethod) -> Result<()> {
        match method {
            NormalizationMethod::MinMax | NormalizationMethod::MeanCenteredMinMax => {
                if self.max == self.min {
                    return Err(Error::DegenerateRange(format!(
                        "min and max are both {}",
                        self.min
                    )));
                }
                if !(self.max - self.min).is_finite() {
                    return Err(Error::DegenerateRange(format!(
                        "range [{}, {}] overflows f64",
                        self.min, self.max
                    )));
                }
            }
            NormalizationMethod::ZScore => {
                if self.std == 0.0 {
                    return Err(Error::DegenerateRange(format!(
                        "standard deviation is zero (all values {})",
                        self.mean
                    )));
                }
                if !self.std.is_finite() || !self.mean.is_finite() {
                    return Err(Error::DegenerateRange(format!(
                        "mean {} or standard deviation {} is not finite",
                        self.mean, self.std
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Min-max style normalizer over all elements of an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeNormalizer {
    method: NormalizationMethod,
    params: Option<RangeParams>,
}

impl RangeNormalizer {
    /// Create an unfitted normalizer
    pub fn new(method: NormalizationMethod) -> Self {
        Self {
            method,
            params: None,
        }
    }

    pub fn min_max() -> Self {
        Self::new(NormalizationMethod::MinMax)
    }

    pub fn mean_centered() -> Self {
        Self::new(NormalizationMethod::MeanCenteredMinMax)
    }

    pub fn z_score() -> Self {
        Self::new(NormalizationMethod::ZScore)
    }

    pub fn method(&self) -> NormalizationMethod {
        self.method
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Fitted statistics, if any
    pub fn params(&self) -> Option<&RangeParams> {
        self.params.as_ref()
    }

    /// Fit on a reference array.
    ///
    /// A normalizer can be fit exactly once. Fails with
    /// `DegenerateRange` when the scale would be zero.
    pub fn fit<S, D>(&mut self, reference: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        if self.params.is_some() {
            return Err(Error::InvalidState(
                "normalizer has already been fitted".to_string(),
            ));
        }

        let params = RangeParams::from_values(reference.iter()).ok_or_else(|| {
            Error::DegenerateRange("reference array has no finite values".to_string())
        })?;

        params.check_scale(self.method)?;

        self.params = Some(params);
        Ok(())
    }

    fn fitted(&self) -> Result<&RangeParams> {
        self.params.as_ref().ok_or_else(|| {
            Error::InvalidState("normalizer must be fitted before use".to_string())
        })
    }

    /// Normalize a single value
    pub fn transform_value(&self, x: f64) -> Result<f64> {
        let p = self.fitted()?;
        Ok(forward(self.method, p, x))
    }

    /// Map a single normalized value back to the original scale
    pub fn inverse_transform_value(&self, x: f64) -> Result<f64> {
        let p = self.fitted()?;
        Ok(inverse(self.method, p, x))
    }

    /// Normalize every element
    pub fn transform<S, D>(&self, data: &ArrayBase<S, D>) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let p = *self.fitted()?;
        let method = self.method;
        Ok(data.mapv(|x| forward(method, &p, x)))
    }

    /// Map every element back to the original scale
    pub fn inverse_transform<S, D>(&self, data: &ArrayBase<S, D>) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let p = *self.fitted()?;
        let method = self.method;
        Ok(data.mapv(|x| inverse(method, &p, x)))
    }

    /// Fit and transform the same array
    pub fn fit_transform<S, D>(&mut self, data: &ArrayBase<S, D>) -> Result<Array<f64, D>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.fit(data)?;
        self.transform(data)
    }

    /// Save the fitted normalizer as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.fitted()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a normalizer saved with `save_json`
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let normalizer: Self = serde_json::from_str(&content)?;
        normalizer.fitted()?.check_scale(normalizer.method)?;
        Ok(normalizer)
    }
}

fn forward(method: NormalizationMethod, p: &RangeParams, x: f64) -> f64 {
    match method {
        NormalizationMethod::MinMax => (x - p.min) / (p.max - p.min),
        NormalizationMethod::MeanCenteredMinMax => 2.0 * (x - p.mean) / (p.max - p.min),
        NormalizationMethod::ZScore => (x - p.mean) / p.std,
    }
}

fn inverse(method: NormalizationMethod, p: &RangeParams, x: f64) -> f64 {
    match method {
        NormalizationMethod::MinMax => x * (p.max - p.min) + p.min,
        NormalizationMethod::MeanCenteredMinMax => x * (p.max - p.min) / 2.0 + p.mean,
        NormalizationMethod::ZScore => x * p.std + p.mean,
    }
}
