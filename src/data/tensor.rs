//! Spatiotemporal demand tensor

use crate::error::{Error, Result};
use ndarray::{s, Array3, Array4, ArrayView4, Axis};

/// Dense demand counts indexed by `(t, row, col, channel)`.
///
/// Station graphs `(t, station, channel)` are stored with `col = 0` and
/// a width of one, so a station's location id equals its index.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandTensor {
    data: Array4<f64>,
}

impl DemandTensor {
    /// Wrap a `(T, H, W, C)` grid
    pub fn new(data: Array4<f64>) -> Result<Self> {
        let (t, h, w, c) = data.dim();
        if t == 0 || h == 0 || w == 0 || c == 0 {
            return Err(Error::Shape(format!(
                "demand tensor must be non-empty in every axis, got ({}, {}, {}, {})",
                t, h, w, c
            )));
        }
        Ok(Self { data })
    }

    /// Wrap a `(T, stations, C)` array as a `(T, stations, 1, C)` grid
    pub fn from_stations(data: Array3<f64>) -> Result<Self> {
        Self::new(data.insert_axis(Axis(2)))
    }

    pub fn time_steps(&self) -> usize {
        self.data.dim().0
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn channels(&self) -> usize {
        self.data.dim().3
    }

    /// `(T, H, W, C)`
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView4<'_, f64> {
        self.data.view()
    }

    pub fn as_array(&self) -> &Array4<f64> {
        &self.data
    }

    /// Time steps `[start, end)` as a view
    pub fn time_slice(&self, start: usize, end: usize) -> Result<ArrayView4<'_, f64>> {
        if start > end || end > self.time_steps() {
            return Err(Error::Shape(format!(
                "time range [{}, {}) outside [0, {})",
                start,
                end,
                self.time_steps()
            )));
        }
        Ok(self.data.slice(s![start..end, .., .., ..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims() {
        let tensor = DemandTensor::new(Array4::zeros((5, 4, 3, 2))).unwrap();
        assert_eq!(tensor.dim(), (5, 4, 3, 2));
        assert_eq!(tensor.time_steps(), 5);
        assert_eq!(tensor.height(), 4);
        assert_eq!(tensor.width(), 3);
        assert_eq!(tensor.channels(), 2);
    }

    #[test]
    fn test_from_stations() {
        let mut stations = Array3::zeros((4, 7, 2));
        stations[[1, 5, 1]] = 3.0;
        let tensor = DemandTensor::from_stations(stations).unwrap();

        assert_eq!(tensor.dim(), (4, 7, 1, 2));
        assert_eq!(tensor.as_array()[[1, 5, 0, 1]], 3.0);
    }

    #[test]
    fn test_empty_axis_rejected() {
        assert!(DemandTensor::new(Array4::zeros((0, 4, 4, 1))).is_err());
        assert!(DemandTensor::new(Array4::zeros((3, 4, 4, 0))).is_err());
    }

    #[test]
    fn test_time_slice_bounds() {
        let tensor = DemandTensor::new(Array4::zeros((5, 2, 2, 1))).unwrap();
        assert_eq!(tensor.time_slice(1, 4).unwrap().dim(), (3, 2, 2, 1));
        assert!(tensor.time_slice(2, 6).is_err());
        assert!(tensor.time_slice(4, 3).is_err());
    }
}
