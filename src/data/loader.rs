//! Loading raw demand arrays from `.npy` files
//!
//! Files may hold `(T, H, W, C)` grids or `(T, stations, C)` station
//! arrays in `f64`, `f32`, `i64` or `i32`. Several files describing the
//! same grid (e.g. pickups and drop-offs) are stacked along the channel
//! axis.

use super::tensor::DemandTensor;
use crate::error::{Error, Result};
use ndarray::{concatenate, Array4, ArrayD, Axis, Ix3, Ix4};
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement};
use std::path::Path;
use tracing::{debug, info};

fn try_read<A>(bytes: &[u8], convert: fn(A) -> f64) -> Result<Option<ArrayD<f64>>>
where
    A: ReadableElement + Clone,
{
    match ArrayD::<A>::read_npy(bytes) {
        Ok(array) => Ok(Some(array.mapv(convert))),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read a `.npy` file of any supported numeric dtype as `f64`
pub fn load_array<P: AsRef<Path>>(path: P) -> Result<ArrayD<f64>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let array = match try_read::<f64>(&bytes, |v| v)? {
        Some(a) => a,
        None => match try_read::<f32>(&bytes, f64::from)? {
            Some(a) => a,
            None => match try_read::<i64>(&bytes, |v| v as f64)? {
                Some(a) => a,
                None => try_read::<i32>(&bytes, f64::from)?.ok_or_else(|| {
                    Error::Shape(format!(
                        "{}: unsupported dtype, expected f64, f32, i64 or i32",
                        path.display()
                    ))
                })?,
            },
        },
    };

    debug!("Read {} with shape {:?}", path.display(), array.shape());
    Ok(array)
}

/// Interpret a dynamic array as a 4-D grid, promoting station arrays
fn as_grid(array: ArrayD<f64>, origin: &str) -> Result<Array4<f64>> {
    match array.ndim() {
        4 => Ok(array
            .into_dimensionality::<Ix4>()
            .map_err(|e| Error::Shape(format!("{}: {}", origin, e)))?),
        3 => Ok(array
            .into_dimensionality::<Ix3>()
            .map_err(|e| Error::Shape(format!("{}: {}", origin, e)))?
            .insert_axis(Axis(2))),
        n => Err(Error::Shape(format!(
            "{}: expected a 3-D (T, stations, C) or 4-D (T, H, W, C) array, got {} dimensions",
            origin, n
        ))),
    }
}

/// Concatenate grids along the channel axis.
///
/// All grids must agree on `(T, H, W)`.
pub fn stack_channels(grids: &[Array4<f64>]) -> Result<Array4<f64>> {
    let first = grids
        .first()
        .ok_or_else(|| Error::Shape("no arrays to stack".to_string()))?;
    let (t, h, w, _) = first.dim();

    for (index, grid) in grids.iter().enumerate().skip(1) {
        let (gt, gh, gw, _) = grid.dim();
        if (gt, gh, gw) != (t, h, w) {
            return Err(Error::Shape(format!(
                "array {} has leading shape ({}, {}, {}), expected ({}, {}, {})",
                index, gt, gh, gw, t, h, w
            )));
        }
    }

    if grids.len() == 1 {
        return Ok(first.clone());
    }

    let views: Vec<_> = grids.iter().map(|g| g.view()).collect();
    concatenate(Axis(3), &views).map_err(|e| Error::Shape(e.to_string()))
}

/// Keep only the listed channels, in the given order
pub fn select_channels(grid: &Array4<f64>, channels: &[usize]) -> Result<Array4<f64>> {
    if channels.is_empty() {
        return Err(Error::Shape("channel selection is empty".to_string()));
    }
    let available = grid.dim().3;
    if let Some(&bad) = channels.iter().find(|&&c| c >= available) {
        return Err(Error::Shape(format!(
            "channel {} out of range, array has {} channels",
            bad, available
        )));
    }
    Ok(grid.select(Axis(3), channels))
}

/// Load one or more raw arrays into a single demand tensor
pub fn load_demand<P: AsRef<Path>>(paths: &[P], channels: Option<&[usize]>) -> Result<DemandTensor> {
    let grids = paths
        .iter()
        .map(|p| {
            let path = p.as_ref();
            as_grid(load_array(path)?, &path.display().to_string())
        })
        .collect::<Result<Vec<_>>>()?;

    let mut grid = stack_channels(&grids)?;
    if let Some(channels) = channels {
        grid = select_channels(&grid, channels)?;
    }

    let tensor = DemandTensor::new(grid)?;
    info!(
        "Loaded demand tensor (T={}, H={}, W={}, C={}) from {} file(s)",
        tensor.time_steps(),
        tensor.height(),
        tensor.width(),
        tensor.channels(),
        paths.len()
    );
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};
    use ndarray_npy::write_npy;
    use tempfile::tempdir;

    #[test]
    fn test_load_f32_station_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stations.npy");
        let mut raw = Array3::<f32>::zeros((6, 5, 2));
        raw[[2, 3, 1]] = 4.5;
        write_npy(&path, &raw).unwrap();

        let tensor = load_demand(&[&path], None).unwrap();
        assert_eq!(tensor.dim(), (6, 5, 1, 2));
        assert_eq!(tensor.as_array()[[2, 3, 0, 1]], 4.5);
    }

    #[test]
    fn test_load_i64_grid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.npy");
        let raw = Array4::<i64>::from_elem((3, 2, 2, 1), 7);
        write_npy(&path, &raw).unwrap();

        let array = load_array(&path).unwrap();
        assert_eq!(array.shape(), &[3, 2, 2, 1]);
        assert!(array.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_stack_and_select_channels() {
        let dir = tempdir().unwrap();
        let pickups = dir.path().join("p.npy");
        let dropoffs = dir.path().join("d.npy");
        write_npy(&pickups, &Array4::<f64>::from_elem((4, 3, 3, 1), 1.0)).unwrap();
        write_npy(&dropoffs, &Array4::<f64>::from_elem((4, 3, 3, 1), 2.0)).unwrap();

        let both = load_demand(&[&pickups, &dropoffs], None).unwrap();
        assert_eq!(both.channels(), 2);
        assert_eq!(both.as_array()[[0, 0, 0, 0]], 1.0);
        assert_eq!(both.as_array()[[0, 0, 0, 1]], 2.0);

        let second = load_demand(&[&pickups, &dropoffs], Some(&[1][..])).unwrap();
        assert_eq!(second.channels(), 1);
        assert_eq!(second.as_array()[[3, 2, 2, 0]], 2.0);
    }

    #[test]
    fn test_mismatched_shapes_rejected() {
        let a = Array4::<f64>::zeros((4, 3, 3, 1));
        let b = Array4::<f64>::zeros((5, 3, 3, 1));
        assert!(matches!(stack_channels(&[a, b]), Err(Error::Shape(_))));
    }

    #[test]
    fn test_channel_out_of_range() {
        let grid = Array4::<f64>::zeros((2, 2, 2, 2));
        assert!(select_channels(&grid, &[2]).is_err());
        assert!(select_channels(&grid, &[]).is_err());
    }

    #[test]
    fn test_wrong_rank_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flat.npy");
        write_npy(&path, &ndarray::Array2::<f64>::zeros((3, 3))).unwrap();
        assert!(matches!(load_demand(&[&path], None), Err(Error::Shape(_))));
    }
}
