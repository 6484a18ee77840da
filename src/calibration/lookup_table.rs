//! # Calibration tables
//!
//! A GLM calibration set is made of three co-indexed 2-D tables over the focal plane pixel
//! grid `(x, y)`:
//!
//! - `pixel_to_lon`: longitude seen by each pixel, in the `[-360, 0)` convention,
//! - `pixel_to_lat`: latitude seen by each pixel,
//! - `lut`: radiometric lookup value of each pixel.
//!
//! Cells outside the field of view are masked. Tables are indexed `[x, y]`, `x` being the
//! matrix row.

use nalgebra::DMatrix;

use crate::constants::{CALIBRATION_HALF_LAT_WINDOW, CALIBRATION_HALF_LON_WINDOW, Degree};
use crate::trigger_errors::TriggerError;

/// A 2-D table with a validity mask (`true` means masked).
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedGrid {
    values: DMatrix<f64>,
    mask: DMatrix<bool>,
}

impl MaskedGrid {
    /// Build a grid from its values and mask.
    ///
    /// Return
    /// ------
    /// * [`TriggerError::CalibrationShape`] when the two matrices differ in shape
    pub fn new(values: DMatrix<f64>, mask: DMatrix<bool>) -> Result<Self, TriggerError> {
        if values.shape() != mask.shape() {
            return Err(TriggerError::CalibrationShape(format!(
                "values {:?} and mask {:?}",
                values.shape(),
                mask.shape()
            )));
        }
        Ok(MaskedGrid { values, mask })
    }

    /// A grid without masked cell.
    pub fn unmasked(values: DMatrix<f64>) -> Self {
        let mask = DMatrix::from_element(values.nrows(), values.ncols(), false);
        MaskedGrid { values, mask }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Value of an unmasked cell.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        let (rows, cols) = self.shape();
        (x < rows && y < cols && !self.mask[(x, y)]).then(|| self.values[(x, y)])
    }

    /// Value of the unmasked, non zero cell closest to `(x, y)` in index space.
    ///
    /// Ties are resolved on the first cell in row-major order. The search walks square rings
    /// of growing radius around `(x, y)` and stops once no farther ring can hold a closer
    /// cell.
    pub fn nearest_valid(&self, x: usize, y: usize) -> Option<f64> {
        let (rows, cols) = self.shape();
        let max_radius = rows.max(x + 1).max(cols).max(y + 1);
        // (squared distance, row, col, value)
        let mut best: Option<(usize, usize, usize, f64)> = None;

        for radius in 0..=max_radius {
            for (i, j) in ring(x, y, radius, rows, cols) {
                let Some(value) = self.get(i, j).filter(|v| *v != 0.0) else {
                    continue;
                };
                let distance = i.abs_diff(x).pow(2) + j.abs_diff(y).pow(2);
                if best.is_none_or(|(d, bi, bj, _)| (distance, i, j) < (d, bi, bj)) {
                    best = Some((distance, i, j, value));
                }
            }
            // every cell of the next ring is at least `radius + 1` away
            if best.is_some_and(|(d, ..)| d < (radius + 1).pow(2)) {
                break;
            }
        }
        best.map(|(.., value)| value)
    }
}

/// In-bounds cells at Chebyshev distance `radius` from `(x, y)`.
fn ring(x: usize, y: usize, radius: usize, rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
    let rows_range = x.saturating_sub(radius)..(x + radius + 1).min(rows);
    rows_range.flat_map(move |i| {
        let cols_range = y.saturating_sub(radius)..(y + radius + 1).min(cols);
        cols_range
            .filter(move |&j| i.abs_diff(x) == radius || j.abs_diff(y) == radius)
            .map(move |j| (i, j))
    })
}

/// One unmasked cell of the geolocation tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableCell {
    pub lat: Degree,
    pub lon: Degree,
    pub x: usize,
    pub y: usize,
}

/// The calibration set of one satellite orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTables {
    pixel_to_lon: MaskedGrid,
    pixel_to_lat: MaskedGrid,
    lut: MaskedGrid,
}

impl CalibrationTables {
    /// Bundle the three tables of a calibration set.
    ///
    /// Return
    /// ------
    /// * [`TriggerError::CalibrationShape`] unless the three tables share the same shape
    pub fn new(
        pixel_to_lon: MaskedGrid,
        pixel_to_lat: MaskedGrid,
        lut: MaskedGrid,
    ) -> Result<Self, TriggerError> {
        let shape = pixel_to_lon.shape();
        if pixel_to_lat.shape() != shape || lut.shape() != shape {
            return Err(TriggerError::CalibrationShape(format!(
                "lon {:?}, lat {:?}, lut {:?}",
                shape,
                pixel_to_lat.shape(),
                lut.shape()
            )));
        }
        Ok(CalibrationTables {
            pixel_to_lon,
            pixel_to_lat,
            lut,
        })
    }

    /// Cells whose lat and lon are both strictly within the calibration window
    /// (±2°) of `(lat, lon)`, in row-major order.
    ///
    /// `lon` must follow the table convention (`[-360, 0)`).
    pub fn cells_near(&self, lat: Degree, lon: Degree) -> Vec<TableCell> {
        let (rows, cols) = self.pixel_to_lon.shape();
        let mut cells = vec![];
        for x in 0..rows {
            for y in 0..cols {
                let (Some(cell_lon), Some(cell_lat)) =
                    (self.pixel_to_lon.get(x, y), self.pixel_to_lat.get(x, y))
                else {
                    continue;
                };
                if (cell_lon - lon).abs() < CALIBRATION_HALF_LON_WINDOW
                    && (cell_lat - lat).abs() < CALIBRATION_HALF_LAT_WINDOW
                {
                    cells.push(TableCell {
                        lat: cell_lat,
                        lon: cell_lon,
                        x,
                        y,
                    });
                }
            }
        }
        cells
    }

    /// Lookup value of a pixel.
    ///
    /// Masked or zero cells (edge of the field of view) take the value of the nearest valid
    /// cell (see [`MaskedGrid::nearest_valid`]).
    ///
    /// Return
    /// ------
    /// * [`TriggerError::EmptyLookupTable`] when the table has no valid cell
    pub fn lut_value(&self, x: usize, y: usize) -> Result<f64, TriggerError> {
        match self.lut.get(x, y) {
            Some(value) if value != 0.0 => Ok(value),
            _ => self.lut.nearest_valid(x, y).ok_or(TriggerError::EmptyLookupTable),
        }
    }
}

#[cfg(test)]
pub(crate) mod lookup_table_test {
    use super::*;

    /// 40 × 40 tables covering lon `[-100, -96.1]` (x) and lat `[20, 23.9]` (y) by steps of
    /// 0.1°, with a lookup value of `1 + x + 100 y`.
    pub(crate) fn regular_tables() -> CalibrationTables {
        let lon = DMatrix::from_fn(40, 40, |x, _| -100.0 + 0.1 * x as f64);
        let lat = DMatrix::from_fn(40, 40, |_, y| 20.0 + 0.1 * y as f64);
        let lut = DMatrix::from_fn(40, 40, |x, y| 1.0 + x as f64 + 100.0 * y as f64);
        CalibrationTables::new(
            MaskedGrid::unmasked(lon),
            MaskedGrid::unmasked(lat),
            MaskedGrid::unmasked(lut),
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch() {
        let small = MaskedGrid::unmasked(DMatrix::zeros(2, 2));
        let large = MaskedGrid::unmasked(DMatrix::zeros(3, 2));
        assert!(matches!(
            CalibrationTables::new(small.clone(), small.clone(), large),
            Err(TriggerError::CalibrationShape(_))
        ));
        assert!(MaskedGrid::new(DMatrix::zeros(2, 2), DMatrix::from_element(2, 3, false)).is_err());
    }

    #[test]
    fn test_cells_near() {
        let tables = regular_tables();
        let cells = tables.cells_near(21.0, -99.0);
        // strictly within 2°: lon index 0..=29 minus the -101 side, lat index 0..=29
        assert!(cells.iter().all(|c| (c.lon + 99.0).abs() < 2.0 && (c.lat - 21.0).abs() < 2.0));
        assert!(cells.iter().any(|c| c.x == 10 && c.y == 10));
        assert!(!cells.iter().any(|c| c.x == 30));
        assert!(tables.cells_near(50.0, -99.0).is_empty());
    }

    #[test]
    fn test_masked_cells_are_ignored() {
        let lon = DMatrix::from_fn(3, 3, |x, _| -100.0 + x as f64);
        let lat = DMatrix::from_fn(3, 3, |_, y| 20.0 + y as f64);
        let mut mask = DMatrix::from_element(3, 3, false);
        mask[(1, 1)] = true;
        let tables = CalibrationTables::new(
            MaskedGrid::new(lon, mask).unwrap(),
            MaskedGrid::unmasked(lat),
            MaskedGrid::unmasked(DMatrix::from_element(3, 3, 1.0)),
        )
        .unwrap();

        let cells = tables.cells_near(21.0, -99.0);
        assert_eq!(cells.len(), 8);
        assert!(!cells.iter().any(|c| c.x == 1 && c.y == 1));
    }

    #[test]
    fn test_lut_value_falls_back_to_nearest() {
        let values = DMatrix::from_fn(4, 4, |x, y| (10 * x + y) as f64);
        let mut mask = DMatrix::from_element(4, 4, false);
        mask[(2, 2)] = true;
        let grid = MaskedGrid::new(values, mask).unwrap();
        let tables = CalibrationTables::new(
            MaskedGrid::unmasked(DMatrix::zeros(4, 4)),
            MaskedGrid::unmasked(DMatrix::zeros(4, 4)),
            grid,
        )
        .unwrap();

        assert_eq!(tables.lut_value(3, 1), Ok(31.0));
        // masked: the first of the four neighbours at distance 1 is (1, 2)
        assert_eq!(tables.lut_value(2, 2), Ok(12.0));
        // (0, 0) holds a zero: nearest valid cells are (0, 1) then (1, 0)
        assert_eq!(tables.lut_value(0, 0), Ok(1.0));

        let empty = CalibrationTables::new(
            MaskedGrid::unmasked(DMatrix::zeros(2, 2)),
            MaskedGrid::unmasked(DMatrix::zeros(2, 2)),
            MaskedGrid::unmasked(DMatrix::zeros(2, 2)),
        )
        .unwrap();
        assert_eq!(empty.lut_value(0, 0), Err(TriggerError::EmptyLookupTable));
    }

    /// Closest valid value by scanning the whole grid.
    fn scanned_nearest(grid: &MaskedGrid, x: usize, y: usize) -> Option<f64> {
        let (rows, cols) = grid.shape();
        let mut best: Option<(usize, f64)> = None;
        for i in 0..rows {
            for j in 0..cols {
                let Some(value) = grid.get(i, j).filter(|v| *v != 0.0) else {
                    continue;
                };
                let distance = i.abs_diff(x).pow(2) + j.abs_diff(y).pow(2);
                if best.is_none_or(|(d, _)| distance < d) {
                    best = Some((distance, value));
                }
            }
        }
        best.map(|(_, value)| value)
    }

    #[test]
    fn test_nearest_valid_matches_full_scan() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        for density in [0.02, 0.3, 0.9] {
            let values = DMatrix::from_fn(30, 17, |x, y| (100 * x + y + 1) as f64);
            let mask = DMatrix::from_fn(30, 17, |_, _| rng.random::<f64>() > density);
            let grid = MaskedGrid::new(values, mask).unwrap();

            for _ in 0..200 {
                let x = rng.random_range(0..30);
                let y = rng.random_range(0..17);
                assert_eq!(grid.nearest_valid(x, y), scanned_nearest(&grid, x, y), "at ({x}, {y})");
            }
        }

        let all_masked = MaskedGrid::new(DMatrix::from_element(3, 3, 1.0), DMatrix::from_element(3, 3, true)).unwrap();
        assert_eq!(all_masked.nearest_valid(1, 1), None);
    }
}
