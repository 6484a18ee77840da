//! Mapping of a pixel event lat/lon back to its focal plane coordinates.
//!
//! The geolocation tables are not invertible in closed form. The search alternates between
//! the two axes: the closest longitude fixes `x`, then the closest latitude among the cells
//! of the columns `x ± 1` fixes `y`, then the closest longitude among the rows `y ± 1` fixes
//! `x` again, and so on. It stops once the last [`PIXEL_SEARCH_STABLE_STEPS`] steps agree on
//! both coordinates, or after [`PIXEL_SEARCH_MAX_TRIES`] steps.
//!
//! This is a best effort search: it converges on regular tables, but nothing guarantees the
//! returned cell is the nearest one on a strongly distorted table.

use log::warn;

use crate::calibration::lookup_table::TableCell;
use crate::constants::{Degree, PIXEL_SEARCH_MAX_TRIES, PIXEL_SEARCH_STABLE_STEPS};

/// First cell minimizing `key`.
fn closest<'a>(cells: impl Iterator<Item = &'a TableCell>, key: impl Fn(&TableCell) -> f64) -> Option<TableCell> {
    let mut best: Option<(f64, TableCell)> = None;
    for cell in cells {
        let distance = key(cell);
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, *cell));
        }
    }
    best.map(|(_, cell)| cell)
}

/// Focal plane coordinates `(x, y)` of the pixel seeing `(lat, lon)`.
///
/// Arguments
/// ---------
/// * `cells`: the reduced geolocation table (see
///   [`CalibrationTables::cells_near`](crate::calibration::lookup_table::CalibrationTables::cells_near))
/// * `lat`, `lon`: pixel event position, `lon` in the table convention
///
/// Return
/// ------
/// * `None` when `cells` is empty
pub fn lat_lon_to_pixel(cells: &[TableCell], lat: Degree, lon: Degree) -> Option<(usize, usize)> {
    let mut steps: Vec<(usize, usize)> = Vec::with_capacity(PIXEL_SEARCH_MAX_TRIES);
    let mut candidates: Vec<TableCell> = cells.to_vec();

    loop {
        let x = closest(candidates.iter(), |c| (c.lon - lon).abs())?.x;
        let y = closest(cells.iter().filter(|c| c.x.abs_diff(x) <= 1), |c| (c.lat - lat).abs())?.y;
        steps.push((x, y));

        if steps.len() >= PIXEL_SEARCH_STABLE_STEPS {
            let last = &steps[steps.len() - PIXEL_SEARCH_STABLE_STEPS..];
            if last.iter().all(|step| *step == (x, y)) {
                return Some((x, y));
            }
        }
        if steps.len() >= PIXEL_SEARCH_MAX_TRIES {
            warn!("pixel search for ({lat:.4}, {lon:.4}) did not converge, keeping ({x}, {y})");
            return Some((x, y));
        }

        candidates = cells.iter().filter(|c| c.y.abs_diff(y) <= 1).copied().collect();
    }
}

#[cfg(test)]
mod pixel_search_test {
    use super::*;
    use crate::calibration::lookup_table::lookup_table_test::regular_tables;

    #[test]
    fn test_regular_table() {
        let tables = regular_tables();
        let cells = tables.cells_near(21.0, -99.0);

        assert_eq!(lat_lon_to_pixel(&cells, 21.0, -99.0), Some((10, 10)));
        assert_eq!(lat_lon_to_pixel(&cells, 21.52, -98.71), Some((13, 15)));
        assert_eq!(lat_lon_to_pixel(&cells, 19.96, -99.0), Some((10, 0)));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(lat_lon_to_pixel(&[], 21.0, -99.0), None);
    }

    #[test]
    fn test_rotated_table() {
        // the longitude also depends on y: several columns match the longitude on the first
        // step, the latitude step then settles it
        let mut cells = vec![];
        for x in 0..20 {
            for y in 0..20 {
                cells.push(TableCell {
                    lon: -100.0 + 0.1 * x as f64 + 0.02 * y as f64,
                    lat: 20.0 + 0.1 * y as f64,
                    x,
                    y,
                });
            }
        }
        // cell (5, 10): lon -99.3, lat 21.0
        assert_eq!(lat_lon_to_pixel(&cells, 21.0, -99.3), Some((5, 10)));
    }
}
