//! # GLM file records
//!
//! Already-materialized content of one GLM L2 LCFA file, as handed over by the file
//! loading collaborator. The record keeps the file conventions untouched (time offsets
//! relative to the file product time, packed event energies); the conversion to the
//! co-indexed arrays of a [`DetectionSet`](crate::detections::DetectionSet) happens in
//! [`DetectionSet::load`](crate::detections::DetectionSet::load).
//!
//! ## Packed event energies
//!
//! Pixel energies are stored as a signed 16 bit integer flagged `_Unsigned`, with a fill
//! value of `-1`. Once reinterpreted as unsigned the fill value reads as `65535`; missing
//! pixels are mapped to the **maximum recordable energy**
//! (`max_int * scale_factor + add_offset`), the closest value to what the L0 data holds.

use serde::{Deserialize, Serialize};

use crate::constants::{Degree, GroupId, Joule, SatelliteId, Second, UnixSeconds};
use crate::geodesy::{geodetic_to_ecef, Ecef};
use crate::trigger_errors::TriggerError;

/// Instrument orientation, from the file `yaw_flip_flag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orientation {
    Upright,
    Transitional,
    Inverted,
}

impl Orientation {
    /// Decode a `yaw_flip_flag` (0 upright, 1 transitional, 2 inverted).
    pub fn from_yaw_flip_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Orientation::Upright),
            1 => Some(Orientation::Transitional),
            2 => Some(Orientation::Inverted),
            _ => None,
        }
    }
}

/// Storage type of a packed integer variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedType {
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
}

impl PackedType {
    fn bits(self) -> u32 {
        match self {
            PackedType::I8 | PackedType::U8 => 8,
            PackedType::I16 | PackedType::U16 => 16,
            PackedType::I32 | PackedType::U32 => 32,
        }
    }

    fn is_signed(self) -> bool {
        matches!(self, PackedType::I8 | PackedType::I16 | PackedType::I32)
    }

    fn max_value(self) -> i64 {
        match self {
            PackedType::I8 => i8::MAX as i64,
            PackedType::I16 => i16::MAX as i64,
            PackedType::I32 => i32::MAX as i64,
            PackedType::U8 => u8::MAX as i64,
            PackedType::U16 => u16::MAX as i64,
            PackedType::U32 => u32::MAX as i64,
        }
    }
}

/// A packed (scaled integer) energy variable.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedEnergy {
    /// Stored integers, as read from the file
    pub raw: Vec<i64>,
    /// `_FillValue` attribute, in the storage representation
    pub fill_value: Option<i64>,
    pub scale_factor: f64,
    pub add_offset: f64,
    pub packed_type: PackedType,
    /// `_Unsigned` attribute
    pub unsigned: bool,
}

impl PackedEnergy {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Largest integer the variable can hold once the `_Unsigned` flag is honored.
    pub fn max_recordable_integer(&self) -> i64 {
        let max = self.packed_type.max_value();
        if self.packed_type.is_signed() && self.unsigned {
            2 * max + 1
        } else {
            max
        }
    }

    /// Energy assigned to missing pixels.
    pub fn max_recordable_energy(&self) -> Joule {
        self.max_recordable_integer() as f64 * self.scale_factor + self.add_offset
    }

    /// Unpack every stored integer into joules.
    ///
    /// Fill values (and their unsigned reinterpretation) decode as
    /// [`PackedEnergy::max_recordable_energy`].
    pub fn decode(&self) -> Vec<Joule> {
        let reinterpret = self.packed_type.is_signed() && self.unsigned;
        let modulus = 1_i64 << self.packed_type.bits();

        self.raw
            .iter()
            .map(|&raw| {
                if self.fill_value == Some(raw) {
                    return self.max_recordable_energy();
                }
                let value = if reinterpret && raw < 0 {
                    raw + modulus
                } else {
                    raw
                };
                if reinterpret && self.fill_value.map(|f| f + modulus) == Some(value) {
                    return self.max_recordable_energy();
                }
                value as f64 * self.scale_factor + self.add_offset
            })
            .collect()
    }
}

/// Per-group arrays of a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupRecords {
    pub id: Vec<GroupId>,
    pub lat: Vec<Degree>,
    pub lon: Vec<Degree>,
    /// Offsets from the file product time (milliseconds before 2018-12-04)
    pub time_offset: Vec<f64>,
    pub energy: Vec<Joule>,
    pub quality_flag: Vec<u16>,
}

impl GroupRecords {
    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Per-pixel-event arrays of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecords {
    pub lat: Vec<Degree>,
    pub lon: Vec<Degree>,
    pub time_offset: Vec<f64>,
    pub energy: PackedEnergy,
    pub parent_group_id: Vec<GroupId>,
}

impl EventRecords {
    pub fn len(&self) -> usize {
        self.parent_group_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_group_id.is_empty()
    }
}

/// One GLM file.
#[derive(Debug, Clone, PartialEq)]
pub struct GlmFileRecord {
    pub satellite_id: SatelliteId,
    /// Coverage start, from the file name
    pub file_start: UnixSeconds,
    /// Coverage end, from the file name
    pub file_end: UnixSeconds,
    /// Seconds since 2000-01-01T12:00:00
    pub product_time: Second,
    pub subpoint_lat: Degree,
    pub subpoint_lon: Degree,
    pub satellite_height_km: f64,
    pub yaw_flip_flag: u8,
    pub groups: GroupRecords,
    pub events: EventRecords,
}

impl GlmFileRecord {
    /// Nominal satellite position in ECEF.
    pub fn satellite_position(&self) -> Ecef {
        geodetic_to_ecef(
            self.subpoint_lat,
            self.subpoint_lon,
            self.satellite_height_km * 1e3,
        )
    }

    /// Check that the group arrays and the event arrays are co-indexed.
    pub fn validate(&self) -> Result<(), TriggerError> {
        let g = &self.groups;
        let n = g.len();
        if [g.lat.len(), g.lon.len(), g.time_offset.len(), g.energy.len(), g.quality_flag.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(TriggerError::MismatchedLengths(format!(
                "group arrays of satellite {} file starting at {}",
                self.satellite_id, self.file_start
            )));
        }

        let e = &self.events;
        let m = e.len();
        if [e.lat.len(), e.lon.len(), e.time_offset.len(), e.energy.len()]
            .iter()
            .any(|&len| len != m)
        {
            return Err(TriggerError::MismatchedLengths(format!(
                "event arrays of satellite {} file starting at {}",
                self.satellite_id, self.file_start
            )));
        }
        Ok(())
    }
}

/// Keep the records overlapping `[start, end]`, ordered by file start time.
///
/// A record is kept when `start < file_end && end >= file_start`. An empty result is the
/// "nothing to process" signal of a window.
pub fn select_records_for_window(
    records: &[GlmFileRecord],
    start: UnixSeconds,
    end: UnixSeconds,
) -> Vec<&GlmFileRecord> {
    let mut selected: Vec<&GlmFileRecord> = records
        .iter()
        .filter(|r| start < r.file_end && end >= r.file_start)
        .collect();
    selected.sort_by(|a, b| a.file_start.total_cmp(&b.file_start));
    selected
}

#[cfg(test)]
mod file_record_test {
    use super::*;
    use approx::assert_relative_eq;

    fn packed(raw: Vec<i64>) -> PackedEnergy {
        PackedEnergy {
            raw,
            fill_value: Some(-1),
            scale_factor: 1.52597e-15,
            add_offset: 2.8515e-16,
            packed_type: PackedType::I16,
            unsigned: true,
        }
    }

    #[test]
    fn test_max_recordable_integer() {
        let p = packed(vec![]);
        assert_eq!(p.max_recordable_integer(), 65535);

        let p = PackedEnergy {
            unsigned: false,
            ..packed(vec![])
        };
        assert_eq!(p.max_recordable_integer(), 32767);

        let p = PackedEnergy {
            packed_type: PackedType::U16,
            ..packed(vec![])
        };
        assert_eq!(p.max_recordable_integer(), 65535);
    }

    #[test]
    fn test_decode_fill_value() {
        let p = packed(vec![10, -1, 65535, -2]);
        let energies = p.decode();
        let max = 65535.0 * 1.52597e-15 + 2.8515e-16;

        assert_relative_eq!(energies[0], 10.0 * 1.52597e-15 + 2.8515e-16);
        assert_relative_eq!(energies[1], max);
        assert_relative_eq!(energies[2], max);
        // -2 reads as 65534 once unsigned
        assert_relative_eq!(energies[3], 65534.0 * 1.52597e-15 + 2.8515e-16);
    }

    #[test]
    fn test_orientation_flag() {
        assert_eq!(Orientation::from_yaw_flip_flag(0), Some(Orientation::Upright));
        assert_eq!(
            Orientation::from_yaw_flip_flag(1),
            Some(Orientation::Transitional)
        );
        assert_eq!(Orientation::from_yaw_flip_flag(2), Some(Orientation::Inverted));
        assert_eq!(Orientation::from_yaw_flip_flag(7), None);
    }

    fn record(satellite_id: SatelliteId, file_start: f64) -> GlmFileRecord {
        GlmFileRecord {
            satellite_id,
            file_start,
            file_end: file_start + 20.0,
            product_time: file_start - 946_728_000.0,
            subpoint_lat: 0.0,
            subpoint_lon: -75.2,
            satellite_height_km: 35786.023,
            yaw_flip_flag: 0,
            groups: GroupRecords::default(),
            events: EventRecords {
                lat: vec![],
                lon: vec![],
                time_offset: vec![],
                energy: packed(vec![]),
                parent_group_id: vec![],
            },
        }
    }

    #[test]
    fn test_select_records_for_window() {
        let records = vec![
            record(16, 1020.0),
            record(16, 980.0),
            record(18, 1000.0),
            record(16, 1060.0),
        ];

        let selected = select_records_for_window(&records, 990.0, 1010.0);
        let starts: Vec<f64> = selected.iter().map(|r| r.file_start).collect();
        assert_eq!(starts, vec![980.0, 1000.0]);

        // boundaries: a file ending exactly at the window start is excluded,
        // a file starting exactly at the window end is kept
        let selected = select_records_for_window(&records, 1000.0, 1020.0);
        let starts: Vec<f64> = selected.iter().map(|r| r.file_start).collect();
        assert_eq!(starts, vec![1000.0, 1020.0]);

        assert!(select_records_for_window(&records, 0.0, 10.0).is_empty());
    }

    #[test]
    fn test_validate() {
        let mut r = record(16, 0.0);
        assert!(r.validate().is_ok());

        r.groups.id.push(1);
        assert!(matches!(
            r.validate(),
            Err(TriggerError::MismatchedLengths(_))
        ));
    }

    #[test]
    fn test_satellite_position() {
        let r = record(16, 0.0);
        let p = r.satellite_position();
        assert_relative_eq!(p.norm(), 6_378_137.0 + 35_786_023.0, epsilon = 1e-3);
    }
}
