//! Per-record transform adjustments: fixed offsets and random jitter.
//!
//! Every adjusted field gets `value + offset + U(-random, random)`, drawn
//! independently per record and per field. Records never influence each
//! other.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::loaders::PlacementRecord;

/// Largest jitter half-width; wider ranges overflow the sampled interval.
pub const MAX_JITTER: f64 = f64::MAX / 4.0;

/// A fixed offset plus a symmetric random range for one field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Adjustment {
    /// Added unconditionally.
    pub offset: f64,
    /// Half-width of the uniform jitter; 0 disables it.
    pub random: f64,
}

impl Adjustment {
    pub fn new(offset: f64, random: f64) -> Self {
        Self { offset, random }
    }

    /// Returns true if applying this adjustment changes nothing.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.offset == 0.0 && self.random <= 0.0
    }

    /// Returns the adjusted value.
    pub fn apply<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        value + self.offset + jitter(rng, self.random)
    }
}

/// Adjustments for every supported record field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldOffsets {
    pub x: Adjustment,
    pub y: Adjustment,
    pub z: Adjustment,
    pub dir: Adjustment,
    pub pitch: Adjustment,
    pub scale: Adjustment,
}

impl FieldOffsets {
    /// Returns true if no field would change.
    pub fn is_noop(&self) -> bool {
        [self.x, self.y, self.z, self.dir, self.pitch, self.scale]
            .iter()
            .all(Adjustment::is_noop)
    }

    /// Applies every enabled adjustment exactly once to `record`.
    pub fn apply<R: Rng + ?Sized>(&self, record: &mut PlacementRecord, rng: &mut R) {
        let fields: [(&mut f64, &Adjustment); 6] = [
            (&mut record.x, &self.x),
            (&mut record.y, &self.y),
            (&mut record.z, &self.z),
            (&mut record.dir, &self.dir),
            (&mut record.pitch, &self.pitch),
            (&mut record.scale, &self.scale),
        ];

        for (value, adjustment) in fields {
            if !adjustment.is_noop() {
                *value = adjustment.apply(*value, rng);
            }
        }
    }
}

/// Uniform value in `[-magnitude, magnitude]`, or 0 for a non-positive magnitude.
///
/// The magnitude is capped at [`MAX_JITTER`].
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, magnitude: f64) -> f64 {
    if magnitude > 0.0 && magnitude.is_finite() {
        let magnitude = magnitude.min(MAX_JITTER);
        rng.gen_range(-magnitude..=magnitude)
    } else {
        0.0
    }
}

/// Applies `offsets` to every record in place.
pub fn apply_offsets<R: Rng + ?Sized>(records: &mut [PlacementRecord], offsets: &FieldOffsets, rng: &mut R) {
    if offsets.is_noop() {
        return;
    }
    for record in records.iter_mut() {
        offsets.apply(record, rng);
    }
}

/// Seeded generator for reproducible runs, OS entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Rounds to 3 decimals, the precision used for generated transforms.
#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<PlacementRecord> {
        vec![
            PlacementRecord::at("a", 10.0, 20.0),
            PlacementRecord::at("b", 30.0, 40.0),
        ]
    }

    #[test]
    fn test_fixed_offsets() {
        let mut records = sample_records();
        let offsets = FieldOffsets {
            x: Adjustment::new(1000.0, 0.0),
            y: Adjustment::new(10.0, 0.0),
            z: Adjustment::new(2.0, 0.0),
            ..FieldOffsets::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        apply_offsets(&mut records, &offsets, &mut rng);

        assert_eq!(records[0].x, 1010.0);
        assert_eq!(records[0].y, 30.0);
        assert_eq!(records[0].z, 2.0);
        assert_eq!(records[1].x, 1030.0);
        assert_eq!(records[1].dir, 0.0);
        assert_eq!(records[1].scale, 1.0);
    }

    #[test]
    fn test_random_stays_in_range() {
        let mut records: Vec<PlacementRecord> =
            (0..500).map(|i| PlacementRecord::at("r", i as f64, 0.0)).collect();
        let offsets = FieldOffsets {
            dir: Adjustment::new(0.0, 10.0),
            pitch: Adjustment::new(0.0, 1.0),
            scale: Adjustment::new(0.0, 0.2),
            ..FieldOffsets::default()
        };
        let mut rng = StdRng::seed_from_u64(42);

        apply_offsets(&mut records, &offsets, &mut rng);

        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.x, i as f64);
            assert!(record.dir.abs() <= 10.0);
            assert!(record.pitch.abs() <= 1.0);
            assert!((record.scale - 1.0).abs() <= 0.2 + 1e-12);
        }
        assert!(records.iter().any(|r| r.dir != 0.0));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let offsets = FieldOffsets {
            z: Adjustment::new(0.0, 0.5),
            ..FieldOffsets::default()
        };

        let mut first = sample_records();
        let mut second = sample_records();
        apply_offsets(&mut first, &offsets, &mut StdRng::seed_from_u64(7));
        apply_offsets(&mut second, &offsets, &mut StdRng::seed_from_u64(7));

        assert_eq!(first, second);
    }

    #[test]
    fn test_noop_offsets() {
        assert!(FieldOffsets::default().is_noop());
        assert!(!FieldOffsets {
            scale: Adjustment::new(0.0, 0.1),
            ..FieldOffsets::default()
        }
        .is_noop());
    }

    #[test]
    fn test_jitter_zero_magnitude() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(jitter(&mut rng, 0.0), 0.0);
        assert_eq!(jitter(&mut rng, -1.0), 0.0);
    }

    #[test]
    fn test_jitter_huge_magnitude_is_capped() {
        let mut rng = StdRng::seed_from_u64(5);
        for magnitude in [1e308, f64::MAX] {
            let value = jitter(&mut rng, magnitude);
            assert!(value.is_finite());
            assert!(value.abs() <= MAX_JITTER);
        }

        let mut records = sample_records();
        let offsets = FieldOffsets {
            z: Adjustment::new(0.0, 1e308),
            ..FieldOffsets::default()
        };
        apply_offsets(&mut records, &offsets, &mut rng);
        assert!(records.iter().all(|r| r.z.is_finite()));
    }

    #[test]
    fn test_seeded_rng() {
        let a: f64 = seeded_rng(Some(9)).gen();
        let b: f64 = seeded_rng(Some(9)).gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(-0.0004), -0.0);
    }
}
