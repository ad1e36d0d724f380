//! Binary telemetry records from the device's IMU characteristic.
//!
//! Wire format (little-endian, 18 bytes):
//! ```text
//! ┌───────────┬──────┬──────┬──────┬──────┬──────┬──────┬─────┬─────┐
//! │ timestamp │  ax  │  ay  │  az  │  gx  │  gy  │  gz  │ pad │ rsv │
//! │  u32      │ i16  │ i16  │ i16  │ i16  │ i16  │ i16  │ u8  │ u8  │
//! └───────────┴──────┴──────┴──────┴──────┴──────┴──────┴─────┴─────┘
//!   0..4        4..6   6..8   8..10  10..12 12..14 14..16  16    17
//! ```
//!
//! Axis values are transmitted as `value * 1000` truncated to `i16`.
//! The gesture label is never on the wire; it is stamped from the
//! active training session when the record is accepted.

use serde::{Deserialize, Serialize};

use crate::error::FramingError;

/// Exact size of one telemetry notification.
pub const RECORD_LEN: usize = 18;

/// Fixed-point scale applied by the device firmware.
const SCALE: f32 = 1000.0;

/// A decoded record before it has been attributed to a gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    pub timestamp: u32,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

impl RawRecord {
    /// Attach the gesture label of the session that accepted this record.
    pub fn into_sample(self, label: &str) -> TelemetrySample {
        let [ax, ay, az] = self.accel;
        let [gx, gy, gz] = self.gyro;
        TelemetrySample {
            timestamp: self.timestamp,
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
            label: label.to_owned(),
        }
    }
}

/// One labelled IMU sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Device-monotonic timestamp (ms).
    pub timestamp: u32,
    /// Linear acceleration (g).
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    /// Angular velocity (rad/s).
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
    /// Gesture being collected when the sample arrived.
    pub label: String,
}

/// Parse one notification into a [`RawRecord`].
pub fn parse_record(buf: &[u8]) -> Result<RawRecord, FramingError> {
    let Ok(record) = <&[u8; RECORD_LEN]>::try_from(buf) else {
        return Err(FramingError::BadRecordLength(buf.len()));
    };

    let axis = |offset: usize| -> f32 {
        f32::from(i16::from_le_bytes([record[offset], record[offset + 1]])) / SCALE
    };

    Ok(RawRecord {
        timestamp: u32::from_le_bytes([record[0], record[1], record[2], record[3]]),
        accel: [axis(4), axis(6), axis(8)],
        gyro: [axis(10), axis(12), axis(14)],
    })
}

/// Encode a record the way the firmware does.  Values outside the
/// representable `±32.767` range saturate.
pub fn encode_record(record: &RawRecord) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    out[..4].copy_from_slice(&record.timestamp.to_le_bytes());

    let axes = record.accel.iter().chain(record.gyro.iter());
    for (i, value) in axes.enumerate() {
        let fixed = (value * SCALE)
            .round()
            .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        let offset = 4 + i * 2;
        out[offset..offset + 2].copy_from_slice(&fixed.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_layout() {
        let mut buf = [0u8; RECORD_LEN];
        buf[..4].copy_from_slice(&1234u32.to_le_bytes());
        buf[4..6].copy_from_slice(&1000i16.to_le_bytes());
        buf[6..8].copy_from_slice(&(-500i16).to_le_bytes());
        buf[8..10].copy_from_slice(&981i16.to_le_bytes());
        buf[10..12].copy_from_slice(&(-32768i16).to_le_bytes());
        buf[12..14].copy_from_slice(&32767i16.to_le_bytes());
        buf[14..16].copy_from_slice(&1i16.to_le_bytes());
        buf[17] = 0xAA; // reserved byte is ignored

        let r = parse_record(&buf).unwrap();
        assert_eq!(r.timestamp, 1234);
        assert!((r.accel[0] - 1.0).abs() < 1e-6);
        assert!((r.accel[1] + 0.5).abs() < 1e-6);
        assert!((r.accel[2] - 0.981).abs() < 1e-6);
        assert!((r.gyro[0] + 32.768).abs() < 1e-4);
        assert!((r.gyro[1] - 32.767).abs() < 1e-4);
        assert!((r.gyro[2] - 0.001).abs() < 1e-6);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(parse_record(&[0u8; 17]), Err(FramingError::BadRecordLength(17)));
        assert_eq!(parse_record(&[0u8; 20]), Err(FramingError::BadRecordLength(20)));
        assert_eq!(parse_record(&[]), Err(FramingError::BadRecordLength(0)));
    }

    #[test]
    fn encode_matches_decode() {
        let r = RawRecord {
            timestamp: u32::MAX,
            accel: [0.123, -9.81, 0.0],
            gyro: [1.5, -1.5, 32.767],
        };
        let decoded = parse_record(&encode_record(&r)).unwrap();
        assert_eq!(decoded.timestamp, r.timestamp);
        for (a, b) in decoded.accel.iter().zip(r.accel.iter()) {
            assert!((a - b).abs() <= 0.001);
        }
        for (a, b) in decoded.gyro.iter().zip(r.gyro.iter()) {
            assert!((a - b).abs() <= 0.001);
        }
    }

    #[test]
    fn encode_saturates_out_of_range() {
        let r = RawRecord {
            timestamp: 0,
            accel: [100.0, -100.0, 0.0],
            gyro: [0.0; 3],
        };
        let decoded = parse_record(&encode_record(&r)).unwrap();
        assert!((decoded.accel[0] - 32.767).abs() < 1e-4);
        assert!((decoded.accel[1] + 32.768).abs() < 1e-4);
    }

    #[test]
    fn label_is_stamped_not_decoded() {
        let r = parse_record(&[0u8; RECORD_LEN]).unwrap();
        let s = r.into_sample("wave");
        assert_eq!(s.label, "wave");
        assert_eq!(s.timestamp, 0);
    }
}
