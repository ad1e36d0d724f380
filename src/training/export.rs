//! CSV export of collected samples for the training server.

use core::fmt::Write as _;

use crate::telemetry::TelemetrySample;

pub const CSV_HEADER: &str = "timestamp,ax,ay,az,gx,gy,gz,label";

/// One header line, then one row per sample, `\n`-separated with no
/// trailing newline.
pub fn to_csv(samples: &[TelemetrySample]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + samples.len() * 48);
    out.push_str(CSV_HEADER);
    for s in samples {
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "\n{},{},{},{},{},{},{},",
            s.timestamp, s.ax, s.ay, s.az, s.gx, s.gy, s.gz
        );
        push_field(&mut out, &s.label);
    }
    out
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
