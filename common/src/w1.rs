//! DS18B20 `w1_slave` payloads as exposed by the Linux one-wire driver.
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```

use std::cmp::Ordering;

use crate::error::SensorReadError;

pub fn parse_w1_payload(payload: &str) -> Result<f32, SensorReadError> {
    let mut lines = payload.lines();
    let crc_line = lines
        .next()
        .ok_or_else(|| SensorReadError::Malformed("empty payload".to_string()))?;
    let data_line = lines
        .next()
        .ok_or_else(|| SensorReadError::Malformed("missing data line".to_string()))?;

    if crc_line.trim_end().ends_with("NO") {
        return Err(SensorReadError::Malformed("crc check failed".to_string()));
    }

    let (_, raw) = data_line
        .split_once("t=")
        .ok_or_else(|| SensorReadError::Malformed("missing t= field".to_string()))?;
    let raw = raw.trim();
    let millidegrees: i32 = raw
        .parse()
        .map_err(|_| SensorReadError::Malformed(format!("bad millidegree value '{raw}'")))?;

    Ok(millidegrees_to_celsius(millidegrees))
}

/// Millidegrees to degrees at one decimal, rounded on the binary value of
/// `millidegrees / 1000`: exact ties go to the even tenth, and near-ties
/// follow whichever side the double actually lies on.
pub fn millidegrees_to_celsius(millidegrees: i32) -> f32 {
    let tenths = millidegrees.div_euclid(100);
    let rest = millidegrees.rem_euclid(100);

    let rounded = match rest.cmp(&50) {
        Ordering::Less => tenths,
        Ordering::Greater => tenths + 1,
        Ordering::Equal => {
            let celsius = f64::from(millidegrees) / 1000.0;
            // Single rounding, so the sign tells which side of the tie we are on.
            let offset = celsius.mul_add(1000.0, -f64::from(millidegrees));
            if offset > 0.0 {
                tenths + 1
            } else if offset < 0.0 {
                tenths
            } else if tenths % 2 == 0 {
                tenths
            } else {
                tenths + 1
            }
        }
    };

    (f64::from(rounded) / 10.0) as f32
}
