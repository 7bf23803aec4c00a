//! Decoding of individual 8-byte measurement records.
//!
//! Grounded on the `Record`/`Flags` classes in the reference
//! implementation's `record.py`.

use crate::{Error, Result};

/// Status bits packed alongside a record's temperature and humidity.
///
/// Named members mirror `record.py`'s `Record.Flags` `IntFlag` exactly,
/// bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    /// This slot marks a user-inserted bookmark.
    pub fn mark(self) -> bool {
        self.0 & 0b0000_0001 != 0
    }
    /// Recording was paused when this record was taken.
    pub fn pause(self) -> bool {
        self.0 & 0b0000_0010 != 0
    }
    /// Recording was stopped when this record was taken.
    pub fn stop(self) -> bool {
        self.0 & 0b0000_0100 != 0
    }
    /// Sign bit for [`Record::temperature`]; negative when set.
    pub fn sign1(self) -> bool {
        self.0 & 0b0000_1000 != 0
    }
    /// The device's light was on.
    pub fn light(self) -> bool {
        self.0 & 0b0001_0000 != 0
    }
    /// The device's vibration sensor tripped.
    pub fn vibr(self) -> bool {
        self.0 & 0b0010_0000 != 0
    }
    /// Sign bit for [`Record::humidity`]; negative when set.
    pub fn sign2(self) -> bool {
        self.0 & 0b0100_0000 != 0
    }
    /// The device's internal error flag was set.
    pub fn error(self) -> bool {
        self.0 & 0b1000_0000 != 0
    }
    /// The raw flags byte.
    pub fn bits(self) -> u8 {
        self.0
    }
}

/// A single decoded measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// When this measurement was taken.
    pub time: chrono::NaiveDateTime,
    /// Temperature, in degrees (scale is device-dependent; see
    /// `temperature-unit`).
    pub temperature: f64,
    /// Relative humidity, in percent, or `None` on temperature-only
    /// devices (signalled by an exact-zero raw humidity reading).
    pub humidity: Option<f64>,
    /// Status bits for this record.
    pub flags: Flags,
}

const TERMINATOR: [u8; 8] = [0xFF; 8];

impl Record {
    /// Decodes an 8-byte record. Returns `Ok(None)` for the all-`0xFF`
    /// terminator sentinel that marks the end of recorded data.
    ///
    /// `protocol_version` gates an extra high bit of precision the
    /// device only encodes from version `0x23` onward; below that the
    /// bit is simply unused and, if set, is logged as unexpected.
    pub fn parse(data: &[u8], protocol_version: u8) -> Result<Option<Record>> {
        if data.len() != 8 {
            return Err(Error::InvalidRecordLength(data.len()));
        }
        if data == TERMINATOR {
            return Ok(None);
        }

        let word = u64::from_le_bytes(data.try_into().unwrap());

        let flags = Flags((word & 0xFF) as u8);
        let second = ((word >> 10) & 0x3F) as u32;
        let year = 2000 + ((word >> 16) & 0x7F) as i32;
        let month = ((word >> 23) & 0x0F) as u32;
        let day = ((word >> 27) & 0x1F) as u32;
        let hour = ((word >> 32) & 0x1F) as u32;
        let minute = ((word >> 48) & 0x3F) as u32;

        let mut temperature_raw = ((word >> 37) & 0x7FF) as i64;
        let extra_bit = (word >> 9) & 1;
        if protocol_version >= 0x23 {
            temperature_raw |= (extra_bit as i64) << 10;
        } else if extra_bit != 0 {
            log::warn!("record carries an unexpected high temperature bit for protocol {protocol_version:#04x}");
        }
        if (word >> 8) & 1 != 0 {
            log::warn!("record's reserved bit 8 is set");
        }

        let humidity_raw = ((word >> 54) & 0x3FF) as i64;

        let temperature = if flags.sign1() {
            -(temperature_raw as f64) / 10.0
        } else {
            temperature_raw as f64 / 10.0
        };
        let humidity_signed = if flags.sign2() {
            -(humidity_raw as f64)
        } else {
            humidity_raw as f64
        };
        let humidity = if humidity_raw == 0 { None } else { Some(humidity_signed / 10.0) };

        let time = chrono::NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .ok_or_else(|| {
                Error::InvalidTimestamp(format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"))
            })?;

        Ok(Some(Record {
            time,
            temperature,
            humidity,
            flags,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(
        second: u64,
        minute: u64,
        hour: u64,
        day: u64,
        month: u64,
        year_offset: u64,
        temperature_raw: u64,
        humidity_raw: u64,
        flags: u64,
    ) -> [u8; 8] {
        let word = flags
            | (second << 10)
            | (year_offset << 16)
            | (month << 23)
            | (day << 27)
            | (hour << 32)
            | ((temperature_raw & 0x7FF) << 37)
            | (minute << 48)
            | ((humidity_raw & 0x3FF) << 54);
        word.to_le_bytes()
    }

    #[test]
    fn terminator_is_none() {
        assert_eq!(Record::parse(&[0xFF; 8], 0x20).unwrap(), None);
    }

    #[test]
    fn wrong_length_is_an_error() {
        assert!(Record::parse(&[0; 7], 0x20).is_err());
    }

    #[test]
    fn decodes_the_scenario_table_sample() {
        let data = [0x00, 0xE8, 0x96, 0xD0, 0xD5, 0x19, 0x23, 0x00];
        let record = Record::parse(&data, 0x20).unwrap().unwrap();
        assert_eq!(
            record.time,
            chrono::NaiveDate::from_ymd_opt(2022, 1, 26).unwrap().and_hms_opt(21, 35, 58).unwrap()
        );
        assert_eq!(record.temperature, 20.6);
        assert_eq!(record.humidity, None);
        assert_eq!(record.flags.bits(), 0);
    }

    #[test]
    fn decodes_a_simple_record_with_humidity() {
        // Sign1 (bit 3) clear, Sign2 (bit 6) clear -> both positive.
        let data = pack(30, 15, 9, 5, 6, 24, 215, 450, 0b0000_0010 /* Pause */);
        let record = Record::parse(&data, 0x20).unwrap().unwrap();
        assert_eq!(
            record.time,
            chrono::NaiveDate::from_ymd_opt(2024, 6, 5).unwrap().and_hms_opt(9, 15, 30).unwrap()
        );
        assert_eq!(record.temperature, 21.5);
        assert_eq!(record.humidity, Some(45.0));
        assert!(record.flags.pause());
        assert!(!record.flags.error());
    }

    #[test]
    fn humidity_zero_means_temperature_only() {
        let data = pack(0, 0, 0, 1, 1, 24, 200, 0, 0);
        let record = Record::parse(&data, 0x20).unwrap().unwrap();
        assert_eq!(record.humidity, None);
    }

    #[test]
    fn negative_temperature_uses_sign1_flag() {
        let data = pack(0, 0, 0, 1, 1, 24, 50, 450, 0b0000_1000 /* Sign1 */);
        let record = Record::parse(&data, 0x20).unwrap().unwrap();
        assert_eq!(record.temperature, -5.0);
    }

    #[test]
    fn negative_humidity_uses_sign2_flag() {
        let data = pack(0, 0, 0, 1, 1, 24, 50, 450, 0b0100_0000 /* Sign2 */);
        let record = Record::parse(&data, 0x20).unwrap().unwrap();
        assert_eq!(record.humidity, Some(-45.0));
    }

    #[test]
    fn high_bit_ignored_below_protocol_0x23() {
        let mut data = pack(0, 0, 0, 1, 1, 24, 500, 10, 0);
        data[1] |= 0b0000_0010; // set bit 9
        let record = Record::parse(&data, 0x20).unwrap().unwrap();
        assert_eq!(record.temperature, 50.0);
    }

    #[test]
    fn high_bit_extends_range_from_protocol_0x23() {
        let mut data = pack(0, 0, 0, 1, 1, 24, 500, 10, 0);
        data[1] |= 0b0000_0010; // set bit 9
        let record = Record::parse(&data, 0x23).unwrap().unwrap();
        assert_eq!(record.temperature, (500.0 + 1024.0) / 10.0);
    }
}
