//! The typed parameter registry: a process-global table mapping stable
//! names to byte offsets and wire encodings, plus read-modify-write
//! codecs for every variant the device uses.
//!
//! Grounded on the `Parameter` class hierarchy and the `parameters` list
//! in the reference implementation's `parameters.py`.

use std::sync::LazyLock;

use crate::range::Range;
use crate::{Error, Result};

/// Which nibble of a byte a [`Variant::HalfByte`] parameter occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nibble {
    /// Bits 0..4.
    Lower,
    /// Bits 4..8.
    Upper,
}

impl Nibble {
    fn bit_offset(self) -> u8 {
        match self {
            Nibble::Lower => 0,
            Nibble::Upper => 4,
        }
    }
}

/// The wire encoding of a parameter's value.
#[derive(Debug, Clone, Copy)]
pub enum Variant {
    /// Fixed-length ASCII text, zero-padded.
    Str(u8),
    /// `year-2000, month, reserved, day, hour, minute, second` packed
    /// into 7 bytes (the 3rd byte is unused padding in the wire format).
    DateTime,
    /// Big-endian unsigned integer, `len` bytes wide.
    UInt(u8),
    /// A named value occupying `bits` bits starting at `bit_offset`
    /// within the leading byte(s) of the field, background bits
    /// preserved on write.
    Enum {
        /// `(name, value)` table; `value`'s maximum determines the bit
        /// width reserved for this field, so the table's own ceiling
        /// member (often literally named `"MAX"`) matters even though
        /// it is rarely a meaningful setting on its own.
        members: &'static [(&'static str, u64)],
        /// Bit position (from the LSB of the field's first byte) where
        /// the value starts.
        bit_offset: u8,
    },
    /// One bit of a byte, naming the two values instead of displaying
    /// them as `True`/`False`, background bits preserved on write.
    EnumBit {
        /// `(name, value)` pair table; exactly two entries, one per bit
        /// state.
        members: &'static [(&'static str, bool)],
        /// Bit position within the byte.
        bit_offset: u8,
    },
    /// One nibble of a byte, background bits preserved on write.
    HalfByte(Nibble),
    /// One bit of a byte, background bits preserved on write.
    Bit(u8),
    /// Tenths of a degree, sign-magnitude offset-binary 16-bit word;
    /// `0xFFFF` denotes "no reading".
    Float,
    /// Multiples of 10 seconds, packed into a 16-bit word, displayed as
    /// `NdNhNmNs`.
    TimeSpan,
    /// A `±HH:MM` UTC offset packed into a 12-byte field: byte 0's low 5
    /// bits hold `hh` (values above 12 denote a negative offset of
    /// `24-hh` hours), byte 11 holds `mm`; the remaining ten bytes are
    /// opaque and preserved across writes.
    TimeZone,
}

fn bits_for_max(max: u64) -> u8 {
    let mut bits = 0u8;
    while (1u64 << bits) <= max {
        bits += 1;
    }
    bits.max(1)
}

impl Variant {
    /// Byte length this variant occupies on the wire.
    pub fn byte_len(&self) -> u8 {
        match self {
            Variant::Str(l) => *l,
            Variant::DateTime => 7,
            Variant::UInt(l) => *l,
            Variant::Enum { members, bit_offset } => {
                let max = members.iter().map(|(_, v)| *v).max().unwrap_or(0);
                let bits = bits_for_max(max);
                (bits as u16 + *bit_offset as u16).div_ceil(8) as u8
            }
            Variant::EnumBit { .. } | Variant::HalfByte(_) | Variant::Bit(_) => 1,
            Variant::Float | Variant::TimeSpan => 2,
            Variant::TimeZone => 12,
        }
    }
}

/// Extracts a `bits`-wide field starting at `bit_offset` from `data`,
/// preserving the same per-byte masking the reference implementation
/// uses (first and last byte of a multi-byte field are masked, interior
/// bytes aren't).
fn extract_bits(data: &[u8], bits: u8, bit_offset: u8) -> u64 {
    let len = (bits as u16 + bit_offset as u16).div_ceil(8) as usize;
    let mut value: u64 = 0;
    for (b, byte) in data.iter().take(len).enumerate() {
        let mask = byte_mask(b, len, bits, bit_offset);
        value = (value << 8) | (byte & mask) as u64;
    }
    value >> bit_offset
}

/// Merges a `bits`-wide `value` at `bit_offset` into `background`,
/// leaving every other bit of `background` untouched.
fn merge_bits(background: &[u8], value: u64, bits: u8, bit_offset: u8) -> Vec<u8> {
    let len = (bits as u16 + bit_offset as u16).div_ceil(8) as usize;
    let mut out = background.to_vec();
    let mut shifted = value << bit_offset;
    for b in (0..len).rev() {
        let mask = byte_mask(b, len, bits, bit_offset);
        out[b] = (shifted as u8 & mask) | (out[b] & !mask);
        shifted >>= 8;
    }
    out
}

fn byte_mask(b: usize, len: usize, bits: u8, bit_offset: u8) -> u8 {
    if len == 1 {
        (((1u16 << bits) - 1) << bit_offset) as u8
    } else if b == 0 {
        (((1u16 << ((bits as u16 + bit_offset as u16 - 1) % 8 + 1)) - 1)) as u8
    } else if b == len - 1 {
        ((0xFFu16 << bit_offset) & 0xFF) as u8
    } else {
        0xFF
    }
}

/// A decoded or to-be-encoded parameter value.
///
/// For [`Variant::Enum`] this is the *raw* numeric value, not a resolved
/// member name: the device can (and does, for unused/reserved settings)
/// echo back values with no matching member, and read-modify-write must
/// round-trip them unchanged. The name lookup for display happens at
/// formatting time and only warns, it never discards the raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// [`Variant::Str`].
    Str(String),
    /// [`Variant::DateTime`].
    DateTime(chrono::NaiveDateTime),
    /// [`Variant::UInt`].
    UInt(u64),
    /// [`Variant::Enum`], raw.
    Enum(u64),
    /// [`Variant::EnumBit`].
    EnumBit(bool),
    /// [`Variant::HalfByte`].
    Nibble(u8),
    /// [`Variant::Bit`].
    Bit(bool),
    /// [`Variant::Float`], raw sign-magnitude offset-binary word.
    FloatRaw(u16),
    /// [`Variant::TimeSpan`], raw tens-of-seconds.
    TimeSpanRaw(u16),
    /// [`Variant::TimeZone`], signed minutes offset from UTC.
    TimeZoneMinutes(i32),
}

/// A stable-named parameter's location and wire encoding.
pub struct Descriptor {
    /// Stable, CLI-facing name (e.g. `"temperature-sensor-unit"`).
    pub name: &'static str,
    /// One-line human description, shown by `parameter list`.
    pub description: &'static str,
    /// Byte offset in device memory.
    pub offset: u32,
    /// Whether `parameter set`/`address set` may write this parameter.
    pub writable: bool,
    /// Whether this parameter must never be overwritten implicitly as a
    /// side effect of writing a range that happens to contain it.
    pub immutable: bool,
    /// The wire encoding.
    pub variant: Variant,
}

impl Descriptor {
    /// This parameter's address range.
    pub fn range(&self) -> Range {
        Range::new(self.offset as i64, self.variant.byte_len() as i64).expect("validated statically")
    }
}

/// A parameter descriptor paired with a possibly-absent decoded value.
///
/// Mirrors the reference implementation's pattern of keeping the raw
/// wire offset/background bytes alongside a lazily-validated value: a
/// value of `None` means "could not be determined" (an out-of-range
/// enum member, invalid timezone bytes, or input that failed to parse)
/// and, on write, falls back to leaving the background bytes untouched.
pub struct ParamInstance {
    /// The parameter this instance is for.
    pub descriptor: &'static Descriptor,
    /// The decoded/parsed value, if any.
    pub value: Option<Value>,
}

impl ParamInstance {
    /// A fresh, valueless instance.
    pub fn new(descriptor: &'static Descriptor) -> Self {
        Self {
            descriptor,
            value: None,
        }
    }

    /// Decodes `data` (exactly [`Descriptor::range`]'s length) into a
    /// value, warning and leaving it unset if that isn't possible.
    pub fn from_data(descriptor: &'static Descriptor, data: &[u8]) -> Self {
        let value = decode(&descriptor.variant, data, descriptor.name);
        Self { descriptor, value }
    }

    /// Parses `text` into this parameter's value. Most variants store a
    /// warning and leave the value unset on malformed input; a
    /// `DateTime` parse failure is reported as an `Err` instead, matching
    /// the one variant whose reference parser has no internal recovery
    /// and must abort the caller's parameter list instead.
    pub fn parse_value(mut self, text: &str) -> Result<Self> {
        self.value = parse_value(&self.descriptor.variant, text, self.descriptor.name)?;
        Ok(self)
    }

    /// Encodes the current value back to wire bytes, merging sub-byte
    /// variants into `old_bytes` (the field's current on-device
    /// contents). Whole-byte variants ignore `old_bytes` entirely.
    pub fn to_bytes(&self, old_bytes: &[u8]) -> Vec<u8> {
        encode(&self.descriptor.variant, self.value.as_ref(), old_bytes)
    }

    /// Renders the current value the way `parameter get`/`parameter list`
    /// display it; `""` if unset.
    pub fn display(&self) -> String {
        match &self.value {
            None => String::new(),
            Some(v) => display_value(&self.descriptor.variant, v, self.descriptor.name),
        }
    }
}

fn decode(variant: &Variant, data: &[u8], name: &str) -> Option<Value> {
    match variant {
        Variant::Str(_) => Some(Value::Str(
            String::from_utf8_lossy(data)
                .trim_end_matches('\0')
                .to_string(),
        )),
        Variant::DateTime => {
            let year = 2000 + data[0] as i32;
            let (month, day, hour, minute, second) = (data[1], data[3], data[4], data[5], data[6]);
            chrono::NaiveDate::from_ymd_opt(year, month as u32, day as u32)
                .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32))
                .map(Value::DateTime)
                .or_else(|| {
                    log::warn!("parameter {name}: invalid date/time in raw data");
                    None
                })
        }
        Variant::UInt(len) => {
            let mut value: u64 = 0;
            for b in &data[..*len as usize] {
                value = (value << 8) | *b as u64;
            }
            Some(Value::UInt(value))
        }
        Variant::Enum { members, bit_offset } => {
            let max = members.iter().map(|(_, v)| *v).max().unwrap_or(0);
            Some(Value::Enum(extract_bits(data, bits_for_max(max), *bit_offset)))
        }
        Variant::EnumBit { .. } => Some(Value::EnumBit(extract_bits(data, 1, variant_enum_bit_offset(variant)) != 0)),
        Variant::HalfByte(nibble) => Some(Value::Nibble(extract_bits(data, 4, nibble.bit_offset()) as u8)),
        Variant::Bit(bit_offset) => Some(Value::Bit(extract_bits(data, 1, *bit_offset) != 0)),
        Variant::Float => Some(Value::FloatRaw(u16::from_be_bytes([data[0], data[1]]))),
        Variant::TimeSpan => Some(Value::TimeSpanRaw(u16::from_be_bytes([data[0], data[1]]))),
        Variant::TimeZone => {
            let h = data[0] & 0x1F;
            let m = data[11];
            if h > 24 || m >= 60 || (h == 12 && m != 0) {
                log::warn!("parameter {name}: invalid timezone data h={h}, m={m}");
                None
            } else if h > 12 {
                Some(Value::TimeZoneMinutes(-(((24 - h) as i32) * 60 + m as i32)))
            } else {
                Some(Value::TimeZoneMinutes(h as i32 * 60 + m as i32))
            }
        }
    }
}

/// Extracts the bit offset back out of a [`Variant::EnumBit`]; panics on
/// any other variant (internal helper, only ever called with one in
/// hand).
fn variant_enum_bit_offset(variant: &Variant) -> u8 {
    match variant {
        Variant::EnumBit { bit_offset, .. } => *bit_offset,
        _ => unreachable!(),
    }
}

fn encode(variant: &Variant, value: Option<&Value>, old_bytes: &[u8]) -> Vec<u8> {
    let len = variant.byte_len() as usize;
    match (variant, value) {
        (Variant::Str(_), Some(Value::Str(s))) => {
            let bytes = s.as_bytes();
            let mut out = bytes.to_vec();
            if bytes.len() < len {
                out.extend(std::iter::repeat_n(0u8, len - bytes.len()));
            }
            out
        }
        (Variant::Str(_), _) => vec![0u8; len],

        (Variant::DateTime, Some(Value::DateTime(dt))) => {
            use chrono::{Datelike, Timelike};
            vec![
                (dt.year() - 2000).max(0) as u8,
                dt.month() as u8,
                0,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
            ]
        }
        (Variant::DateTime, _) => vec![0u8; 7],

        (Variant::UInt(l), Some(Value::UInt(v))) => {
            let mut out = vec![0u8; *l as usize];
            let bytes = v.to_be_bytes();
            out.copy_from_slice(&bytes[bytes.len() - *l as usize..]);
            out
        }
        (Variant::UInt(l), _) => vec![0u8; *l as usize],

        (Variant::Enum { members, bit_offset }, Some(Value::Enum(raw))) => {
            let max = members.iter().map(|(_, v)| *v).max().unwrap_or(0);
            merge_bits(&background(old_bytes, len), *raw, bits_for_max(max), *bit_offset)
        }
        (Variant::Enum { .. }, _) => background(old_bytes, len),

        (Variant::EnumBit { bit_offset, .. }, Some(Value::EnumBit(v))) => {
            merge_bits(&background(old_bytes, len), *v as u64, 1, *bit_offset)
        }
        (Variant::EnumBit { .. }, _) => background(old_bytes, len),

        (Variant::HalfByte(nibble), Some(Value::Nibble(v))) => {
            merge_bits(&background(old_bytes, len), *v as u64, 4, nibble.bit_offset())
        }
        (Variant::HalfByte(_), _) => background(old_bytes, len),

        (Variant::Bit(bit_offset), Some(Value::Bit(v))) => {
            merge_bits(&background(old_bytes, len), *v as u64, 1, *bit_offset)
        }
        (Variant::Bit(_), _) => background(old_bytes, len),

        (Variant::Float, Some(Value::FloatRaw(raw))) => raw.to_be_bytes().to_vec(),
        (Variant::Float, _) => vec![0u8; 2],

        (Variant::TimeSpan, Some(Value::TimeSpanRaw(raw))) => raw.to_be_bytes().to_vec(),
        (Variant::TimeSpan, _) => vec![0u8; 2],

        (Variant::TimeZone, Some(Value::TimeZoneMinutes(minutes))) => {
            let mut out = background(old_bytes, len);
            // Asymmetric masking (0x1F negative, 0x0F non-negative) matches
            // the reference implementation's own `__bytes__` exactly.
            if *minutes < 0 {
                let magnitude = (-*minutes) as i64;
                let h = (24 - magnitude / 60) as u8;
                out[0] = (out[0] & 0xE0) | (h & 0x1F);
                out[11] = (magnitude % 60) as u8;
            } else {
                let h = (*minutes / 60) as u8;
                out[0] = (out[0] & 0xE0) | (h & 0x0F);
                out[11] = (*minutes % 60) as u8;
            }
            out
        }
        (Variant::TimeZone, _) => background(old_bytes, len),
    }
}

fn background(old_bytes: &[u8], len: usize) -> Vec<u8> {
    if old_bytes.len() == len {
        old_bytes.to_vec()
    } else {
        vec![0u8; len]
    }
}

fn display_value(variant: &Variant, value: &Value, name: &str) -> String {
    match (variant, value) {
        (Variant::Str(_), Value::Str(s)) => s.clone(),
        (Variant::DateTime, Value::DateTime(dt)) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        (Variant::UInt(len), Value::UInt(v)) => format!("{:#0width$x}", v, width = 2 + 2 * *len as usize),
        (Variant::Enum { members, .. }, Value::Enum(raw)) => members
            .iter()
            .find(|(_, v)| v == raw)
            .map(|(n, _)| n.to_string())
            .unwrap_or_else(|| {
                log::warn!("parameter {name}: raw value {raw} matches no known member");
                String::new()
            }),
        (Variant::EnumBit { members, .. }, Value::EnumBit(v)) => members
            .iter()
            .find(|(_, b)| b == v)
            .map(|(n, _)| n.to_string())
            .unwrap_or_default(),
        (Variant::HalfByte(_), Value::Nibble(v)) => format!("{v:#04x}"),
        (Variant::Bit(_), Value::Bit(v)) => if *v { "True" } else { "False" }.to_string(),
        (Variant::Float, Value::FloatRaw(raw)) => format_float(*raw),
        (Variant::TimeSpan, Value::TimeSpanRaw(raw)) => format_timespan(*raw),
        (Variant::TimeZone, Value::TimeZoneMinutes(m)) => format_timezone(*m),
        _ => unreachable!("value variant mismatched with descriptor variant"),
    }
}

fn float_of_raw(raw: u16) -> f64 {
    if raw == 0xFFFF {
        f64::NAN
    } else if raw < 0x8000 {
        raw as f64 / 10.0
    } else {
        -((raw - 0x8000) as f64) / 10.0
    }
}

fn format_float(raw: u16) -> String {
    let v = float_of_raw(raw);
    if v.is_nan() {
        "nan".to_string()
    } else {
        format!("{v}")
    }
}

fn format_timespan(raw: u16) -> String {
    let mut seconds = raw as i64 * 10;
    let days = seconds / 86400;
    seconds %= 86400;
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    seconds %= 60;
    let mut out = String::new();
    if days != 0 {
        out.push_str(&format!("{days}d"));
    }
    if hours != 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes != 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds != 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

fn format_timezone(minutes: i32) -> String {
    let sign = if minutes < 0 { "-" } else { "+" };
    let minutes = minutes.abs();
    format!("{sign}{:02}{:02}", minutes / 60, minutes % 60)
}

fn parse_value(variant: &Variant, text: &str, name: &str) -> Result<Option<Value>> {
    let text = text.trim();
    Ok(match variant {
        Variant::Str(len) => {
            if text.len() > *len as usize {
                log::warn!("parameter {name}: value too long, truncating to {len} bytes");
                Some(Value::Str(text.chars().take(*len as usize).collect()))
            } else {
                Some(Value::Str(text.to_string()))
            }
        }
        Variant::DateTime => {
            match chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
                Ok(dt) => Some(Value::DateTime(dt)),
                Err(_) => {
                    log::warn!("invalid value for parameter: {name}");
                    return Err(Error::InvalidTimestamp(text.to_string()));
                }
            }
        }
        Variant::UInt(len) => match parse_int(text) {
            Some(v) if v < (1u128 << (8 * *len)) => Some(Value::UInt(v as u64)),
            _ => {
                log::warn!("parameter {name}: value out of range for {len}-byte unsigned integer");
                None
            }
        },
        Variant::Enum { members, .. } => match members.iter().find(|(n, _)| *n == text) {
            Some((_, v)) => Some(Value::Enum(*v)),
            None => {
                log::warn!("parameter {name}: unknown member \"{text}\"");
                None
            }
        },
        Variant::EnumBit { members, .. } => match members.iter().find(|(n, _)| *n == text) {
            Some((_, v)) => Some(Value::EnumBit(*v)),
            None => {
                log::warn!("parameter {name}: unknown member \"{text}\"");
                None
            }
        },
        Variant::HalfByte(_) => match parse_int(text) {
            Some(v) if v < 16 => Some(Value::Nibble(v as u8)),
            _ => {
                log::warn!("parameter {name}: value must fit in a nibble (0-15)");
                None
            }
        },
        Variant::Bit(_) => match text {
            "True" | "true" | "1" => Some(Value::Bit(true)),
            "False" | "false" | "0" => Some(Value::Bit(false)),
            _ => {
                log::warn!("parameter {name}: expected True/False");
                None
            }
        },
        Variant::Float => match text.parse::<f64>() {
            Ok(v) if v.is_nan() || v.is_infinite() => Some(Value::FloatRaw(0xFFFF)),
            Ok(v) => {
                let raw = (10.0 * v).round();
                if !(-32766.0..=32767.0).contains(&raw) {
                    log::warn!("parameter {name}: value out of range");
                    None
                } else if raw >= 0.0 {
                    Some(Value::FloatRaw(raw as u16))
                } else {
                    Some(Value::FloatRaw(0x8000 + (-raw) as u16))
                }
            }
            Err(_) => {
                log::warn!("parameter {name}: invalid float value");
                None
            }
        },
        Variant::TimeSpan => match parse_timespan(text) {
            Some(seconds) => {
                if seconds % 10 != 0 {
                    log::warn!("parameter {name}: truncating to a multiple of 10 seconds");
                }
                Some(Value::TimeSpanRaw((seconds / 10) as u16))
            }
            None => {
                log::warn!("parameter {name}: invalid timespan \"{text}\"");
                None
            }
        },
        Variant::TimeZone => match parse_timezone(text) {
            Some(minutes) => Some(Value::TimeZoneMinutes(minutes)),
            None => {
                log::warn!("parameter {name}: invalid timezone \"{text}\"");
                None
            }
        },
    })
}

fn parse_int(text: &str) -> Option<u128> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u128::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u128::from_str_radix(bin, 2).ok()
    } else {
        text.parse().ok()
    }
}

fn parse_timespan(text: &str) -> Option<i64> {
    let mut seconds: i64 = 0;
    let mut digits = String::new();
    let mut saw_any = false;
    for c in text.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'd' | 'h' | 'm' | 's' => {
                let n: i64 = digits.parse().ok()?;
                digits.clear();
                saw_any = true;
                seconds += n
                    * match c {
                        'd' => 86400,
                        'h' => 3600,
                        'm' => 60,
                        's' => 1,
                        _ => unreachable!(),
                    };
            }
            _ => return None,
        }
    }
    if !digits.is_empty() || !saw_any {
        return None;
    }
    Some(seconds)
}

fn parse_timezone(text: &str) -> Option<i32> {
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    if rest.len() != 4 || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = rest[0..2].parse().ok()?;
    let minutes: i32 = rest[2..4].parse().ok()?;
    if hours > 12 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

macro_rules! enum_table {
    ($name:ident: $( $member:literal => $value:expr ),+ $(,)?) => {
        pub static $name: &[(&str, u64)] = &[ $( ($member, $value) ),+ ];
    };
}

macro_rules! enum_bit_table {
    ($name:ident: $( $member:literal => $value:expr ),+ $(,)?) => {
        pub static $name: &[(&str, bool)] = &[ $( ($member, $value) ),+ ];
    };
}

enum_table!(PDF_LANGUAGES: "en" => 0x00, "zh" => 0x01, "es" => 0x02, "MAX" => 0xFF);
enum_table!(START_MODES: "Immediate" => 0b000, "Manual" => 0b001, "Timer" => 0b010, "MAX" => 0b111);
enum_table!(SENSOR_TYPES: "NoInformation" => 0b00, "GlycolBottle" => 0b01, "MAX" => 0b11);
enum_table!(DEVICE_STATES: "MAX" => 0b111_1111);
enum_table!(STOP_MODES: "Manual" => 0b000, "Temporary" => 0b011, "MAX" => 0b111);
enum_bit_table!(TEMPERATURE_UNITS: "Celsius" => false, "Farenheit" => true);
enum_bit_table!(SENSOR_LOCATIONS: "Internal" => false, "External" => true);

macro_rules! param {
    ($name:literal, $desc:literal, $offset:expr, $writable:expr, $immutable:expr, $variant:expr) => {
        Descriptor {
            name: $name,
            description: $desc,
            offset: $offset,
            writable: $writable,
            immutable: $immutable,
            variant: $variant,
        }
    };
}

/// The full, ordered parameter table, addresses and encodings as used on
/// the wire.
///
/// `travel-number` is given length 13 rather than the reference
/// implementation's 7: the source catalog has two historical revisions
/// disagreeing on this field's length, and the longer one is used here
/// (see `DESIGN.md`). `configuration-time` is the sole parameter marked
/// immutable; the reference command layer hardcodes exactly this one
/// exception rather than a general per-parameter flag.
pub static PARAMETERS: LazyLock<Vec<Descriptor>> = LazyLock::new(|| {
    vec![
        param!("model", "Product id of the device from its memory", 0x00, false, false, Variant::UInt(2)),
        param!("serial-number", "Serial number of the device", 0x02, false, false, Variant::Str(12)),
        param!("travel-number", "Travel number", 0x10, true, false, Variant::Str(13)),
        param!(
            "pdf-language",
            "Language to be used in the PDF",
            0x1D,
            true,
            false,
            Variant::Enum { members: PDF_LANGUAGES, bit_offset: 0 }
        ),
        param!(
            "product-properties",
            "Properties of the product",
            0x1E,
            false,
            false,
            Variant::HalfByte(Nibble::Lower)
        ),
        param!("light-on", "Control device light (if available)", 0x1E, true, false, Variant::Bit(4)),
        param!(
            "allow-cycle",
            "Allow overwriting old data when the memory is full",
            0x1E,
            true,
            false,
            Variant::Bit(7)
        ),
        param!("firmware-version", "Version number of the firmware", 0x1F, false, false, Variant::UInt(1)),
        param!(
            "start-mode",
            "Recording start mode",
            0x20,
            true,
            false,
            Variant::Enum { members: START_MODES, bit_offset: 0 }
        ),
        param!("button-stop", "The device can be stopped by button", 0x20, true, false, Variant::Bit(3)),
        param!("software-stop", "The device can be stopped by software", 0x20, true, false, Variant::Bit(4)),
        param!(
            "repeat",
            "Allow a new recording to be started without reading the previous one",
            0x20,
            true,
            false,
            Variant::Bit(6)
        ),
        param!(
            "pause-allowed",
            "Authorize the recording to be paused",
            0x20,
            true,
            false,
            Variant::Bit(7)
        ),
        param!(
            "pdf-password-protected",
            "Protect PDF file with a password",
            0x21,
            true,
            false,
            Variant::Bit(0)
        ),
        param!(
            "temperature-sensor-location",
            "Temperature sensor to be used",
            0x21,
            true,
            false,
            Variant::EnumBit { members: SENSOR_LOCATIONS, bit_offset: 1 }
        ),
        param!(
            "humidity-sensor-location",
            "Humidity sensor to be used",
            0x21,
            true,
            false,
            Variant::EnumBit { members: SENSOR_LOCATIONS, bit_offset: 2 }
        ),
        param!(
            "temperature-sensor-unit",
            "Unit for the temperature record",
            0x21,
            true,
            false,
            Variant::EnumBit { members: TEMPERATURE_UNITS, bit_offset: 3 }
        ),
        param!(
            "temperature-alarm-mode",
            "Operation mode of temperature alarm",
            0x21,
            true,
            false,
            Variant::Bit(4)
        ),
        param!(
            "humidity-alarm-mode",
            "Operation mode of humidity alarm",
            0x21,
            true,
            false,
            Variant::Bit(6)
        ),
        param!("high-temperature-alarm3-type", "High temperature alarm 3 type", 0x22, true, false, Variant::Bit(0)),
        param!("high-temperature-alarm2-type", "High temperature alarm 2 type", 0x22, true, false, Variant::Bit(1)),
        param!("high-temperature-alarm1-type", "High temperature alarm 1 type", 0x22, true, false, Variant::Bit(2)),
        param!("low-temperature-alarm1-type", "Low temperature alarm 1 type", 0x22, true, false, Variant::Bit(3)),
        param!("low-temperature-alarm2-type", "Low temperature alarm 2 type", 0x22, true, false, Variant::Bit(4)),
        param!("low-temperature-alarm3-type", "Low temperature alarm 3 type", 0x22, true, false, Variant::Bit(5)),
        param!("high-humidity-alarm-type", "High humidity alarm type", 0x22, true, false, Variant::Bit(6)),
        param!("low-humidity-alarm-type", "Low humidity alarm type", 0x22, true, false, Variant::Bit(7)),
        param!(
            "exact-sensor-type",
            "Additional information on the temperature sensor type",
            0x23,
            true,
            false,
            Variant::Enum { members: SENSOR_TYPES, bit_offset: 0 }
        ),
        param!(
            "light-intensity",
            "Intensity of the light of the device",
            0x23,
            true,
            false,
            Variant::HalfByte(Nibble::Upper)
        ),
        param!("timezone", "Timezone for the time parameters", 0x24, true, false, Variant::TimeZone),
        param!(
            "device-state",
            "Current state of the device",
            0x25,
            false,
            false,
            Variant::Enum { members: DEVICE_STATES, bit_offset: 0 }
        ),
        param!(
            "actual-stop-mode",
            "How the device actually stopped",
            0x26,
            false,
            false,
            Variant::Enum { members: STOP_MODES, bit_offset: 0 }
        ),
        param!(
            "temporary-pdf",
            "Generate a PDF file even if the device is temporarily stopped",
            0x26,
            true,
            false,
            Variant::Bit(3)
        ),
        param!("display-time", "Show elapsed time on the device", 0x26, true, false, Variant::Bit(4)),
        param!(
            "battery-level",
            "Current charging level of the battery",
            0x27,
            false,
            false,
            Variant::HalfByte(Nibble::Lower)
        ),
        param!("csv", "Encode measurement data in PDF file", 0x27, true, false, Variant::Bit(4)),
        param!(
            "configuration-time",
            "Time at which the device was last configured",
            0x28,
            true,
            true,
            Variant::DateTime
        ),
        param!("start-time", "Time at which recording started", 0x30, false, false, Variant::DateTime),
        param!("stop-time", "Time at which recording stopped", 0x38, false, false, Variant::DateTime),
        param!(
            "start-delay",
            "Delay to wait before starting in \"Timer\" start mode",
            0x40,
            true,
            false,
            Variant::UInt(2)
        ),
        param!("device-capacity", "Device capacity (in records)", 0x42, false, false, Variant::UInt(4)),
        param!("record-number", "Number of records currently in memory", 0x48, false, false, Variant::UInt(2)),
        param!("interval", "Time span between samples", 0x4C, true, false, Variant::TimeSpan),
        param!("password", "Password used to protect PDF files", 0x80, true, false, Variant::Str(6)),
        param!("device-time", "Current device time", 0x88, false, false, Variant::DateTime),
        param!("protocol-version", "Version number of the protocol", 0x95, false, false, Variant::UInt(1)),
    ]
});

/// Looks up a parameter by its stable name.
pub fn find(name: &str) -> Result<&'static Descriptor> {
    PARAMETERS
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| Error::UnknownParameter(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_parameter_name_is_unique() {
        let mut names: Vec<&str> = PARAMETERS.iter().map(|d| d.name).collect();
        names.sort_unstable();
        let mut dedup = names.clone();
        dedup.dedup();
        assert_eq!(names, dedup);
    }

    #[test]
    fn find_unknown_fails() {
        assert!(find("not-a-real-parameter").is_err());
    }

    #[test]
    fn bit_roundtrip_preserves_background() {
        let d = find("light-on").unwrap();
        let old = vec![0b1110_1111];
        let inst = ParamInstance::new(d);
        let mut inst = inst.parse_value("True").unwrap();
        assert_eq!(inst.to_bytes(&old), vec![0b1111_1111]);
        inst = inst.parse_value("False").unwrap();
        assert_eq!(inst.to_bytes(&old), vec![0b1110_1111]);
    }

    #[test]
    fn halfbyte_roundtrip_preserves_other_nibble() {
        let d = find("light-intensity").unwrap();
        let old = vec![0x0A];
        let inst = ParamInstance::new(d).parse_value("0x5").unwrap();
        assert_eq!(inst.to_bytes(&old), vec![0x5A]);
    }

    #[test]
    fn enum_bit_displays_member_name_not_boolean() {
        let d = find("temperature-sensor-unit").unwrap();
        let inst = ParamInstance::from_data(d, &[0b0000_1000]);
        assert_eq!(inst.display(), "Farenheit");
        let inst = ParamInstance::from_data(d, &[0x00]);
        assert_eq!(inst.display(), "Celsius");
    }

    #[test]
    fn enum_bit_roundtrip_preserves_background() {
        let d = find("humidity-sensor-location").unwrap();
        let old = vec![0b1111_1011];
        let inst = ParamInstance::new(d).parse_value("External").unwrap();
        assert_eq!(inst.to_bytes(&old), vec![0b1111_1111]);
    }

    #[test]
    fn float_encodes_negative_as_offset_binary() {
        let d = find("interval").unwrap();
        // interval is actually a TimeSpan; exercise Float via a made-up
        // descriptor instead, directly against the codec functions.
        let v = parse_value(&Variant::Float, "-1.5", "t").unwrap().unwrap();
        assert_eq!(v, Value::FloatRaw(0x800F));
        assert_eq!(encode(&Variant::Float, Some(&v), &[]), vec![0x80, 15]);
        assert_eq!(format_float(0x800F), "-1.5");
        let _ = d;
    }

    #[test]
    fn float_nan_sentinel() {
        assert_eq!(format_float(0xFFFF), "nan");
    }

    #[test]
    fn timespan_formats_and_parses() {
        assert_eq!(format_timespan(6), "1m");
        assert_eq!(parse_timespan("1h30m").unwrap(), 5400);
    }

    #[test]
    fn timezone_decodes_documented_layout() {
        // h=5 (low 5 bits of byte 0), m=30 at byte 11.
        let mut data = vec![0u8; 12];
        data[0] = 5;
        data[11] = 30;
        let value = decode(&Variant::TimeZone, &data, "timezone").unwrap();
        assert_eq!(value, Value::TimeZoneMinutes(330));
        assert_eq!(format_timezone(330), "+0530");
    }

    #[test]
    fn timezone_negative_offset_uses_24_minus_hh() {
        // h=19 means -(24-19)=-5 hours.
        let mut data = vec![0u8; 12];
        data[0] = 19;
        data[11] = 30;
        let value = decode(&Variant::TimeZone, &data, "timezone").unwrap();
        assert_eq!(value, Value::TimeZoneMinutes(-(5 * 60 + 30)));
    }

    #[test]
    fn timezone_roundtrip_preserves_interior_bytes() {
        let old = vec![0xFFu8; 12]; // interior bytes carry unrelated parameters
        let inst = ParamInstance::new(find("timezone").unwrap()).parse_value("-0530").unwrap();
        let encoded = inst.to_bytes(&old);
        assert_eq!(encoded[11], 30);
        assert_eq!(encoded[0] & 0x1F, 19);
        assert_eq!(&encoded[1..11], &old[1..11]);
    }

    #[test]
    fn timezone_invalid_raw_data_is_unset() {
        let mut data = vec![0u8; 12];
        data[0] = 12;
        data[11] = 1; // h==12 but m!=0 is invalid
        assert_eq!(decode(&Variant::TimeZone, &data, "timezone"), None);
    }

    #[test]
    fn datetime_decodes_month_from_byte_one() {
        // year=24, month=6, reserved, day=5, hour=9, minute=15, second=30
        let data = [24, 6, 0xAA, 5, 9, 15, 30];
        let value = decode(&Variant::DateTime, &data, "t").unwrap();
        assert_eq!(
            value,
            Value::DateTime(chrono::NaiveDate::from_ymd_opt(2024, 6, 5).unwrap().and_hms_opt(9, 15, 30).unwrap())
        );
    }

    #[test]
    fn datetime_encodes_month_into_byte_one() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 6, 5).unwrap().and_hms_opt(9, 15, 30).unwrap();
        let bytes = encode(&Variant::DateTime, Some(&Value::DateTime(dt)), &[]);
        assert_eq!(bytes, vec![24, 6, 0, 5, 9, 15, 30]);
    }

    #[test]
    fn datetime_parse_failure_is_a_hard_error() {
        let d = find("configuration-time").unwrap();
        let inst = ParamInstance::new(d);
        assert!(inst.parse_value("not-a-date").is_err());
    }

    #[test]
    fn enum_member_named_max_is_selectable() {
        let d = find("pdf-language").unwrap();
        let inst = ParamInstance::new(d).parse_value("MAX").unwrap();
        assert_eq!(inst.value, Some(Value::Enum(0xFF)));
    }

    #[test]
    fn only_configuration_time_is_immutable() {
        let immutable: Vec<&str> = PARAMETERS.iter().filter(|d| d.immutable).map(|d| d.name).collect();
        assert_eq!(immutable, vec!["configuration-time"]);
    }
}
