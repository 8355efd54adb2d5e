//! Host scheduler enumerations and their numeric encodings.

use chrono::Weekday;
use serde_json::Value;

use crate::error::{GcsError, GcsResult};
use crate::identity::{DayMask, TargetKind};
use crate::manifest::{Repeat, StopType};

/// Weekdays in the host's index order (0 = Sunday).
const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Set when `day` carries an explicit weekday bitmask.
const DAY_MASK_FLAG: i64 = 0x10000;

/// Bit for each weekday inside a host bitmask, Sunday first.
const DAY_MASK_BITS: [i64; 7] = [0x4000, 0x2000, 0x1000, 0x0800, 0x0400, 0x0200, 0x0100];

/// Named day sets the host understands, beyond single weekdays.
const NAMED_DAYS: [(i64, u8); 7] = [
    (7, 0b111_1111),  // every day
    (8, 0b011_1110),  // Mon-Fri
    (9, 0b100_0001),  // Sat, Sun
    (10, 0b010_1010), // Mon, Wed, Fri
    (11, 0b001_0100), // Tue, Thu
    (12, 0b001_1111), // Sun-Thu
    (13, 0b110_0000), // Fri, Sat
];

/// Odd and even days of the month. No weekday equivalent.
const MONTH_PARITY: [i64; 2] = [14, 15];

impl DayMask {
    pub fn from_host(value: i64) -> GcsResult<Self> {
        if (0..7).contains(&value) {
            return Ok(DayMask::single(WEEK[value as usize]));
        }
        if let Some((_, bits)) = NAMED_DAYS.iter().find(|(code, _)| *code == value) {
            return DayMask::from_bits(*bits).ok_or_else(|| day_error(value));
        }
        if MONTH_PARITY.contains(&value) {
            return Err(GcsError::invalid_field(
                "day",
                format!("{value} (odd/even days of the month) has no weekday equivalent"),
            ));
        }
        if value >= DAY_MASK_FLAG {
            let bits = DAY_MASK_BITS
                .iter()
                .enumerate()
                .filter(|(_, bit)| value & **bit != 0)
                .fold(0u8, |acc, (index, _)| acc | (1 << index));
            return DayMask::from_bits(bits).ok_or_else(|| day_error(value));
        }
        Err(day_error(value))
    }

    /// The host's preferred encoding: a single weekday index or named set
    /// when one matches, a bitmask otherwise.
    pub fn host_code(&self) -> i64 {
        let bits = self.bits();
        if bits.count_ones() == 1 {
            return i64::from(bits.trailing_zeros());
        }
        if let Some((code, _)) = NAMED_DAYS.iter().find(|(_, named)| *named == bits) {
            return *code;
        }
        DAY_MASK_BITS
            .iter()
            .enumerate()
            .filter(|(index, _)| bits & (1 << index) != 0)
            .fold(DAY_MASK_FLAG, |acc, (_, bit)| acc | bit)
    }
}

fn day_error(value: i64) -> GcsError {
    GcsError::invalid_field("day", format!("unknown day value {value}"))
}

impl StopType {
    pub fn from_host(value: i64) -> GcsResult<Self> {
        match value {
            0 => Ok(StopType::Graceful),
            1 => Ok(StopType::Hard),
            2 => Ok(StopType::GracefulLoop),
            other => Err(GcsError::invalid_field("stopType", format!("unknown value {other}"))),
        }
    }

    pub fn host_code(&self) -> i64 {
        match self {
            StopType::Graceful => 0,
            StopType::Hard => 1,
            StopType::GracefulLoop => 2,
        }
    }
}

impl Repeat {
    /// 0 = none, 1 = immediate, n*100 = every n minutes.
    pub fn from_host(value: i64) -> GcsResult<Self> {
        match value {
            0 => Ok(Repeat::None),
            1 => Ok(Repeat::Immediate),
            n if n >= 100 && n % 100 == 0 => u32::try_from(n / 100)
                .map(Repeat::Every)
                .map_err(|_| GcsError::invalid_field("repeat", format!("{n} is out of range"))),
            other => Err(GcsError::invalid_field("repeat", format!("unknown value {other}"))),
        }
    }

    pub fn host_code(&self) -> i64 {
        match self {
            Repeat::None => 0,
            Repeat::Immediate => 1,
            Repeat::Every(minutes) => i64::from(*minutes) * 100,
        }
    }
}

/// Repeat mode when neither the host entry nor the calendar names one.
pub fn default_repeat(kind: TargetKind) -> Repeat {
    match kind {
        TargetKind::Playlist => Repeat::Immediate,
        TargetKind::Sequence | TargetKind::Command => Repeat::None,
    }
}

/// The host stores `enabled` as 0/1; tolerate booleans too.
pub fn enabled_from_host(value: &Value) -> GcsResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        other => Err(GcsError::invalid_field("enabled", format!("expected 0/1, got {other}"))),
    }
}

/// Strip the file extension the host appends to sequence and playlist names.
pub fn strip_target_suffix(target: &str) -> &str {
    target
        .strip_suffix(".fseq")
        .or_else(|| target.strip_suffix(".json"))
        .unwrap_or(target)
}
