// dir2iso/src/utils.rs
use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{ImageError, Result};

pub const SECTOR_SIZE: usize = 2048;

/// Sectors needed to hold `bytes`, never less than one.
pub fn sectors_for(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_SIZE as u64).max(1)
}

pub fn put_u16_le(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32_le(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u64_le(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u16_be(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

pub fn put_u32_be(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Writes a 16-bit value little-endian followed by big-endian (ECMA-119 7.2.3).
pub fn put_u16_both(buf: &mut [u8], offset: usize, value: u16) {
    put_u16_le(buf, offset, value);
    put_u16_be(buf, offset + 2, value);
}

/// Writes a 32-bit value little-endian followed by big-endian (ECMA-119 7.3.3).
pub fn put_u32_both(buf: &mut [u8], offset: usize, value: u32) {
    put_u32_le(buf, offset, value);
    put_u32_be(buf, offset + 4, value);
}

/// Copies `value` into `field`, filling the remainder with `pad`.
pub fn put_padded(field: &mut [u8], value: &[u8], pad: &[u8]) {
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value[..len]);
    for (i, byte) in field[len..].iter_mut().enumerate() {
        *byte = pad[i % pad.len()];
    }
}

/// A UTC calendar time used for every timestamp written to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Calendar time of `secs` seconds after the Unix epoch, in UTC.
    pub fn from_unix(secs: i64) -> Result<Self> {
        let time = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            ImageError::overflow("recording time", format!("{} is out of range", secs))
        })?;
        Ok(Self {
            year: time.year(),
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
        })
    }

    /// ECMA-119 9.1.5 seven-byte form; zeros when unspecified.
    pub fn iso_record_bytes(time: Option<Timestamp>) -> [u8; 7] {
        match time {
            Some(t) => [
                (t.year - 1900).clamp(0, 255) as u8,
                t.month,
                t.day,
                t.hour,
                t.minute,
                t.second,
                0,
            ],
            None => [0; 7],
        }
    }

    /// ECMA-119 8.4.26.1 seventeen-byte digit form.
    pub fn iso_volume_bytes(time: Option<Timestamp>) -> [u8; 17] {
        let digits = match time {
            Some(t) => format!(
                "{:04}{:02}{:02}{:02}{:02}{:02}00",
                t.year.clamp(0, 9999),
                t.month,
                t.day,
                t.hour,
                t.minute,
                t.second
            ),
            None => "0000000000000000".to_string(),
        };
        let mut out = [0u8; 17];
        out[..16].copy_from_slice(digits.as_bytes());
        out
    }

    /// ECMA-167 1/7.3 timestamp, type 1 (local time) at UTC offset 0.
    pub fn udf_bytes(time: Option<Timestamp>) -> [u8; 12] {
        let mut out = [0u8; 12];
        if let Some(t) = time {
            put_u16_le(&mut out, 0, 0x1000);
            put_u16_le(&mut out, 2, t.year.clamp(1, 9999) as u16);
            out[4] = t.month;
            out[5] = t.day;
            out[6] = t.hour;
            out[7] = t.minute;
            out[8] = t.second;
        }
        out
    }
}
