// dir2iso/src/udf/tag.rs
//! Descriptor tag and the small ECMA-167 / OSTA field types shared by every
//! UDF descriptor.

use crate::error::{ImageError, Result};
use crate::names::osta_cs0;
use crate::utils::{put_u16_le, put_u32_le};

/// Crc calculator for descriptor tags (CRC-ITU-T, initial value 0).
const TAG_CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

pub const TAG_LEN: usize = 16;
/// NSR02 descriptors (UDF 1.02).
pub const DESCRIPTOR_VERSION: u16 = 2;
pub const TAG_SERIAL: u16 = 1;
pub const UDF_REVISION: u16 = 0x0102;

pub const TAG_PRIMARY_VOLUME: u16 = 1;
pub const TAG_ANCHOR_POINTER: u16 = 2;
pub const TAG_IMPLEMENTATION_USE: u16 = 4;
pub const TAG_PARTITION: u16 = 5;
pub const TAG_LOGICAL_VOLUME: u16 = 6;
pub const TAG_UNALLOCATED_SPACE: u16 = 7;
pub const TAG_TERMINATING: u16 = 8;
pub const TAG_INTEGRITY: u16 = 9;
pub const TAG_FILE_SET: u16 = 256;
pub const TAG_FILE_IDENTIFIER: u16 = 257;
pub const TAG_FILE_ENTRY: u16 = 261;

pub const DOMAIN_ID: &str = "*OSTA UDF Compliant";
pub const LV_INFO_ID: &str = "*UDF LV Info";
pub const IMPLEMENTATION_ID: &str = "*dir2iso";
pub const NSR02_ID: &str = "+NSR02";

/// Fills in the 16-byte tag at the start of `desc`. The CRC covers every
/// byte after the tag, so the body must be complete.
pub fn finish_tag(desc: &mut [u8], identifier: u16, location: u32) {
    put_u16_le(desc, 0, identifier);
    put_u16_le(desc, 2, DESCRIPTOR_VERSION);
    desc[5] = 0;
    put_u16_le(desc, 6, TAG_SERIAL);
    let body = &desc[TAG_LEN..];
    let crc = TAG_CRC.checksum(body);
    let crc_len = body.len() as u16;
    put_u16_le(desc, 8, crc);
    put_u16_le(desc, 10, crc_len);
    put_u32_le(desc, 12, location);
    desc[4] = tag_checksum(desc);
}

/// Sum of the tag bytes modulo 256, excluding the checksum byte itself.
pub fn tag_checksum(desc: &[u8]) -> u8 {
    desc[..TAG_LEN]
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 4)
        .fold(0u8, |sum, (_, b)| sum.wrapping_add(*b))
}

/// Checks a finished descriptor's tag checksum and CRC.
pub fn verify_tag(desc: &[u8]) -> bool {
    if desc.len() < TAG_LEN || desc[4] != tag_checksum(desc) {
        return false;
    }
    let crc = u16::from_le_bytes([desc[8], desc[9]]);
    let crc_len = u16::from_le_bytes([desc[10], desc[11]]) as usize;
    desc.len() >= TAG_LEN + crc_len && TAG_CRC.checksum(&desc[TAG_LEN..TAG_LEN + crc_len]) == crc
}

/// OSTA CS0 charspec (UDF 2.1.2).
pub fn charspec() -> [u8; 64] {
    let mut spec = [0u8; 64];
    let info = b"OSTA Compressed Unicode";
    spec[1..1 + info.len()].copy_from_slice(info);
    spec
}

/// Entity identifier (ECMA-167 1/7.4) with an identifier suffix.
pub fn regid(identifier: &str, suffix: [u8; 8]) -> [u8; 32] {
    let mut id = [0u8; 32];
    let bytes = identifier.as_bytes();
    let len = bytes.len().min(23);
    id[1..1 + len].copy_from_slice(&bytes[..len]);
    id[24..32].copy_from_slice(&suffix);
    id
}

/// Domain and UDF identifier suffix: the UDF revision then zero flags.
pub fn udf_suffix() -> [u8; 8] {
    let mut suffix = [0u8; 8];
    put_u16_le(&mut suffix, 0, UDF_REVISION);
    suffix
}

pub fn implementation_regid() -> [u8; 32] {
    regid(IMPLEMENTATION_ID, [0; 8])
}

/// Fixed-length dstring: CS0 characters with the used length in the last
/// byte.
pub fn dstring(field: &str, value: &str, len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    let encoded = osta_cs0(value);
    if encoded.len() > len - 1 {
        return Err(ImageError::overflow(
            field,
            format!("'{}' needs {} bytes, the field holds {}", value, encoded.len(), len - 1),
        ));
    }
    out[..encoded.len()].copy_from_slice(&encoded);
    out[len - 1] = encoded.len() as u8;
    Ok(out)
}

/// extent_ad (ECMA-167 3/7.1)
pub fn put_extent_ad(buf: &mut [u8], offset: usize, length: u32, location: u32) {
    put_u32_le(buf, offset, length);
    put_u32_le(buf, offset + 4, location);
}

/// long_ad (ECMA-167 4/14.14.2); the UDF unique id goes in the
/// implementation use bytes.
pub fn put_long_ad(buf: &mut [u8], offset: usize, length: u32, lbn: u32, unique_id: u32) {
    put_u32_le(buf, offset, length);
    put_u32_le(buf, offset + 4, lbn);
    put_u16_le(buf, offset + 8, 0); // partition reference
    put_u16_le(buf, offset + 10, 0); // flags
    put_u32_le(buf, offset + 12, unique_id);
}
