// dir2iso/src/udf/file_entry.rs
//! File set descriptor, File Entries and File Identifier Descriptors.

use std::path::Path;

use crate::error::{ImageError, Result};
use crate::udf::tag::{
    DOMAIN_ID, TAG_FILE_ENTRY, TAG_FILE_IDENTIFIER, TAG_FILE_SET, charspec, dstring, finish_tag,
    implementation_regid, put_long_ad, regid, udf_suffix,
};
use crate::utils::{SECTOR_SIZE, Timestamp, put_u16_le, put_u32_le, put_u64_le, sectors_for};

/// Fixed part of a File Entry before extended attributes and allocation
/// descriptors.
pub const FE_HEADER_LEN: usize = 176;
const SHORT_AD_LEN: usize = 8;
/// Largest extent one short_ad can describe, kept to whole blocks.
pub const MAX_AD_LEN: u64 = (1 << 30) - SECTOR_SIZE as u64;

const FID_HEADER_LEN: usize = 38;

pub const FILE_TYPE_DIRECTORY: u8 = 4;
pub const FILE_TYPE_FILE: u8 = 5;

pub const CHAR_DIRECTORY: u8 = 0x02;
pub const CHAR_PARENT: u8 = 0x08;

/// Read for everyone.
const FILE_PERMISSIONS: u32 = 0x1084;
/// Read and search for everyone.
const DIRECTORY_PERMISSIONS: u32 = 0x14A5;

fn allocation_descriptor_count(len: u64) -> u64 {
    len.div_ceil(MAX_AD_LEN)
}

/// Fails when the allocation descriptors for `len` bytes would not fit in
/// one File Entry block.
pub fn check_allocation_fits(len: u64, source: &Path) -> Result<()> {
    let needed = FE_HEADER_LEN as u64 + SHORT_AD_LEN as u64 * allocation_descriptor_count(len);
    if needed > SECTOR_SIZE as u64 {
        return Err(ImageError::overflow(
            "UDF allocation descriptors",
            format!(
                "'{}' ({} bytes) needs a {} byte File Entry",
                source.display(),
                len,
                needed
            ),
        ));
    }
    Ok(())
}

/// Length of one File Identifier Descriptor, padded to four bytes.
pub fn fid_len(id_len: usize) -> usize {
    (FID_HEADER_LEN + id_len).next_multiple_of(4)
}

/// Bytes in a directory's identifier stream: the parent entry plus one per
/// child.
pub fn directory_stream_size(child_id_lens: impl IntoIterator<Item = usize>) -> u64 {
    child_id_lens
        .into_iter()
        .fold(fid_len(0) as u64, |total, len| total + fid_len(len) as u64)
}

/// File Set Descriptor (ECMA-167 4/14.1), recorded at logical block 0.
pub fn file_set_descriptor(
    volume_id: &str,
    root_icb: u32,
    recorded: Option<Timestamp>,
) -> Result<Vec<u8>> {
    let mut fsd = vec![0u8; 512];
    fsd[16..28].copy_from_slice(&Timestamp::udf_bytes(recorded));
    put_u16_le(&mut fsd, 28, 3); // Interchange level
    put_u16_le(&mut fsd, 30, 3); // Maximum interchange level
    put_u32_le(&mut fsd, 32, 1); // Character set list
    put_u32_le(&mut fsd, 36, 1); // Maximum character set list
    fsd[48..112].copy_from_slice(&charspec());
    fsd[112..240].copy_from_slice(&dstring("logical volume identifier", volume_id, 128)?);
    fsd[240..304].copy_from_slice(&charspec());
    fsd[304..336].copy_from_slice(&dstring("file set identifier", volume_id, 32)?);
    put_long_ad(&mut fsd, 400, SECTOR_SIZE as u32, root_icb, 0);
    fsd[416..448].copy_from_slice(&regid(DOMAIN_ID, udf_suffix()));
    finish_tag(&mut fsd, TAG_FILE_SET, 0);
    Ok(fsd)
}

/// Everything a File Entry records about one node.
#[derive(Debug, Clone)]
pub struct FileEntryInfo {
    /// Logical block of the entry itself.
    pub lbn: u32,
    pub is_dir: bool,
    /// Information length in bytes.
    pub length: u64,
    /// Logical block where the data or identifier stream starts.
    pub data_lbn: u32,
    pub link_count: u16,
    pub unique_id: u64,
    pub recorded: Option<Timestamp>,
}

/// File Entry (ECMA-167 4/14.9) with short allocation descriptors.
pub fn file_entry(info: &FileEntryInfo) -> Result<Vec<u8>> {
    let ad_count = allocation_descriptor_count(info.length) as usize;
    let ad_len = ad_count * SHORT_AD_LEN;
    if FE_HEADER_LEN + ad_len > SECTOR_SIZE {
        return Err(ImageError::overflow(
            "UDF allocation descriptors",
            format!("{} descriptors for block {}", ad_count, info.lbn),
        ));
    }
    let mut fe = vec![0u8; FE_HEADER_LEN + ad_len];

    // ICB tag
    put_u16_le(&mut fe, 20, 4); // Strategy type
    put_u16_le(&mut fe, 24, 1); // Maximum number of entries
    fe[27] = if info.is_dir {
        FILE_TYPE_DIRECTORY
    } else {
        FILE_TYPE_FILE
    };
    put_u16_le(&mut fe, 34, 0); // Flags: short_ad

    put_u32_le(&mut fe, 36, u32::MAX); // uid
    put_u32_le(&mut fe, 40, u32::MAX); // gid
    put_u32_le(
        &mut fe,
        44,
        if info.is_dir {
            DIRECTORY_PERMISSIONS
        } else {
            FILE_PERMISSIONS
        },
    );
    put_u16_le(&mut fe, 48, info.link_count);
    put_u64_le(&mut fe, 56, info.length);
    let recorded_blocks = if info.length == 0 {
        0
    } else {
        sectors_for(info.length)
    };
    put_u64_le(&mut fe, 64, recorded_blocks);
    let time = Timestamp::udf_bytes(info.recorded);
    for offset in [72, 84, 96] {
        fe[offset..offset + 12].copy_from_slice(&time);
    }
    put_u32_le(&mut fe, 108, 1); // Checkpoint
    fe[128..160].copy_from_slice(&implementation_regid());
    put_u64_le(&mut fe, 160, info.unique_id);
    put_u32_le(&mut fe, 172, ad_len as u32);

    let mut remaining = info.length;
    let mut position = info.data_lbn;
    for index in 0..ad_count {
        let len = remaining.min(MAX_AD_LEN);
        let offset = FE_HEADER_LEN + index * SHORT_AD_LEN;
        put_u32_le(&mut fe, offset, len as u32);
        put_u32_le(&mut fe, offset + 4, position);
        remaining -= len;
        position += (len / SECTOR_SIZE as u64) as u32;
    }

    finish_tag(&mut fe, TAG_FILE_ENTRY, info.lbn);
    Ok(fe)
}

/// One entry of a directory's identifier stream.
#[derive(Debug, Clone)]
pub struct FileIdentifier {
    pub characteristics: u8,
    /// CS0 identifier; empty for the parent entry.
    pub identifier: Vec<u8>,
    pub icb_lbn: u32,
    pub unique_id: u64,
}

impl FileIdentifier {
    pub fn parent(icb_lbn: u32, unique_id: u64) -> Self {
        Self {
            characteristics: CHAR_DIRECTORY | CHAR_PARENT,
            identifier: Vec::new(),
            icb_lbn,
            unique_id,
        }
    }
}

/// File Identifier Descriptors (ECMA-167 4/14.4) packed back to back. Each
/// tag records the block the descriptor starts in.
pub fn directory_stream(stream_lbn: u32, entries: &[FileIdentifier]) -> Result<Vec<u8>> {
    let mut stream = Vec::new();
    for entry in entries {
        let id_len = u8::try_from(entry.identifier.len()).map_err(|_| {
            ImageError::overflow(
                "UDF file identifier",
                format!("{} bytes", entry.identifier.len()),
            )
        })?;
        let mut fid = vec![0u8; fid_len(entry.identifier.len())];
        put_u16_le(&mut fid, 16, 1); // File version number
        fid[18] = entry.characteristics;
        fid[19] = id_len;
        put_long_ad(
            &mut fid,
            20,
            SECTOR_SIZE as u32,
            entry.icb_lbn,
            entry.unique_id as u32,
        );
        put_u16_le(&mut fid, 36, 0); // Implementation use length
        fid[FID_HEADER_LEN..FID_HEADER_LEN + entry.identifier.len()]
            .copy_from_slice(&entry.identifier);

        let location = stream_lbn + (stream.len() / SECTOR_SIZE) as u32;
        finish_tag(&mut fid, TAG_FILE_IDENTIFIER, location);
        stream.extend_from_slice(&fid);
    }
    Ok(stream)
}
