// dir2iso/src/iso/volume_descriptor.rs
use crate::layout::PathTableLayout;
use crate::names::ucs2_be;
use crate::utils::{SECTOR_SIZE, Timestamp, put_padded, put_u16_both, put_u32_be, put_u32_both, put_u32_le};

pub const ISO_VOLUME_DESCRIPTOR_TERMINATOR: u8 = 255;
pub const ISO_VOLUME_DESCRIPTOR_PRIMARY: u8 = 1;
pub const ISO_VOLUME_DESCRIPTOR_SUPPLEMENTARY: u8 = 2;
pub const ISO_ID: &[u8] = b"CD001";
pub const ISO_VERSION: u8 = 1;
/// UCS-2 level 3 escape sequence marking a Joliet descriptor.
pub const JOLIET_ESCAPE: &[u8] = b"%/E";
pub const APPLICATION_ID: &str = "DIR2ISO";

pub const PVD_SYSTEM_ID_OFFSET: usize = 8;
pub const PVD_VOLUME_ID_OFFSET: usize = 40;
pub const PVD_TOTAL_SECTORS_OFFSET: usize = 80;
pub const PVD_ESCAPE_SEQUENCES_OFFSET: usize = 88;
pub const PVD_VOL_SET_SIZE_OFFSET: usize = 120;
pub const PVD_VOL_SEQ_NUM_OFFSET: usize = 124;
pub const PVD_LOGICAL_BLOCK_SIZE_OFFSET: usize = 128;
pub const PVD_PATH_TABLE_SIZE_OFFSET: usize = 132;
pub const PVD_L_PATH_TABLE_OFFSET: usize = 140;
pub const PVD_M_PATH_TABLE_OFFSET: usize = 148;
pub const PVD_ROOT_DIR_RECORD_OFFSET: usize = 156;
pub const PVD_VOLUME_SET_ID_OFFSET: usize = 190;
pub const PVD_APPLICATION_ID_OFFSET: usize = 574;
pub const PVD_CREATION_DATE_OFFSET: usize = 813;
pub const PVD_FILE_STRUCTURE_VERSION_OFFSET: usize = 881;

/// Identifier fields between the volume set id and the dates:
/// volume set, publisher, preparer, application, copyright, abstract,
/// bibliographic.
const TEXT_FIELDS: [(usize, usize); 7] = [
    (190, 128),
    (318, 128),
    (446, 128),
    (574, 128),
    (702, 37),
    (739, 37),
    (776, 37),
];

/// Values shared by the primary and Joliet descriptors.
pub struct VolumeInfo<'a> {
    pub volume_id: &'a str,
    pub total_sectors: u32,
    pub path_table: PathTableLayout,
    pub root_record: &'a [u8],
    pub recorded: Option<Timestamp>,
}

pub fn primary_volume_descriptor(info: &VolumeInfo<'_>) -> [u8; SECTOR_SIZE] {
    let mut pvd = descriptor_header(ISO_VOLUME_DESCRIPTOR_PRIMARY);

    put_padded(&mut pvd[PVD_SYSTEM_ID_OFFSET..PVD_SYSTEM_ID_OFFSET + 32], b"", b" ");
    put_padded(
        &mut pvd[PVD_VOLUME_ID_OFFSET..PVD_VOLUME_ID_OFFSET + 32],
        info.volume_id.as_bytes(),
        b" ",
    );
    for (offset, len) in TEXT_FIELDS {
        put_padded(&mut pvd[offset..offset + len], b"", b" ");
    }
    put_padded(
        &mut pvd[PVD_APPLICATION_ID_OFFSET..PVD_APPLICATION_ID_OFFSET + 128],
        APPLICATION_ID.as_bytes(),
        b" ",
    );

    fill_common(&mut pvd, info);
    pvd
}

/// Joliet supplementary descriptor; identifiers are UCS-2 big-endian.
pub fn joliet_volume_descriptor(info: &VolumeInfo<'_>) -> [u8; SECTOR_SIZE] {
    const UCS2_SPACE: &[u8] = &[0x00, 0x20];
    let mut svd = descriptor_header(ISO_VOLUME_DESCRIPTOR_SUPPLEMENTARY);

    put_padded(&mut svd[PVD_SYSTEM_ID_OFFSET..PVD_SYSTEM_ID_OFFSET + 32], b"", UCS2_SPACE);
    let volume_id: String = info.volume_id.chars().take(16).collect();
    put_padded(
        &mut svd[PVD_VOLUME_ID_OFFSET..PVD_VOLUME_ID_OFFSET + 32],
        &ucs2_be(&volume_id),
        UCS2_SPACE,
    );
    svd[PVD_ESCAPE_SEQUENCES_OFFSET..PVD_ESCAPE_SEQUENCES_OFFSET + JOLIET_ESCAPE.len()]
        .copy_from_slice(JOLIET_ESCAPE);
    for (offset, len) in TEXT_FIELDS {
        // The 37-byte fields hold 18 characters and one trailing zero byte.
        let even = len - len % 2;
        put_padded(&mut svd[offset..offset + even], b"", UCS2_SPACE);
    }
    put_padded(
        &mut svd[PVD_APPLICATION_ID_OFFSET..PVD_APPLICATION_ID_OFFSET + 128],
        &ucs2_be(APPLICATION_ID),
        UCS2_SPACE,
    );

    fill_common(&mut svd, info);
    svd
}

pub fn volume_descriptor_terminator() -> [u8; SECTOR_SIZE] {
    descriptor_header(ISO_VOLUME_DESCRIPTOR_TERMINATOR)
}

fn descriptor_header(kind: u8) -> [u8; SECTOR_SIZE] {
    let mut vd = [0u8; SECTOR_SIZE];
    vd[0] = kind;
    vd[1..6].copy_from_slice(ISO_ID);
    vd[6] = ISO_VERSION;
    vd
}

fn fill_common(vd: &mut [u8; SECTOR_SIZE], info: &VolumeInfo<'_>) {
    put_u32_both(vd, PVD_TOTAL_SECTORS_OFFSET, info.total_sectors);
    put_u16_both(vd, PVD_VOL_SET_SIZE_OFFSET, 1);
    put_u16_both(vd, PVD_VOL_SEQ_NUM_OFFSET, 1);
    put_u16_both(vd, PVD_LOGICAL_BLOCK_SIZE_OFFSET, SECTOR_SIZE as u16);

    put_u32_both(vd, PVD_PATH_TABLE_SIZE_OFFSET, info.path_table.size);
    put_u32_le(vd, PVD_L_PATH_TABLE_OFFSET, info.path_table.l_extent.start);
    put_u32_be(vd, PVD_M_PATH_TABLE_OFFSET, info.path_table.m_extent.start);

    vd[PVD_ROOT_DIR_RECORD_OFFSET..PVD_ROOT_DIR_RECORD_OFFSET + info.root_record.len()]
        .copy_from_slice(info.root_record);

    // Creation and modification dates; expiration and effective stay unset.
    let recorded = Timestamp::iso_volume_bytes(info.recorded);
    let unset = Timestamp::iso_volume_bytes(None);
    for (i, date) in [recorded, recorded, unset, unset].iter().enumerate() {
        let offset = PVD_CREATION_DATE_OFFSET + i * 17;
        vd[offset..offset + 17].copy_from_slice(date);
    }

    vd[PVD_FILE_STRUCTURE_VERSION_OFFSET] = 1;
}
