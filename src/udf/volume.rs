// dir2iso/src/udf/volume.rs
//! Volume recognition, the volume descriptor sequence, the integrity
//! descriptor and the anchor pointer.

use uuid::Uuid;

use crate::error::Result;
use crate::fs_node::Extent;
use crate::udf::tag::{
    LV_INFO_ID, NSR02_ID, TAG_ANCHOR_POINTER, TAG_IMPLEMENTATION_USE, TAG_INTEGRITY,
    TAG_LOGICAL_VOLUME, TAG_PARTITION, TAG_PRIMARY_VOLUME, TAG_TERMINATING,
    TAG_UNALLOCATED_SPACE, UDF_REVISION, DOMAIN_ID, charspec, dstring, finish_tag,
    implementation_regid, put_extent_ad, put_long_ad, regid, udf_suffix,
};
use crate::utils::{SECTOR_SIZE, Timestamp, put_u16_le, put_u32_le, put_u64_le};

const VDS_DESCRIPTOR_LEN: usize = 512;

/// One structure of the volume recognition sequence (ECMA-167 2/9.1).
pub fn recognition_sequence_entry(identifier: &[u8; 5]) -> Vec<u8> {
    let mut entry = vec![0u8; SECTOR_SIZE];
    entry[1..6].copy_from_slice(identifier);
    entry[6] = 1;
    entry
}

/// Settings shared by every descriptor of the volume.
pub struct VolumeInfo<'a> {
    pub volume_id: &'a str,
    pub partition: Extent,
    pub integrity_extent: Extent,
    pub recorded: Option<Timestamp>,
}

/// The main (or reserve) volume descriptor sequence starting at `start`,
/// one descriptor per sector.
pub fn volume_descriptor_sequence(info: &VolumeInfo<'_>, start: u32) -> Result<Vec<Vec<u8>>> {
    let mut sequence = vec![
        primary_volume_descriptor(info)?,
        implementation_use_descriptor(info)?,
        partition_descriptor(info),
        logical_volume_descriptor(info)?,
        unallocated_space_descriptor(),
        vec![0u8; VDS_DESCRIPTOR_LEN],
    ];
    let tags = [
        TAG_PRIMARY_VOLUME,
        TAG_IMPLEMENTATION_USE,
        TAG_PARTITION,
        TAG_LOGICAL_VOLUME,
        TAG_UNALLOCATED_SPACE,
        TAG_TERMINATING,
    ];
    for (index, (desc, tag)) in sequence.iter_mut().zip(tags).enumerate() {
        // Every descriptor but the terminator carries its sequence number.
        if tag != TAG_TERMINATING {
            put_u32_le(desc, 16, index as u32);
        }
        finish_tag(desc, tag, start + index as u32);
    }
    Ok(sequence)
}

fn primary_volume_descriptor(info: &VolumeInfo<'_>) -> Result<Vec<u8>> {
    let mut pvd = vec![0u8; VDS_DESCRIPTOR_LEN];
    put_u32_le(&mut pvd, 20, 0); // Primary volume descriptor number
    pvd[24..56].copy_from_slice(&dstring("volume identifier", info.volume_id, 32)?);
    put_u16_le(&mut pvd, 56, 1); // Volume sequence number
    put_u16_le(&mut pvd, 58, 1); // Maximum volume sequence number
    put_u16_le(&mut pvd, 60, 2); // Interchange level
    put_u16_le(&mut pvd, 62, 2); // Maximum interchange level
    put_u32_le(&mut pvd, 64, 1); // Character set list
    put_u32_le(&mut pvd, 68, 1); // Maximum character set list
    pvd[72..200].copy_from_slice(&dstring("volume set identifier", &volume_set_id(info.volume_id), 128)?);
    pvd[200..264].copy_from_slice(&charspec());
    pvd[264..328].copy_from_slice(&charspec());
    pvd[344..376].copy_from_slice(&implementation_regid());
    pvd[376..388].copy_from_slice(&Timestamp::udf_bytes(info.recorded));
    pvd[388..420].copy_from_slice(&implementation_regid());
    Ok(pvd)
}

/// 16 hex digits unique to the label, then the label itself (UDF 2.2.2.5).
pub fn volume_set_id(volume_id: &str) -> String {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, volume_id.as_bytes());
    let hex = uuid.simple().to_string().to_uppercase();
    format!("{}{}", &hex[..16], volume_id)
}

fn implementation_use_descriptor(info: &VolumeInfo<'_>) -> Result<Vec<u8>> {
    let mut iuvd = vec![0u8; VDS_DESCRIPTOR_LEN];
    iuvd[20..52].copy_from_slice(&regid(LV_INFO_ID, udf_suffix()));
    iuvd[52..116].copy_from_slice(&charspec());
    iuvd[116..244].copy_from_slice(&dstring("logical volume identifier", info.volume_id, 128)?);
    iuvd[352..384].copy_from_slice(&implementation_regid());
    Ok(iuvd)
}

fn partition_descriptor(info: &VolumeInfo<'_>) -> Vec<u8> {
    let mut pd = vec![0u8; VDS_DESCRIPTOR_LEN];
    put_u16_le(&mut pd, 20, 1); // Allocated
    put_u16_le(&mut pd, 22, 0); // Partition number
    pd[24..56].copy_from_slice(&regid(NSR02_ID, [0; 8]));
    put_u32_le(&mut pd, 184, 1); // Access type: read only
    put_u32_le(&mut pd, 188, info.partition.start);
    put_u32_le(&mut pd, 192, info.partition.sectors);
    pd[196..228].copy_from_slice(&implementation_regid());
    pd
}

fn logical_volume_descriptor(info: &VolumeInfo<'_>) -> Result<Vec<u8>> {
    const PARTITION_MAP_LEN: usize = 6;
    let mut lvd = vec![0u8; 440 + PARTITION_MAP_LEN];
    lvd[20..84].copy_from_slice(&charspec());
    lvd[84..212].copy_from_slice(&dstring("logical volume identifier", info.volume_id, 128)?);
    put_u32_le(&mut lvd, 212, SECTOR_SIZE as u32);
    lvd[216..248].copy_from_slice(&regid(DOMAIN_ID, udf_suffix()));
    // The file set descriptor is the first block of the partition.
    put_long_ad(&mut lvd, 248, SECTOR_SIZE as u32, 0, 0);
    put_u32_le(&mut lvd, 264, PARTITION_MAP_LEN as u32);
    put_u32_le(&mut lvd, 268, 1);
    lvd[272..304].copy_from_slice(&implementation_regid());
    put_extent_ad(
        &mut lvd,
        432,
        info.integrity_extent.sectors * SECTOR_SIZE as u32,
        info.integrity_extent.start,
    );
    // Type 1 partition map
    lvd[440] = 1;
    lvd[441] = PARTITION_MAP_LEN as u8;
    put_u16_le(&mut lvd, 442, 1); // Volume sequence number
    put_u16_le(&mut lvd, 444, 0); // Partition number
    Ok(lvd)
}

fn unallocated_space_descriptor() -> Vec<u8> {
    // No free extents: the image is written once.
    vec![0u8; 24]
}

pub fn terminating_descriptor(location: u32) -> Vec<u8> {
    let mut td = vec![0u8; VDS_DESCRIPTOR_LEN];
    finish_tag(&mut td, TAG_TERMINATING, location);
    td
}

/// Counts recorded in the closing integrity descriptor.
pub struct IntegrityInfo {
    pub next_unique_id: u64,
    pub files: u32,
    pub directories: u32,
}

/// Closed Logical Volume Integrity Descriptor (ECMA-167 3/10.10).
pub fn integrity_descriptor(
    info: &VolumeInfo<'_>,
    integrity: &IntegrityInfo,
    location: u32,
) -> Vec<u8> {
    const IMPL_USE_LEN: usize = 46;
    let mut lvid = vec![0u8; 80 + 8 + IMPL_USE_LEN];
    lvid[16..28].copy_from_slice(&Timestamp::udf_bytes(info.recorded));
    put_u32_le(&mut lvid, 28, 1); // Close integrity
    put_u64_le(&mut lvid, 40, integrity.next_unique_id);
    put_u32_le(&mut lvid, 72, 1); // Number of partitions
    put_u32_le(&mut lvid, 76, IMPL_USE_LEN as u32);
    put_u32_le(&mut lvid, 80, 0); // Free space
    put_u32_le(&mut lvid, 84, info.partition.sectors); // Partition size
    lvid[88..120].copy_from_slice(&implementation_regid());
    put_u32_le(&mut lvid, 120, integrity.files);
    put_u32_le(&mut lvid, 124, integrity.directories);
    put_u16_le(&mut lvid, 128, UDF_REVISION); // Minimum read revision
    put_u16_le(&mut lvid, 130, UDF_REVISION); // Minimum write revision
    put_u16_le(&mut lvid, 132, UDF_REVISION); // Maximum write revision
    finish_tag(&mut lvid, TAG_INTEGRITY, location);
    lvid
}

/// Anchor Volume Descriptor Pointer (ECMA-167 3/10.2).
pub fn anchor_pointer(main: Extent, reserve: Extent, location: u32) -> Vec<u8> {
    let mut avdp = vec![0u8; VDS_DESCRIPTOR_LEN];
    put_extent_ad(&mut avdp, 16, main.sectors * SECTOR_SIZE as u32, main.start);
    put_extent_ad(&mut avdp, 24, reserve.sectors * SECTOR_SIZE as u32, reserve.start);
    finish_tag(&mut avdp, TAG_ANCHOR_POINTER, location);
    avdp
}
