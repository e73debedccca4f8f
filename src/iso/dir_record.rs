// dir2iso/src/iso/dir_record.rs
use crate::utils::{SECTOR_SIZE, put_u16_both, put_u32_both, sectors_for};

pub const FLAG_DIRECTORY: u8 = 0x02;
/// Identifier of the `.` record.
pub const SELF_ID: &[u8] = &[0x00];
/// Identifier of the `..` record.
pub const PARENT_ID: &[u8] = &[0x01];

const HEADER_LEN: usize = 33;

/// ISO9660 directory record structure (ECMA-119 9.1)
pub struct IsoDirEntry<'a> {
    pub lba: u32,
    pub size: u32,
    pub flags: u8,
    pub identifier: &'a [u8],
    pub recorded: [u8; 7],
}

impl IsoDirEntry<'_> {
    /// Creates ISO9660 directory record bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let id_len = self.identifier.len();
        let record_len = record_len(id_len);
        let mut record = vec![0u8; record_len];

        record[0] = record_len as u8;
        record[1] = 0; // Extended attribute length
        put_u32_both(&mut record, 2, self.lba);
        put_u32_both(&mut record, 10, self.size);
        record[18..25].copy_from_slice(&self.recorded);
        record[25] = self.flags;
        record[26] = 0; // File unit size
        record[27] = 0; // Interleave gap size
        put_u16_both(&mut record, 28, 1); // Volume sequence number
        record[32] = id_len as u8;
        record[HEADER_LEN..HEADER_LEN + id_len].copy_from_slice(self.identifier);

        record
    }
}

/// Length of a record carrying an identifier of `id_len` bytes, padded to even.
pub fn record_len(id_len: usize) -> usize {
    let len = HEADER_LEN + id_len;
    len + len % 2
}

/// Lays records out sector by sector; a record never straddles a boundary.
pub fn pack_records(records: &[Vec<u8>]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for record in records {
        let used = out.len() % SECTOR_SIZE;
        if used + record.len() > SECTOR_SIZE {
            out.resize(out.len() + SECTOR_SIZE - used, 0);
        }
        out.extend_from_slice(record);
    }
    let sectors = sectors_for(out.len() as u64) as usize;
    out.resize(sectors * SECTOR_SIZE, 0);
    out
}

/// Bytes taken by a directory whose children have the given identifier
/// lengths, including `.` and `..`, rounded to whole sectors.
pub fn directory_size(child_id_lens: impl IntoIterator<Item = usize>) -> u64 {
    let mut offset = 0usize;
    let lens = [SELF_ID.len(), PARENT_ID.len()]
        .into_iter()
        .chain(child_id_lens)
        .map(record_len);
    for len in lens {
        let used = offset % SECTOR_SIZE;
        if used + len > SECTOR_SIZE {
            offset += SECTOR_SIZE - used;
        }
        offset += len;
    }
    sectors_for(offset as u64) * SECTOR_SIZE as u64
}
