use std::{
    fs,
    io,
    path::Path,
};

use dir2iso::{BuildReport, ImageOptions, Result, SECTOR_SIZE, create_image};

pub const README: &[u8] = b"hello world\n";

/// Lays out `docs/readme.txt` (12 bytes) and the empty `docs/sub/`.
pub fn setup_docs_tree(root: &Path) -> io::Result<()> {
    fs::create_dir_all(root.join("docs").join("sub"))?;
    fs::write(root.join("docs").join("readme.txt"), README)?;
    Ok(())
}

/// Builds an image of `input` into memory.
pub fn build_image(input: &Path, options: &ImageOptions) -> Result<(Vec<u8>, BuildReport)> {
    let mut image = Vec::new();
    let report = create_image(input, &mut image, options)?;
    Ok((image, report))
}

pub fn sector(image: &[u8], lba: u32) -> &[u8] {
    let start = lba as usize * SECTOR_SIZE;
    &image[start..start + SECTOR_SIZE]
}

pub fn u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub fn u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub fn u64_le(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// One ISO9660 directory record as read back from an image.
#[derive(Debug, Clone)]
pub struct IsoRecord {
    pub identifier: Vec<u8>,
    pub lba: u32,
    pub size: u32,
    pub flags: u8,
}

impl IsoRecord {
    /// Parses a record; the both-endian fields must agree.
    pub fn parse(buf: &[u8]) -> IsoRecord {
        let lba = u32_le(buf, 2);
        assert_eq!(u32::from_be_bytes(buf[6..10].try_into().unwrap()), lba);
        let size = u32_le(buf, 10);
        assert_eq!(u32::from_be_bytes(buf[14..18].try_into().unwrap()), size);
        let id_len = buf[32] as usize;
        IsoRecord {
            identifier: buf[33..33 + id_len].to_vec(),
            lba,
            size,
            flags: buf[25],
        }
    }

    pub fn is_dir(&self) -> bool {
        self.flags & 0x02 != 0
    }
}

/// Every record of the directory stored at `lba`, `.` and `..` included.
pub fn iso_directory(image: &[u8], lba: u32, size: u32) -> Vec<IsoRecord> {
    let mut records = Vec::new();
    for s in 0..size / SECTOR_SIZE as u32 {
        let block = sector(image, lba + s);
        let mut offset = 0;
        while offset < SECTOR_SIZE && block[offset] != 0 {
            let len = block[offset] as usize;
            records.push(IsoRecord::parse(&block[offset..offset + len]));
            offset += len;
        }
    }
    records
}

/// Finds a child record by identifier.
pub fn iso_lookup<'a>(records: &'a [IsoRecord], identifier: &[u8]) -> Option<&'a IsoRecord> {
    records.iter().find(|r| r.identifier == identifier)
}

pub fn ucs2(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}

/// Decodes an OSTA CS0 identifier.
pub fn cs0_to_string(bytes: &[u8]) -> String {
    match bytes.first() {
        Some(8) => bytes[1..].iter().map(|&b| b as char).collect(),
        Some(16) => {
            let units: Vec<u16> = bytes[1..]
                .chunks(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::new(),
    }
}

/// One File Identifier Descriptor read back from a UDF directory.
#[derive(Debug, Clone)]
pub struct UdfEntry {
    pub name: String,
    pub characteristics: u8,
    pub icb_lbn: u32,
}

/// Information length and first data block of the File Entry at `fe_lbn`.
pub fn udf_file_entry(image: &[u8], partition_start: u32, fe_lbn: u32) -> (u64, u32, u8) {
    let fe = sector(image, partition_start + fe_lbn);
    assert_eq!(u16_le(fe, 0), 261, "no File Entry at lbn {}", fe_lbn);
    assert!(dir2iso::udf::tag::verify_tag(fe));
    let length = u64_le(fe, 56);
    let data_lbn = if u32_le(fe, 172) > 0 { u32_le(fe, 180) } else { 0 };
    (length, data_lbn, fe[27])
}

/// Reads the identifier stream of the directory whose File Entry is at
/// `fe_lbn`.
pub fn udf_directory(image: &[u8], partition_start: u32, fe_lbn: u32) -> Vec<UdfEntry> {
    let (length, data_lbn, file_type) = udf_file_entry(image, partition_start, fe_lbn);
    assert_eq!(file_type, 4, "lbn {} is not a directory", fe_lbn);
    let start = (partition_start + data_lbn) as usize * SECTOR_SIZE;
    let stream = &image[start..start + length as usize];

    let mut entries = Vec::new();
    let mut offset = 0;
    while offset < stream.len() {
        let fid = &stream[offset..];
        assert_eq!(u16_le(fid, 0), 257);
        let id_len = fid[19] as usize;
        let iu_len = u16_le(fid, 36) as usize;
        let len = (38 + id_len + iu_len).next_multiple_of(4);
        assert!(dir2iso::udf::tag::verify_tag(&fid[..len]));
        entries.push(UdfEntry {
            name: cs0_to_string(&fid[38 + iu_len..38 + iu_len + id_len]),
            characteristics: fid[18],
            icb_lbn: u32_le(fid, 24),
        });
        offset += len;
    }
    entries
}
