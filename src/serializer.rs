// dir2iso/src/serializer.rs
//! Turns a finished plan into the image, one sector at a time.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use log::debug;

use crate::error::{ImageError, NameCollisionWarning, Result};
use crate::format::FormatVariant;
use crate::fs_node::Extent;
use crate::utils::SECTOR_SIZE;

const FILE_BUFFER: usize = 64 * 1024;

/// Contents of one extent.
#[derive(Debug, Clone)]
pub enum RegionData {
    /// Descriptor or table bytes built in memory.
    Bytes(Vec<u8>),
    /// File contents, read only while the extent is being serialized.
    File { source: PathBuf, size: u64 },
}

/// An extent and what goes in it. Bytes past the data are zero.
#[derive(Debug, Clone)]
pub struct Region {
    pub extent: Extent,
    pub data: RegionData,
}

impl Region {
    pub fn bytes(extent: Extent, data: Vec<u8>) -> Self {
        Self {
            extent,
            data: RegionData::Bytes(data),
        }
    }

    pub fn file(extent: Extent, source: PathBuf, size: u64) -> Self {
        Self {
            extent,
            data: RegionData::File { source, size },
        }
    }

    pub fn bytes_data(&self) -> Option<&[u8]> {
        match &self.data {
            RegionData::Bytes(data) => Some(data),
            RegionData::File { .. } => None,
        }
    }

    pub fn data_len(&self) -> u64 {
        match &self.data {
            RegionData::Bytes(data) => data.len() as u64,
            RegionData::File { size, .. } => *size,
        }
    }
}

/// Every region of the image with its final placement. Immutable once built.
#[derive(Debug, Clone)]
pub struct ImagePlan {
    variant: FormatVariant,
    volume_id: String,
    total_sectors: u32,
    regions: Vec<Region>,
    warnings: Vec<NameCollisionWarning>,
}

impl ImagePlan {
    /// Orders the regions and checks that each fits its extent, lies inside
    /// the image and overlaps no other region.
    pub fn new(
        variant: FormatVariant,
        volume_id: String,
        total_sectors: u32,
        mut regions: Vec<Region>,
        warnings: Vec<NameCollisionWarning>,
    ) -> Result<Self> {
        regions.sort_by_key(|region| region.extent);

        for region in &regions {
            let capacity = region.extent.sectors as u64 * SECTOR_SIZE as u64;
            if region.data_len() > capacity {
                return Err(ImageError::fault(format!(
                    "{} bytes do not fit extent {:?}",
                    region.data_len(),
                    region.extent
                )));
            }
            if region.extent.end() > total_sectors as u64 {
                return Err(ImageError::fault(format!(
                    "extent {:?} ends past sector {}",
                    region.extent, total_sectors
                )));
            }
        }
        for pair in regions.windows(2) {
            if pair[0].extent.overlaps(&pair[1].extent) {
                return Err(ImageError::fault(format!(
                    "extents {:?} and {:?} overlap",
                    pair[0].extent, pair[1].extent
                )));
            }
        }

        debug!(
            "{} plan: {} regions over {} sectors",
            variant,
            regions.len(),
            total_sectors
        );
        Ok(Self {
            variant,
            volume_id,
            total_sectors,
            regions,
            warnings,
        })
    }

    pub fn variant(&self) -> FormatVariant {
        self.variant
    }

    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn image_size(&self) -> u64 {
        self.total_sectors as u64 * SECTOR_SIZE as u64
    }

    pub fn extents(&self) -> impl Iterator<Item = Extent> + '_ {
        self.regions.iter().map(|region| region.extent)
    }

    pub fn warnings(&self) -> &[NameCollisionWarning] {
        &self.warnings
    }

    /// A fresh pass over the image. Each call starts again from sector 0, so
    /// the same plan can be serialized any number of times.
    pub fn sectors(&self) -> Sectors<'_> {
        Sectors {
            plan: self,
            next_sector: 0,
            region_index: 0,
            reader: None,
            done: false,
        }
    }
}

/// Lazy sequence of the image's sectors. Stops after the first error.
pub struct Sectors<'a> {
    plan: &'a ImagePlan,
    next_sector: u64,
    region_index: usize,
    reader: Option<BufReader<File>>,
    done: bool,
}

impl Sectors<'_> {
    fn fill(&mut self, sector: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        let plan = self.plan;
        let Some(region) = plan.regions.get(self.region_index) else {
            return Ok(());
        };
        if self.next_sector < region.extent.start as u64 {
            return Ok(());
        }

        let offset = (self.next_sector - region.extent.start as u64) * SECTOR_SIZE as u64;
        match &region.data {
            RegionData::Bytes(data) => {
                let start = (offset as usize).min(data.len());
                let end = (start + SECTOR_SIZE).min(data.len());
                sector[..end - start].copy_from_slice(&data[start..end]);
            }
            RegionData::File { source, size } => {
                if offset == 0 {
                    let file = File::open(source).map_err(|err| {
                        ImageError::fault(format!("cannot open {}: {}", source.display(), err))
                    })?;
                    self.reader = Some(BufReader::with_capacity(FILE_BUFFER, file));
                }
                let wanted = size.saturating_sub(offset).min(SECTOR_SIZE as u64) as usize;
                if wanted > 0 {
                    let reader = self.reader.as_mut().ok_or_else(|| {
                        ImageError::fault(format!("{} was never opened", source.display()))
                    })?;
                    reader.read_exact(&mut sector[..wanted]).map_err(|err| {
                        ImageError::fault(format!(
                            "reading {} at byte {}: {}",
                            source.display(),
                            offset,
                            err
                        ))
                    })?;
                }
            }
        }

        if self.next_sector + 1 >= region.extent.end() {
            self.region_index += 1;
            self.reader = None;
        }
        Ok(())
    }
}

impl Iterator for Sectors<'_> {
    type Item = Result<[u8; SECTOR_SIZE]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_sector >= self.plan.total_sectors as u64 {
            return None;
        }
        let mut sector = [0u8; SECTOR_SIZE];
        let filled = self.fill(&mut sector);
        self.next_sector += 1;
        match filled {
            Ok(()) => Some(Ok(sector)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.plan.total_sectors as u64).saturating_sub(self.next_sector) as usize;
        if self.done { (0, Some(0)) } else { (0, Some(left)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn collect(plan: &ImagePlan) -> Result<Vec<u8>> {
        let mut image = Vec::new();
        for sector in plan.sectors() {
            image.extend_from_slice(&sector?);
        }
        Ok(image)
    }

    #[test]
    fn test_gaps_are_zero_and_bytes_land_in_place() -> Result<()> {
        let plan = ImagePlan::new(
            FormatVariant::Iso9660,
            "TEST".to_string(),
            4,
            vec![
                Region::bytes(Extent::new(2, 1), vec![0xAB; 10]),
                Region::bytes(Extent::new(0, 1), vec![0x01; 3]),
            ],
            Vec::new(),
        )?;
        let image = collect(&plan)?;
        assert_eq!(image.len() as u64, plan.image_size());
        assert_eq!(&image[..3], &[1, 1, 1]);
        assert!(image[3..2 * SECTOR_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&image[2 * SECTOR_SIZE..2 * SECTOR_SIZE + 10], &[0xAB; 10]);
        assert!(image[2 * SECTOR_SIZE + 10..].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_file_region_spanning_sectors() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("data.bin");
        let contents: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &contents)?;

        let plan = ImagePlan::new(
            FormatVariant::Udf,
            "TEST".to_string(),
            5,
            vec![Region::file(Extent::new(1, 3), path, contents.len() as u64)],
            Vec::new(),
        )?;
        let first = collect(&plan)?;
        assert_eq!(&first[SECTOR_SIZE..SECTOR_SIZE + 5000], &contents[..]);
        assert!(first[SECTOR_SIZE + 5000..].iter().all(|&b| b == 0));

        // Restarting yields the same bytes.
        assert_eq!(first, collect(&plan)?);
        Ok(())
    }

    #[test]
    fn test_truncated_source_is_a_fault() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("short.bin");
        fs::write(&path, b"short")?;

        let plan = ImagePlan::new(
            FormatVariant::Udf,
            "TEST".to_string(),
            2,
            vec![Region::file(Extent::new(0, 1), path, 100)],
            Vec::new(),
        )?;
        let mut sectors = plan.sectors();
        assert!(matches!(sectors.next(), Some(Err(ImageError::SerializationFault(_)))));
        assert!(sectors.next().is_none());
        Ok(())
    }

    #[test]
    fn test_overlapping_regions_are_rejected() {
        let result = ImagePlan::new(
            FormatVariant::Iso9660,
            "TEST".to_string(),
            10,
            vec![
                Region::bytes(Extent::new(2, 2), vec![1]),
                Region::bytes(Extent::new(3, 1), vec![2]),
            ],
            Vec::new(),
        );
        assert!(matches!(result, Err(ImageError::SerializationFault(_))));
    }

    #[test]
    fn test_region_past_end_or_overfull_is_rejected() {
        let past_end = ImagePlan::new(
            FormatVariant::Iso9660,
            "TEST".to_string(),
            3,
            vec![Region::bytes(Extent::new(2, 2), vec![1])],
            Vec::new(),
        );
        assert!(matches!(past_end, Err(ImageError::SerializationFault(_))));

        let overfull = ImagePlan::new(
            FormatVariant::Iso9660,
            "TEST".to_string(),
            3,
            vec![Region::bytes(Extent::new(0, 1), vec![0; SECTOR_SIZE + 1])],
            Vec::new(),
        );
        assert!(matches!(overfull, Err(ImageError::SerializationFault(_))));
    }
}
