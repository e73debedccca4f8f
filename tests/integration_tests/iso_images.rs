use std::{fs, io};

use dir2iso::{FormatVariant, ImageError, ImageOptions, SECTOR_SIZE, build_plan};
use tempfile::tempdir;

use crate::integration_tests::common::{
    README, build_image, iso_directory, iso_lookup, sector, setup_docs_tree, u16_le, u32_le, ucs2,
};

fn iso_options(format: FormatVariant) -> ImageOptions {
    ImageOptions {
        format,
        volume_id: Some("DOCS".to_string()),
        recording_time: None,
    }
}

#[test]
fn test_iso9660_docs_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    setup_docs_tree(temp_dir.path())?;

    let (image, report) = build_image(temp_dir.path(), &iso_options(FormatVariant::Iso9660))?;

    // System area, PVD, terminator, L and M path tables, root, docs, sub, readme.
    assert_eq!(report.total_sectors, 24);
    assert_eq!(image.len(), 24 * SECTOR_SIZE);
    assert_eq!(report.counters.bytes_read, image.len() as u64);
    assert_eq!(report.counters.bytes_written, image.len() as u64);
    assert!(image[..16 * SECTOR_SIZE].iter().all(|&b| b == 0));

    let pvd = sector(&image, 16);
    assert_eq!(&pvd[0..7], &[0x01, b'C', b'D', b'0', b'0', b'1', 0x01]);
    assert_eq!(&pvd[40..44], b"DOCS");
    assert_eq!(u32_le(pvd, 80), 24);
    assert_eq!(&sector(&image, 17)[0..6], &[0xFF, b'C', b'D', b'0', b'0', b'1']);

    // Path table: root, DOCS, SUB in parent-before-child order.
    let table_size = u32_le(pvd, 132) as usize;
    let l_table = sector(&image, u32_le(pvd, 140));
    let mut offset = 0;
    let mut entries = Vec::new();
    while offset < table_size {
        let id_len = l_table[offset] as usize;
        let parent = u16_le(l_table, offset + 6);
        entries.push((l_table[offset + 8..offset + 8 + id_len].to_vec(), parent));
        offset += 8 + id_len + id_len % 2;
    }
    assert_eq!(
        entries,
        vec![(vec![0u8], 1), (b"DOCS".to_vec(), 1), (b"SUB".to_vec(), 2)]
    );
    let m_lba = u32::from_be_bytes(pvd[148..152].try_into()?);
    assert_eq!(&sector(&image, m_lba)[2..6], &20u32.to_be_bytes());

    let root = iso_directory(&image, u32_le(pvd, 158), u32_le(pvd, 166));
    assert_eq!(root.len(), 3);
    let docs = iso_lookup(&root, b"DOCS").ok_or("DOCS missing")?;
    assert!(docs.is_dir());

    let docs_records = iso_directory(&image, docs.lba, docs.size);
    let names: Vec<&[u8]> = docs_records.iter().map(|r| r.identifier.as_slice()).collect();
    assert_eq!(names, vec![&[0u8][..], &[1u8][..], b"README.TXT;1", b"SUB"]);

    let readme = iso_lookup(&docs_records, b"README.TXT;1").ok_or("README missing")?;
    assert_eq!(readme.size, README.len() as u32);
    let data = sector(&image, readme.lba);
    assert_eq!(&data[..README.len()], README);
    assert!(data[README.len()..].iter().all(|&b| b == 0));

    let sub = iso_lookup(&docs_records, b"SUB").ok_or("SUB missing")?;
    assert_eq!(sub.size, SECTOR_SIZE as u32);
    assert_eq!(iso_directory(&image, sub.lba, sub.size).len(), 2);
    Ok(())
}

#[test]
fn test_joliet_keeps_original_names() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    setup_docs_tree(temp_dir.path())?;
    fs::write(temp_dir.path().join("Mixed Case Name.html"), b"<p>")?;

    let (image, _) = build_image(temp_dir.path(), &iso_options(FormatVariant::Joliet))?;

    let svd = sector(&image, 17);
    assert_eq!(svd[0], 2);
    assert_eq!(&svd[88..91], b"%/E");
    assert_eq!(&svd[40..48], &ucs2("DOCS")[..]);
    assert_eq!(sector(&image, 18)[0], 0xFF);

    let root = iso_directory(&image, u32_le(svd, 158), u32_le(svd, 166));
    let html = iso_lookup(&root, &ucs2("Mixed Case Name.html;1")).ok_or("Joliet name missing")?;
    assert_eq!(html.size, 3);
    assert!(iso_lookup(&root, &ucs2("docs")).is_some());

    // The primary hierarchy points at the same file data.
    let pvd = sector(&image, 16);
    let primary = iso_directory(&image, u32_le(pvd, 158), u32_le(pvd, 166));
    let short = iso_lookup(&primary, b"MIXED_CA.HTM;1").ok_or("ISO name missing")?;
    assert_eq!(short.lba, html.lba);
    Ok(())
}

#[test]
fn test_large_mixed_case_joliet_directory() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    // Long lower-case names sort first in the primary tree and last in the
    // Joliet tree, so the two directories pack differently.
    let mut expected = Vec::new();
    for i in 0..19 {
        let long = format!("a{:02}{}", i, "x".repeat(55));
        let short = format!("B{:02}yyyy", i);
        fs::write(temp_dir.path().join(&long), long.as_bytes())?;
        fs::write(temp_dir.path().join(&short), short.as_bytes())?;
        expected.push(long);
        expected.push(short);
    }

    let options = ImageOptions {
        format: FormatVariant::Joliet,
        volume_id: Some("Mixed Docs".to_string()),
        recording_time: None,
    };
    let (image, report) = build_image(temp_dir.path(), &options)?;
    assert!(report.warnings.is_empty());

    let svd = sector(&image, 17);
    assert_eq!(&svd[40..60], &ucs2("Mixed Docs")[..]);
    assert_eq!(&sector(&image, 16)[40..50], b"MIXED_DOCS");

    let root_size = u32_le(svd, 166);
    assert!(root_size > SECTOR_SIZE as u32);
    let root = iso_directory(&image, u32_le(svd, 158), root_size);
    assert_eq!(root.len(), 2 + expected.len());
    let names: Vec<&[u8]> = root[2..].iter().map(|r| r.identifier.as_slice()).collect();
    assert_eq!(names[0], &ucs2("B00yyyy;1")[..]);
    assert_eq!(names[expected.len() - 1], &ucs2(&format!("a18{};1", "x".repeat(55)))[..]);

    for name in &expected {
        let record = iso_lookup(&root, &ucs2(&format!("{};1", name)))
            .ok_or_else(|| format!("{} missing", name))?;
        assert_eq!(record.size as usize, name.len());
        assert_eq!(&sector(&image, record.lba)[..name.len()], name.as_bytes());
    }

    let pvd = sector(&image, 16);
    let primary = iso_directory(&image, u32_le(pvd, 158), u32_le(pvd, 166));
    assert_eq!(primary.len(), 2 + expected.len());
    Ok(())
}

#[test]
fn test_colliding_names_are_suffixed() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("a.txt"), b"lower")?;
    fs::write(temp_dir.path().join("A.TXT"), b"UPPER")?;

    let (image, report) = build_image(temp_dir.path(), &iso_options(FormatVariant::Iso9660))?;
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].original, "a.txt");
    assert_eq!(report.warnings[0].encoded, "A_1.TXT;1");

    let pvd = sector(&image, 16);
    let root = iso_directory(&image, u32_le(pvd, 158), u32_le(pvd, 166));
    let upper = iso_lookup(&root, b"A.TXT;1").ok_or("A.TXT missing")?;
    let lower = iso_lookup(&root, b"A_1.TXT;1").ok_or("A_1.TXT missing")?;
    assert_ne!(upper.lba, lower.lba);
    assert_eq!(&sector(&image, upper.lba)[..5], b"UPPER");
    assert_eq!(&sector(&image, lower.lba)[..5], b"lower");
    Ok(())
}

#[test]
fn test_empty_file_and_directory() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("empty.dat"), b"")?;
    fs::create_dir(temp_dir.path().join("void"))?;

    let (image, _) = build_image(temp_dir.path(), &iso_options(FormatVariant::Iso9660))?;
    let pvd = sector(&image, 16);
    let root = iso_directory(&image, u32_le(pvd, 158), u32_le(pvd, 166));
    let empty = iso_lookup(&root, b"EMPTY.DAT;1").ok_or("empty file missing")?;
    let void = iso_lookup(&root, b"VOID").ok_or("empty directory missing")?;
    assert_eq!(empty.size, 0);
    assert_eq!(void.size, SECTOR_SIZE as u32);
    assert_ne!(empty.lba, void.lba);
    Ok(())
}

#[test]
fn test_output_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    setup_docs_tree(temp_dir.path())?;
    fs::write(temp_dir.path().join("b.bin"), vec![7u8; 5000])?;

    for format in [FormatVariant::Iso9660, FormatVariant::Joliet, FormatVariant::Udf] {
        let options = ImageOptions {
            format,
            volume_id: None,
            recording_time: Some(1_700_000_000),
        };
        let (first, _) = build_image(temp_dir.path(), &options)?;
        let (second, _) = build_image(temp_dir.path(), &options)?;
        assert!(first == second, "{} output differs between runs", format);
    }
    Ok(())
}

#[test]
fn test_extents_are_disjoint_and_inside_the_image() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    setup_docs_tree(temp_dir.path())?;
    fs::create_dir_all(temp_dir.path().join("a").join("b").join("c"))?;
    fs::write(temp_dir.path().join("a").join("b").join("big.bin"), vec![1u8; 3 * SECTOR_SIZE + 1])?;

    for format in [FormatVariant::Iso9660, FormatVariant::Joliet, FormatVariant::Udf] {
        let plan = build_plan(temp_dir.path(), &ImageOptions { format, ..ImageOptions::default() })?;
        let extents: Vec<_> = plan.extents().collect();
        for (i, a) in extents.iter().enumerate() {
            assert!(a.end() <= plan.total_sectors() as u64);
            for b in &extents[i + 1..] {
                assert!(!a.overlaps(b), "{}: {:?} overlaps {:?}", format, a, b);
            }
        }
    }
    Ok(())
}

#[test]
fn test_missing_input_is_not_found() {
    let mut sink = Vec::new();
    let result = dir2iso::create_image(
        std::path::Path::new("/definitely/not/here"),
        &mut sink,
        &ImageOptions::default(),
    );
    assert!(matches!(result, Err(ImageError::NotFound { .. })));
    assert!(sink.is_empty());
}

#[test]
fn test_too_deep_tree_writes_nothing() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let mut deep = temp_dir.path().to_path_buf();
    for level in 1..=8 {
        deep.push(format!("d{}", level));
    }
    fs::create_dir_all(&deep)?;

    let mut sink = Vec::new();
    let result = dir2iso::create_image(
        temp_dir.path(),
        &mut sink,
        &iso_options(FormatVariant::Iso9660),
    );
    assert!(matches!(result, Err(ImageError::FieldOverflow { .. })));
    assert!(sink.is_empty());

    // UDF has no depth limit.
    let udf = ImageOptions::default();
    assert!(dir2iso::create_image(temp_dir.path(), &mut sink, &udf).is_ok());
    Ok(())
}
