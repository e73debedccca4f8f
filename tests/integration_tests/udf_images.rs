use std::fs;

use dir2iso::udf::tag::verify_tag;
use dir2iso::{FormatVariant, ImageOptions, SECTOR_SIZE};
use tempfile::tempdir;

use crate::integration_tests::common::{
    README, build_image, cs0_to_string, sector, setup_docs_tree, u16_le, u32_le, udf_directory,
    udf_file_entry,
};

fn udf_options() -> ImageOptions {
    ImageOptions {
        format: FormatVariant::Udf,
        volume_id: Some("Docs Disc".to_string()),
        recording_time: None,
    }
}

#[test]
fn test_udf_volume_structure() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    setup_docs_tree(temp_dir.path())?;

    let (image, report) = build_image(temp_dir.path(), &udf_options())?;
    assert_eq!(image.len(), report.total_sectors as usize * SECTOR_SIZE);

    for (lba, id) in [(16, b"BEA01"), (17, b"NSR02"), (18, b"TEA01")] {
        assert_eq!(&sector(&image, lba)[1..6], id);
    }

    let last = report.total_sectors - 1;
    for lba in [256, last] {
        let avdp = sector(&image, lba);
        assert_eq!(u16_le(avdp, 0), 2, "no anchor at {}", lba);
        assert_eq!(u32_le(avdp, 12), lba);
        assert!(verify_tag(avdp));
        assert_eq!(u32_le(avdp, 20), 32);
        assert_eq!(u32_le(avdp, 28), 48);
    }

    // Main and reserve sequences hold the same descriptors.
    for start in [32, 48] {
        let ids: Vec<u16> = (0..6).map(|i| u16_le(sector(&image, start + i), 0)).collect();
        assert_eq!(ids, vec![1, 4, 5, 6, 7, 8]);
        for i in 0..6 {
            assert!(verify_tag(sector(&image, start + i)));
        }
    }

    let pvd = sector(&image, 32);
    assert_eq!(cs0_to_string(&pvd[24..24 + pvd[55] as usize]), "Docs Disc");

    let lvid = sector(&image, 64);
    assert_eq!(u16_le(lvid, 0), 9);
    assert!(verify_tag(lvid));
    assert_eq!(u32_le(lvid, 120), 1, "file count");
    assert_eq!(u32_le(lvid, 124), 3, "directory count");
    assert_eq!(u16_le(sector(&image, 65), 0), 8);
    Ok(())
}

#[test]
fn test_udf_tree_reads_back() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    setup_docs_tree(temp_dir.path())?;
    fs::write(temp_dir.path().join("Ünïcode ✓.txt"), b"wide")?;

    let (image, _) = build_image(temp_dir.path(), &udf_options())?;

    let pd = sector(&image, 34);
    assert_eq!(u16_le(pd, 0), 5);
    let partition_start = u32_le(pd, 188);
    assert_eq!(partition_start, 257);

    let fsd = sector(&image, partition_start);
    assert_eq!(u16_le(fsd, 0), 256);
    assert!(verify_tag(fsd));
    let root_fe = u32_le(fsd, 404);

    let root = udf_directory(&image, partition_start, root_fe);
    assert_eq!(root[0].characteristics, 0x0A);
    assert_eq!(root[0].icb_lbn, root_fe);
    let names: Vec<&str> = root[1..].iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["docs", "Ünïcode ✓.txt"]);

    let wide = &root[2];
    let (length, data_lbn, file_type) = udf_file_entry(&image, partition_start, wide.icb_lbn);
    assert_eq!((length, file_type), (4, 5));
    assert_eq!(&sector(&image, partition_start + data_lbn)[..4], b"wide");

    let docs = udf_directory(&image, partition_start, root[1].icb_lbn);
    assert_eq!(docs[0].icb_lbn, root_fe);
    let names: Vec<&str> = docs[1..].iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["readme.txt", "sub"]);
    assert_eq!(docs[2].characteristics, 0x02);

    let (length, data_lbn, _) = udf_file_entry(&image, partition_start, docs[1].icb_lbn);
    assert_eq!(length, README.len() as u64);
    assert_eq!(&sector(&image, partition_start + data_lbn)[..README.len()], README);

    let sub = udf_directory(&image, partition_start, docs[2].icb_lbn);
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].icb_lbn, root[1].icb_lbn);
    Ok(())
}

#[test]
fn test_udf_rejects_long_explicit_label() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    setup_docs_tree(temp_dir.path())?;
    let options = ImageOptions {
        volume_id: Some("x".repeat(40)),
        ..udf_options()
    };
    let mut sink = Vec::new();
    let result = dir2iso::create_image(temp_dir.path(), &mut sink, &options);
    assert!(matches!(result, Err(dir2iso::ImageError::FieldOverflow { .. })));
    assert!(sink.is_empty());
    Ok(())
}
