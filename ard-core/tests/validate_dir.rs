use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ard_core::domain::{Product, Sensor};
use ard_core::integrity::digest_file;
use ard_core::naming::expected_bands;
use ard_core::report::{Category, Outcome};
use ard_core::util::hash_reader::HashAlgo;
use ard_core::{
    ArdNaming, ExtentResolver, ExtentTable, FlatDirEnumerator, Schema, ValidateOptions, Validator,
    validate,
};

const XML: &str = include_str!("data/LC08_CU_003008_20130413_20170811_C01_V01.xml");
const BASE: &str = "LC08_CU_003008_20130413_20170811_C01_V01";

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn append(b: &mut tar::Builder<File>, name: &str, bytes: &[u8]) {
    let mut h = tar::Header::new_gnu();
    h.set_size(bytes.len() as u64);
    h.set_mode(0o644);
    h.set_mtime(0);
    b.append_data(&mut h, name, bytes).unwrap();
}

/// Writes `<base>_SR.tar` holding every SR band plus the metadata file.
fn write_bundle(dir: &Path, base: &str, xml: &str) -> PathBuf {
    let path = dir.join(format!("{base}_SR.tar"));
    let mut b = tar::Builder::new(File::create(&path).unwrap());
    for band in expected_bands(Sensor::Lc08, Product::Sr).unwrap() {
        append(&mut b, &format!("{base}_{band}.tif"), b"II*\0raster");
    }
    append(&mut b, &format!("{base}.xml"), xml.as_bytes());
    b.into_inner().unwrap();
    path
}

fn write_md5(tar: &Path) {
    let digest = digest_file(tar, HashAlgo::Md5).unwrap();
    let name = tar.file_name().unwrap().to_string_lossy();
    fs::write(tar.with_extension("md5"), format!("{digest}  {name}\n")).unwrap();
}

fn validator(schema: ard_core::error::Result<Schema>, opts: ValidateOptions) -> Validator {
    let table = ExtentTable::from_path(&data("ard_tile_extents.csv")).unwrap();
    Validator::new(
        Box::new(FlatDirEnumerator),
        Box::new(ArdNaming),
        ExtentResolver::new(table),
        schema,
        opts,
    )
}

fn schema() -> ard_core::error::Result<Schema> {
    Schema::from_path(&data("ard_metadata.xsd"))
}

#[test]
fn well_formed_bundle_passes_every_check() {
    let dir = tempfile::tempdir().unwrap();
    let tar = write_bundle(dir.path(), BASE, XML);
    write_md5(&tar);

    let report = validator(schema(), ValidateOptions::default())
        .run(dir.path())
        .unwrap();
    assert_eq!(report.bundles().len(), 1);
    let b = &report.bundles()[0];
    assert_eq!(b.name, format!("{BASE}_SR.tar"));
    let failures: Vec<_> = b.failures().collect();
    assert!(failures.is_empty(), "{failures:#?}");

    assert_eq!(b.checks[0].name, "checksum match");
    let categories: Vec<Category> = b.checks.iter().map(|c| c.category).collect();
    let first = |cat| categories.iter().position(|c| *c == cat).unwrap();
    assert!(first(Category::Integrity) < first(Category::Schema));
    assert!(first(Category::FieldMismatch) < first(Category::Naming));

    assert!(report.render(false).is_empty());
    assert!(report.render(true).starts_with(&format!("[{BASE}_SR.tar]\n")));
}

#[test]
fn problems_stay_within_their_bundle() {
    let dir = tempfile::tempdir().unwrap();

    // checksum mismatch
    let bad_sum = write_bundle(dir.path(), BASE, XML);
    fs::write(
        bad_sum.with_extension("md5"),
        format!("{}  x\n", "0".repeat(32)),
    )
    .unwrap();

    // no sidecar, metadata for another tile
    let other = "LC08_CU_004008_20130413_20170811_C01_V01";
    write_bundle(dir.path(), other, &XML.replace(BASE, other));

    // unreadable archive
    let broken = dir.path().join("LE07_AK_010005_20130413_20170811_C01_V01_SR.tar");
    fs::write(&broken, vec![0x5a_u8; 2048]).unwrap();
    write_md5(&broken);

    // sidecar with no bundle
    fs::write(dir.path().join("LT05_HI_000000_19900101_20170811_C01_V01_BT.md5"), "abc\n").unwrap();

    let report = validator(schema(), ValidateOptions::default())
        .run(dir.path())
        .unwrap();
    let names: Vec<&str> = report.bundles().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "LC08_CU_003008_20130413_20170811_C01_V01_SR.tar",
            "LC08_CU_004008_20130413_20170811_C01_V01_SR.tar",
            "LE07_AK_010005_20130413_20170811_C01_V01_SR.tar",
            "LT05_HI_000000_19900101_20170811_C01_V01_BT.md5",
        ]
    );

    let b = &report.bundles()[0];
    let failing: Vec<&str> = b.failures().map(|c| c.name.as_str()).collect();
    assert_eq!(failing, vec!["checksum match"]);
    assert!(matches!(&b.checks[0].outcome, Outcome::Fail(m) if m.contains(&"0".repeat(32))));

    // metadata still carries the grid position of tile 003008
    let b = &report.bundles()[1];
    assert_eq!(
        b.checks[0].outcome,
        Outcome::Error("checksum file missing".to_string())
    );
    let failing: Vec<&str> = b.failures().map(|c| c.name.as_str()).collect();
    assert_eq!(failing, vec!["checksum match", "tile_grid h", "ulx", "lrx"]);

    let b = &report.bundles()[2];
    assert!(b.checks[0].outcome.is_pass());
    let io = b.checks.iter().find(|c| c.category == Category::Io).unwrap();
    assert_eq!(io.name, "archive readable");
    assert!(matches!(io.outcome, Outcome::Error(_)));
    assert!(b.checks.iter().any(|c| c.name == "name sensor" && c.outcome.is_pass()));

    let b = &report.bundles()[3];
    assert_eq!(b.checks.len(), 1);
    assert_eq!(b.checks[0].category, Category::Integrity);
    assert!(matches!(b.checks[0].outcome, Outcome::Error(_)));

    let s = report.summary();
    assert_eq!(s.bundles, 4);
    assert!(s.failed > 0 && s.errors >= 3);
}

#[test]
fn missing_schema_is_recorded_per_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let tar = write_bundle(dir.path(), BASE, XML);
    write_md5(&tar);

    let report = validator(
        Schema::from_path(&dir.path().join("missing.xsd")),
        ValidateOptions::default(),
    )
    .run(dir.path())
    .unwrap();
    let b = &report.bundles()[0];
    let failing: Vec<_> = b.failures().collect();
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].name, "xml schema valid");
    assert!(matches!(&failing[0].outcome, Outcome::Error(m) if m.starts_with("schema unavailable")));
}

#[test]
fn tolerance_absorbs_small_corner_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let xml = XML.replace(r#"y="1964805.000000""#, r#"y="1964804.500000""#);
    let tar = write_bundle(dir.path(), BASE, &xml);
    write_md5(&tar);

    let exact = validator(schema(), ValidateOptions::default())
        .run(dir.path())
        .unwrap();
    let failing: Vec<&str> = exact.bundles()[0]
        .failures()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(failing, vec!["lry"]);

    let loose = validator(
        schema(),
        ValidateOptions {
            tolerance: 1.0,
            ..Default::default()
        },
    )
    .run(dir.path())
    .unwrap();
    assert_eq!(loose.summary().failed, 0);
}

#[test]
fn validate_writes_a_timestamped_report() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_bundle(input.path(), BASE, XML);

    let opts = ValidateOptions {
        verbose: true,
        ..Default::default()
    };
    let path = validate(
        input.path(),
        &data("ard_tile_extents.csv"),
        &data("ard_metadata.xsd"),
        out.path(),
        Some(&opts),
    )
    .unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("validate_tiles_"), "{name}");
    assert!(name.ends_with("_verbose.txt"), "{name}");
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains(": checksum match: ERROR (checksum file missing)"));
    assert!(text.contains(": xml schema valid: PASS"));

    let quiet = validate(
        input.path(),
        &data("ard_tile_extents.csv"),
        &data("ard_metadata.xsd"),
        out.path(),
        None,
    )
    .unwrap();
    let quiet_text = fs::read_to_string(&quiet).unwrap();
    assert_eq!(
        quiet_text,
        format!("[{BASE}_SR.tar]\n    {BASE}_SR.tar: checksum match: ERROR (checksum file missing)\n")
    );
}

#[test]
fn invocation_errors_stop_before_any_bundle() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let csv = data("ard_tile_extents.csv");
    let xsd = data("ard_metadata.xsd");

    assert!(validate(&input.path().join("nope"), &csv, &xsd, out.path(), None).is_err());
    assert!(validate(input.path(), &csv, &xsd, &out.path().join("nope"), None).is_err());
    assert!(validate(input.path(), &input.path().join("no.csv"), &xsd, out.path(), None).is_err());
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}
