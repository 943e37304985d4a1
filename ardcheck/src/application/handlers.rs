use std::path::{Path, PathBuf};

use ard_core::domain::{Region, TileExtent};
use ard_core::error::{ArdError, Result};
use ard_core::integrity::digest_file;
use ard_core::locate::file_name;
use ard_core::naming::expected_bands;
use ard_core::report::Check;
use ard_core::util::hash_reader::HashAlgo;
use ard_core::{ArdNaming, ExtentResolver, ExtentTable, NamingConvention, ValidateOptions, validate};
use tracing::info;

pub fn handle_validate(
    dir: PathBuf,
    csv: PathBuf,
    xsd: PathBuf,
    out: PathBuf,
    verbose: bool,
    tolerance: f64,
) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ArdError::Format(format!(
            "tolerance must be a non-negative number, got {tolerance}"
        )));
    }
    let opts = ValidateOptions { tolerance, verbose };
    let path = validate(&dir, &csv, &xsd, &out, Some(&opts))?;
    info!(report = %path.display(), "done");
    println!("{}", path.display());
    Ok(())
}

fn extent_line(e: &TileExtent) -> String {
    let c = &e.corners;
    let mut line = format!(
        "{} ulx={} uly={} lrx={} lry={}",
        e.tile, c.ulx, c.uly, c.lrx, c.lry
    );
    if let Some(hv) = &e.hv {
        line.push_str(&format!(" hv={hv}"));
    }
    line
}

pub fn handle_extent(csv: PathBuf, region: String, h: u16, v: u16) -> Result<()> {
    let region: Region = region.parse()?;
    let resolver = ExtentResolver::new(ExtentTable::from_path(&csv)?);
    let extent = resolver.resolve(region, h, v)?;
    println!("{}", extent_line(extent));
    Ok(())
}

fn name_report(file_name: &str) -> (Vec<String>, usize) {
    let (name, checks) = ArdNaming.check_bundle_name(file_name);
    let failed = checks.iter().filter(|c| !c.outcome.is_pass()).count();
    let mut lines: Vec<String> = checks.iter().map(token_line).collect();
    if let (Some(s), Some(p)) = (name.sensor, name.product) {
        match expected_bands(s, p) {
            Some(bands) => lines.push(format!(
                "expected members: {} bands + {}",
                bands.len(),
                name.metadata_name()
            )),
            None => lines.push(format!("{} is not produced for {}", p.code(), s.code())),
        }
    }
    (lines, failed)
}

fn token_line(c: &Check) -> String {
    format!("{}: {}", c.name, c.outcome)
}

pub fn handle_name(file_name: String) -> Result<()> {
    let (lines, failed) = name_report(&file_name);
    for l in lines {
        println!("{l}");
    }
    if failed > 0 {
        return Err(ArdError::Format(format!(
            "{failed} naming check(s) failed for {file_name}"
        )));
    }
    Ok(())
}

fn digest_line(file: &Path, algo: &str) -> Result<String> {
    let algo = HashAlgo::from_extension(algo)
        .ok_or_else(|| ArdError::Format(format!("unknown digest algorithm {algo:?}")))?;
    let hex = digest_file(file, algo)?;
    Ok(format!("{hex}  {}", file_name(file)))
}

pub fn handle_digest(file: PathBuf, algo: String) -> Result<()> {
    println!("{}", digest_line(&file, &algo)?);
    Ok(())
}
