//! ARD file naming grammar.
//!
//! Bundles are named
//! `<sensor>_<region>_<hhhvvv>_<acquired>_<produced>_C<nn>_V<nn>_<product>.tar`,
//! for example `LC08_CU_003008_20130413_20170811_C01_V01_SR.tar`. The first
//! seven tokens form the 40-character base shared by every member:
//! `<base>_<band>.tif` for rasters and `<base>.xml` for the metadata file.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use time::{Date, Month};

use crate::domain::{Product, Region, Sensor, TileId};
use crate::report::{Category, Check, Outcome};

static TILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{3})(\d{3})$").unwrap());
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([12]\d{3})(\d{2})(\d{2})$").unwrap());
static COLLECTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^C\d{2}$").unwrap());
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^V\d{2}$").unwrap());

pub const MAX_H: u16 = 39;
pub const MAX_V: u16 = 29;

const TOKEN_NAMES: [&str; 8] = [
    "sensor",
    "region",
    "tile",
    "acquisition date",
    "production date",
    "collection",
    "version",
    "product",
];

/// What could be recovered from a bundle file name. Malformed tokens stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BundleName {
    pub file_name: String,
    pub base: String,
    pub sensor: Option<Sensor>,
    pub region: Option<Region>,
    pub hv: Option<(u16, u16)>,
    pub product: Option<Product>,
}

impl BundleName {
    pub fn tile(&self) -> Option<TileId> {
        let region = self.region?;
        let (h, v) = self.hv?;
        Some(TileId { region, h, v })
    }

    pub fn metadata_name(&self) -> String {
        format!("{}.xml", self.base)
    }
}

/// Naming rules applied to bundles and their members.
pub trait NamingConvention: Send + Sync {
    /// Parse a bundle file name into per-token checks plus whatever parsed cleanly.
    fn check_bundle_name(&self, file_name: &str) -> (BundleName, Vec<Check>);

    /// Per-token checks for every member plus bundle-level completeness checks.
    fn check_members(&self, bundle: &BundleName, members: &[String]) -> Vec<Check>;
}

/// Landsat ARD collection 1 naming.
#[derive(Clone, Debug, Default)]
pub struct ArdNaming;

/// Band suffixes a bundle must contain, or `None` if the combination is invalid.
pub fn expected_bands(sensor: Sensor, product: Product) -> Option<Vec<&'static str>> {
    const QA_COMMON: [&str; 3] = ["LINEAGEQA", "PIXELQA", "RADSATQA"];
    const ANGLES: [&str; 4] = ["SOA4", "SOZ4", "SEA4", "SEZ4"];

    let mut v: Vec<&'static str> = Vec::new();
    if sensor.is_landsat8() {
        match product {
            Product::Sr => {
                v.extend(["SRB1", "SRB2", "SRB3", "SRB4", "SRB5", "SRB6", "SRB7"]);
                v.extend(QA_COMMON);
                v.push("SRAEROSOLQA");
            }
            Product::Ta => {
                v.extend([
                    "TAB1", "TAB2", "TAB3", "TAB4", "TAB5", "TAB6", "TAB7", "TAB9",
                ]);
                v.extend(ANGLES);
                v.extend(QA_COMMON);
            }
            Product::Bt if sensor == Sensor::Lo08 => return None,
            Product::Bt => {
                v.extend(["BTB10", "BTB11"]);
                v.extend(QA_COMMON);
            }
            Product::Qa => {
                v.extend(QA_COMMON);
                v.push("SRAEROSOLQA");
            }
        }
    } else {
        match product {
            Product::Sr => {
                v.extend(["SRB1", "SRB2", "SRB3", "SRB4", "SRB5", "SRB7"]);
                v.extend(QA_COMMON);
                v.extend(["SRCLOUDQA", "SRATMOSOPACITYQA"]);
            }
            Product::Ta => {
                v.extend(["TAB1", "TAB2", "TAB3", "TAB4", "TAB5", "TAB7"]);
                v.extend(ANGLES);
                v.extend(QA_COMMON);
            }
            Product::Bt => {
                v.push("BTB6");
                v.extend(QA_COMMON);
            }
            Product::Qa => {
                v.extend(QA_COMMON);
                v.extend(["SRCLOUDQA", "SRATMOSOPACITYQA"]);
            }
        }
    }
    Some(v)
}

fn check_date(tok: &str) -> Outcome {
    let Some(c) = DATE_RE.captures(tok) else {
        return Outcome::Fail(format!("{tok} is not YYYYMMDD"));
    };
    let y: i32 = c[1].parse().unwrap_or(0);
    let m: u8 = c[2].parse().unwrap_or(0);
    let d: u8 = c[3].parse().unwrap_or(0);
    let valid = Month::try_from(m)
        .ok()
        .and_then(|m| Date::from_calendar_date(y, m, d).ok())
        .is_some();
    Outcome::check(valid, || format!("{tok} is not a calendar date"))
}

fn check_tile(tok: &str) -> (Outcome, Option<(u16, u16)>) {
    let Some(c) = TILE_RE.captures(tok) else {
        return (Outcome::Fail(format!("{tok} is not hhhvvv")), None);
    };
    let h: u16 = c[1].parse().unwrap_or(u16::MAX);
    let v: u16 = c[2].parse().unwrap_or(u16::MAX);
    if h > MAX_H || v > MAX_V {
        return (
            Outcome::Fail(format!("h{h:03}v{v:03} outside grid (h<={MAX_H}, v<={MAX_V})")),
            None,
        );
    }
    (Outcome::Pass, Some((h, v)))
}

fn parsed<T>(tok: &str, r: crate::error::Result<T>) -> (Outcome, Option<T>) {
    match r {
        Ok(t) => (Outcome::Pass, Some(t)),
        Err(_) => (Outcome::Fail(format!("unexpected {tok:?}")), None),
    }
}

/// Split `stem_band.ext` of a member relative to the bundle base.
struct MemberParts<'a> {
    base_ok: bool,
    band: Option<&'a str>,
    ext: &'a str,
}

fn split_member<'a>(name: &'a str, base: &str) -> MemberParts<'a> {
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    if stem == base {
        return MemberParts {
            base_ok: true,
            band: None,
            ext,
        };
    }
    match stem.strip_prefix(base).and_then(|r| r.strip_prefix('_')) {
        Some(band) => MemberParts {
            base_ok: true,
            band: Some(band),
            ext,
        },
        None => MemberParts {
            base_ok: false,
            band: stem.rsplit_once('_').map(|(_, b)| b),
            ext,
        },
    }
}

/// Member file name without any directory prefix.
pub fn member_leaf(member: &str) -> &str {
    member.rsplit('/').next().unwrap_or(member)
}

impl NamingConvention for ArdNaming {
    fn check_bundle_name(&self, file_name: &str) -> (BundleName, Vec<Check>) {
        let mut checks = Vec::with_capacity(TOKEN_NAMES.len() + 1);
        let mut name = BundleName {
            file_name: file_name.to_string(),
            ..Default::default()
        };
        let check = |token: &str, outcome: Outcome| {
            Check::new(file_name, format!("name {token}"), Category::Naming, outcome)
        };

        let (stem, has_ext) = match file_name.strip_suffix(".tar") {
            Some(s) => (s, true),
            None => (file_name.rsplit_once('.').map_or(file_name, |(s, _)| s), false),
        };
        let mut parts = stem.splitn(TOKEN_NAMES.len(), '_');
        let toks: Vec<&str> = (0..TOKEN_NAMES.len())
            .map(|_| parts.next().unwrap_or(""))
            .collect();
        name.base = toks[..7].join("_");

        for (i, token) in TOKEN_NAMES.iter().enumerate() {
            let tok = toks[i];
            let outcome = if tok.is_empty() {
                Outcome::Fail("missing".to_string())
            } else {
                match i {
                    0 => {
                        let (o, s) = parsed(tok, tok.parse::<Sensor>());
                        name.sensor = s;
                        o
                    }
                    1 => {
                        let (o, r) = parsed(tok, tok.parse::<Region>());
                        name.region = r;
                        o
                    }
                    2 => {
                        let (o, hv) = check_tile(tok);
                        name.hv = hv;
                        o
                    }
                    3 | 4 => check_date(tok),
                    5 => Outcome::check(COLLECTION_RE.is_match(tok), || {
                        format!("{tok} is not C<nn>")
                    }),
                    6 => Outcome::check(VERSION_RE.is_match(tok), || {
                        format!("{tok} is not V<nn>")
                    }),
                    _ => {
                        let (o, p) = parsed(tok, tok.parse::<Product>());
                        name.product = p;
                        o
                    }
                }
            };
            checks.push(check(token, outcome));
        }
        checks.push(check(
            "extension",
            Outcome::check(has_ext, || "expected .tar".to_string()),
        ));
        (name, checks)
    }

    fn check_members(&self, bundle: &BundleName, members: &[String]) -> Vec<Check> {
        let mut checks = Vec::new();
        let expected = match (bundle.sensor, bundle.product) {
            (Some(s), Some(p)) => match expected_bands(s, p) {
                Some(v) => Ok(v),
                None => Err(format!(
                    "{} bundles are not produced for {}",
                    p.code(),
                    s.code()
                )),
            },
            _ => Err("sensor or product unknown".to_string()),
        };

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for member in members {
            let leaf = member_leaf(member);
            let parts = split_member(leaf, &bundle.base);
            checks.push(Check::new(
                member.as_str(),
                "name base",
                Category::Naming,
                Outcome::check(parts.base_ok, || format!("expected prefix {}", bundle.base)),
            ));
            match parts.band {
                None => {
                    checks.push(Check::new(
                        member.as_str(),
                        "name extension",
                        Category::Naming,
                        Outcome::check(parts.ext == "xml", || {
                            format!("metadata file must be .xml, got .{}", parts.ext)
                        }),
                    ));
                }
                Some(band) => {
                    let outcome = match &expected {
                        Ok(bands) => Outcome::check(bands.iter().any(|b| *b == band), || {
                            format!("{band} not allowed here")
                        }),
                        Err(m) => Outcome::Error(m.clone()),
                    };
                    if parts.base_ok {
                        seen.insert(band);
                    }
                    checks.push(Check::new(member.as_str(), "name band", Category::Naming, outcome));
                    checks.push(Check::new(
                        member.as_str(),
                        "name extension",
                        Category::Naming,
                        Outcome::check(parts.ext == "tif", || {
                            format!("raster must be .tif, got .{}", parts.ext)
                        }),
                    ));
                }
            }
        }

        let subject = bundle.file_name.as_str();
        match &expected {
            Ok(bands) => {
                let want = bands.len() + 1;
                checks.push(Check::new(
                    subject,
                    "number of files correct",
                    Category::Naming,
                    Outcome::check(members.len() == want, || {
                        format!("expected {want}, found {}", members.len())
                    }),
                ));
                let missing: Vec<&str> = bands
                    .iter()
                    .copied()
                    .filter(|b| !seen.contains(*b))
                    .collect();
                checks.push(Check::new(
                    subject,
                    "missing members",
                    Category::Naming,
                    Outcome::check(missing.is_empty(), || missing.join(", ")),
                ));
            }
            Err(m) => {
                checks.push(Check::new(
                    subject,
                    "number of files correct",
                    Category::Naming,
                    Outcome::Error(m.clone()),
                ));
            }
        }
        checks
    }
}
