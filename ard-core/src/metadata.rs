//! Metadata validation: XSD conformance plus geospatial cross-checks of the
//! tile metadata against the bundle name, the region's Albers projection and
//! the reference tile extents.

use std::collections::BTreeSet;

use tracing::debug;

use crate::bundle::BundleContents;
use crate::domain::Region;
use crate::extent::ExtentResolver;
use crate::naming::{BundleName, member_leaf};
use crate::report::{Category, Check, Outcome};
use crate::schema::{Element, Schema, dom};

pub const SCHEMA_CHECK: &str = "xml schema valid";

const PROJECTION: &str = "AEA";
const DATUM: &str = "WGS84";
const UNITS: &str = "meters";

/// Everything the metadata checks consult besides the bundle itself.
pub struct MetadataValidator<'a> {
    pub resolver: &'a ExtentResolver,
    /// The loaded schema, or why it could not be loaded.
    pub schema: std::result::Result<&'a Schema, &'a str>,
    /// Absolute tolerance for corner coordinates, in projected metres.
    pub tolerance: f64,
}

impl MetadataValidator<'_> {
    pub fn check(&self, name: &BundleName, contents: &BundleContents) -> Vec<Check> {
        let mut checks = Vec::new();
        let Some((xml_name, xml)) = pick_metadata(name, contents, &mut checks) else {
            checks.push(Check::new(
                name.file_name.as_str(),
                SCHEMA_CHECK,
                Category::Schema,
                Outcome::Error("bundle has no .xml member".to_string()),
            ));
            return checks;
        };

        let root = match dom::parse(xml) {
            Ok(root) => root,
            Err(e) => {
                checks.push(Check::new(
                    xml_name,
                    SCHEMA_CHECK,
                    Category::Schema,
                    Outcome::Error(e.to_string()),
                ));
                return checks;
            }
        };

        match self.schema {
            Err(why) => checks.push(Check::new(
                xml_name,
                SCHEMA_CHECK,
                Category::Schema,
                Outcome::Error(format!("schema unavailable: {why}")),
            )),
            Ok(schema) => {
                let violations = schema.validate(&root);
                debug!(member = xml_name, violations = violations.len(), "schema validated");
                if violations.is_empty() {
                    checks.push(Check::new(xml_name, SCHEMA_CHECK, Category::Schema, Outcome::Pass));
                }
                for v in violations {
                    checks.push(Check::new(
                        v.path,
                        SCHEMA_CHECK,
                        Category::Schema,
                        Outcome::Fail(format!("line {}: {}", v.line, v.message)),
                    ));
                }
            }
        }

        let fields = Fields::new(xml_name, &root);
        fields.identity(name, &mut checks);
        fields.grid(name.region, &mut checks);
        fields.corners(self.resolver, name, self.tolerance, &mut checks);
        fields.bands(contents, &mut checks);
        checks
    }
}

/// Select the metadata member. More than one `.xml` is a naming failure;
/// the one named after the bundle base wins, else the first.
fn pick_metadata<'c>(
    name: &BundleName,
    contents: &'c BundleContents,
    checks: &mut Vec<Check>,
) -> Option<(&'c str, &'c [u8])> {
    let md = &contents.metadata;
    if md.len() > 1 {
        let names: Vec<&str> = md.iter().map(|(n, _)| n.as_str()).collect();
        checks.push(Check::new(
            name.file_name.as_str(),
            "single metadata file",
            Category::Naming,
            Outcome::Fail(format!("found {}: {}", md.len(), names.join(", "))),
        ));
    }
    let want = name.metadata_name();
    md.iter()
        .find(|(n, _)| member_leaf(n) == want)
        .or_else(|| md.first())
        .map(|(n, b)| (n.as_str(), b.as_slice()))
}

struct Fields<'a> {
    subject: &'a str,
    global: Option<&'a Element>,
    projection: Option<&'a Element>,
    tile: Option<&'a Element>,
}

fn fail_missing(what: &str) -> Outcome {
    Outcome::Fail(format!("{what} missing from metadata"))
}

fn number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse().ok())
}

impl<'a> Fields<'a> {
    fn new(subject: &'a str, root: &'a Element) -> Self {
        let tile = root.child("tile_metadata");
        let global = tile.and_then(|t| t.child("global_metadata"));
        Self {
            subject,
            global,
            projection: global.and_then(|g| g.child("projection_information")),
            tile,
        }
    }

    fn push(&self, out: &mut Vec<Check>, name: &str, category: Category, outcome: Outcome) {
        out.push(Check::new(self.subject, name, category, outcome));
    }

    /// Region and tile grid against the bundle name.
    fn identity(&self, name: &BundleName, out: &mut Vec<Check>) {
        let region = self
            .global
            .and_then(|g| g.child("region"))
            .map(|e| e.text_trimmed());
        let outcome = match (region, name.region) {
            (_, None) => Outcome::Error("region unknown from bundle name".to_string()),
            (None, _) => fail_missing("region"),
            (Some(got), Some(want)) => Outcome::check(got == want.code(), || {
                format!("metadata {got}, bundle {want}")
            }),
        };
        self.push(out, "region", Category::FieldMismatch, outcome);

        let grid = self.global.and_then(|g| g.child("tile_grid"));
        for (axis, want) in [("h", name.hv.map(|p| p.0)), ("v", name.hv.map(|p| p.1))] {
            let got = grid.and_then(|g| g.attr(axis));
            let outcome = match (got, want) {
                (_, None) => Outcome::Error("tile unknown from bundle name".to_string()),
                (None, _) => fail_missing(&format!("tile_grid {axis}")),
                (Some(raw), Some(want)) => match raw.trim().parse::<u16>() {
                    Ok(got) => Outcome::check(got == want, || {
                        format!("metadata {got}, bundle {want}")
                    }),
                    Err(_) => Outcome::Fail(format!("{raw:?} is not a tile index")),
                },
            };
            self.push(out, &format!("tile_grid {axis}"), Category::FieldMismatch, outcome);
        }
    }

    /// Projection, datum, units and the Albers parameters of the region.
    fn grid(&self, region: Option<Region>, out: &mut Vec<Check>) {
        for (attr, want) in [("projection", PROJECTION), ("datum", DATUM), ("units", UNITS)] {
            let outcome = match self.projection.and_then(|p| p.attr(attr)) {
                None => fail_missing(attr),
                Some(got) => Outcome::check(got.trim() == want, || {
                    format!("{got}, expected {want}")
                }),
            };
            self.push(out, attr, Category::FieldMismatch, outcome);
        }

        let params = self.projection.and_then(|p| p.child("albers_proj_params"));
        let Some(region) = region else {
            for (field, _) in Region::Cu.albers().fields() {
                self.push(
                    out,
                    field,
                    Category::FieldMismatch,
                    Outcome::Error("region unknown from bundle name".to_string()),
                );
            }
            return;
        };
        for (field, want) in region.albers().fields() {
            let raw = params.and_then(|p| p.child(field)).map(|e| e.text_trimmed());
            let outcome = match (raw, number(raw)) {
                (None, _) => fail_missing(field),
                (Some(raw), None) => Outcome::Fail(format!("{raw:?} is not a number")),
                (_, Some(got)) => Outcome::check(got == want, || {
                    format!("{got}, expected {want} for {region}")
                }),
            };
            self.push(out, field, Category::FieldMismatch, outcome);
        }
    }

    /// Corner points against the reference extent of the named tile.
    fn corners(
        &self,
        resolver: &ExtentResolver,
        name: &BundleName,
        tolerance: f64,
        out: &mut Vec<Check>,
    ) {
        const FIELDS: [&str; 4] = ["ulx", "uly", "lrx", "lry"];
        let extent = match name.tile() {
            None => Err("tile unknown from bundle name".to_string()),
            Some(t) => resolver.resolve(t.region, t.h, t.v).map_err(|e| e.to_string()),
        };
        let extent = match extent {
            Ok(e) => e,
            Err(msg) => {
                for f in FIELDS {
                    self.push(out, f, Category::Lookup, Outcome::Error(msg.clone()));
                }
                return;
            }
        };

        let point = |loc: &str| -> (Option<f64>, Option<f64>) {
            let cp = self.projection.and_then(|p| {
                p.children_named("corner_point")
                    .find(|c| c.attr("location") == Some(loc))
            });
            (
                number(cp.and_then(|c| c.attr("x"))),
                number(cp.and_then(|c| c.attr("y"))),
            )
        };
        let (mut ulx, mut uly) = point("UL");
        let (mut lrx, mut lry) = point("LR");

        let origin = self
            .projection
            .and_then(|p| p.child("grid_origin"))
            .map(|e| e.text_trimmed());
        if origin == Some("CENTER") {
            let px = self.tile.and_then(|t| t.find("pixel_size"));
            let (Some(x), Some(y)) = (
                number(px.and_then(|p| p.attr("x"))),
                number(px.and_then(|p| p.attr("y"))),
            ) else {
                for f in FIELDS {
                    self.push(out, f, Category::FieldMismatch, fail_missing("pixel_size"));
                }
                return;
            };
            let (hx, hy) = (x / 2.0, y / 2.0);
            ulx = ulx.map(|v| v - hx);
            uly = uly.map(|v| v + hy);
            lrx = lrx.map(|v| v + hx);
            lry = lry.map(|v| v - hy);
        }

        for ((field, want), got) in extent.corners.fields().into_iter().zip([ulx, uly, lrx, lry]) {
            let want = want as f64;
            let outcome = match got {
                None => fail_missing(field),
                Some(got) => Outcome::check((got - want).abs() <= tolerance, || {
                    format!("metadata {got}, expected {want}")
                }),
            };
            self.push(out, field, Category::FieldMismatch, outcome);
        }
    }

    /// Every described band is in the archive and every raster is described.
    fn bands(&self, contents: &BundleContents, out: &mut Vec<Check>) {
        let described: BTreeSet<&str> = self
            .tile
            .and_then(|t| t.child("bands"))
            .into_iter()
            .flat_map(|b| b.children_named("band"))
            .filter_map(|b| b.child("file_name"))
            .map(|f| f.text_trimmed())
            .collect();
        let present: BTreeSet<&str> = contents.members.iter().map(|m| member_leaf(m)).collect();

        for file in &described {
            out.push(Check::new(
                *file,
                "band file present",
                Category::FieldMismatch,
                Outcome::check(present.contains(file), || "not in archive".to_string()),
            ));
        }
        for member in contents.tif_members() {
            out.push(Check::new(
                member,
                "band described",
                Category::FieldMismatch,
                Outcome::check(described.contains(member_leaf(member)), || {
                    "no band entry in metadata".to_string()
                }),
            ));
        }
    }
}
