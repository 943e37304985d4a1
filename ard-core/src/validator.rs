use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::bundle::read_bundle;
use crate::error::{ArdError, Result};
use crate::extent::{ExtentResolver, ExtentTable};
use crate::integrity;
use crate::locate::{Bundle, FileEnumerator, FlatDirEnumerator, file_name, locate};
use crate::metadata::MetadataValidator;
use crate::naming::{ArdNaming, NamingConvention};
use crate::report::{self, BundleReport, Category, Check, Outcome, Report};
use crate::schema::Schema;

#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// Absolute tolerance for corner coordinates in projected metres; 0 compares exactly.
    pub tolerance: f64,
    /// Report passing checks too.
    pub verbose: bool,
}

/// Runs every check over a directory of bundles, one bundle at a time.
pub struct Validator {
    enumerator: Box<dyn FileEnumerator>,
    naming: Box<dyn NamingConvention>,
    resolver: ExtentResolver,
    schema: std::result::Result<Schema, String>,
    opts: ValidateOptions,
}

impl Validator {
    /// A schema that failed to load is kept as its error message; every
    /// bundle then records an error for the schema check.
    pub fn new(
        enumerator: Box<dyn FileEnumerator>,
        naming: Box<dyn NamingConvention>,
        resolver: ExtentResolver,
        schema: Result<Schema>,
        opts: ValidateOptions,
    ) -> Self {
        let schema = schema.map_err(|e| {
            warn!(error = %e, "schema unavailable");
            e.to_string()
        });
        Self {
            enumerator,
            naming,
            resolver,
            schema,
            opts,
        }
    }

    pub fn run(&self, dir: &Path) -> Result<Report> {
        let located = locate(self.enumerator.as_ref(), dir)?;
        info!(
            dir = %dir.display(),
            bundles = located.bundles.len(),
            orphans = located.orphans.len(),
            "validating"
        );

        let mut report = Report::new();
        for bundle in &located.bundles {
            report.push(self.check_bundle(bundle));
        }
        for orphan in &located.orphans {
            let name = file_name(&orphan.path);
            let mut b = BundleReport::new(name.clone());
            b.push(Check::new(
                name,
                integrity::CHECK_NAME,
                Category::Integrity,
                Outcome::Error("no matching .tar bundle".to_string()),
            ));
            report.push(b);
        }

        let s = report.summary();
        info!(
            bundles = s.bundles,
            checks = s.checks,
            failed = s.failed,
            errors = s.errors,
            "validation finished"
        );
        Ok(report)
    }

    /// Integrity, then metadata, then naming. Archive errors end this bundle only.
    pub fn check_bundle(&self, bundle: &Bundle) -> BundleReport {
        let bundle_name = bundle.file_name();
        let mut out = BundleReport::new(bundle_name.clone());
        out.push(integrity::check_bundle(bundle));

        let (name, name_checks) = self.naming.check_bundle_name(&bundle_name);
        match read_bundle(&bundle.path) {
            Ok(contents) => {
                let md = MetadataValidator {
                    resolver: &self.resolver,
                    schema: self.schema.as_ref().map_err(String::as_str),
                    tolerance: self.opts.tolerance,
                };
                out.extend(md.check(&name, &contents));
                out.extend(name_checks);
                out.extend(self.naming.check_members(&name, &contents.members));
            }
            Err(e) => {
                out.push(Check::new(
                    bundle_name.as_str(),
                    "archive readable",
                    Category::Io,
                    Outcome::Error(e.to_string()),
                ));
                out.extend(name_checks);
            }
        }

        info!(
            bundle = %bundle_name,
            checks = out.checks.len(),
            failures = out.failures().count(),
            "bundle checked"
        );
        out
    }
}

/// Validate `dir` against the extent CSV and XSD and write the report into
/// `out_dir`. Returns the report path.
pub fn validate(
    dir: &Path,
    csv: &Path,
    xsd: &Path,
    out_dir: &Path,
    opts: Option<&ValidateOptions>,
) -> Result<PathBuf> {
    let opts = opts.cloned().unwrap_or_default();
    if !dir.is_dir() {
        return Err(ArdError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input directory {} not found", dir.display()),
        )));
    }
    if !out_dir.is_dir() {
        return Err(ArdError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("output directory {} not found", out_dir.display()),
        )));
    }
    let table = ExtentTable::from_path(csv)?;
    let schema = Schema::from_path(xsd);
    let verbose = opts.verbose;

    let validator = Validator::new(
        Box::new(FlatDirEnumerator),
        Box::new(ArdNaming),
        ExtentResolver::new(table),
        schema,
        opts,
    );
    let report = validator.run(dir)?;
    report.write_to_dir(out_dir, verbose, report::now())
}
