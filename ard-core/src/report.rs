use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::info;

use crate::error::{ArdError, Result};

/// What kind of problem a check can surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Integrity,
    Lookup,
    Schema,
    FieldMismatch,
    Naming,
    Io,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail(String),
    Error(String),
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    /// Pass when `ok`, otherwise fail with `msg()`.
    pub fn check(ok: bool, msg: impl FnOnce() -> String) -> Self {
        if ok { Outcome::Pass } else { Outcome::Fail(msg()) }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => f.write_str("PASS"),
            Outcome::Fail(m) if m.is_empty() => f.write_str("FAIL"),
            Outcome::Fail(m) => write!(f, "FAIL ({m})"),
            Outcome::Error(m) => write!(f, "ERROR ({m})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Check {
    /// File the check is about: the bundle itself, a member, or an element path.
    pub subject: String,
    pub name: String,
    pub category: Category,
    pub outcome: Outcome,
}

impl Check {
    pub fn new(
        subject: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        outcome: Outcome,
    ) -> Self {
        Self {
            subject: subject.into(),
            name: name.into(),
            category,
            outcome,
        }
    }

    fn line(&self) -> String {
        format!("    {}: {}: {}", self.subject, self.name, self.outcome)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BundleReport {
    pub name: String,
    pub checks: Vec<Check>,
}

impl BundleReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
        }
    }

    pub fn push(&mut self, c: Check) {
        self.checks.push(c);
    }

    pub fn extend(&mut self, cs: impl IntoIterator<Item = Check>) {
        self.checks.extend(cs);
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.outcome.is_pass())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bundles: usize,
    pub checks: usize,
    pub failed: usize,
    pub errors: usize,
}

/// Append-only result sequence, in processing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    bundles: Vec<BundleReport>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, b: BundleReport) {
        self.bundles.push(b);
    }

    pub fn bundles(&self) -> &[BundleReport] {
        &self.bundles
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary {
            bundles: self.bundles.len(),
            ..Default::default()
        };
        for c in self.bundles.iter().flat_map(|b| &b.checks) {
            s.checks += 1;
            match c.outcome {
                Outcome::Pass => {}
                Outcome::Fail(_) => s.failed += 1,
                Outcome::Error(_) => s.errors += 1,
            }
        }
        s
    }

    /// Verbose renders every check; otherwise only failing checks and their bundle headers.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        for b in &self.bundles {
            let lines: Vec<String> = b
                .checks
                .iter()
                .filter(|c| verbose || !c.outcome.is_pass())
                .map(Check::line)
                .collect();
            if lines.is_empty() && !verbose {
                continue;
            }
            let _ = writeln!(out, "[{}]", b.name);
            for l in lines {
                let _ = writeln!(out, "{l}");
            }
        }
        out
    }

    /// Write the rendered report into `dir` and return the file path.
    pub fn write_to_dir(&self, dir: &Path, verbose: bool, at: OffsetDateTime) -> Result<PathBuf> {
        if !dir.is_dir() {
            return Err(ArdError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("output directory not found: {}", dir.display()),
            )));
        }
        let path = dir.join(report_file_name(at, verbose)?);
        fs::write(&path, self.render(verbose))?;
        info!(path = %path.display(), verbose, "report written");
        Ok(path)
    }
}

pub fn report_file_name(at: OffsetDateTime, verbose: bool) -> Result<String> {
    let stamp = at
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .map_err(|e| ArdError::Format(format!("timestamp: {e}")))?;
    let suffix = if verbose { "_verbose" } else { "" };
    Ok(format!("validate_tiles_{stamp}{suffix}.txt"))
}

/// Local time when the offset is known, UTC otherwise.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> Report {
        let mut r = Report::new();
        let mut a = BundleReport::new("A_SR.tar");
        a.push(Check::new("A_SR.tar", "checksum match", Category::Integrity, Outcome::Pass));
        a.push(Check::new(
            "A_SRB1.tif",
            "band",
            Category::Naming,
            Outcome::Fail("SRB9 not allowed".into()),
        ));
        a.push(Check::new("A.xml", "xml schema valid", Category::Schema, Outcome::Pass));
        r.push(a);
        let mut b = BundleReport::new("B_SR.tar");
        b.push(Check::new("B_SR.tar", "checksum match", Category::Integrity, Outcome::Pass));
        r.push(b);
        let mut c = BundleReport::new("C_SR.tar");
        c.push(Check::new(
            "C_SR.tar",
            "checksum match",
            Category::Integrity,
            Outcome::Error("checksum file missing".into()),
        ));
        r.push(c);
        r
    }

    #[test]
    fn verbose_lists_every_check_grouped_by_bundle() {
        let text = sample().render(true);
        let expected = "\
[A_SR.tar]
    A_SR.tar: checksum match: PASS
    A_SRB1.tif: band: FAIL (SRB9 not allowed)
    A.xml: xml schema valid: PASS
[B_SR.tar]
    B_SR.tar: checksum match: PASS
[C_SR.tar]
    C_SR.tar: checksum match: ERROR (checksum file missing)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn quiet_output_is_an_ordered_subset_of_verbose() {
        let r = sample();
        let verbose: Vec<String> = r.render(true).lines().map(str::to_string).collect();
        let quiet: Vec<String> = r.render(false).lines().map(str::to_string).collect();
        assert_eq!(
            quiet,
            vec![
                "[A_SR.tar]",
                "    A_SRB1.tif: band: FAIL (SRB9 not allowed)",
                "[C_SR.tar]",
                "    C_SR.tar: checksum match: ERROR (checksum file missing)",
            ]
        );
        let mut it = verbose.iter();
        for q in &quiet {
            assert!(it.any(|v| v == q), "{q} out of order or missing");
        }
    }

    #[test]
    fn summary_counts_outcomes() {
        let s = sample().summary();
        assert_eq!(
            s,
            Summary {
                bundles: 3,
                checks: 5,
                failed: 1,
                errors: 1
            }
        );
    }

    #[test]
    fn file_name_carries_timestamp_and_mode() {
        let at = datetime!(2017-08-02 13:05:09 UTC);
        assert_eq!(
            report_file_name(at, false).unwrap(),
            "validate_tiles_20170802130509.txt"
        );
        assert_eq!(
            report_file_name(at, true).unwrap(),
            "validate_tiles_20170802130509_verbose.txt"
        );
    }

    #[test]
    fn writes_into_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let at = datetime!(2020-01-01 00:00:00 UTC);
        let p = sample().write_to_dir(dir.path(), false, at).unwrap();
        let text = std::fs::read_to_string(p).unwrap();
        assert!(text.starts_with("[A_SR.tar]\n"));
        assert!(sample().write_to_dir(&dir.path().join("missing"), false, at).is_err());
    }
}
