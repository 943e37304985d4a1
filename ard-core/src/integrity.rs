use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::error::{ArdError, Result};
use crate::locate::{Bundle, ChecksumSidecar, file_name};
use crate::report::{Category, Check, Outcome};
use crate::util::hash_reader::{HashAlgo, digest_reader};

pub const CHECK_NAME: &str = "checksum match";

/// Read the reference digest from an `md5sum`-style sidecar (first token).
pub fn read_expected(sidecar: &ChecksumSidecar) -> Result<String> {
    let text = std::fs::read_to_string(&sidecar.path)?;
    let token = text
        .split_whitespace()
        .next()
        .ok_or_else(|| ArdError::Format(format!("empty checksum file: {}", sidecar.path.display())))?
        .to_ascii_lowercase();
    if token.len() != sidecar.algo.hex_len() || hex::decode(&token).is_err() {
        return Err(ArdError::Format(format!(
            "malformed {} digest in {}: {token}",
            sidecar.algo.name(),
            sidecar.path.display()
        )));
    }
    Ok(token)
}

pub fn digest_file(path: &Path, algo: HashAlgo) -> Result<String> {
    let f = BufReader::new(File::open(path)?);
    let (digest, n) = digest_reader(f, algo)?;
    debug!(file = %path.display(), algo = algo.name(), bytes = n, "digest computed");
    Ok(digest)
}

/// Compare the bundle's digest against its sidecar.
pub fn check_bundle(bundle: &Bundle) -> Check {
    let subject = bundle.file_name();
    let outcome = match &bundle.checksum {
        None => Outcome::Error("checksum file missing".to_string()),
        Some(sc) => match compare(&bundle.path, sc) {
            Ok(o) => o,
            Err(e) => Outcome::Error(e.to_string()),
        },
    };
    Check::new(subject, CHECK_NAME, Category::Integrity, outcome)
}

fn compare(bundle: &Path, sc: &ChecksumSidecar) -> Result<Outcome> {
    let expected = read_expected(sc)?;
    let actual = digest_file(bundle, sc.algo)?;
    Ok(Outcome::check(actual == expected, || {
        format!(
            "{} expected {expected} from {}, computed {actual}",
            sc.algo.name(),
            file_name(&sc.path)
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn setup(content: &[u8], sidecar: Option<&str>) -> (tempfile::TempDir, Bundle) {
        let dir = tempfile::tempdir().unwrap();
        let tar = dir.path().join("X_SR.tar");
        std::fs::write(&tar, content).unwrap();
        let checksum = sidecar.map(|text| {
            let p: PathBuf = dir.path().join("X_SR.md5");
            std::fs::write(&p, text).unwrap();
            ChecksumSidecar {
                path: p,
                algo: HashAlgo::Md5,
            }
        });
        (dir, Bundle { path: tar, checksum })
    }

    #[test]
    fn matching_digest_passes() {
        let (_d, b) = setup(b"abc", Some("900150983CD24FB0D6963F7D28E17F72  X_SR.tar\n"));
        let c = check_bundle(&b);
        assert_eq!(c.outcome, Outcome::Pass);
        assert_eq!(c.category, Category::Integrity);
    }

    #[test]
    fn mismatch_reports_both_digests() {
        let (_d, b) = setup(b"abd", Some("900150983cd24fb0d6963f7d28e17f72 X_SR.tar"));
        match check_bundle(&b).outcome {
            Outcome::Fail(m) => {
                assert!(m.contains("900150983cd24fb0d6963f7d28e17f72"));
                assert!(m.contains(&digest_reader(&b"abd"[..], HashAlgo::Md5).unwrap().0));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_sidecar_is_an_error_not_a_skip() {
        let (_d, b) = setup(b"abc", None);
        assert!(matches!(check_bundle(&b).outcome, Outcome::Error(_)));
    }

    #[test]
    fn malformed_sidecar_is_an_error() {
        let (_d, b) = setup(b"abc", Some("not-a-digest"));
        assert!(matches!(check_bundle(&b).outcome, Outcome::Error(_)));
        let (_d, b) = setup(b"abc", Some("   \n"));
        assert!(matches!(check_bundle(&b).outcome, Outcome::Error(_)));
    }
}
