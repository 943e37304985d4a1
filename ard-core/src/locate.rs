use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ArdError, Result};
use crate::util::hash_reader::HashAlgo;

/// Discovery strategy for candidate files in an input directory.
pub trait FileEnumerator: Send + Sync {
    /// Regular files to consider, in a stable order.
    fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Lists the regular files directly inside `dir` (no recursion), sorted by name.
#[derive(Clone, Debug, Default)]
pub struct FlatDirEnumerator;

impl FileEnumerator for FlatDirEnumerator {
    fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ArdError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input directory not found: {}", dir.display()),
            )));
        }
        let mut out = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ArdError::Io(e.into()))?;
            if entry.file_type().is_file() {
                out.push(entry.into_path());
            }
        }
        Ok(out)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumSidecar {
    pub path: PathBuf,
    pub algo: HashAlgo,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bundle {
    pub path: PathBuf,
    pub checksum: Option<ChecksumSidecar>,
}

impl Bundle {
    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Located {
    pub bundles: Vec<Bundle>,
    /// Sidecars with no matching bundle.
    pub orphans: Vec<ChecksumSidecar>,
}

pub fn file_name(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Pair `*.tar` bundles with sidecars named `<stem>.<algo>` or `<stem>.tar.<algo>`.
pub fn pair_bundles(files: &[PathBuf]) -> Located {
    let mut tars: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut sidecars: Vec<(String, ChecksumSidecar)> = Vec::new();

    for p in files {
        let name = file_name(p);
        let Some((stem, ext)) = name.rsplit_once('.') else {
            continue;
        };
        if ext.eq_ignore_ascii_case("tar") {
            tars.insert(stem.to_string(), p.clone());
        } else if let Some(algo) = HashAlgo::from_extension(ext) {
            let key = stem.strip_suffix(".tar").unwrap_or(stem).to_string();
            sidecars.push((
                key,
                ChecksumSidecar {
                    path: p.clone(),
                    algo,
                },
            ));
        }
    }

    let mut matched: BTreeMap<String, ChecksumSidecar> = BTreeMap::new();
    let mut orphans = Vec::new();
    for (key, sc) in sidecars {
        if !tars.contains_key(&key) {
            warn!(sidecar = %sc.path.display(), "checksum file has no matching bundle");
            orphans.push(sc);
        } else if let Some(prev) = matched.get(&key) {
            // first sidecar by name wins
            debug!(kept = %prev.path.display(), ignored = %sc.path.display(), "multiple sidecars");
        } else {
            matched.insert(key, sc);
        }
    }

    let bundles = tars
        .into_iter()
        .map(|(stem, path)| Bundle {
            checksum: matched.remove(&stem),
            path,
        })
        .collect();

    Located { bundles, orphans }
}

/// Enumerate `dir` and pair bundles with sidecars.
pub fn locate(enumerator: &dyn FileEnumerator, dir: &Path) -> Result<Located> {
    let files = enumerator.enumerate(dir)?;
    debug!(dir = %dir.display(), files = files.len(), "enumerated input directory");
    Ok(pair_bundles(&files))
}
