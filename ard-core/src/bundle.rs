use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{ArdError, Result};

/// Largest metadata member read into memory.
pub const MAX_METADATA_BYTES: u64 = 64 << 20;

/// Member listing of one bundle archive, with its metadata read into memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BundleContents {
    /// Regular-file member names in archive order.
    pub members: Vec<String>,
    /// Every `.xml` member and its bytes.
    pub metadata: Vec<(String, Vec<u8>)>,
}

impl BundleContents {
    pub fn tif_members(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .map(String::as_str)
            .filter(|m| m.to_ascii_lowercase().ends_with(".tif"))
    }
}

/// List a tar bundle without extracting it.
pub fn read_bundle(path: &Path) -> Result<BundleContents> {
    let file = File::open(path)?;
    read_archive(BufReader::new(file))
}

pub fn read_archive<R: Read>(rdr: R) -> Result<BundleContents> {
    let mut archive = tar::Archive::new(rdr);
    let mut out = BundleContents::default();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        if name.to_ascii_lowercase().ends_with(".xml") {
            if entry.size() > MAX_METADATA_BYTES {
                return Err(ArdError::Format(format!(
                    "metadata member {name} claims {} bytes, limit is {MAX_METADATA_BYTES}",
                    entry.size()
                )));
            }
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            out.metadata.push((name.clone(), buf));
        }
        out.members.push(name);
    }
    debug!(
        members = out.members.len(),
        metadata = out.metadata.len(),
        "bundle listed"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_of(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut b = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut h = tar::Header::new_gnu();
            h.set_size(data.len() as u64);
            h.set_mode(0o644);
            h.set_cksum();
            b.append_data(&mut h, name, *data).unwrap();
        }
        b.into_inner().unwrap()
    }

    #[test]
    fn lists_members_and_reads_metadata() {
        let bytes = tar_of(&[
            ("X_SRB1.tif", b"raster"),
            ("X.xml", b"<ard_metadata/>"),
            ("X_PIXELQA.TIF", b"qa"),
        ]);
        let c = read_archive(&bytes[..]).unwrap();
        assert_eq!(c.members, vec!["X_SRB1.tif", "X.xml", "X_PIXELQA.TIF"]);
        assert_eq!(c.metadata, vec![("X.xml".to_string(), b"<ard_metadata/>".to_vec())]);
        assert_eq!(c.tif_members().count(), 2);
    }

    #[test]
    fn garbage_is_an_error() {
        let junk = vec![0x5a_u8; 1024];
        assert!(read_archive(&junk[..]).is_err());
    }

    #[test]
    fn oversized_metadata_header_is_a_format_error() {
        let mut h = tar::Header::new_gnu();
        h.set_path("X.xml").unwrap();
        h.set_size(u64::MAX / 2);
        h.set_mode(0o644);
        h.set_entry_type(tar::EntryType::Regular);
        h.set_cksum();
        let mut bytes = h.as_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 1024]);

        match read_archive(&bytes[..]) {
            Err(ArdError::Format(m)) => assert!(m.contains("X.xml"), "{m}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_bundle(&dir.path().join("nope.tar")).unwrap_err();
        assert!(matches!(err, ArdError::Io(_)));
    }
}
