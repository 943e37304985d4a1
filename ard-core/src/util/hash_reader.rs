use std::io::{Read, Result};

use md5::Md5;
use sha2::{Digest, Sha256};

/// Digest algorithm of a checksum sidecar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HashAlgo {
    Md5,
    Sha256,
    Blake3,
}

impl HashAlgo {
    /// Map a sidecar extension (without the dot) to its algorithm.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md5" => Some(HashAlgo::Md5),
            "sha256" => Some(HashAlgo::Sha256),
            "b3" | "blake3" => Some(HashAlgo::Blake3),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgo::Md5 => "md5",
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Blake3 => "blake3",
        }
    }

    /// Hex digest length.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgo::Md5 => 32,
            HashAlgo::Sha256 | HashAlgo::Blake3 => 64,
        }
    }
}

pub enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    pub fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Md5 => Hasher::Md5(Md5::new()),
            HashAlgo::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgo::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, buf: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(buf),
            Hasher::Sha256(h) => h.update(buf),
            Hasher::Blake3(h) => {
                h.update(buf);
            }
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Reader adapter that feeds every byte it yields into a hasher.
pub struct HashingReader<'a, R: Read> {
    inner: R,
    hasher: &'a mut Hasher,
    pub counted: u64,
}

impl<'a, R: Read> HashingReader<'a, R> {
    pub fn new(inner: R, hasher: &'a mut Hasher) -> Self {
        Self {
            inner,
            hasher,
            counted: 0,
        }
    }
}

impl<'a, R: Read> Read for HashingReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.counted += n as u64;
        Ok(n)
    }
}

/// Stream `r` to the end and return its hex digest and byte count.
pub fn digest_reader<R: Read>(r: R, algo: HashAlgo) -> Result<(String, u64)> {
    let mut hasher = Hasher::new(algo);
    let mut hr = HashingReader::new(r, &mut hasher);
    std::io::copy(&mut hr, &mut std::io::sink())?;
    let n = hr.counted;
    Ok((hasher.finalize_hex(), n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests_of_abc() {
        let (md5, n) = digest_reader(&b"abc"[..], HashAlgo::Md5).unwrap();
        assert_eq!(md5, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(n, 3);

        let (sha, _) = digest_reader(&b"abc"[..], HashAlgo::Sha256).unwrap();
        assert_eq!(
            sha,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let (b3, _) = digest_reader(&b"abc"[..], HashAlgo::Blake3).unwrap();
        assert_eq!(b3, blake3::hash(b"abc").to_hex().to_string());
        assert_eq!(b3.len(), HashAlgo::Blake3.hex_len());
    }

    #[test]
    fn extension_mapping_is_case_insensitive() {
        assert_eq!(HashAlgo::from_extension("MD5"), Some(HashAlgo::Md5));
        assert_eq!(HashAlgo::from_extension("b3"), Some(HashAlgo::Blake3));
        assert_eq!(HashAlgo::from_extension("tar"), None);
    }
}
