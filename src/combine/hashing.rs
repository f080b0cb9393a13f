use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::runtime::Error;

/// Passes bytes through to the inner writer and hashes exactly what it accepted
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    num_bytes: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> HashingWriter<W> {
        HashingWriter {
            inner,
            hasher: Sha256::new(),
            num_bytes: 0,
        }
    }

    pub fn num_bytes(&self) -> u64 {
        self.num_bytes
    }

    /// Inner writer and lower-case hex SHA-256 of everything written
    pub fn finalize(self) -> (W, String) {
        (self.inner, format!("{:x}", self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.num_bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// SHA-256 of a file on disk, same digest as HashingWriter gives for the same bytes
pub fn checksum_file(path: &Path) -> Result<String, Error> {
    let file = File::open(path).map_err(|e| Error::read_failed(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(file), &mut hasher).map_err(|e| Error::read_failed(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}
