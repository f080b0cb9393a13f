use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use log::debug;

use super::detect_fileformat::has_compression_suffix;
use crate::runtime::Error;

pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// One four-line FASTQ record. Lines are stored without their line terminator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastqRecord {
    pub head: Vec<u8>,
    pub seq: Vec<u8>,
    pub sep: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    pub fn has_valid_head(&self) -> bool {
        self.head.first() == Some(&b'@')
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.head)?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.seq)?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.sep)?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.qual)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Read one line into buf, dropping the terminator. Returns false at end of input
fn read_line_into<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(true)
}

///////////////////////////////
/// Streaming reader of four-line records. Memory use is one record plus the underlying buffer
pub struct FastqRecordReader<R> {
    reader: R,
    num_framed: u64,
    num_malformed: u64,
    truncated: bool,
}

impl<R: BufRead> FastqRecordReader<R> {
    pub fn new(reader: R) -> FastqRecordReader<R> {
        FastqRecordReader {
            reader,
            num_framed: 0,
            num_malformed: 0,
            truncated: false,
        }
    }

    /// Read the next four lines, whatever they contain.
    /// Returns false at the end of input, including when fewer than four lines remain
    pub fn read_framed(&mut self, record: &mut FastqRecord) -> io::Result<bool> {
        if !read_line_into(&mut self.reader, &mut record.head)? {
            return Ok(false);
        }
        let complete = read_line_into(&mut self.reader, &mut record.seq)?
            && read_line_into(&mut self.reader, &mut record.sep)?
            && read_line_into(&mut self.reader, &mut record.qual)?;
        if !complete {
            self.truncated = true;
            return Ok(false);
        }
        self.num_framed += 1;
        Ok(true)
    }

    /// Read the next complete record whose header starts with '@'.
    /// Records with any other header are skipped and counted as malformed
    pub fn read_record(&mut self, record: &mut FastqRecord) -> io::Result<bool> {
        loop {
            if !self.read_framed(record)? {
                return Ok(false);
            }
            if record.has_valid_head() {
                return Ok(true);
            }
            self.num_malformed += 1;
        }
    }

    pub fn records(self) -> FastqRecords<R> {
        FastqRecords { reader: self }
    }

    pub fn num_malformed(&self) -> u64 {
        self.num_malformed
    }

    /// Number of four-line groups read so far, valid or not
    pub fn num_framed(&self) -> u64 {
        self.num_framed
    }

    /// True once a trailing partial record has been dropped
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Owning iterator over valid records; allocates one record per item
pub struct FastqRecords<R> {
    reader: FastqRecordReader<R>,
}

impl<R: BufRead> Iterator for FastqRecords<R> {
    type Item = io::Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = FastqRecord::default();
        match self.reader.read_record(&mut record) {
            Ok(true) => Some(Ok(record)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Open a file for buffered reading, decompressing when the suffix says so
pub fn open_fastq_stream(path: &Path, buffer_size: usize) -> Result<Box<dyn BufRead>, Error> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::file_not_found(path),
        _ => Error::read_failed(path, e),
    })?;
    let len = file
        .metadata()
        .map_err(|e| Error::read_failed(path, e))?
        .len();

    if len == 0 {
        debug!("Opened empty file {}", path.display());
        return Ok(Box::new(io::empty()));
    }

    if has_compression_suffix(path) {
        let (reader, compression) = niffler::get_reader(Box::new(file))
            .map_err(|e| Error::file_not_valid(path, Some(e.to_string())))?;
        debug!(
            "Opened file {} with compression {:?}",
            path.display(),
            compression
        );
        Ok(Box::new(BufReader::with_capacity(buffer_size, reader)))
    } else {
        debug!("Opened plain file {}", path.display());
        Ok(Box::new(BufReader::with_capacity(buffer_size, file)))
    }
}

pub fn open_fastq(
    path: &Path,
    buffer_size: usize,
) -> Result<FastqRecordReader<Box<dyn BufRead>>, Error> {
    Ok(FastqRecordReader::new(open_fastq_stream(path, buffer_size)?))
}

/// Number of complete, well-formed records in a file
pub fn count_records(path: &Path, buffer_size: usize) -> Result<u64, Error> {
    let mut reader = open_fastq(path, buffer_size)?;
    let mut record = FastqRecord::default();
    let mut n = 0;
    while reader
        .read_record(&mut record)
        .map_err(|e| Error::read_failed(path, e))?
    {
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader_for(text: &str) -> FastqRecordReader<Cursor<Vec<u8>>> {
        FastqRecordReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_reads_complete_records() {
        let records: Vec<FastqRecord> = reader_for("@r1\nACGT\n+\nFFFF\n@r2\nGG\n+\nFF\n")
            .records()
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].head, b"@r1".to_vec());
        assert_eq!(records[1].seq, b"GG".to_vec());
    }

    #[test]
    fn test_partial_trailing_record_is_dropped() {
        let mut reader = reader_for("@r1\nACGT\n+\nFFFF\n@r2\nACGT\n");
        let mut record = FastqRecord::default();
        assert!(reader.read_record(&mut record).unwrap());
        assert!(!reader.read_record(&mut record).unwrap());
        assert!(reader.is_truncated());
    }

    #[test]
    fn test_bad_header_is_skipped() {
        let mut reader = reader_for(">r1\nACGT\n+\nFFFF\n@r2\nAC\n+\nFF\n");
        let mut record = FastqRecord::default();
        assert!(reader.read_record(&mut record).unwrap());
        assert_eq!(record.head, b"@r2".to_vec());
        assert_eq!(reader.num_malformed(), 1);
        assert_eq!(reader.num_framed(), 2);
    }

    #[test]
    fn test_missing_final_newline_and_crlf() {
        let mut reader = reader_for("@r1\r\nACGT\r\n+\r\nFFFF");
        let mut record = FastqRecord::default();
        assert!(reader.read_record(&mut record).unwrap());
        assert_eq!(record.seq, b"ACGT".to_vec());
        assert_eq!(record.qual, b"FFFF".to_vec());

        let mut out = Vec::new();
        record.write(&mut out).unwrap();
        assert_eq!(out, b"@r1\nACGT\n+\nFFFF\n".to_vec());
    }

    #[test]
    fn test_empty_input() {
        let mut reader = reader_for("");
        let mut record = FastqRecord::default();
        assert!(!reader.read_record(&mut record).unwrap());
        assert!(!reader.is_truncated());
    }
}
