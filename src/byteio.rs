//! Wraps an input stream, tracks bytes-remaining-in-section and a running
//! CRC of consumed bytes, and optionally tees writes to a rewrite sink with
//! its own CRC.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::crc::fit_crc;
use crate::error::{FitError, FitResult};

pub struct ByteSource<R> {
    inner: R,
    crc: u16,
    /// Bytes remaining in the current record section; `None` before the
    /// file header has set it.
    remaining: Option<i64>,
    sink: Option<Box<dyn Write>>,
    out_crc: u16,
}

impl<R: Read> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        ByteSource { inner, crc: 0, remaining: None, sink: None, out_crc: 0 }
    }

    pub fn with_sink(inner: R, sink: Box<dyn Write>) -> Self {
        ByteSource { inner, crc: 0, remaining: None, sink: Some(sink), out_crc: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    pub fn out_crc(&self) -> u16 {
        self.out_crc
    }

    pub fn remaining(&self) -> Option<i64> {
        self.remaining
    }

    pub fn set_remaining(&mut self, n: i64) {
        self.remaining = Some(n);
    }

    pub fn reset_crc(&mut self) {
        self.crc = 0;
        self.out_crc = 0;
    }

    /// Reads exactly `n` bytes, folding them into the running CRC and
    /// decrementing the remaining-bytes counter. `UnexpectedEof` (surfaced
    /// as `FitError::Eof`) if fewer than `n` bytes are available.
    pub fn read(&mut self, n: usize) -> FitResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf).map_err(|_| {
            // We don't know exactly how many bytes were actually available
            // without a fallible partial read; report the request size.
            FitError::Eof { wanted: n, got: 0 }
        })?;
        self.crc = fit_crc(&buf, self.crc);
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= n as i64;
        }
        Ok(buf)
    }

    /// Tees `data` to the rewrite sink, folding it into the sink's CRC. A
    /// no-op (short-circuits all encoding work) when no sink is attached.
    pub fn write(&mut self, data: &[u8]) -> FitResult<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(data)?;
            self.out_crc = fit_crc(data, self.out_crc);
        }
        Ok(())
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }
}

impl<R: Read + Seek> ByteSource<R> {
    pub fn tell(&mut self) -> FitResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn seek_end(&mut self) -> FitResult<u64> {
        Ok(self.inner.seek(SeekFrom::End(0))?)
    }

    /// True once the stream position equals its total length.
    pub fn at_eof(&mut self) -> FitResult<bool> {
        let pos = self.tell()?;
        let cur = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(cur))?;
        Ok(pos >= end || cur >= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_folds_crc_and_decrements_remaining() {
        let mut src = ByteSource::new(Cursor::new(vec![1, 2, 3, 4]));
        src.set_remaining(4);
        let a = src.read(2).unwrap();
        assert_eq!(a, vec![1, 2]);
        assert_eq!(src.remaining(), Some(2));
        assert_ne!(src.crc(), 0);
    }

    #[test]
    fn short_read_is_eof_error() {
        let mut src = ByteSource::new(Cursor::new(vec![1]));
        assert!(matches!(src.read(4), Err(FitError::Eof { .. })));
    }

    #[test]
    fn write_without_sink_is_noop() {
        let mut src = ByteSource::new(Cursor::new(vec![1, 2]));
        src.write(&[9, 9]).unwrap();
        assert_eq!(src.out_crc(), 0);
    }

    #[test]
    fn write_with_sink_folds_out_crc() {
        let sink: Box<dyn Write> = Box::new(Vec::new());
        let mut src = ByteSource::with_sink(Cursor::new(vec![1, 2]), sink);
        src.write(&[9, 9]).unwrap();
        assert_ne!(src.out_crc(), 0);
    }
}
