//! Peek-then-restore reading of a probe window.

use std::io::{self, Chain, Cursor, Read};

/// A reader that yields the peeked probe bytes followed by the rest of the
/// original source, so nothing read for classification is lost.
#[derive(Debug)]
pub struct Peeked<R> {
    inner: Chain<Cursor<Vec<u8>>, R>,
}

impl<R: Read> Peeked<R> {
    /// Reads up to `size` bytes from `reader` and keeps them for replay.
    ///
    /// Short reads are retried until `size` bytes are buffered or the source
    /// reports end of stream. On error the bytes read so far are still
    /// replayed by the returned reader.
    pub fn peek(mut reader: R, size: usize) -> (Self, io::Result<()>) {
        let mut buf = vec![0u8; size];
        let mut filled = 0;
        let mut result = Ok(());

        while filled < size {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        buf.truncate(filled);

        (
            Self {
                inner: Cursor::new(buf).chain(reader),
            },
            result,
        )
    }

    /// The buffered probe bytes.
    #[must_use]
    pub fn probe(&self) -> &[u8] {
        self.inner.get_ref().0.get_ref()
    }

    /// Discards the replay buffer and returns the underlying reader,
    /// positioned after the probe window.
    pub fn into_inner(self) -> R {
        self.inner.into_inner().1
    }
}

impl<R: Read> Read for Peeked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    /// Yields one byte per read call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((first, rest)) if !buf.is_empty() => {
                    buf[0] = *first;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    /// Fails after yielding its bytes.
    struct Failing(Cursor<Vec<u8>>);

    impl Read for Failing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::other("disk on fire")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_peek_restores_full_stream() {
        let data = b"%PDF-1.4\nrest of the document".to_vec();
        let (mut peeked, result) = Peeked::peek(Cursor::new(data.clone()), 4);
        assert!(result.is_ok());
        assert_eq!(peeked.probe(), b"%PDF");

        let mut all = Vec::new();
        peeked.read_to_end(&mut all).unwrap();
        assert_eq!(all, data);
    }

    #[test]
    fn test_peek_fills_across_short_reads() {
        let (peeked, result) = Peeked::peek(Trickle(b"abcdef"), 4);
        assert!(result.is_ok());
        assert_eq!(peeked.probe(), b"abcd");
    }

    #[test]
    fn test_peek_shorter_than_window() {
        let (mut peeked, result) = Peeked::peek(Cursor::new(b"ab".to_vec()), 20);
        assert!(result.is_ok());
        assert_eq!(peeked.probe(), b"ab");

        let mut all = String::new();
        peeked.read_to_string(&mut all).unwrap();
        assert_eq!(all, "ab");
    }

    #[test]
    fn test_peek_error_keeps_partial_bytes() {
        let (peeked, result) = Peeked::peek(Failing(Cursor::new(b"xy".to_vec())), 20);
        assert!(result.is_err());
        assert_eq!(peeked.probe(), b"xy");
    }

    #[test]
    fn test_into_inner_skips_probe() {
        let (peeked, _) = Peeked::peek(Cursor::new(b"abcdef".to_vec()), 2);
        let mut rest = String::new();
        peeked.into_inner().read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "cdef");
    }
}
