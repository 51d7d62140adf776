//! Byte source abstraction for the element stream decoder.
//!
//! The decoder only needs to pull bytes in order,
//! and to know how many it has consumed so far.
use std::io::{self, ErrorKind, Read};

/// A sequential source of bytes which keeps track of its position.
pub trait ByteSource {
    /// Read bytes into `buf`, returning the number of bytes read.
    ///
    /// Short reads from the underlying medium are accumulated,
    /// so the outcome is only less than `buf.len()`
    /// when the source is exhausted.
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// The number of bytes consumed from the source so far.
    fn position(&self) -> u64;

    /// Advance the source by up to `n` bytes,
    /// returning the number of bytes effectively skipped.
    fn skip(&mut self, n: u64) -> io::Result<u64>;
}

impl<T: ?Sized> ByteSource for &mut T
where
    T: ByteSource,
{
    #[inline]
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_up_to(buf)
    }

    #[inline]
    fn position(&self) -> u64 {
        (**self).position()
    }

    #[inline]
    fn skip(&mut self, n: u64) -> io::Result<u64> {
        (**self).skip(n)
    }
}

/// A byte source over any [`Read`] implementation,
/// such as a file, a socket or an in-memory slice.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
    position: u64,
}

impl<R> StreamSource<R> {
    /// Wrap a reader, starting at position 0.
    pub fn new(inner: R) -> Self {
        StreamSource { inner, position: 0 }
    }

    /// Wrap a reader whose first byte is at the given stream position.
    pub fn with_position(inner: R, position: u64) -> Self {
        StreamSource { inner, position }
    }

    /// Unwrap the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> ByteSource for StreamSource<R>
where
    R: Read,
{
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.inner.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.position += total as u64;
                    return Err(e);
                }
            }
        }
        self.position += total as u64;
        Ok(total)
    }

    #[inline]
    fn position(&self) -> u64 {
        self.position
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        self.position += skipped;
        Ok(skipped)
    }
}
