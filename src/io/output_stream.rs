//! [`BufferedOutputStream`]: a reservation-based writer layered over a
//! [`ByteStream`].

use crate::buffer::DynamicBuffer;
use crate::config::ChannelConfig;
use crate::error::Error;
use crate::io::byte_stream::ByteStream;

/// Hands out writable windows, tracks confirmed bytes, flushes on demand.
///
/// Invariant: `reserve_pos <= capacity <= max_size`.
pub struct BufferedOutputStream<S> {
    buffer: DynamicBuffer,
    stream: S,
    reserve_pos: usize,
}

impl<S: ByteStream> BufferedOutputStream<S> {
    pub fn new(stream: S, config: &ChannelConfig) -> Result<Self, Error> {
        let buffer = DynamicBuffer::new(config.memory_limit(), config.initial_buffer_size())?;
        Ok(Self {
            buffer,
            stream,
            reserve_pos: 0,
        })
    }

    /// Allocates `n` bytes of writable space contiguous from the
    /// reservation cursor, growing the buffer if needed. Does not advance
    /// the cursor and does not touch the underlying stream; the caller
    /// writes into the window then calls [`Self::confirm`].
    pub fn reserve(&mut self, n: usize) -> Result<&mut [u8], Error> {
        let end = self.reserve_pos + n;
        self.buffer.resize_at_least(end)?;
        Ok(&mut self.buffer.as_mut_slice()[self.reserve_pos..end])
    }

    /// Like [`Self::reserve`], but on `limit-exceeded` flushes the
    /// confirmed bytes out (freeing up room at the front is not possible
    /// since data is contiguous from zero, but flushing resets the cursor
    /// so growth needed is only for the unconfirmed tail) and retries once.
    pub fn reserve_or_flush(&mut self, n: usize) -> Result<&mut [u8], Error> {
        match self.reserve(n) {
            Err(Error::LimitExceeded) => {
                self.flush()?;
                self.reserve(n)
            }
            other => other,
        }
    }

    /// Advances the reservation cursor by `n` after the caller has written
    /// into the window most recently returned by `reserve`.
    pub fn confirm(&mut self, n: usize) {
        self.reserve_pos += n;
    }

    /// Writes `[0, reserve_pos)` through the underlying stream and resets
    /// the cursor to zero.
    pub fn flush(&mut self) -> Result<(), Error> {
        if self.reserve_pos == 0 {
            return Ok(());
        }
        self.stream
            .write(&self.buffer.as_slice()[..self.reserve_pos])
            .map_err(Error::Send)?;
        self.reserve_pos = 0;
        Ok(())
    }

    pub fn size_reserved(&self) -> usize {
        self.reserve_pos
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Direct access to an already-reserved region at an absolute offset,
    /// for backpatching a header slot (e.g. a batch's `batchSize`) written
    /// as a placeholder earlier in the same unflushed buffer.
    pub fn patch(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.buffer.as_mut_slice()[offset..offset + len]
    }

    pub fn set_max_size(&mut self, n: usize) {
        self.buffer.set_max_size(n);
        self.reserve_pos = 0;
    }

    pub fn set_timeout(&self, timeout: Option<std::time::Duration>) -> std::io::Result<()> {
        self.stream.set_timeout(timeout)
    }
}
