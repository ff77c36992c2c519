//! [`BufferedInputStream`]: a reservation-based reader layered over a
//! [`ByteStream`].

use crate::buffer::DynamicBuffer;
use crate::config::ChannelConfig;
use crate::error::Error;
use crate::io::byte_stream::ByteStream;

/// Reads ahead into an internal [`DynamicBuffer`] and hands out read-only
/// windows by length.
///
/// Invariant: `reserve_pos <= read_pos <= capacity <= max_size`.
pub struct BufferedInputStream<S> {
    buffer: DynamicBuffer,
    stream: S,
    reserve_pos: usize,
    read_pos: usize,
}

impl<S: ByteStream> BufferedInputStream<S> {
    pub fn new(stream: S, config: &ChannelConfig) -> Result<Self, Error> {
        let buffer = DynamicBuffer::new(config.memory_limit(), config.initial_buffer_size())?;
        Ok(Self {
            buffer,
            stream,
            reserve_pos: 0,
            read_pos: 0,
        })
    }

    /// Guarantees at least `n` contiguous bytes available starting at the
    /// reservation cursor, advances the cursor by `n`, and returns the
    /// window. If read-ahead already covers `n` bytes, no I/O happens.
    /// Otherwise the buffer is grown if necessary and the underlying stream
    /// is read exactly once, which may return more than `n` needs (filling
    /// read-ahead for the next call) but must return at least that much or
    /// the call fails.
    pub fn reserve(&mut self, n: usize) -> Result<&[u8], Error> {
        let required_end = self.reserve_pos + n;

        if required_end > self.read_pos {
            self.buffer.resize_at_least(required_end)?;

            let min = required_end - self.read_pos;
            let max = self.buffer.capacity() - self.read_pos;
            let slice = &mut self.buffer.as_mut_slice()[self.read_pos..self.read_pos + max];
            let got = self.stream.read(slice, min).map_err(Error::Receive)?;
            if got < min {
                return Err(Error::Receive(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected at least {min} bytes, got {got}"),
                )));
            }
            self.read_pos += got;
        }

        let window_start = self.reserve_pos;
        self.reserve_pos = required_end;
        Ok(&self.buffer.as_slice()[window_start..required_end])
    }

    /// Shifts any bytes past the reservation cursor to the buffer start and
    /// resets both cursors. Called explicitly by the streaming record
    /// reader to make room after flushing accumulated records to the
    /// caller; never called implicitly by `reserve`.
    pub fn confirm(&mut self) {
        let remaining = self.read_pos - self.reserve_pos;
        self.buffer
            .as_mut_slice()
            .copy_within(self.reserve_pos..self.read_pos, 0);
        self.reserve_pos = 0;
        self.read_pos = remaining;
    }

    /// Resets the buffer bound; contents are discarded. Used by
    /// `set_memory_limit` between requests.
    pub fn set_max_size(&mut self, n: usize) {
        self.buffer.set_max_size(n);
        self.reserve_pos = 0;
        self.read_pos = 0;
    }

    pub fn set_timeout(&self, timeout: Option<std::time::Duration>) -> std::io::Result<()> {
        self.stream.set_timeout(timeout)
    }
}
