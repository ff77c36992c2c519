//! [`DynamicBuffer`]: an amortized-growth contiguous byte arena with a hard
//! upper bound.

use crate::error::Error;

/// A growable byte arena bounded by `max_size`. Grows by doubling, clamped
/// to `max_size`; never shrinks on its own, only on `set_max_size`.
///
/// Holding a slice into storage across a successful `resize_at_least` is
/// illegal: growth may reallocate. Callers only ever hold a window for the
/// duration of one reserve/confirm step, so this is enforced naturally by
/// the borrow checker rather than documented as a runtime hazard.
#[derive(Debug)]
pub struct DynamicBuffer {
    storage: Vec<u8>,
    max_size: usize,
}

impl DynamicBuffer {
    pub fn new(max_size: usize, initial_size: usize) -> Result<Self, Error> {
        if initial_size > max_size {
            return Err(Error::Invalid("initial_size exceeds max_size"));
        }

        let mut storage = Vec::new();
        storage
            .try_reserve(initial_size)
            .map_err(|_| Error::ResourceExhaustion)?;
        storage.resize(initial_size, 0);

        Ok(Self { storage, max_size })
    }

    /// Grows to at least `n` bytes if not already that large: doubling
    /// when `n <= 2 * size`, otherwise growing to exactly `n`, clamped to
    /// `max_size` either way. No-op if `n <= size`.
    pub fn resize_at_least(&mut self, n: usize) -> Result<(), Error> {
        if n <= self.storage.len() {
            return Ok(());
        }

        if n > self.max_size {
            return Err(Error::LimitExceeded);
        }

        let doubled = self.storage.len().saturating_mul(2);
        let target = if n <= doubled { doubled } else { n }.min(self.max_size);

        let additional = target - self.storage.len();
        self.storage
            .try_reserve(additional)
            .map_err(|_| Error::ResourceExhaustion)?;
        self.storage.resize(target, 0);

        Ok(())
    }

    /// Frees the current allocation and records a new upper bound. The
    /// buffer reallocates lazily on next use.
    pub fn set_max_size(&mut self, n: usize) {
        self.storage = Vec::new();
        self.max_size = n;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Current physical capacity (not the amount of valid data in it —
    /// that's tracked separately by the buffered streams).
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}
