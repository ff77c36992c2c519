//! The caller-supplied payload codec capability.

/// Per-channel codec for the opaque payload type `T`.
///
/// One trait for both directions rather than a separate encode/decode pair,
/// since the protocol always needs them together. The protocol itself never
/// inspects `T`; it only needs to know how many bytes a value takes on the
/// wire and how to turn bytes back into a value.
pub trait EncodeDecode<T> {
    /// Writes `value`'s serialization into `out` iff `out.len() >= needed`,
    /// and always returns the exact needed byte count. Deterministic: the
    /// same value must always produce the same bytes.
    ///
    /// Callers probe the required size with an empty (or undersized) `out`
    /// before reserving wire space, then call again once space is secured.
    fn encode(&self, value: &T, out: &mut [u8]) -> usize;

    /// Decodes a value from exactly `buf.len()` bytes. `buf.len()` is
    /// always the payload length established by the frame around it.
    fn decode(&self, buf: &[u8]) -> Result<T, DecodeError>;
}

/// Payload decoding failed. Carries whatever the codec wants to say about
/// why; the channel wraps it into [`crate::error::Error::Decode`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
