//! The record key and the half-open ranges used to query it.

use crate::io::primitive::{WireGet, WirePut};

/// Reserved `cid` marking the end of a batch stream on the wire; never a
/// legal key `cid`.
pub const SENTINEL_CID: i32 = -1;

/// A 5-tuple key, lexicographically ordered by `(cid, mid, moid, cap, acq)`.
///
/// Field declaration order matches wire order and sort order on purpose:
/// the derived [`Ord`] falls out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub cid: i32,
    pub mid: i64,
    pub moid: i32,
    pub cap: i64,
    pub acq: i64,
}

impl Key {
    /// Size on the wire with every field present.
    pub const WIRE_SIZE_FULL: usize = 32;
    /// Size on the wire with `cid` omitted (PUT_A_SAFE record key).
    pub const WIRE_SIZE_NO_CID: usize = 28;
    /// Size on the wire with `cid` and `acq` omitted (PUT_SAFE record key).
    pub const WIRE_SIZE_NO_CID_NO_ACQ: usize = 20;

    pub fn new(cid: i32, mid: i64, moid: i32, cap: i64, acq: i64) -> Self {
        Self {
            cid,
            mid,
            moid,
            cap,
            acq,
        }
    }

    /// Writes all 32 bytes: `cid, mid, moid, cap, acq`.
    pub fn encode_full(&self, buf: &mut [u8]) {
        buf.put_i32_le(0, self.cid);
        buf.put_i64_le(4, self.mid);
        buf.put_i32_le(12, self.moid);
        buf.put_i64_le(16, self.cap);
        buf.put_i64_le(24, self.acq);
    }

    pub fn decode_full(buf: &[u8]) -> Self {
        Self {
            cid: buf.get_i32_le(0),
            mid: buf.get_i64_le(4),
            moid: buf.get_i32_le(12),
            cap: buf.get_i64_le(16),
            acq: buf.get_i64_le(24),
        }
    }

    /// Writes `mid, moid, cap, acq` (28 bytes) — the PUT_A_SAFE record key.
    pub fn encode_no_cid(&self, buf: &mut [u8]) {
        buf.put_i64_le(0, self.mid);
        buf.put_i32_le(8, self.moid);
        buf.put_i64_le(12, self.cap);
        buf.put_i64_le(20, self.acq);
    }

    /// Writes `mid, moid, cap` (20 bytes) — the PUT_SAFE record key, where
    /// `acq` is assigned by the server and therefore not sent.
    pub fn encode_no_cid_no_acq(&self, buf: &mut [u8]) {
        buf.put_i64_le(0, self.mid);
        buf.put_i32_le(8, self.moid);
        buf.put_i64_le(12, self.cap);
    }
}

/// A half-open range `[min, max)` in key-lexicographic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub min: Key,
    pub max: Key,
}

impl KeyRange {
    pub fn new(min: Key, max: Key) -> Self {
        Self { min, max }
    }

    /// `min <= max - 1` must hold for the range to be a legal request.
    ///
    /// Implemented as `min < max` rather than literally subtracting 1 from
    /// `max`, since `max` is a tuple of independent integer fields with no
    /// single predecessor operation; the two are equivalent for a
    /// lexicographic order with no gaps to worry about at this level.
    pub fn is_valid(&self) -> bool {
        self.min < self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ordering_matches_field_order() {
        let a = Key::new(0, 0, 0, 0, 0);
        let b = Key::new(0, 0, 0, 0, 1);
        let c = Key::new(1, i64::MIN, i32::MIN, i64::MIN, i64::MIN);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn key_round_trips_through_wire_encoding() {
        let k = Key::new(7, -5, 3, i64::MAX, i64::MIN);
        let mut buf = [0u8; Key::WIRE_SIZE_FULL];
        k.encode_full(&mut buf);
        assert_eq!(Key::decode_full(&buf), k);
    }

    #[test]
    fn key_range_validity() {
        let min = Key::new(0, 0, 0, 0, 0);
        let max = Key::new(0, 0, 0, 0, 1);
        assert!(KeyRange::new(min, max).is_valid());
        assert!(!KeyRange::new(min, min).is_valid());
        assert!(!KeyRange::new(max, min).is_valid());
    }
}
