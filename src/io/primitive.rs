//! PrimitiveCodec: endian-explicit fixed-width integer access over a
//! window into a buffered stream.
//!
//! The wire is little-endian, independent of host endianness; the
//! conversion always goes through `byteorder::LittleEndian` so the same
//! bytes decode to the same value on every host.

use byteorder::{ByteOrder, LittleEndian};

/// Little-endian fixed-width reads at an explicit offset.
pub trait WireGet {
    fn get_i32_le(&self, at: usize) -> i32;
    fn get_i64_le(&self, at: usize) -> i64;
    fn get_u32_le(&self, at: usize) -> u32;
    fn get_u64_le(&self, at: usize) -> u64;
}

impl WireGet for [u8] {
    fn get_i32_le(&self, at: usize) -> i32 {
        LittleEndian::read_i32(&self[at..at + 4])
    }

    fn get_i64_le(&self, at: usize) -> i64 {
        LittleEndian::read_i64(&self[at..at + 8])
    }

    fn get_u32_le(&self, at: usize) -> u32 {
        LittleEndian::read_u32(&self[at..at + 4])
    }

    fn get_u64_le(&self, at: usize) -> u64 {
        LittleEndian::read_u64(&self[at..at + 8])
    }
}

/// Little-endian fixed-width writes at an explicit offset.
pub trait WirePut {
    fn put_i32_le(&mut self, at: usize, val: i32);
    fn put_i64_le(&mut self, at: usize, val: i64);
    fn put_u32_le(&mut self, at: usize, val: u32);
    fn put_u64_le(&mut self, at: usize, val: u64);
}

impl WirePut for [u8] {
    fn put_i32_le(&mut self, at: usize, val: i32) {
        LittleEndian::write_i32(&mut self[at..at + 4], val);
    }

    fn put_i64_le(&mut self, at: usize, val: i64) {
        LittleEndian::write_i64(&mut self[at..at + 8], val);
    }

    fn put_u32_le(&mut self, at: usize, val: u32) {
        LittleEndian::write_u32(&mut self[at..at + 4], val);
    }

    fn put_u64_le(&mut self, at: usize, val: u64) {
        LittleEndian::write_u64(&mut self[at..at + 8], val);
    }
}
