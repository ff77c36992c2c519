//! Client-side wire-protocol engine for TStorage, a proprietary
//! time-series database. Establishes a stateful TCP channel and drives the
//! GET, GET_ACQ, PUT_SAFE and PUT_A_SAFE exchanges over it, with a
//! buffered, zero-copy byte-framing pipeline underneath.
//!
//! The transport and the payload serialization are external collaborators:
//! bring your own [`io::ByteStream`] (a real one is provided,
//! [`io::TcpByteStream`]) and [`codec::EncodeDecode`].

#![forbid(unsafe_code)]

pub mod batch;
pub mod buffer;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod key;
pub mod reader;
pub mod record;
pub mod wire;

pub use batch::PutMode;
pub use channel::Channel;
pub use codec::{DecodeError, EncodeDecode};
pub use config::ChannelConfig;
pub use error::{Error, Result};
pub use io::{ByteStream, Connect, TcpByteStream};
pub use key::{Key, KeyRange};
pub use record::{Record, RecordsSet};
pub use wire::Command;
