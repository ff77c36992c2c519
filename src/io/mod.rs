//! Buffered, zero-copy byte framing over a [`byte_stream::ByteStream`].

pub mod byte_stream;
pub mod input_stream;
pub mod output_stream;
pub mod primitive;

pub use byte_stream::{ByteStream, Connect, TcpByteStream};
pub use input_stream::BufferedInputStream;
pub use output_stream::BufferedOutputStream;
