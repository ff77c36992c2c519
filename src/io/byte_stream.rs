//! The `ByteStream` collaborator: the only capability the core requires
//! from a transport.

use std::io;
use std::net::TcpStream;
use std::rc::Rc;
use std::time::Duration;

/// A byte transport the channel drives synchronously from its own thread.
///
/// `read`/`write` take `&self` rather than `&mut self`: the only state a
/// real socket needs is the OS file descriptor, which supports concurrent
/// read and write without Rust-level exclusivity. This lets
/// [`crate::io::input_stream::BufferedInputStream`] and
/// [`crate::io::output_stream::BufferedOutputStream`] each hold their own
/// cheap handle onto the same connection instead of fighting over one
/// `&mut`.
pub trait ByteStream {
    /// Attempts one read into `buf`, requiring at least `min` bytes.
    /// Returns the count actually read. A return `< min` is a protocol
    /// error; `0` specifically means the peer closed the connection.
    /// Timeouts surface identically to other I/O errors.
    fn read(&self, buf: &mut [u8], min: usize) -> io::Result<usize>;

    /// Writes all of `buf` or reports an error.
    fn write(&self, buf: &[u8]) -> io::Result<()>;

    /// Sets the send/receive timeout, effective immediately.
    fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

/// Capability to open a fresh connection of this stream type.
pub trait Connect: Sized {
    fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<Self>;
}

/// The reference `ByteStream`: a `std::net::TcpStream` shared behind an
/// `Rc` so the channel's two buffered streams can each hold a cheap clone
/// of the one connection. `Rc`, not `Arc`: the channel is explicitly
/// single-threaded per request (see the crate's concurrency model).
#[derive(Debug, Clone)]
pub struct TcpByteStream {
    inner: Rc<TcpStream>,
}

impl ByteStream for TcpByteStream {
    /// Loops over as many `recv` calls as it takes to gather at least `min`
    /// bytes, since a single TCP read may return less than that even while
    /// the connection is healthy. [`BufferedInputStream`](crate::io::input_stream::BufferedInputStream)
    /// calls this once per reservation and relies on the `min` guarantee
    /// holding by the time it returns.
    fn read(&self, buf: &mut [u8], min: usize) -> io::Result<usize> {
        use io::Read;

        let mut stream = &*self.inner;
        let mut total = 0;
        while total < min {
            match stream.read(&mut buf[total..]) {
                Ok(0) => break, // peer closed
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if total < min {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected at least {min} bytes, got {total}"),
            ));
        }
        Ok(total)
    }

    fn write(&self, buf: &[u8]) -> io::Result<()> {
        use io::Write;

        let mut stream = &*self.inner;
        stream.write_all(buf)
    }

    fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(timeout)?;
        self.inner.set_write_timeout(timeout)
    }
}

impl Connect for TcpByteStream {
    fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: Rc::new(stream),
        })
    }
}
