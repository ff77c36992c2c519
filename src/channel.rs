//! [`Channel`]: sequences the four request/response exchanges over one
//! connection, enforces legal ordering, and maps errors to the public
//! taxonomy.

use std::time::Duration;

use crate::batch::{write_batches, PutMode};
use crate::codec::EncodeDecode;
use crate::config::ChannelConfig;
use crate::error::Error;
use crate::io::byte_stream::{ByteStream, Connect};
use crate::io::input_stream::BufferedInputStream;
use crate::io::output_stream::BufferedOutputStream;
use crate::io::primitive::{WireGet, WirePut};
use crate::key::KeyRange;
use crate::reader::{read_all, read_streaming};
use crate::record::RecordsSet;
use crate::wire::{
    Command, ACQ_BODY_SIZE, KEY_RANGE_WIRE_SIZE, PUT_RESPONSE_ACQ_SIZE, REQUEST_HEADER_SIZE,
    RESPONSE_HEADER_SIZE,
};

/// The open half of a [`Channel`]: the two buffered streams layered over
/// one connected [`ByteStream`].
struct Connection<S> {
    input: BufferedInputStream<S>,
    output: BufferedOutputStream<S>,
}

/// A stateful client channel to a TStorage node. `CLOSED` is modeled as
/// `conn: None`; any sub-state within an exchange lives only on the call
/// stack of the method driving it, since every exchange is synchronous
/// with respect to the caller.
///
/// An `Invalid` error (illegal call in the current state, e.g. `connect`
/// while open, an inverted key range) never tears down an already-open
/// connection: nothing was written to the wire, so there is nothing to
/// recover from. Every other error kind closes the channel, per the
/// caller-visible contract that the connection must be reconnected after
/// any non-`ok` result other than a caller mistake.
pub struct Channel<S, C, T> {
    config: ChannelConfig,
    codec: C,
    conn: Option<Connection<S>>,
    _payload: std::marker::PhantomData<T>,
}

impl<S, C, T> Channel<S, C, T>
where
    S: ByteStream + Connect + Clone,
    C: EncodeDecode<T>,
{
    /// Opens the underlying stream and allocates both buffers at the
    /// configured memory limit.
    pub fn connect(&mut self) -> Result<(), Error> {
        if self.conn.is_some() {
            return Err(Error::Invalid("connect called while already open"));
        }

        log::debug!(
            "connecting to {}:{} (memory_limit={}, timeout={:?})",
            self.config.host(),
            self.config.port(),
            self.config.memory_limit(),
            self.config.timeout()
        );
        let stream = S::connect(self.config.host(), self.config.port(), self.config.timeout())
            .map_err(Error::Receive)?;
        let input = BufferedInputStream::new(stream.clone(), &self.config)?;
        let output = BufferedOutputStream::new(stream, &self.config)?;
        self.conn = Some(Connection { input, output });
        log::info!("connected to {}:{}", self.config.host(), self.config.port());
        Ok(())
    }
}

impl<S, C, T> Channel<S, C, T>
where
    S: ByteStream,
    C: EncodeDecode<T>,
{
    pub fn new(config: ChannelConfig, codec: C) -> Self {
        Self {
            config,
            codec,
            conn: None,
            _payload: std::marker::PhantomData,
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Severs the underlying stream. Does not flush.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.conn.take().is_none() {
            return Err(Error::Invalid("close called while not open"));
        }
        log::debug!("channel closed");
        Ok(())
    }

    /// Takes effect immediately on the underlying stream, in any state.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
        self.config = self.config.clone().with_timeout(timeout);
        if let Some(conn) = &self.conn {
            conn.input.set_timeout(Some(timeout)).map_err(Error::Receive)?;
            conn.output.set_timeout(Some(timeout)).map_err(Error::Send)?;
        }
        Ok(())
    }

    /// Resets the buffer (contents discarded, reallocated lazily).
    pub fn set_memory_limit(&mut self, bytes: usize) {
        self.config = self.config.clone().with_memory_limit(bytes);
        if let Some(conn) = &mut self.conn {
            conn.input.set_max_size(bytes);
            conn.output.set_max_size(bytes);
        }
    }

    /// Writes the GET frame, reads the response header, the record stream,
    /// then the confirmation header. Returns every record decoded before a
    /// failure alongside the error, per the partial-results contract.
    pub fn get(
        &mut self,
        range: KeyRange,
    ) -> Result<(RecordsSet<T>, i64), (RecordsSet<T>, Error)> {
        if let Err(e) = require_valid_range(&range) {
            return Err((RecordsSet::new(), e));
        }

        let outcome = self.get_inner(range);
        if let Err((_, e)) = &outcome {
            if !e.is_invalid() {
                log::warn!("closing channel after error: {e}");
                self.conn = None;
            }
        }
        outcome
    }

    fn get_inner(
        &mut self,
        range: KeyRange,
    ) -> Result<(RecordsSet<T>, i64), (RecordsSet<T>, Error)> {
        if let Err(e) = self.write_get_request(Command::Get, range) {
            return Err((RecordsSet::new(), e));
        }

        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err((RecordsSet::new(), Error::Invalid("channel is not open"))),
        };

        let result = read_get_response(&mut conn.input, &self.codec);
        conn.input.confirm();
        result
    }

    /// Same semantics as [`Self::get`] but hands records to `callback` as
    /// soon as the buffer fills, instead of materializing the whole set.
    pub fn get_stream(
        &mut self,
        range: KeyRange,
        callback: impl FnMut(RecordsSet<T>),
    ) -> Result<i64, Error> {
        require_valid_range(&range)?;
        let result = self.get_stream_inner(range, callback);
        self.close_on_non_invalid_error(&result);
        result
    }

    fn get_stream_inner(
        &mut self,
        range: KeyRange,
        callback: impl FnMut(RecordsSet<T>),
    ) -> Result<i64, Error> {
        self.write_get_request(Command::Get, range)?;

        let conn = self.conn.as_mut().ok_or(Error::Invalid("channel is not open"))?;
        let result = read_get_stream_response(&mut conn.input, &self.codec, callback);
        conn.input.confirm();
        result
    }

    pub fn get_acq(&mut self, range: KeyRange) -> Result<i64, Error> {
        require_valid_range(&range)?;
        let result = self.get_acq_inner(range);
        self.close_on_non_invalid_error(&result);
        result
    }

    fn get_acq_inner(&mut self, range: KeyRange) -> Result<i64, Error> {
        self.write_get_request(Command::GetAcq, range)?;
        let conn = self.conn.as_mut().ok_or(Error::Invalid("channel is not open"))?;
        let result = read_acq_response(&mut conn.input);
        conn.input.confirm();
        result
    }

    /// Serializes `records` as a PUT_SAFE batch stream and reads the
    /// result.
    pub fn put(&mut self, records: &RecordsSet<T>) -> Result<(), Error> {
        let result = self.put_inner(records, PutMode::Safe, Command::PutSafe);
        self.close_on_non_invalid_error(&result);
        result
    }

    /// Serializes `records` as a PUT_A_SAFE batch stream and reads the
    /// result.
    pub fn put_a(&mut self, records: &RecordsSet<T>) -> Result<(), Error> {
        let result = self.put_inner(records, PutMode::ASafe, Command::PutASafe);
        self.close_on_non_invalid_error(&result);
        result
    }

    fn put_inner(
        &mut self,
        records: &RecordsSet<T>,
        mode: PutMode,
        cmd: Command,
    ) -> Result<(), Error> {
        {
            let conn = self.conn.as_mut().ok_or(Error::Invalid("channel is not open"))?;
            write_request_header(&mut conn.output, cmd, 0)?;
            write_batches(&mut conn.output, &self.codec, records, mode)?;
            conn.output.flush()?;
        }

        let conn = self.conn.as_mut().ok_or(Error::Invalid("channel is not open"))?;
        let result = read_put_response(&mut conn.input);
        conn.input.confirm();
        result
    }

    fn write_get_request(&mut self, cmd: Command, range: KeyRange) -> Result<(), Error> {
        let conn = self.conn.as_mut().ok_or(Error::Invalid("channel is not open"))?;
        write_request_header(&mut conn.output, cmd, KEY_RANGE_WIRE_SIZE as u64)?;
        let window = conn.output.reserve_or_flush(KEY_RANGE_WIRE_SIZE)?;
        range.min.encode_full(&mut window[..32]);
        range.max.encode_full(&mut window[32..]);
        conn.output.confirm(KEY_RANGE_WIRE_SIZE);
        conn.output.flush()
    }

    fn close_on_non_invalid_error<R>(&mut self, result: &Result<R, Error>) {
        if let Err(e) = result {
            if !e.is_invalid() {
                log::warn!("closing channel after error: {e}");
                self.conn = None;
            }
        }
    }
}

fn require_valid_range(range: &KeyRange) -> Result<(), Error> {
    if !range.is_valid() {
        return Err(Error::Invalid("key range requires min < max"));
    }
    Ok(())
}

fn write_request_header<S: ByteStream>(
    out: &mut BufferedOutputStream<S>,
    cmd: Command,
    data_size: u64,
) -> Result<(), Error> {
    let window = out.reserve_or_flush(REQUEST_HEADER_SIZE)?;
    window.put_i32_le(0, cmd.as_i32());
    window.put_u64_le(4, data_size);
    out.confirm(REQUEST_HEADER_SIZE);
    Ok(())
}

fn read_header<S: ByteStream>(input: &mut BufferedInputStream<S>) -> Result<(i32, u64), Error> {
    let window = input.reserve(RESPONSE_HEADER_SIZE)?;
    Ok((window.get_i32_le(0), window.get_u64_le(4)))
}

fn read_response_header<S: ByteStream>(input: &mut BufferedInputStream<S>) -> Result<(), Error> {
    let (result, _data_size) = read_header(input)?;
    if result != 0 {
        return Err(Error::ServerStatus(result));
    }
    Ok(())
}

/// Reads the GET confirmation header and its `acq` body, after the record
/// stream's terminator has already been consumed.
fn read_confirmation<S: ByteStream>(input: &mut BufferedInputStream<S>) -> Result<i64, Error> {
    let (result, data_size) = read_header(input)?;
    if result != 0 {
        return Err(Error::ServerStatus(result));
    }
    if data_size != ACQ_BODY_SIZE as u64 {
        return Err(Error::Unexpected(format!(
            "confirmation dataSize {data_size}, expected {ACQ_BODY_SIZE}"
        )));
    }
    Ok(input.reserve(ACQ_BODY_SIZE)?.get_i64_le(0))
}

/// Reads the response header, the full GET record stream, and the trailing
/// confirmation, returning every record decoded before any failure.
fn read_get_response<S, C, T>(
    input: &mut BufferedInputStream<S>,
    codec: &C,
) -> Result<(RecordsSet<T>, i64), (RecordsSet<T>, Error)>
where
    S: ByteStream,
    C: EncodeDecode<T>,
{
    if let Err(e) = read_response_header(input) {
        return Err((RecordsSet::new(), e));
    }
    let records = match read_all(input, codec) {
        Ok(records) => records,
        Err((records, e)) => return Err((records, e)),
    };
    match read_confirmation(input) {
        Ok(acq) => Ok((records, acq)),
        Err(e) => Err((records, e)),
    }
}

/// Same as [`read_get_response`] but hands records to `callback` as the
/// buffer fills, instead of materializing the whole set.
fn read_get_stream_response<S, C, T>(
    input: &mut BufferedInputStream<S>,
    codec: &C,
    callback: impl FnMut(RecordsSet<T>),
) -> Result<i64, Error>
where
    S: ByteStream,
    C: EncodeDecode<T>,
{
    read_response_header(input)?;
    read_streaming(input, codec, callback)?;
    read_confirmation(input)
}

/// Reads a GET_ACQ response: a header followed by an 8-byte `acq`.
fn read_acq_response<S: ByteStream>(input: &mut BufferedInputStream<S>) -> Result<i64, Error> {
    let (result, data_size) = read_header(input)?;
    if result != 0 {
        return Err(Error::ServerStatus(result));
    }
    if data_size != ACQ_BODY_SIZE as u64 {
        return Err(Error::Unexpected(format!(
            "GET_ACQ response dataSize {data_size}, expected {ACQ_BODY_SIZE}"
        )));
    }
    Ok(input.reserve(ACQ_BODY_SIZE)?.get_i64_le(0))
}

/// Reads a PUT/PUT_A response header and drains its body, if any.
fn read_put_response<S: ByteStream>(input: &mut BufferedInputStream<S>) -> Result<(), Error> {
    let (result, data_size) = read_header(input)?;
    if data_size > 0 {
        // Drain the body; `acqMin`/`acqMax` occupy its first 16 bytes when
        // present, per the deliberately-unnormalized response shape (some
        // transcripts send 16 bytes, others fewer).
        let body = input.reserve(data_size as usize)?;
        if data_size as usize >= PUT_RESPONSE_ACQ_SIZE {
            let _acq_min = body.get_i64_le(0);
            let _acq_max = body.get_i64_le(8);
        }
    }
    if result != 0 {
        return Err(Error::ServerStatus(result));
    }
    Ok(())
}
