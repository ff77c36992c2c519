//! [`InboundRecordReader`]: deserializes inbound record streams, optionally
//! flushing buffered records to a callback when memory is tight.

use crate::codec::EncodeDecode;
use crate::error::Error;
use crate::io::byte_stream::ByteStream;
use crate::io::input_stream::BufferedInputStream;
use crate::io::primitive::WireGet;
use crate::key::Key;
use crate::record::{Record, RecordsSet};
use crate::wire::REC_SIZE_FIELD;

/// Reads the GET record stream to completion, appending every record to a
/// single `RecordsSet`. On any error, returns the error alongside whatever
/// was decoded before it — `confirm()` is never called, so accumulated
/// bytes continue to count against the memory limit across records, which
/// is what lets an undersized limit surface `limit-exceeded` deterministically.
pub fn read_all<S, C, T>(
    input: &mut BufferedInputStream<S>,
    codec: &C,
) -> Result<RecordsSet<T>, (RecordsSet<T>, Error)>
where
    S: ByteStream,
    C: EncodeDecode<T>,
{
    let mut records = RecordsSet::new();
    loop {
        let rec_size = match read_rec_size(input) {
            Ok(n) => n,
            Err(e) => return Err((records, e)),
        };
        if rec_size == 0 {
            return Ok(records);
        }
        match read_body(input, codec, rec_size) {
            Ok(record) => records.append(record),
            Err(e) => return Err((records, e)),
        }
    }
}

/// Reads the GET record stream, invoking `callback` with the accumulated
/// records whenever the buffer fills up (a reservation returns
/// `limit-exceeded`) and once more at the end regardless of outcome.
/// Returns the terminal error, if any; the caller already has every record
/// via `callback`.
pub fn read_streaming<S, C, T>(
    input: &mut BufferedInputStream<S>,
    codec: &C,
    mut callback: impl FnMut(RecordsSet<T>),
) -> Result<(), Error>
where
    S: ByteStream,
    C: EncodeDecode<T>,
{
    let mut records = RecordsSet::new();
    loop {
        let rec_size = match read_rec_size(input) {
            Ok(n) => n,
            Err(Error::LimitExceeded) if !records.is_empty() => {
                callback(std::mem::take(&mut records));
                input.confirm();
                match read_rec_size(input) {
                    Ok(n) => n,
                    Err(e) => {
                        callback(records);
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                callback(records);
                return Err(e);
            }
        };

        if rec_size == 0 {
            callback(records);
            return Ok(());
        }

        match read_body(input, codec, rec_size) {
            Ok(record) => records.append(record),
            Err(Error::LimitExceeded) if !records.is_empty() => {
                callback(std::mem::take(&mut records));
                input.confirm();
                match read_body(input, codec, rec_size) {
                    Ok(record) => records.append(record),
                    Err(e) => {
                        callback(records);
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                callback(records);
                return Err(e);
            }
        }
    }
}

/// Reads the `recSize: i32` prefix, positive for a record or zero for the
/// terminator.
fn read_rec_size<S: ByteStream>(input: &mut BufferedInputStream<S>) -> Result<i32, Error> {
    let rec_size = input.reserve(REC_SIZE_FIELD)?.get_i32_le(0);
    if rec_size < 0 {
        return Err(Error::Unexpected(format!(
            "negative record size {rec_size}"
        )));
    }
    Ok(rec_size)
}

/// Reads and decodes the `rec_size`-byte body (full `Key` plus payload)
/// following an already-consumed `recSize` prefix.
fn read_body<S, C, T>(
    input: &mut BufferedInputStream<S>,
    codec: &C,
    rec_size: i32,
) -> Result<Record<T>, Error>
where
    S: ByteStream,
    C: EncodeDecode<T>,
{
    let body = input.reserve(rec_size as usize)?;
    let key = Key::decode_full(&body[..Key::WIRE_SIZE_FULL]);
    let payload = codec
        .decode(&body[Key::WIRE_SIZE_FULL..])
        .map_err(|e| Error::Decode(e.0))?;
    Ok(Record::new(key, payload))
}
