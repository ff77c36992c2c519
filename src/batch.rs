//! [`BatchSerializer`]: groups outbound records into same-`cid` batches,
//! writes batch headers lazily, and terminates the stream with the
//! sentinel.

use crate::codec::EncodeDecode;
use crate::error::Error;
use crate::io::byte_stream::ByteStream;
use crate::io::output_stream::BufferedOutputStream;
use crate::io::primitive::WirePut;
use crate::key::{Key, SENTINEL_CID};
use crate::record::RecordsSet;
use crate::wire::{BATCH_HEADER_SIZE, REC_SIZE_FIELD};

/// Which PUT variant this batch stream serializes for — governs how much
/// of the key is written per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// PUT_SAFE: server assigns `acq`; key on wire omits it.
    Safe,
    /// PUT_A_SAFE: caller supplies `acq`; key on wire carries it.
    ASafe,
}

impl PutMode {
    fn key_size(self) -> usize {
        match self {
            PutMode::Safe => Key::WIRE_SIZE_NO_CID_NO_ACQ,
            PutMode::ASafe => Key::WIRE_SIZE_NO_CID,
        }
    }

    fn encode_key(self, key: &Key, buf: &mut [u8]) {
        match self {
            PutMode::Safe => key.encode_no_cid_no_acq(buf),
            PutMode::ASafe => key.encode_no_cid(buf),
        }
    }
}

/// Tracks the currently open batch so its header can be backpatched once
/// its size is known, either at a `cid` change or the end of input.
struct OpenBatch {
    cid: i32,
    header_offset: usize,
    size: i32,
}

/// Serializes `records` as a PUT/PUT_A batch stream (without the leading
/// request header, which the channel writes itself) and terminates it with
/// the `cid = -1` sentinel. Does not issue a final flush; the caller flushes
/// once the request header and batch stream are both written.
pub fn write_batches<S, C, T>(
    out: &mut BufferedOutputStream<S>,
    codec: &C,
    records: &RecordsSet<T>,
    mode: PutMode,
) -> Result<(), Error>
where
    S: ByteStream,
    C: EncodeDecode<T>,
{
    let mut open: Option<OpenBatch> = None;

    for record in records.iter() {
        let payload_size = codec.encode(&record.payload, &mut []);
        let record_size = REC_SIZE_FIELD + mode.key_size() + payload_size;

        let needs_new_batch = match &open {
            None => true,
            Some(batch) => batch.cid != record.key.cid,
        };
        if needs_new_batch {
            close_batch(out, open.take());
            open = Some(open_batch(out, record.key.cid)?);
        }

        let overflows = {
            let batch = open.as_ref().expect("opened above");
            (batch.size as i64) + (record_size as i64) > i32::MAX as i64
        };
        if overflows {
            let cid = open.as_ref().expect("opened above").cid;
            close_batch(out, open.take());
            open = Some(open_batch(out, cid)?);
        }

        reserve_record(out, &mut open, record.key.cid, record_size)?;

        {
            let window = out.reserve(record_size)?;
            window.put_i32_le(0, (record_size - REC_SIZE_FIELD) as i32);
            let key_end = REC_SIZE_FIELD + mode.key_size();
            mode.encode_key(&record.key, &mut window[REC_SIZE_FIELD..key_end]);
            codec.encode(&record.payload, &mut window[key_end..]);
        }
        out.confirm(record_size);

        open.as_mut().expect("opened above").size += record_size as i32;
    }

    close_batch(out, open.take());
    write_sentinel(out)
}

/// Ensures `record_size` bytes are reserved, closing and flushing the
/// current batch (then reopening one with the same `cid`) if the buffer
/// cannot grow to fit it without a flush.
fn reserve_record<S: ByteStream>(
    out: &mut BufferedOutputStream<S>,
    open: &mut Option<OpenBatch>,
    cid: i32,
    record_size: usize,
) -> Result<(), Error> {
    match out.reserve(record_size) {
        Ok(_) => Ok(()),
        Err(Error::LimitExceeded) => {
            let batch = open.take().expect("a batch is always open here");
            close_and_flush(out, batch)?;
            *open = Some(open_batch(out, cid)?);
            out.reserve(record_size).map(|_| ())
        }
        Err(e) => Err(e),
    }
}

fn open_batch<S: ByteStream>(
    out: &mut BufferedOutputStream<S>,
    cid: i32,
) -> Result<OpenBatch, Error> {
    let window = out.reserve_or_flush(BATCH_HEADER_SIZE)?;
    window.put_i32_le(0, cid);
    window.put_i32_le(4, 0); // placeholder batchSize, patched on close
    let header_offset = out.size_reserved();
    out.confirm(BATCH_HEADER_SIZE);
    Ok(OpenBatch {
        cid,
        header_offset,
        size: 0,
    })
}

fn close_batch<S: ByteStream>(out: &mut BufferedOutputStream<S>, batch: Option<OpenBatch>) {
    if let Some(batch) = batch {
        out.patch(batch.header_offset + 4, 4).put_i32_le(0, batch.size);
    }
}

fn close_and_flush<S: ByteStream>(
    out: &mut BufferedOutputStream<S>,
    batch: OpenBatch,
) -> Result<(), Error> {
    out.patch(batch.header_offset + 4, 4).put_i32_le(0, batch.size);
    out.flush()
}

fn write_sentinel<S: ByteStream>(out: &mut BufferedOutputStream<S>) -> Result<(), Error> {
    let window = out.reserve_or_flush(REC_SIZE_FIELD)?;
    window.put_i32_le(0, SENTINEL_CID);
    out.confirm(REC_SIZE_FIELD);
    Ok(())
}
