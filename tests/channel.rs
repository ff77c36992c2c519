//! End-to-end scenarios driving a real `Channel<TcpByteStream, _, _>` over a
//! loopback socket against a scripted fake server, replaying the literal
//! request/response byte sequences.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

use tstorage_client::codec::DecodeError;
use tstorage_client::io::primitive::{WireGet, WirePut};
use tstorage_client::{
    ChannelConfig, Command, EncodeDecode, Error, Key, KeyRange, Record, RecordsSet,
};

struct RawCodec;

impl EncodeDecode<Vec<u8>> for RawCodec {
    fn encode(&self, value: &Vec<u8>, out: &mut [u8]) -> usize {
        if out.len() >= value.len() {
            out[..value.len()].copy_from_slice(value);
        }
        value.len()
    }

    fn decode(&self, buf: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(buf.to_vec())
    }
}

type TestChannel = tstorage_client::Channel<tstorage_client::TcpByteStream, RawCodec, Vec<u8>>;

/// Spawns a one-shot fake server on an ephemeral loopback port, running
/// `script` against the single accepted connection on a background thread.
/// Returns the channel config pointed at it and a handle to join.
fn spawn_server(
    script: impl FnOnce(TcpStream) + Send + 'static,
) -> (ChannelConfig, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept connection");
        script(stream);
    });

    (ChannelConfig::new("127.0.0.1", addr.port()), handle)
}

/// A 37-byte-on-the-wire record (32-byte key, 1-byte payload), the unit this
/// scenario sizes its memory limit against.
fn small_record(i: i64) -> Vec<u8> {
    let mut record = vec![0u8; 4 + 32 + 1];
    record.put_i32_le(0, 33);
    Key::new(0, i, 0, 0, 0).encode_full(&mut record[4..36]);
    record[36] = b'x';
    record
}

fn read_exact_vec(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).expect("read expected bytes");
    buf
}

/// Initializes `log` output once per test binary, so a failing scenario's
/// `log::debug!`/`warn!` trail shows up under `RUST_LOG=debug`.
fn init_logger() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = env_logger::try_init();
    });
}

fn full_range() -> KeyRange {
    KeyRange::new(
        Key::new(0, i64::MIN, i32::MIN, i64::MIN, i64::MIN),
        Key::new(i32::MAX, i64::MAX, i32::MAX, i64::MAX, i64::MAX),
    )
}

fn response_header(result: i32, data_size: u64) -> Vec<u8> {
    let mut buf = vec![0u8; 12];
    buf.put_i32_le(0, result);
    buf.put_u64_le(4, data_size);
    buf
}

fn i64_le(v: i64) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    buf.put_i64_le(0, v);
    buf
}

#[test]
fn empty_put_sends_sixteen_bytes_and_reads_ok() {
    init_logger();
    let (config, server) = spawn_server(|mut stream| {
        let request = read_exact_vec(&mut stream, 16);
        assert_eq!(
            request,
            vec![
                0x05, 0x00, 0x00, 0x00, // cmd = 5 (PUT_SAFE)
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // dataSize = 0
                0xFF, 0xFF, 0xFF, 0xFF, // sentinel cid = -1
            ]
        );

        let mut response = response_header(0, 16);
        response.extend(i64_le(100));
        response.extend(i64_le(200));
        stream.write_all(&response).unwrap();
    });

    let mut channel: TestChannel = tstorage_client::Channel::new(config, RawCodec);
    channel.connect().unwrap();
    let records: RecordsSet<Vec<u8>> = RecordsSet::new();
    channel.put(&records).unwrap();
    assert!(channel.is_open());

    server.join().unwrap();
}

#[test]
fn get_acq_happy_path() {
    init_logger();
    let (config, server) = spawn_server(|mut stream| {
        let request = read_exact_vec(&mut stream, 12 + 64);
        assert_eq!(request.as_slice().get_i32_le(0), Command::GetAcq as i32);
        assert_eq!(request.as_slice().get_u64_le(4), 64);

        let mut response = response_header(0, 8);
        response.extend(i64_le(12345));
        stream.write_all(&response).unwrap();
    });

    let mut channel: TestChannel = tstorage_client::Channel::new(config, RawCodec);
    channel.connect().unwrap();
    let acq = channel.get_acq(full_range()).unwrap();
    assert_eq!(acq, 12345);

    server.join().unwrap();
}

#[test]
fn get_single_record() {
    init_logger();
    let (config, server) = spawn_server(|mut stream| {
        let _request = read_exact_vec(&mut stream, 12 + 64);

        let mut response = response_header(0, 0);

        let mut record = vec![0u8; 4 + 32 + 4];
        record.put_i32_le(0, 36); // recSize = 32 (key) + 4 (payload)
        Key::new(0, 0, 0, 0, 0).encode_full(&mut record[4..36]);
        record[36..].copy_from_slice(b"abcd");
        response.extend(record);
        response.extend([0, 0, 0, 0]); // recSize = 0 terminator

        response.extend(response_header(0, 8));
        response.extend(i64_le(777));

        stream.write_all(&response).unwrap();
    });

    let mut channel: TestChannel = tstorage_client::Channel::new(config, RawCodec);
    channel.connect().unwrap();
    let (records, acq) = channel.get(full_range()).unwrap();

    assert_eq!(records.len(), 1);
    let record = records.iter().next().unwrap();
    assert_eq!(record.key, Key::new(0, 0, 0, 0, 0));
    assert_eq!(record.payload, b"abcd");
    assert_eq!(acq, 777);

    server.join().unwrap();
}

#[test]
fn put_safe_groups_by_adjacent_cid() {
    init_logger();
    let (config, server) = spawn_server(|mut stream| {
        // Header: cmd=5, dataSize=0
        let header = read_exact_vec(&mut stream, 12);
        assert_eq!(header.as_slice().get_i32_le(0), Command::PutSafe as i32);

        let mut cids = Vec::new();
        loop {
            let cid = read_exact_vec(&mut stream, 4);
            let cid = cid.as_slice().get_i32_le(0);
            if cid == -1 {
                break;
            }
            let batch_size = read_exact_vec(&mut stream, 4);
            let batch_size = batch_size.as_slice().get_i32_le(0) as usize;
            let _batch_body = read_exact_vec(&mut stream, batch_size);
            cids.push(cid);
        }
        assert_eq!(cids, vec![7, 3, 7]);

        let mut response = response_header(0, 16);
        response.extend(i64_le(1));
        response.extend(i64_le(2));
        stream.write_all(&response).unwrap();
    });

    let mut channel: TestChannel = tstorage_client::Channel::new(config, RawCodec);
    channel.connect().unwrap();

    let mut records: RecordsSet<Vec<u8>> = RecordsSet::new();
    for cid in [7, 7, 3, 7] {
        records.append(Record::new(Key::new(cid, 1, 2, 3, 4), vec![0xAB]));
    }
    channel.put(&records).unwrap();

    server.join().unwrap();
}

#[test]
fn get_stream_flushes_to_callback_under_a_tight_memory_limit() {
    init_logger();
    let (config, server) = spawn_server(|mut stream| {
        let _request = read_exact_vec(&mut stream, 12 + 64);

        let mut response = response_header(0, 0);
        for i in 0..5i64 {
            response.extend(small_record(i));
        }
        response.extend([0, 0, 0, 0]); // recSize = 0 terminator
        response.extend(response_header(0, 8));
        response.extend(i64_le(999));
        stream.write_all(&response).unwrap();
    });

    // Room for the 12-byte response header plus exactly two 37-byte records.
    let config = config.with_memory_limit(12 + 2 * (4 + 32 + 1));
    let mut channel: TestChannel = tstorage_client::Channel::new(config, RawCodec);
    channel.connect().unwrap();

    let mut batch_sizes = Vec::new();
    let acq = channel
        .get_stream(full_range(), |records| batch_sizes.push(records.len()))
        .unwrap();

    assert_eq!(batch_sizes.iter().sum::<usize>(), 5);
    assert!(batch_sizes.len() >= 2);
    assert_eq!(acq, 999);
    assert!(channel.is_open());

    server.join().unwrap();
}

#[test]
fn get_under_the_same_limit_reports_limit_exceeded_with_first_two_records() {
    init_logger();
    let (config, server) = spawn_server(|mut stream| {
        let _request = read_exact_vec(&mut stream, 12 + 64);

        let mut response = response_header(0, 0);
        for i in 0..5i64 {
            response.extend(small_record(i));
        }
        response.extend([0, 0, 0, 0]);
        response.extend(response_header(0, 8));
        response.extend(i64_le(999));
        stream.write_all(&response).unwrap();
    });

    let config = config.with_memory_limit(12 + 2 * (4 + 32 + 1));
    let mut channel: TestChannel = tstorage_client::Channel::new(config, RawCodec);
    channel.connect().unwrap();

    let (records, err) = channel.get(full_range()).unwrap_err();

    assert_eq!(records.len(), 2);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.key, Key::new(0, i as i64, 0, 0, 0));
    }
    assert!(matches!(err, Error::LimitExceeded));
    assert!(!channel.is_open());

    server.join().unwrap();
}

#[test]
fn mid_stream_disconnect_returns_partial_records() {
    init_logger();
    let (config, server) = spawn_server(|mut stream| {
        let _request = read_exact_vec(&mut stream, 12 + 64);

        let mut response = response_header(0, 0);
        for i in 0..2i64 {
            response.extend(small_record(i));
        }
        stream.write_all(&response).unwrap();
        // Connection drops here without a terminator or confirmation.
    });

    let mut channel: TestChannel = tstorage_client::Channel::new(config, RawCodec);
    channel.connect().unwrap();
    let (records, err) = channel.get(full_range()).unwrap_err();

    assert_eq!(records.len(), 2);
    assert!(matches!(err, Error::Receive(_)));
    assert!(!channel.is_open());

    server.join().unwrap();
}
