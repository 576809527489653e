use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};

use arkiv_mux::{
    MultiplexReader, MultiplexWriter, MuxError, PrependedMultiplexReader, multiplexed_size,
};
use arkiv_stream::StreamError;
use tempfile::tempdir;

fn payload(len: usize, seed: u8) -> Vec<u8> { (0..len).map(|i| (i as u8).wrapping_mul(seed)).collect() }

#[test]
fn test_round_trip_through_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bundle.mux");
    let payloads = [payload(0, 3), payload(5, 5), payload(1000, 7)];

    let mut writer = MultiplexWriter::new(BufWriter::new(File::create(&path).unwrap()));
    for p in &payloads {
        writer.append_entry(p.len() as u64, Cursor::new(p)).unwrap();
    }
    writer.append_end_of_file().unwrap();
    let written = writer.bytes_written();
    writer.into_inner().flush().unwrap();

    assert_eq!(written, multiplexed_size(&[0, 5, 1000]).unwrap());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), written);

    let reader = MultiplexReader::new(BufReader::new(File::open(&path).unwrap()));
    let entries = reader.read_entries().unwrap();
    assert_eq!(entries, payloads);
}

#[test]
fn test_entry_sizes_are_reported_in_order() {
    let mut writer = MultiplexWriter::new(Vec::new());
    for len in [3usize, 0, 64] {
        writer.append_entry(len as u64, Cursor::new(payload(len, 11))).unwrap();
    }
    writer.append_end_of_file().unwrap();
    let bytes = writer.into_inner();

    let mut reader = MultiplexReader::new(&bytes[..]);
    let mut sizes = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        sizes.push(entry.size());
    }
    assert_eq!(sizes, vec![3, 0, 64]);
    assert!(reader.is_finished());
}

#[test]
fn test_prepend_to_file_backed_stream() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("existing.mux");
    {
        let mut writer = MultiplexWriter::new(File::create(&path).unwrap());
        writer.append_entry(4, &b"tail"[..]).unwrap();
        writer.append_end_of_file().unwrap();
        writer.into_inner().flush().unwrap();
    }
    let existing_size = std::fs::metadata(&path).unwrap().len();

    let head = payload(7, 13);
    let mut prepended = PrependedMultiplexReader::new(
        Cursor::new(head.clone()),
        7,
        File::open(&path).unwrap(),
        existing_size,
    )
    .unwrap();
    assert_eq!(prepended.size(), 8 + 7 + existing_size);

    let mut combined = Vec::new();
    prepended.read_to_end(&mut combined).unwrap();
    assert_eq!(combined.len() as u64, prepended.size());
    assert_eq!(&combined[15..], &std::fs::read(&path).unwrap()[..]);

    let entries = MultiplexReader::new(&combined[..]).read_entries().unwrap();
    assert_eq!(entries, vec![head, b"tail".to_vec()]);
}

#[test]
fn test_off_by_one_sources_fail() {
    let mut short = MultiplexWriter::new(Vec::new());
    let err = short.append_entry(10, Cursor::new(payload(9, 1))).unwrap_err();
    assert!(matches!(err, MuxError::Stream(StreamError::PrematureEof { expected: 10, actual: 9 })));

    let mut long = MultiplexWriter::new(Vec::new());
    let err = long.append_entry(10, Cursor::new(payload(11, 1))).unwrap_err();
    assert!(matches!(err, MuxError::Stream(StreamError::TooLong { expected: 10 })));
}
