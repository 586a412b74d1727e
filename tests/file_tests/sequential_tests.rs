//! Tests for SequentialFile
//!
//! These tests verify:
//! - Reads return content in order and stop at the end
//! - The cursor never moves backward
//! - Skip is clamped to the end of content

use std::io::Read;

use atlasenv::file::SequentialFile;

use crate::{data_path, durable_file_with, pattern, setup_manager, BrokenFile, MemFile};

#[test]
fn test_read_whole_content_in_chunks() {
    let content = pattern(1000);
    let mut file = SequentialFile::new("mem", MemFile::with_data(&content));

    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = file.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, content);
    assert_eq!(file.position(), 1000);
}

#[test]
fn test_short_read_at_end() {
    let mut file = SequentialFile::new("mem", MemFile::with_data(b"hello world"));

    let mut buf = [0u8; 8];
    assert_eq!(file.read(&mut buf).unwrap(), 8);
    assert_eq!(&buf, b"hello wo");
    assert_eq!(file.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], b"rld");
    assert_eq!(file.read(&mut buf).unwrap(), 0);
    assert_eq!(file.position(), 11);
}

#[test]
fn test_skip_moves_cursor() {
    let mut file = SequentialFile::new("mem", MemFile::with_data(b"0123456789"));

    file.skip(4).unwrap();
    assert_eq!(file.position(), 4);

    let mut buf = [0u8; 3];
    assert_eq!(file.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf, b"456");
}

#[test]
fn test_skip_past_end_clamps() {
    let mut file = SequentialFile::new("mem", MemFile::with_data(b"hello world"));

    file.skip(100).unwrap();
    assert_eq!(file.position(), 11);
    assert_eq!(file.read(&mut [0u8; 10]).unwrap(), 0);

    file.skip(u64::MAX).unwrap();
    assert_eq!(file.position(), 11);
}

#[test]
fn test_cursor_is_monotonic() {
    let content = pattern(300);
    let mut file = SequentialFile::new("mem", MemFile::with_data(&content));

    let mut last = 0;
    let mut buf = [0u8; 7];
    for step in 0..100u64 {
        if step % 3 == 0 {
            file.skip(step % 11).unwrap();
        } else {
            file.read(&mut buf).unwrap();
        }
        assert!(file.position() >= last);
        assert!(file.position() <= 300);
        last = file.position();
    }
}

#[test]
fn test_empty_buffer_reads_nothing() {
    let mut file = SequentialFile::new("mem", MemFile::with_data(b"abc"));
    assert_eq!(file.read(&mut []).unwrap(), 0);
    assert_eq!(file.position(), 0);
}

#[test]
fn test_read_error_propagates() {
    let mut file = SequentialFile::new("broken", BrokenFile);
    assert!(file.read(&mut [0u8; 4]).is_err());
    assert!(file.skip(1).is_err());
    assert_eq!(file.position(), 0);
}

#[test]
fn test_io_read_adapter() {
    let content = pattern(5000);
    let mut file = SequentialFile::new("mem", MemFile::with_data(&content));

    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    assert_eq!(out, content);
}

#[test]
fn test_pool_backed_sequential_read() {
    let (temp, manager) = setup_manager();
    let path = data_path(&temp, "000007.log");
    let durable = durable_file_with(&manager, &path, b"hello world");

    let mut file = SequentialFile::new(&path, durable);
    assert_eq!(file.len().unwrap(), 11);
    assert_eq!(file.path(), path.as_path());

    let mut buf = [0u8; 11];
    assert_eq!(file.read(&mut buf).unwrap(), 11);
    assert_eq!(&buf, b"hello world");
}
