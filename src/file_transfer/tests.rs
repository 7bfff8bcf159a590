#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use rand::Rng;

use super::receiver::sanitize_name;
use super::{FileTransferError, recv_file, send_file, send_file_as, send_reader};
use crate::log::NoopLogSink;
use crate::protocol::{DEFAULT_MAX_MESSAGE_LEN, FrameError, recv_binary, recv_text, send_text};

fn temp_dir(tag: &str) -> PathBuf {
    let suffix: u64 = rand::thread_rng().r#gen();
    let dir = std::env::temp_dir().join(format!("proctorcast_ft_{tag}_{suffix:x}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

fn roundtrip(len: usize) {
    let src_dir = temp_dir("src");
    let dst_dir = temp_dir("dst").join("nested");
    let src = src_dir.join("answers.bin");
    let content = pattern(len);
    fs::write(&src, &content).unwrap();

    let mut wire = Vec::new();
    let sent = send_file(&mut wire, &src, &NoopLogSink).unwrap();
    assert_eq!(sent, len as u64);

    let got = recv_file(
        &mut Cursor::new(wire),
        &dst_dir,
        DEFAULT_MAX_MESSAGE_LEN,
        &NoopLogSink,
    )
    .unwrap();
    assert_eq!(got.path, dst_dir.join("answers.bin"));
    assert_eq!(got.bytes, len as u64);
    assert_eq!(fs::read(&got.path).unwrap(), content);

    let _ = fs::remove_dir_all(src_dir);
    let _ = fs::remove_dir_all(dst_dir.parent().unwrap());
}

#[test]
fn empty_file_roundtrip() {
    roundtrip(0);
}

#[test]
fn single_chunk_roundtrip() {
    roundtrip(4096);
}

#[test]
fn many_chunks_with_partial_tail_roundtrip() {
    roundtrip(12_345);
}

#[test]
fn wire_shape_is_name_chunks_sentinel() {
    let content = pattern(12_345);
    let mut wire = Vec::new();
    send_reader(&mut wire, "exam.pdf", Cursor::new(content.clone()), &NoopLogSink).unwrap();

    let mut r = Cursor::new(wire);
    assert_eq!(recv_binary(&mut r).unwrap(), b"exam.pdf");

    let mut sizes = Vec::new();
    let mut joined = Vec::new();
    loop {
        let chunk = recv_binary(&mut r).unwrap();
        if chunk.is_empty() {
            break;
        }
        sizes.push(chunk.len());
        joined.extend_from_slice(&chunk);
    }
    assert_eq!(sizes, vec![4096, 4096, 4096, 57]);
    assert_eq!(joined, content);
    assert_eq!(r.position() as usize, r.get_ref().len());
}

#[test]
fn empty_file_is_name_then_sentinel() {
    let mut wire = Vec::new();
    send_reader(&mut wire, "a", Cursor::new(Vec::new()), &NoopLogSink).unwrap();
    assert_eq!(wire, b"000000000000001a000000000000000");
}

#[test]
fn send_file_as_uses_wire_name() {
    let dir = temp_dir("as");
    let src = dir.join("essay.txt");
    fs::write(&src, b"hello").unwrap();

    let mut wire = Vec::new();
    send_file_as(&mut wire, &src, "alice_essay.txt", &NoopLogSink).unwrap();
    assert_eq!(recv_binary(&mut Cursor::new(wire)).unwrap(), b"alice_essay.txt");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_source_writes_nothing() {
    let mut wire = Vec::new();
    let err = send_file(&mut wire, Path::new("/no/such/file.bin"), &NoopLogSink).unwrap_err();
    assert!(matches!(err, FileTransferError::Io(_)));
    assert!(wire.is_empty());
}

/// Yields `good` bytes, then fails.
struct FailingReader {
    good: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.good == 0 {
            return Err(io::Error::other("disk gone"));
        }
        let n = buf.len().min(self.good);
        buf[..n].fill(7);
        self.good -= n;
        Ok(n)
    }
}

#[test]
fn read_failure_still_terminates_transfer() {
    let mut wire = Vec::new();
    send_text(&mut wire, "before").unwrap();
    let err = send_reader(&mut wire, "x.bin", FailingReader { good: 5000 }, &NoopLogSink)
        .unwrap_err();
    assert!(matches!(err, FileTransferError::Io(_)));
    assert!(!err.is_connection_fatal());
    send_text(&mut wire, "after").unwrap();

    let dir = temp_dir("trunc");
    let mut r = Cursor::new(wire);
    assert_eq!(recv_text(&mut r).unwrap(), "before");
    let got = recv_file(&mut r, &dir, DEFAULT_MAX_MESSAGE_LEN, &NoopLogSink).unwrap();
    assert_eq!(got.bytes, 4096);
    assert_eq!(recv_text(&mut r).unwrap(), "after");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn unusable_destination_drains_and_keeps_framing() {
    let dir = temp_dir("blocked");
    // A regular file where the directory should be.
    let blocker = dir.join("not_a_dir");
    fs::write(&blocker, b"x").unwrap();

    let mut wire = Vec::new();
    send_reader(&mut wire, "sub.txt", Cursor::new(pattern(9000)), &NoopLogSink).unwrap();
    send_text(&mut wire, "NEXT").unwrap();

    let mut r = Cursor::new(wire);
    let err = recv_file(&mut r, &blocker, DEFAULT_MAX_MESSAGE_LEN, &NoopLogSink).unwrap_err();
    assert!(matches!(err, FileTransferError::Io(_)));
    assert_eq!(recv_text(&mut r).unwrap(), "NEXT");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn hostile_names_are_confined_or_rejected() {
    assert_eq!(sanitize_name(b"../../etc/passwd").unwrap(), "passwd");
    assert_eq!(sanitize_name(b"C:\\Users\\bob\\hw.docx").unwrap(), "hw.docx");
    assert_eq!(sanitize_name(b"plain.txt").unwrap(), "plain.txt");
    for bad in [&b""[..], &b".."[..], &b"."[..], &b"dir/"[..], &[0xffu8, 0xfe][..]] {
        assert!(matches!(
            sanitize_name(bad),
            Err(FileTransferError::InvalidName(_))
        ));
    }
}

#[test]
fn invalid_name_drains_transfer() {
    let dir = temp_dir("badname");
    let mut wire = Vec::new();
    send_reader(&mut wire, "..", Cursor::new(pattern(10)), &NoopLogSink).unwrap();
    send_text(&mut wire, "NEXT").unwrap();

    let mut r = Cursor::new(wire);
    let err = recv_file(&mut r, &dir, DEFAULT_MAX_MESSAGE_LEN, &NoopLogSink).unwrap_err();
    assert!(matches!(err, FileTransferError::InvalidName(_)));
    assert_eq!(recv_text(&mut r).unwrap(), "NEXT");
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn connection_drop_mid_transfer_is_fatal_and_leaves_partial_file() {
    let dir = temp_dir("drop");
    let mut wire = Vec::new();
    send_reader(&mut wire, "cut.bin", Cursor::new(pattern(10_000)), &NoopLogSink).unwrap();
    // Keep the name and the first chunk, lose the rest.
    wire.truncate(15 + 7 + 15 + 4096 + 100);

    let err = recv_file(
        &mut Cursor::new(wire),
        &dir,
        DEFAULT_MAX_MESSAGE_LEN,
        &NoopLogSink,
    )
    .unwrap_err();
    assert!(err.is_connection_fatal());
    assert!(matches!(
        err,
        FileTransferError::Frame(FrameError::ConnectionClosed)
    ));
    assert!(dir.join("cut.bin").exists());

    let _ = fs::remove_dir_all(dir);
}
