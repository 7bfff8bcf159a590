use std::io::{self, Read, Write};

use super::{
    Control, DEFAULT_MAX_MESSAGE_LEN, FrameError, HEADER_LEN, MAX_REPRESENTABLE_LEN, ProtoError,
};

/// Write one message: `HEADER_LEN` zero-padded decimal digits, then the payload.
///
/// Header and payload go out in a single buffer so a concurrent writer holding
/// another clone of the socket can never split them (callers still serialize
/// whole messages through a lock, see `server::registry`).
pub fn write_message<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = payload.len() as u64;
    if len > MAX_REPRESENTABLE_LEN {
        return Err(ProtoError::TooLarge {
            max: MAX_REPRESENTABLE_LEN,
            actual: len,
        }
        .into());
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(format!("{len:0width$}", width = HEADER_LEN).as_bytes());
    frame.extend_from_slice(payload);

    w.write_all(&frame)?;
    w.flush()?;
    Ok(())
}

/// Read one message payload, refusing declared lengths above `max_len`.
///
/// Never returns short: partial reads are retried until the declared length
/// has arrived. A zero-byte read while bytes are still owed is
/// `ConnectionClosed`; a non-digit header is `ProtoError::InvalidHeader`.
pub fn read_message<R: Read>(r: &mut R, max_len: usize) -> Result<Vec<u8>, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    read_full(r, &mut header)?;

    let len = parse_header(&header)?;
    if len > max_len as u64 {
        return Err(ProtoError::TooLarge {
            max: max_len as u64,
            actual: len,
        }
        .into());
    }

    // len <= max_len, so it fits in usize.
    let mut body = vec![0u8; len as usize];
    read_full(r, &mut body)?;
    Ok(body)
}

pub fn send_text<W: Write>(w: &mut W, text: &str) -> Result<(), FrameError> {
    write_message(w, text.as_bytes())
}

pub fn recv_text<R: Read>(r: &mut R) -> Result<String, FrameError> {
    recv_text_max(r, DEFAULT_MAX_MESSAGE_LEN)
}

pub fn recv_text_max<R: Read>(r: &mut R, max_len: usize) -> Result<String, FrameError> {
    let body = read_message(r, max_len)?;
    String::from_utf8(body).map_err(|_| ProtoError::InvalidUtf8.into())
}

pub fn send_binary<W: Write>(w: &mut W, bytes: &[u8]) -> Result<(), FrameError> {
    write_message(w, bytes)
}

pub fn recv_binary<R: Read>(r: &mut R) -> Result<Vec<u8>, FrameError> {
    read_message(r, DEFAULT_MAX_MESSAGE_LEN)
}

pub fn recv_binary_max<R: Read>(r: &mut R, max_len: usize) -> Result<Vec<u8>, FrameError> {
    read_message(r, max_len)
}

pub fn send_control<W: Write>(w: &mut W, control: Control) -> Result<(), FrameError> {
    send_text(w, control.as_str())
}

/// Read a text message and map it onto the control vocabulary.
///
/// An unknown word comes back as `ProtoError::UnknownControl`; the message has
/// been fully consumed, so the stream is still framed correctly.
pub fn recv_control<R: Read>(r: &mut R, max_len: usize) -> Result<Control, FrameError> {
    let text = recv_text_max(r, max_len)?;
    text.parse::<Control>().map_err(FrameError::from)
}

fn parse_header(header: &[u8; HEADER_LEN]) -> Result<u64, ProtoError> {
    if !header.iter().all(u8::is_ascii_digit) {
        return Err(ProtoError::InvalidHeader(header.to_vec()));
    }
    Ok(header
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0')))
}

fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per `read` call.
    struct Trickle<R> {
        inner: R,
        step: usize,
    }

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step);
            self.inner.read(&mut buf[..n])
        }
    }

    #[test]
    fn header_is_fifteen_zero_padded_digits() {
        let mut out = Vec::new();
        send_text(&mut out, "STREAM").unwrap();
        assert_eq!(out, b"000000000000006STREAM");
    }

    #[test]
    fn text_roundtrip_counts_bytes_not_chars() {
        let text = "¿Qué tal? 你好 ✓";
        let mut out = Vec::new();
        send_text(&mut out, text).unwrap();
        assert_eq!(&out[..HEADER_LEN], format!("{:015}", text.len()).as_bytes());

        let got = recv_text(&mut Cursor::new(out)).unwrap();
        assert_eq!(got, text);
    }

    #[test]
    fn empty_binary_is_a_valid_message() {
        let mut out = Vec::new();
        send_binary(&mut out, &[]).unwrap();
        assert_eq!(out, b"000000000000000");

        let mut cur = Cursor::new(out);
        assert!(recv_binary(&mut cur).unwrap().is_empty());
    }

    #[test]
    fn partial_reads_are_reassembled() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut out = Vec::new();
        send_binary(&mut out, &payload).unwrap();
        send_text(&mut out, "STOP").unwrap();

        let mut r = Trickle {
            inner: Cursor::new(out),
            step: 7,
        };
        assert_eq!(recv_binary(&mut r).unwrap(), payload);
        assert_eq!(recv_text(&mut r).unwrap(), "STOP");
    }

    #[test]
    fn non_digit_header_is_protocol_error() {
        let mut r = Cursor::new(b"XXXXXXXXXXXXXXXhello".to_vec());
        match recv_text(&mut r) {
            Err(FrameError::Proto(ProtoError::InvalidHeader(raw))) => {
                assert_eq!(raw, b"XXXXXXXXXXXXXXX");
            }
            other => panic!("expected InvalidHeader, got {other:?}"),
        }
    }

    #[test]
    fn signed_or_spaced_header_is_rejected() {
        for bad in [&b"-00000000000005"[..], &b" 00000000000005"[..]] {
            let err = recv_binary(&mut Cursor::new(bad.to_vec())).unwrap_err();
            assert!(matches!(err, FrameError::Proto(ProtoError::InvalidHeader(_))));
        }
    }

    #[test]
    fn eof_inside_header_or_body_is_connection_closed() {
        let err = recv_text(&mut Cursor::new(b"0000000".to_vec())).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));

        let err = recv_text(&mut Cursor::new(b"000000000000010short".to_vec())).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(err.is_disconnect());

        let err = recv_text(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn declared_length_over_limit_is_rejected_before_reading_body() {
        let mut r = Cursor::new(b"000000000001000".to_vec());
        match recv_binary_max(&mut r, 999) {
            Err(FrameError::Proto(ProtoError::TooLarge { max, actual })) => {
                assert_eq!((max, actual), (999, 1000));
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_text_is_protocol_error() {
        let mut out = Vec::new();
        send_binary(&mut out, &[0xff, 0xfe]).unwrap();
        let err = recv_text(&mut Cursor::new(out)).unwrap_err();
        assert!(matches!(err, FrameError::Proto(ProtoError::InvalidUtf8)));
    }

    #[test]
    fn control_words_parse_and_unknown_ones_are_consumed() {
        let mut out = Vec::new();
        send_text(&mut out, "DANCE").unwrap();
        send_control(&mut out, Control::RequestLastFile).unwrap();

        let mut r = Cursor::new(out);
        let err = recv_control(&mut r, DEFAULT_MAX_MESSAGE_LEN).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Proto(ProtoError::UnknownControl(ref w)) if w == "DANCE"
        ));
        assert_eq!(
            recv_control(&mut r, DEFAULT_MAX_MESSAGE_LEN).unwrap(),
            Control::RequestLastFile
        );
    }
}
