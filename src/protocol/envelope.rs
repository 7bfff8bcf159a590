use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

/// Size of the big-endian image length prefix.
const IMAGE_LEN_PREFIX: usize = 4;

/// One streamed picture plus the display name of the peer that sent it.
///
/// Wire layout (payload of a single binary message):
/// `[u32 BE image length][image bytes][remaining bytes = UTF-8 username]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEnvelope {
    /// Encoded picture (JPEG in practice); never interpreted here.
    pub image: Bytes,
    pub username: String,
}

/// A payload that does not have the envelope shape.
#[derive(Debug, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Shorter than the length prefix, or than the image it declares.
    Truncated { declared: usize, available: usize },
    /// The trailing username is not valid UTF-8.
    InvalidUsername,
    /// The image does not fit a 32-bit length prefix.
    ImageTooLarge(usize),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                declared,
                available,
            } => write!(
                f,
                "frame envelope truncated: need {declared} bytes, have {available}"
            ),
            Self::InvalidUsername => write!(f, "frame envelope username is not valid UTF-8"),
            Self::ImageTooLarge(n) => write!(f, "image of {n} bytes does not fit the envelope"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

impl FrameEnvelope {
    pub fn new(image: impl Into<Bytes>, username: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            username: username.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let image_len = u32::try_from(self.image.len())
            .map_err(|_| EnvelopeError::ImageTooLarge(self.image.len()))?;

        let mut buf =
            Vec::with_capacity(IMAGE_LEN_PREFIX + self.image.len() + self.username.len());
        // Writing into a Vec cannot fail.
        let _ = buf.write_u32::<BigEndian>(image_len);
        buf.extend_from_slice(&self.image);
        buf.extend_from_slice(self.username.as_bytes());
        Ok(buf)
    }

    /// Decodes a payload; the image is sliced out of `payload` without copying.
    pub fn decode(payload: impl Into<Bytes>) -> Result<Self, EnvelopeError> {
        let payload: Bytes = payload.into();

        let mut cursor = Cursor::new(payload.as_ref());
        let image_len = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| EnvelopeError::Truncated {
                declared: IMAGE_LEN_PREFIX,
                available: payload.len(),
            })? as usize;

        let image_end = IMAGE_LEN_PREFIX
            .checked_add(image_len)
            .filter(|end| *end <= payload.len())
            .ok_or(EnvelopeError::Truncated {
                declared: IMAGE_LEN_PREFIX.saturating_add(image_len),
                available: payload.len(),
            })?;

        let username = std::str::from_utf8(&payload[image_end..])
            .map_err(|_| EnvelopeError::InvalidUsername)?
            .to_owned();

        Ok(Self {
            image: payload.slice(IMAGE_LEN_PREFIX..image_end),
            username,
        })
    }
}
