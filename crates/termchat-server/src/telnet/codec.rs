//! Newline framing for client input.
//!
//! Bad lines come out as [`Input`] items rather than decoder errors. A
//! decoder error makes `FramedRead` yield `None` once and then wait for
//! fresh bytes, which would stall any lines already buffered behind it.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};

/// One line of client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Longer than the configured maximum. The bytes up to the next newline
    /// are discarded.
    TooLong,
    /// Not valid UTF-8.
    NotUtf8,
}

#[derive(Debug)]
pub struct InputCodec {
    inner: AnyDelimiterCodec,
}

impl InputCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_length),
        }
    }
}

fn to_input(frame: Result<Option<Bytes>, AnyDelimiterCodecError>) -> io::Result<Option<Input>> {
    match frame {
        Ok(Some(chunk)) => {
            let raw = chunk.strip_suffix(b"\r").unwrap_or(&chunk[..]);
            Ok(Some(match std::str::from_utf8(raw) {
                Ok(line) => Input::Line(line.to_string()),
                Err(_) => Input::NotUtf8,
            }))
        }
        Ok(None) => Ok(None),
        Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Input::TooLong)),
        Err(AnyDelimiterCodecError::Io(err)) => Err(err),
    }
}

impl Decoder for InputCodec {
    type Item = Input;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Input>> {
        to_input(self.inner.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Input>> {
        to_input(self.inner.decode_eof(src))
    }
}
