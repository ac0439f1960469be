// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Frame codec for the coordinator/follower link.
//!
//! Every frame is `[i32 big-endian length N][N payload bytes]`; the payload
//! layout is defined by [`Message`]. Two read paths exist:
//!
//! - [`MessageCodec`] plugs into `tokio_util::codec::Framed` for the
//!   follower's blocking session (no read timeout).
//! - [`read_frame`] reads exactly one frame with a per-frame timeout, for the
//!   coordinator's multiplexed loop.
//!
//! Frames whose payload does not decode (unknown tag, truncated body) are
//! skipped with a log line, never surfaced as errors.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};
use tracing::{debug, warn};

use crate::domain::message::{Message, PayloadError};

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound on a payload; anything larger is a corrupt stream.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid frame length {0}")]
    InvalidLength(i64),
}

/// Encode a message as a complete frame (length prefix + payload).
pub fn encode_frame(message: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + message.payload_len());
    buf.put_i32(message.payload_len() as i32);
    message.encode_payload(&mut buf);
    buf.freeze()
}

/// Decode a payload, logging and swallowing anything the receiver should ignore.
pub fn decode_or_skip(payload: &[u8]) -> Option<Message> {
    match Message::decode_payload(payload) {
        Ok(message) => Some(message),
        Err(PayloadError::UnknownTag(tag)) => {
            debug!(tag, "Ignoring frame with unrecognized tag");
            metrics::counter!("flockstep_frames_ignored_total").increment(1);
            None
        }
        Err(e) => {
            warn!("Ignoring malformed frame: {}", e);
            metrics::counter!("flockstep_frames_ignored_total").increment(1);
            None
        }
    }
}

/// `tokio_util` codec producing [`Message`]s from a byte stream.
#[derive(Debug)]
pub struct MessageCodec {
    frames: LengthDelimitedCodec,
}

impl MessageCodec {
    pub fn new() -> Self {
        let frames = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_PREFIX_LEN)
            .big_endian()
            .max_frame_length(MAX_FRAME_LEN)
            .new_codec();
        Self { frames }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, io::Error> {
        // Keep pulling frames until one decodes or the buffer runs dry.
        while let Some(payload) = self.frames.decode(src)? {
            if let Some(message) = decode_or_skip(&payload) {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), io::Error> {
        self.frames.encode(message.to_payload(), dst)
    }
}

/// Result of one timed frame read.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete payload.
    Frame(Bytes),
    /// The peer stalled mid-frame; the bytes read so far are dropped.
    TimedOut,
    /// End of stream before a full frame arrived.
    Closed,
}

/// Read exactly one frame, bounding each of the header and payload reads by
/// `limit`.
pub async fn read_frame<R>(reader: &mut R, limit: Duration) -> Result<FrameRead, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_PREFIX_LEN];
    match read_exact_within(reader, &mut header, limit).await? {
        ReadStep::Done => {}
        ReadStep::TimedOut => return Ok(FrameRead::TimedOut),
        ReadStep::Eof => return Ok(FrameRead::Closed),
    }

    let len = i32::from_be_bytes(header);
    if len < 0 || len as usize > MAX_FRAME_LEN {
        return Err(CodecError::InvalidLength(len as i64));
    }

    let mut payload = vec![0u8; len as usize];
    match read_exact_within(reader, &mut payload, limit).await? {
        ReadStep::Done => Ok(FrameRead::Frame(Bytes::from(payload))),
        ReadStep::TimedOut => Ok(FrameRead::TimedOut),
        ReadStep::Eof => Ok(FrameRead::Closed),
    }
}

enum ReadStep {
    Done,
    TimedOut,
    Eof,
}

async fn read_exact_within<R>(reader: &mut R, buf: &mut [u8], limit: Duration) -> io::Result<ReadStep>
where
    R: AsyncRead + Unpin,
{
    if buf.is_empty() {
        return Ok(ReadStep::Done);
    }
    match tokio::time::timeout(limit, reader.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(ReadStep::Done),
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(ReadStep::Eof),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(ReadStep::TimedOut),
    }
}
