// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Messages
//!
//! Typed payloads exchanged between the coordinator and its followers.
//!
//! A payload is the body of one length-prefixed frame (see
//! [`crate::infrastructure::codec`]). Its first byte is the kind tag:
//!
//! | Tag | Kind | Body | Payload size |
//! |-----|------|------|--------------|
//! | `1` | `LOGIN` | `i32` big-endian follower id | 5 bytes |
//! | `2` | `START` | `u8` dance index | 2 bytes |
//! | `3` | `EMERGENCY` | (empty) | 1 byte |
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Wire-level value objects, no I/O

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

pub const TAG_LOGIN: u8 = 1;
pub const TAG_START: u8 = 2;
pub const TAG_EMERGENCY: u8 = 3;

/// Identifier a follower announces in its LOGIN message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FollowerId(pub i32);

impl fmt::Display for FollowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message on the coordinator/follower link.
///
/// Messages are immutable values; they are built right before a send and
/// consumed right after a receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Follower → coordinator: register this connection under `follower_id`.
    Login { follower_id: FollowerId },
    /// Coordinator → follower: start performance number `dance_index`.
    Start { dance_index: u8 },
    /// Coordinator → follower: abort and land.
    Emergency,
}

impl Message {
    pub fn tag(&self) -> u8 {
        match self {
            Message::Login { .. } => TAG_LOGIN,
            Message::Start { .. } => TAG_START,
            Message::Emergency => TAG_EMERGENCY,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Message::Login { .. } => "LOGIN",
            Message::Start { .. } => "START",
            Message::Emergency => "EMERGENCY",
        }
    }

    /// Payload length in bytes, tag included.
    pub fn payload_len(&self) -> usize {
        match self {
            Message::Login { .. } => 5,
            Message::Start { .. } => 2,
            Message::Emergency => 1,
        }
    }

    /// Serialize the payload (tag + body), without the length prefix.
    pub fn encode_payload(&self, dst: &mut BytesMut) {
        dst.reserve(self.payload_len());
        dst.put_u8(self.tag());
        match self {
            Message::Login { follower_id } => dst.put_i32(follower_id.0),
            Message::Start { dance_index } => dst.put_u8(*dance_index),
            Message::Emergency => {}
        }
    }

    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload_len());
        self.encode_payload(&mut buf);
        buf.freeze()
    }

    /// Parse one payload.
    ///
    /// Trailing bytes after the kind-specific body are tolerated.
    pub fn decode_payload(payload: &[u8]) -> Result<Message, PayloadError> {
        let (&tag, body) = payload.split_first().ok_or(PayloadError::Empty)?;
        match tag {
            TAG_LOGIN => {
                let raw: [u8; 4] = body
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(PayloadError::Truncated { tag, needed: 5, got: payload.len() })?;
                Ok(Message::Login { follower_id: FollowerId(i32::from_be_bytes(raw)) })
            }
            TAG_START => {
                let dance_index = *body
                    .first()
                    .ok_or(PayloadError::Truncated { tag, needed: 2, got: payload.len() })?;
                Ok(Message::Start { dance_index })
            }
            TAG_EMERGENCY => Ok(Message::Emergency),
            other => Err(PayloadError::UnknownTag(other)),
        }
    }
}

/// Why a payload could not be turned into a [`Message`].
///
/// None of these are fatal for a link: receivers log and skip the frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,

    #[error("unrecognized message tag {0}")]
    UnknownTag(u8),

    #[error("payload for tag {tag} truncated: need {needed} bytes, got {got}")]
    Truncated { tag: u8, needed: usize, got: usize },
}
