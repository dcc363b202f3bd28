//! Wire format for everything exchanged between sessions: the handshake
//! messages and the Sync Engine's input traffic. Every datagram begins with
//! a 1-byte tag, followed by fixed little-endian fields — deliberately not
//! `bincode`/`serde`, since the exact byte layout is part of the contract
//! peers on different builds must agree on.

const TAG_SYNC_REQUEST: u8 = 0x01;
const TAG_SYNC_REPLY: u8 = 0x02;
const TAG_INPUT_BATCH: u8 = 0x03;
const TAG_INPUT_ACK: u8 = 0x04;
const TAG_QUALITY_REPORT: u8 = 0x05;
const TAG_QUALITY_REPLY: u8 = 0x06;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Message {
    SyncRequest {
        nonce: u32,
    },
    SyncReply {
        nonce: u32,
    },
    /// `frames[i]` is the payload for frame `start_frame + i`.
    InputBatch {
        start_frame: u32,
        end_frame: u32,
        bytes: Vec<u8>,
    },
    InputAck {
        frame: u32,
    },
    QualityReport {
        frame: u32,
        advantage: i32,
    },
    QualityReply {
        frame: u32,
    },
}

impl Message {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Message::SyncRequest { nonce } => {
                out.push(TAG_SYNC_REQUEST);
                out.extend_from_slice(&nonce.to_le_bytes());
            }
            Message::SyncReply { nonce } => {
                out.push(TAG_SYNC_REPLY);
                out.extend_from_slice(&nonce.to_le_bytes());
            }
            Message::InputBatch {
                start_frame,
                end_frame,
                bytes,
            } => {
                out.push(TAG_INPUT_BATCH);
                out.extend_from_slice(&start_frame.to_le_bytes());
                out.extend_from_slice(&end_frame.to_le_bytes());
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Message::InputAck { frame } => {
                out.push(TAG_INPUT_ACK);
                out.extend_from_slice(&frame.to_le_bytes());
            }
            Message::QualityReport { frame, advantage } => {
                out.push(TAG_QUALITY_REPORT);
                out.extend_from_slice(&frame.to_le_bytes());
                out.extend_from_slice(&advantage.to_le_bytes());
            }
            Message::QualityReply { frame } => {
                out.push(TAG_QUALITY_REPLY);
                out.extend_from_slice(&frame.to_le_bytes());
            }
        }
        out
    }

    /// Decodes a datagram. Returns `None` on any malformed input — a short
    /// buffer, an unknown tag, a length field that overruns the buffer.
    /// Per `spec.md` §7, malformed messages are discarded, never surfaced
    /// as an error.
    pub(crate) fn decode(bytes: &[u8]) -> Option<Message> {
        let (&tag, rest) = bytes.split_first()?;
        match tag {
            TAG_SYNC_REQUEST => Some(Message::SyncRequest {
                nonce: read_u32(rest)?,
            }),
            TAG_SYNC_REPLY => Some(Message::SyncReply {
                nonce: read_u32(rest)?,
            }),
            TAG_INPUT_BATCH => {
                let start_frame = read_u32(rest.get(0..4)?)?;
                let end_frame = read_u32(rest.get(4..8)?)?;
                let length = read_u16(rest.get(8..10)?)? as usize;
                let payload = rest.get(10..10 + length)?;
                Some(Message::InputBatch {
                    start_frame,
                    end_frame,
                    bytes: payload.to_vec(),
                })
            }
            TAG_INPUT_ACK => Some(Message::InputAck {
                frame: read_u32(rest)?,
            }),
            TAG_QUALITY_REPORT => {
                let frame = read_u32(rest.get(0..4)?)?;
                let advantage = read_i32(rest.get(4..8)?)?;
                Some(Message::QualityReport { frame, advantage })
            }
            TAG_QUALITY_REPLY => Some(Message::QualityReply {
                frame: read_u32(rest)?,
            }),
            _ => None,
        }
    }
}

fn read_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(0..4)?.try_into().ok()?))
}

fn read_i32(bytes: &[u8]) -> Option<i32> {
    Some(i32::from_le_bytes(bytes.get(0..4)?.try_into().ok()?))
}

fn read_u16(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(0..2)?.try_into().ok()?))
}
