// Newline-delimited message framing over TCP.
//
// Wire format: one compact JSON object per line, `{"type": ..., "payload":
// ...}`, terminated by a single `\n`. No length prefix. serde_json escapes
// control characters inside strings, so an encoded body never contains a raw
// newline and the delimiter is unambiguous.
//
// Reading is split into three layers so each can be tested without sockets:
// - `LineDecoder` accumulates raw bytes from arbitrary read boundaries and
//   yields complete lines, keeping at most one undelimited fragment buffered.
//   It works on bytes, so a UTF-8 character split across two reads is
//   reassembled before any decoding happens.
// - `decode_line` performs structural validation into an `Envelope` (a line
//   missing `type` or `payload`, or not valid UTF-8/JSON, fails here).
// - `decode_message` checks the envelope's tag against the message enum's
//   `Tagged::KINDS`, then decodes the original line bytes as the typed
//   message, separating unknown message types from known types with bad
//   payloads. The typed decode never goes through an intermediate `Value`:
//   serde_json can only read integer-keyed maps (the `Roster`) from text.
//
// `FrameReader` glues the layers to a blocking `Read` for the per-connection
// reader threads on both sides. It reports every dropped line to the caller
// instead of closing (a malformed message never ends a session) and turns
// EOF and connection resets into `Frame::Closed`.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Tagged;

/// Longest line accepted (1 MiB). A peer that streams more than this without
/// a newline has its fragment discarded.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Size of each blocking read on a session socket.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Reasons a single line is dropped. None of these end a session.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("line is not a valid message envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("bad payload for {kind:?}: {source}")]
    BadPayload {
        kind: String,
        source: serde_json::Error,
    },
    #[error("line exceeds the length limit ({len} bytes buffered), discarded")]
    LineTooLong { len: usize },
}

/// Structurally valid message: a string tag plus an arbitrary payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

/// Structurally validate one line (without its `\n`).
pub fn decode_line(line: &[u8]) -> Result<Envelope, FrameError> {
    let text = std::str::from_utf8(line)?;
    Ok(serde_json::from_str(text)?)
}

/// Validate one line and decode it as a typed message enum.
pub fn decode_message<M: Tagged + DeserializeOwned>(line: &[u8]) -> Result<M, FrameError> {
    let envelope = decode_line(line)?;
    if !M::KINDS.contains(&envelope.kind.as_str()) {
        return Err(FrameError::UnknownType(envelope.kind));
    }
    serde_json::from_slice(line).map_err(|source| FrameError::BadPayload {
        kind: envelope.kind,
        source,
    })
}

/// Serialize a message, append the `\n` delimiter, and write the whole line.
pub fn write_message<W: Write, M: Serialize>(writer: &mut W, msg: &M) -> io::Result<()> {
    let mut line = serde_json::to_vec(msg).map_err(io::Error::other)?;
    if line.len() > MAX_LINE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "message too large: {} bytes (max {MAX_LINE_LENGTH})",
                line.len()
            ),
        ));
    }
    if line.contains(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "encoded message contains a raw newline",
        ));
    }
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()
}

/// Incremental line splitter for a byte stream.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    // Prefix of `buffer` already searched for a newline.
    scanned: usize,
    max_line: usize,
    // Set after an overlong fragment was thrown away: skip bytes up to and
    // including the next newline.
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_LENGTH)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            discarding: false,
        }
    }

    /// Append bytes from one read.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet terminated by a newline (plus any complete
    /// lines not drained yet).
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete, non-blank line with the delimiter (and a trailing
    /// `\r`, if any) stripped. `None` once only a partial fragment remains.
    pub fn next_line(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        loop {
            let found = self.buffer[self.scanned..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|offset| self.scanned + offset);
            let Some(newline) = found else {
                if self.discarding {
                    self.buffer.clear();
                } else if self.buffer.len() > self.max_line {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    self.discarding = true;
                    self.scanned = 0;
                    return Some(Err(FrameError::LineTooLong { len }));
                }
                self.scanned = self.buffer.len();
                return None;
            };

            self.scanned = 0;
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_line {
                return Some(Err(FrameError::LineTooLong { len: line.len() }));
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(Ok(line));
        }
    }

    /// Next complete line decoded as `M`. A line that fails to decode is
    /// consumed and reported as an error; later lines are unaffected.
    pub fn next_message<M: Tagged + DeserializeOwned>(
        &mut self,
    ) -> Option<Result<M, FrameError>> {
        self.next_line()
            .map(|line| line.and_then(|line| decode_message(&line)))
    }
}

/// One step of a blocking frame reader.
#[derive(Debug)]
pub enum Frame<M> {
    /// A decoded message.
    Message(M),
    /// A line was dropped; the connection stays open.
    Dropped(FrameError),
    /// The peer closed the connection (`None`) or it failed (`Some`).
    Closed(Option<io::Error>),
}

/// Blocking reader that turns a byte stream into decoded messages.
pub struct FrameReader<R> {
    inner: R,
    decoder: LineDecoder,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: LineDecoder::new(),
        }
    }

    /// Block until the next message, dropped line, or closure.
    pub fn next_frame<M: Tagged + DeserializeOwned>(&mut self) -> Frame<M> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.decoder.next_message() {
                Some(Ok(msg)) => return Frame::Message(msg),
                Some(Err(err)) => return Frame::Dropped(err),
                None => {}
            }
            match self.inner.read(&mut chunk) {
                Ok(0) => return Frame::Closed(None),
                Ok(n) => self.decoder.push(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    return Frame::Closed(None);
                }
                Err(e) => return Frame::Closed(Some(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::message::{ClientMessage, ServerMessage};
    use crate::types::{LobbyId, PlayerId, Position, RequestId, Roster};

    fn sample_messages() -> Vec<ClientMessage> {
        vec![
            ClientMessage::CreateLobby {
                lobby_name: "Äpfel & Birnen 🍐".into(),
                lobby_password: Some("pw".into()),
                host_profile: serde_json::json!(["id", "Host"]),
            },
            ClientMessage::GetLobbies {},
            ClientMessage::JoinRequest {
                lobby_id: Some(LobbyId(1)),
                player_name: "Guest\nwith newline".into(),
            },
            ClientMessage::JoinDecision {
                lobby_id: LobbyId(1),
                request_id: RequestId(2),
                accepted: true,
            },
        ]
    }

    fn encode_all(messages: &[ClientMessage]) -> Vec<u8> {
        let mut wire = Vec::new();
        for msg in messages {
            write_message(&mut wire, msg).unwrap();
        }
        wire
    }

    fn drain(decoder: &mut LineDecoder, out: &mut Vec<ClientMessage>) {
        while let Some(decoded) = decoder.next_message::<ClientMessage>() {
            out.push(decoded.unwrap());
        }
    }

    #[test]
    fn write_appends_single_newline() {
        let mut wire = Vec::new();
        write_message(&mut wire, &ClientMessage::GetLobbies {}).unwrap();
        assert_eq!(wire, b"{\"type\":\"get_lobbies\",\"payload\":{}}\n");
    }

    #[test]
    fn every_split_point_decodes_the_same_sequence() {
        let messages = sample_messages();
        let wire = encode_all(&messages);

        for split in 0..=wire.len() {
            let mut decoder = LineDecoder::new();
            let mut out = Vec::new();
            decoder.push(&wire[..split]);
            drain(&mut decoder, &mut out);
            decoder.push(&wire[split..]);
            drain(&mut decoder, &mut out);
            assert_eq!(out, messages, "split at byte {split}");
            assert_eq!(decoder.pending(), 0);
        }
    }

    #[test]
    fn byte_at_a_time_decodes_in_order() {
        let messages = sample_messages();
        let wire = encode_all(&messages);

        let mut decoder = LineDecoder::new();
        let mut out = Vec::new();
        for byte in &wire {
            decoder.push(std::slice::from_ref(byte));
            drain(&mut decoder, &mut out);
        }
        assert_eq!(out, messages);
    }

    #[test]
    fn partial_fragment_stays_buffered() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"type\":\"get_lo");
        assert!(decoder.next_line().is_none());
        assert_eq!(decoder.pending(), 15);
        decoder.push(b"bbies\",\"payload\":{}}\n{\"ty");
        let msg = decoder.next_message::<ClientMessage>().unwrap().unwrap();
        assert_eq!(msg, ClientMessage::GetLobbies {});
        assert!(decoder.next_line().is_none());
        assert_eq!(decoder.pending(), 4);
    }

    #[test]
    fn malformed_lines_are_dropped_individually() {
        let mut wire = Vec::new();
        write_message(&mut wire, &ClientMessage::GetLobbies {}).unwrap();
        wire.extend_from_slice(b"not json at all\n");
        wire.extend_from_slice(b"{\"type\":\"get_lobbies\"}\n");
        wire.extend_from_slice(b"{\"payload\":{}}\n");
        wire.extend_from_slice(b"{\"type\":\"teleport\",\"payload\":{}}\n");
        wire.extend_from_slice(b"{\"type\":\"join_decision\",\"payload\":{\"lobby_id\":1}}\n");
        wire.extend_from_slice(&[0xFF, 0xFE, b'\n']);
        write_message(
            &mut wire,
            &ClientMessage::JoinRequest {
                lobby_id: None,
                player_name: "Late".into(),
            },
        )
        .unwrap();

        let mut decoder = LineDecoder::new();
        decoder.push(&wire);
        let mut good = Vec::new();
        let mut errors = Vec::new();
        while let Some(decoded) = decoder.next_message::<ClientMessage>() {
            match decoded {
                Ok(msg) => good.push(msg),
                Err(err) => errors.push(err),
            }
        }

        assert_eq!(
            good,
            vec![
                ClientMessage::GetLobbies {},
                ClientMessage::JoinRequest {
                    lobby_id: None,
                    player_name: "Late".into(),
                },
            ]
        );
        assert_eq!(errors.len(), 6);
        assert!(matches!(errors[0], FrameError::Json(_)));
        assert!(matches!(errors[1], FrameError::Json(_)));
        assert!(matches!(errors[2], FrameError::Json(_)));
        assert!(matches!(&errors[3], FrameError::UnknownType(kind) if kind == "teleport"));
        assert!(matches!(
            &errors[4],
            FrameError::BadPayload { kind, .. } if kind == "join_decision"
        ));
        assert!(matches!(errors[5], FrameError::InvalidUtf8(_)));
    }

    #[test]
    fn init_with_roster_decodes() {
        let mut players = Roster::new();
        players.insert(PlayerId(1), Position(0, 0));
        players.insert(PlayerId(2), Position(5, -3));
        let init = ServerMessage::Init {
            player_id: PlayerId(2),
            players,
        };

        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"type\":\"init\",\"payload\":{\"player_id\":2,");
        decoder.push(b"\"players\":{\"1\":[0,0],\"2\":[5,-3]}}}\n");
        assert_eq!(decoder.next_message::<ServerMessage>().unwrap().unwrap(), init);
    }

    #[test]
    fn long_line_in_small_chunks_is_found_once_complete() {
        let name = "n".repeat(64 * 1024);
        let msg = ClientMessage::JoinRequest {
            lobby_id: None,
            player_name: name,
        };
        let mut wire = Vec::new();
        write_message(&mut wire, &msg).unwrap();

        let mut decoder = LineDecoder::new();
        let (body, tail) = wire.split_at(wire.len() - 1);
        for chunk in body.chunks(READ_CHUNK_SIZE) {
            decoder.push(chunk);
            assert!(decoder.next_line().is_none());
        }
        assert_eq!(decoder.pending(), body.len());
        decoder.push(tail);
        assert_eq!(decoder.next_message::<ClientMessage>().unwrap().unwrap(), msg);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn blank_and_crlf_lines_are_tolerated() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"\n  \n{\"type\":\"get_lobbies\",\"payload\":{}}\r\n");
        let msg = decoder.next_message::<ClientMessage>().unwrap().unwrap();
        assert_eq!(msg, ClientMessage::GetLobbies {});
        assert!(decoder.next_line().is_none());
    }

    #[test]
    fn overlong_fragment_is_discarded_until_next_newline() {
        let mut decoder = LineDecoder::with_max_line(16);
        decoder.push(&[b'x'; 20]);
        assert!(matches!(
            decoder.next_line(),
            Some(Err(FrameError::LineTooLong { len: 20 }))
        ));
        decoder.push(b"still the same line\n");
        decoder.push(b"{\"a\":1}\n");
        assert_eq!(decoder.next_line().unwrap().unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn frame_reader_reports_drops_then_closes() {
        let mut wire = Vec::new();
        let mut roster = Roster::new();
        roster.insert(PlayerId(1), Default::default());
        write_message(&mut wire, &ServerMessage::UpdatePlayers(roster.clone())).unwrap();
        wire.extend_from_slice(b"garbage\n");
        write_message(&mut wire, &ServerMessage::UpdatePlayers(roster.clone())).unwrap();
        wire.extend_from_slice(b"{\"type\":\"init\"");

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert!(matches!(
            reader.next_frame::<ServerMessage>(),
            Frame::Message(ServerMessage::UpdatePlayers(r)) if r == roster
        ));
        assert!(matches!(reader.next_frame::<ServerMessage>(), Frame::Dropped(_)));
        assert!(matches!(reader.next_frame::<ServerMessage>(), Frame::Message(_)));
        // The trailing fragment never completes; EOF closes cleanly.
        assert!(matches!(reader.next_frame::<ServerMessage>(), Frame::Closed(None)));
    }

    #[test]
    fn frame_reader_treats_reset_as_orderly_close() {
        struct ResetReader;
        impl Read for ResetReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::ConnectionReset))
            }
        }
        let mut reader = FrameReader::new(ResetReader);
        assert!(matches!(reader.next_frame::<ClientMessage>(), Frame::Closed(None)));
    }
}
