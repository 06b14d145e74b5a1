//! SSE wire framing utilities
//!
//! Shared framing for the import stream. Each frame is an `event:`
//! designator line and a `data:` payload line, terminated by a blank line
//! (frames are separated by a double line-break). Consumers read the
//! channel in arbitrarily-sized chunks, so reassembly must tolerate a frame
//! split across reads and several frames arriving in one read.

use tracing::warn;

use crate::events::{ImportEvent, WireError};

/// Frame separator on the wire
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Encode an event into its wire frame
pub fn encode_frame(event: &ImportEvent) -> String {
    format!(
        "event: {}\ndata: {}\n\n",
        event.event_type(),
        event.data_json()
    )
}

/// Convert an event into an axum SSE event (server side)
pub fn to_sse_event(event: &ImportEvent) -> axum::response::sse::Event {
    axum::response::sse::Event::default()
        .event(event.event_type())
        .data(event.data_json().to_string())
}

/// Reassembles wire frames from arbitrarily-chunked reads.
///
/// Chunks are appended to an accumulation buffer; complete frames are split
/// off at the blank-line delimiter and any trailing fragment is retained
/// for the next read. Operates on raw bytes so a chunk boundary inside a
/// multi-byte UTF-8 sequence cannot corrupt the stream.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and split off every frame it completes.
    ///
    /// Frames that are not valid UTF-8 are dropped with a warning; empty
    /// frames (consecutive delimiters) are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_delimiter(&self.buf) {
            let rest = self.buf.split_off(pos + FRAME_DELIMITER.len());
            let mut frame_bytes = std::mem::replace(&mut self.buf, rest);
            frame_bytes.truncate(pos);

            match String::from_utf8(frame_bytes) {
                Ok(frame) => {
                    if !frame.trim().is_empty() {
                        frames.push(frame);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "dropping frame that is not valid UTF-8");
                }
            }
        }
        frames
    }

    /// Bytes of the trailing incomplete fragment still buffered
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_DELIMITER.len())
        .position(|w| w == FRAME_DELIMITER)
}

/// Split a raw frame into its event designator and data payload.
///
/// Returns `None` for frames carrying no data line (comments, heartbeats).
/// Multiple `data:` lines are joined with a newline. An absent `event:`
/// line defaults the kind to `message`, matching EventSource semantics.
pub fn parse_frame(frame: &str) -> Option<(String, String)> {
    let mut kind = "message".to_string();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            kind = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data_lines.push(rest);
        }
    }

    if data_lines.is_empty() {
        None
    } else {
        Some((kind, data_lines.join("\n")))
    }
}

/// Parse and decode a raw frame into an [`ImportEvent`].
///
/// `Ok(None)` means the frame carried no event (comment/heartbeat) and
/// should be ignored.
pub fn decode_frame(frame: &str) -> Result<Option<ImportEvent>, WireError> {
    match parse_frame(frame) {
        Some((kind, data)) => ImportEvent::from_wire(&kind, &data).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn encode_frame_matches_the_wire_contract() {
        let event = ImportEvent::Start { target: 100 };
        assert_eq!(
            encode_frame(&event),
            "event: start\ndata: {\"target\":100}\n\n"
        );
    }

    #[test]
    fn one_chunk_may_carry_several_frames() {
        let a = encode_frame(&ImportEvent::Start { target: 50 });
        let b = encode_frame(&ImportEvent::BatchError {
            batch: 1,
            error: "timeout".to_string(),
        });

        let mut assembler = FrameAssembler::new();
        let frames = assembler.push(format!("{a}{b}").as_bytes());
        assert_eq!(frames.len(), 2);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn a_frame_split_across_chunks_is_reassembled() {
        let frame = encode_frame(&ImportEvent::Session {
            session_id: Uuid::new_v4(),
        });
        let bytes = frame.as_bytes();

        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(&bytes[..10]).is_empty());
        assert!(assembler.pending() > 0);
        let frames = assembler.push(&bytes[10..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn chunk_boundary_inside_a_multibyte_character_is_harmless() {
        let event = ImportEvent::Error {
            error: "query rejected: données indisponibles".to_string(),
        };
        let frame = encode_frame(&event);
        let bytes = frame.as_bytes();

        // Split inside the first multi-byte character of the payload.
        let split = frame.find('é').unwrap() + 1;
        assert!(!frame.is_char_boundary(split));

        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(&bytes[..split]).is_empty());
        let frames = assembler.push(&bytes[split..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(decode_frame(&frames[0]).unwrap(), Some(event));
    }

    #[test]
    fn comment_frames_decode_to_nothing() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.push(b": heartbeat\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(decode_frame(&frames[0]).unwrap(), None);
    }

    #[test]
    fn trailing_fragment_is_kept_for_the_next_read() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.push(b"event: start\ndata: {\"target\":10}\n\nevent: batch");
        assert_eq!(frames.len(), 1);
        assert_eq!(assembler.pending(), "event: batch".len());
    }
}
