use crate::core::events::ScreeningEvent;

pub const FRAME_DELIMITER: &str = "\n\n";
pub const PAYLOAD_PREFIX: &str = "data:";

enum FrameOutcome {
    Event(ScreeningEvent),
    NoPayload,
    Malformed { payload: String, error: String },
}

/// 將串流文字切成 frame，並解析每個 frame 的 payload
///
/// Only the undelivered tail after the last complete frame is buffered. A frame that fails
/// to parse is logged and dropped; decoding continues with the next frame.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    pending_bytes: Vec<u8>,
    frames_decoded: usize,
    malformed_frames: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes from the response body. A multi-byte character split across two
    /// chunks is held back until the rest of it arrives.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Vec<ScreeningEvent> {
        self.pending_bytes.extend_from_slice(bytes);

        let split = match std::str::from_utf8(&self.pending_bytes) {
            Ok(_) => self.pending_bytes.len(),
            // 區塊切在多位元組字元中間，保留尾端等下一塊
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                tracing::warn!("⚠️ Invalid UTF-8 in screening stream, replacing bad bytes");
                let text = String::from_utf8_lossy(&self.pending_bytes).into_owned();
                self.pending_bytes.clear();
                return self.feed(&text);
            }
        };

        let rest = self.pending_bytes.split_off(split);
        let complete = std::mem::replace(&mut self.pending_bytes, rest);
        let text = String::from_utf8_lossy(&complete).into_owned();
        self.feed(&text)
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<ScreeningEvent> {
        self.buffer.extend(chunk.chars().filter(|c| *c != '\r'));

        let mut events = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..].find(FRAME_DELIMITER) {
            let frame_end = consumed + offset;

            match decode_frame(&self.buffer[consumed..frame_end]) {
                FrameOutcome::Event(event) => {
                    self.frames_decoded += 1;
                    tracing::debug!("📨 Decoded {} frame", event.kind());
                    events.push(event);
                }
                FrameOutcome::NoPayload => {}
                FrameOutcome::Malformed { payload, error } => {
                    self.malformed_frames += 1;
                    tracing::warn!(
                        "⚠️ Dropping malformed frame ({}): {}",
                        error,
                        truncate(&payload, 120)
                    );
                }
            }

            consumed = frame_end + FRAME_DELIMITER.len();
        }

        self.buffer.drain(..consumed);
        events
    }

    /// Ends the stream. Returns the partial frame that was still buffered, if any; it is
    /// never decoded.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.buffer.push_str(&tail);
            self.pending_bytes.clear();
        }

        let tail = std::mem::take(&mut self.buffer);
        if tail.trim().is_empty() {
            return None;
        }

        tracing::debug!(
            "Stream ended with {} undelivered bytes, ignoring partial frame",
            tail.len()
        );
        Some(tail)
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len() + self.pending_bytes.len()
    }

    pub fn frames_decoded(&self) -> usize {
        self.frames_decoded
    }

    pub fn malformed_frames(&self) -> usize {
        self.malformed_frames
    }
}

fn decode_frame(frame: &str) -> FrameOutcome {
    let Some(payload) = frame
        .lines()
        .find_map(|line| line.strip_prefix(PAYLOAD_PREFIX))
    else {
        return FrameOutcome::NoPayload;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    match serde_json::from_str::<ScreeningEvent>(payload) {
        Ok(event) => FrameOutcome::Event(event),
        Err(e) => FrameOutcome::Malformed {
            payload: payload.to_string(),
            error: e.to_string(),
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
