#[cfg(test)]
#[path = "stream_decoder_test.rs"]
mod tests;

use serde::Deserialize;

use crate::domain::models::StreamEvent;
use crate::domain::models::StreamFragment;
use crate::domain::models::StreamOutcome;

const MISSING_DONE: &str = "stream ended without completion marker";

#[derive(Default, Debug, Deserialize)]
struct RecordMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Default, Debug, Deserialize)]
struct ChatRecord {
    #[serde(default)]
    message: Option<RecordMessage>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Turns newline delimited JSON chat records, delivered in arbitrary byte
/// chunks, into ordered stream events. Performs no I/O.
#[derive(Default)]
pub struct StreamDecoder {
    pending_bytes: Vec<u8>,
    buffer: String,
    done_seen: bool,
    dropped_lines: usize,
}

impl StreamDecoder {
    pub fn new() -> StreamDecoder {
        return StreamDecoder::default();
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if chunk.is_empty() {
            return vec![];
        }

        let text = self.decode_utf8(chunk);
        self.buffer.push_str(&text);

        let mut events: Vec<StreamEvent> = vec![];
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].to_string();
            self.buffer.drain(..=pos);
            self.parse_line(&line, &mut events);
        }

        return events;
    }

    /// Ends the decode. Any incomplete trailing record is discarded.
    pub fn finish(&mut self) -> StreamOutcome {
        if !self.pending_bytes.is_empty() {
            self.pending_bytes.clear();
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }

        if !self.buffer.trim().is_empty() {
            tracing::debug!(residue = %self.buffer, "Discarding incomplete trailing record");
            self.dropped_lines += 1;
        }
        self.buffer.clear();

        if !self.done_seen {
            return StreamOutcome::Failed(MISSING_DONE.to_string());
        }

        return StreamOutcome::Completed;
    }

    /// Lines that could not be parsed as a record, including a discarded
    /// trailing residue.
    pub fn dropped_lines(&self) -> usize {
        return self.dropped_lines;
    }

    // Incomplete multi-byte sequences at the end of a chunk are carried into
    // the next call. Invalid sequences become U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending_bytes);
        bytes.extend_from_slice(chunk);

        let mut res = String::new();
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    res.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, invalid) = rest.split_at(err.valid_up_to());
                    res.push_str(&String::from_utf8_lossy(valid));

                    if let Some(len) = err.error_len() {
                        res.push(char::REPLACEMENT_CHARACTER);
                        rest = &invalid[len..];
                    } else {
                        self.pending_bytes = invalid.to_vec();
                        break;
                    }
                }
            }
        }

        return res;
    }

    fn parse_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let record = match serde_json::from_str::<ChatRecord>(line) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(error = ?err, line, "Dropping unparseable record");
                self.dropped_lines += 1;
                return;
            }
        };

        if let Some(text) = record.message.and_then(|msg| return msg.content) {
            if !text.is_empty() {
                events.push(StreamEvent::Fragment(StreamFragment { text }));
            }
        }

        if let Some(err) = record.error {
            events.push(StreamEvent::UpstreamError(err));
        }

        if record.done.unwrap_or(false) {
            self.done_seen = true;
            events.push(StreamEvent::Done);
        }
    }
}
