//! Incremental parser for the `/transfer-events` stream

use crate::services::TransferEvent;

/// Buffers raw chunks and yields complete `transfer` events
#[derive(Debug, Default)]
pub(super) struct EventParser {
    buffer: Vec<u8>,
}

impl EventParser {
    pub(super) fn push(&mut self, chunk: &[u8]) -> Vec<TransferEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame);

            let mut name = None;
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    if !data.is_empty() {
                        data.push('\n');
                    }
                    data.push_str(value.trim_start());
                }
            }

            match name.as_deref() {
                Some("transfer") => match serde_json::from_str(&data) {
                    Ok(event) => events.push(event),
                    Err(e) => tracing::warn!("Skipping malformed transfer event: {}", e),
                },
                Some("lagged") => {
                    tracing::warn!("Server dropped transfer events for this subscriber: {}", data)
                }
                // keep-alive comments and unknown events
                _ => {}
            }
        }
        events
    }
}

fn frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}
