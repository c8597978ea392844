//! Incremental assembly of a streamed assistant message.
//!
//! The relay body is NDJSON: one [`StreamFragment`] per line. Chunks may end
//! mid-line and mid-character; both are carried over to the next chunk so
//! that no fragment is lost to a chunk boundary.
//!
//! End of message is signalled only by the stream closing. A `done: true`
//! line is recorded but does not stop assembly.

use relay_types::StreamFragment;
use tracing::{debug, warn};

use crate::decoder::Utf8StreamDecoder;

#[derive(Debug, Default)]
pub struct StreamAssembler {
    decoder: Utf8StreamDecoder,
    line_buf: String,
    content: String,
    fragments: usize,
    skipped: usize,
    saw_done: bool,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk of the response body.
    ///
    /// Returns `true` when the accumulated content changed.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        let text = self.decoder.decode(chunk);
        self.line_buf.push_str(&text);

        let mut changed = false;
        while let Some(newline) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=newline).collect();
            changed |= self.process_line(&line);
        }
        changed
    }

    /// Flush whatever is left once the stream has closed.
    ///
    /// A final line without a trailing newline is still processed.
    pub fn finish(&mut self) -> bool {
        let tail = self.decoder.finish();
        self.line_buf.push_str(&tail);
        let rest = std::mem::take(&mut self.line_buf);
        self.process_line(&rest)
    }

    /// The assistant message assembled so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of lines that carried message content.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Number of lines dropped because they were not valid fragments.
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    /// Whether the upstream has sent a line flagged `done: true`.
    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    fn process_line(&mut self, raw: &str) -> bool {
        let line = raw.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return false;
        }

        let fragment: StreamFragment = match serde_json::from_str(line) {
            Ok(f) => f,
            Err(e) => {
                self.skipped += 1;
                warn!(error = %e, line, "skipping malformed stream line");
                return false;
            }
        };

        if fragment.is_done() && !self.saw_done {
            self.saw_done = true;
            debug!(
                reason = fragment.done_reason.as_deref().unwrap_or(""),
                fragments = self.fragments,
                "upstream reported done; waiting for stream close"
            );
        }

        match fragment.content() {
            Some(piece) if !piece.is_empty() => {
                self.content.push_str(piece);
                self.fragments += 1;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    fn line(content: &str) -> String {
        format!(
            "{}\n",
            serde_json::json!({
                "model": "llama3.2",
                "message": { "role": "assistant", "content": content },
                "done": false
            })
        )
    }

    #[test]
    fn concatenates_fragments_in_arrival_order() {
        let pieces = ["The", " quick", " brown", " fox"];
        let mut asm = StreamAssembler::new();
        for p in pieces {
            assert!(asm.feed(line(p).as_bytes()));
        }
        assert!(!asm.finish());
        assert_eq!(asm.content(), pieces.concat());
        assert_eq!(asm.fragment_count(), 4);
    }

    #[test]
    #[traced_test]
    fn malformed_line_between_fragments_is_skipped() {
        let body = format!("{}{{\"message\": oops\n{}", line("Hel"), line("lo"));
        let mut asm = StreamAssembler::new();
        asm.feed(body.as_bytes());
        asm.finish();
        assert_eq!(asm.content(), "Hello");
        assert_eq!(asm.skipped_lines(), 1);
        assert!(logs_contain("skipping malformed stream line"));
    }

    #[test]
    fn fragment_split_at_every_byte_is_reassembled() {
        let body = [line("naïve "), line("café ☕"), line("🦀")].concat();
        let mut asm = StreamAssembler::new();
        for b in body.as_bytes() {
            asm.feed(std::slice::from_ref(b));
        }
        asm.finish();
        assert_eq!(asm.content(), "naïve café ☕🦀");
        assert_eq!(asm.skipped_lines(), 0);
    }

    #[test]
    fn blank_and_crlf_lines_are_tolerated() {
        let body = format!("\n\r\n{}\r\n\n", line("ok").trim_end());
        let mut asm = StreamAssembler::new();
        asm.feed(body.as_bytes());
        asm.finish();
        assert_eq!(asm.content(), "ok");
        assert_eq!(asm.skipped_lines(), 0);
    }

    #[test]
    fn unterminated_last_line_is_processed_on_finish() {
        let mut asm = StreamAssembler::new();
        assert!(!asm.feed(line("tail").trim_end().as_bytes()));
        assert!(asm.finish());
        assert_eq!(asm.content(), "tail");
    }

    #[test]
    fn done_flag_does_not_stop_assembly() {
        let body = format!(
            "{}{}\n{}",
            line("a"),
            r#"{"message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
            line("b")
        );
        let mut asm = StreamAssembler::new();
        asm.feed(body.as_bytes());
        asm.finish();
        assert!(asm.saw_done());
        assert_eq!(asm.content(), "ab");
    }

    #[test]
    fn lines_without_content_change_nothing() {
        let mut asm = StreamAssembler::new();
        assert!(!asm.feed(b"{\"done\":false}\n"));
        assert!(!asm.feed(b"{\"message\":{\"role\":\"assistant\"}}\n"));
        assert_eq!(asm.content(), "");
    }
}
