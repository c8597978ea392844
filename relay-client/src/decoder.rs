//! Incremental UTF-8 decoding of a chunked byte stream.

const REPLACEMENT: char = '\u{FFFD}';

/// Stateful UTF-8 decoder.
///
/// Network chunk boundaries do not respect character boundaries, so a
/// multi-byte character may arrive split across two reads. The incomplete
/// tail of one chunk is held back and completed by the next. Invalid
/// sequences decode to U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT);
                            rest = &tail[bad..];
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A dangling partial character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ascii_passes_straight_through() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(b"hello"), "hello");
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        // "é" = C3 A9, "€" = E2 82 AC, "🦀" = F0 9F A6 80
        let bytes = "é€🦀".as_bytes();
        let mut d = Utf8StreamDecoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&d.decode(std::slice::from_ref(b)));
        }
        out.push_str(&d.finish());
        assert_eq!(out, "é€🦀");
    }

    #[test]
    fn split_is_held_back_until_complete() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(&[b'a', 0xE2, 0x82]), "a");
        assert_eq!(d.pending_len(), 2);
        assert_eq!(d.decode(&[0xAC, b'b']), "€b");
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn truncated_tail_is_flushed_as_replacement() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(&[b'x', 0xF0, 0x9F]), "x");
        assert_eq!(d.finish(), "\u{FFFD}");
        assert_eq!(d.finish(), "");
    }
}
