// src/io/serial/text.rs
//
// Incremental UTF-8 decoding of the serial byte stream into text chunks.
// A multi-byte character split across two reads is held back until it completes.

/// Streaming UTF-8 decoder. Invalid sequences decode to U+FFFD.
#[derive(Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any held-back prefix) as possible.
    /// Returns an empty string when everything is still incomplete.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid_up_to always lands on a char boundary
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // Truncated sequence at the end: keep it for the next read
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut dec = Utf8ChunkDecoder::new();
        assert_eq!(dec.decode(b"{\"flow\":1}\n"), "{\"flow\":1}\n");
    }

    #[test]
    fn test_split_multibyte_is_carried_over() {
        // "µ" is 0xC2 0xB5
        let mut dec = Utf8ChunkDecoder::new();
        assert_eq!(dec.decode(b"12 \xC2"), "12 ");
        assert_eq!(dec.decode(b"\xB5L\n"), "\u{b5}L\n");
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut dec = Utf8ChunkDecoder::new();
        assert_eq!(dec.decode(b"a\xFFb"), "a\u{FFFD}b");
    }
}
