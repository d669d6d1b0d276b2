//! Terminal control stripping and whitespace normalisation.
//!
//! Console programs may emit colour codes, cursor movement and title
//! sequences even with `TERM=dumb`. Every read goes through the
//! [`Sanitizer`] before any pattern matching, so prompts and phrases are
//! matched against plain text only.

use memchr::memchr;
use vte::{Parser, Perform};

const ESC: u8 = 0x1b;

/// Streaming escape-sequence stripper.
///
/// Keeps parser state between [`feed`](Self::feed) calls so a sequence
/// split across two reads is still removed.
pub struct Sanitizer {
    parser: Parser,
    pending: bool,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            pending: false,
        }
    }

    /// Strip control sequences from a chunk, returning the printable text.
    ///
    /// Newlines, carriage returns and tabs are kept; everything else below
    /// 0x20 and every ESC/CSI/OSC/DCS sequence is dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> String {
        let has_escape = memchr(ESC, bytes).is_some();
        let utf8 = std::str::from_utf8(bytes).ok();

        if !self.pending && !has_escape && !bytes.iter().any(|b| is_dropped_control(*b)) {
            if let Some(text) = utf8 {
                return text.to_string();
            }
        }

        let mut printer = Printer {
            text: String::with_capacity(bytes.len()),
        };
        self.parser.advance(&mut printer, bytes);
        // The parser may be holding a partial sequence or character
        self.pending = has_escape || utf8.is_none();
        printer.text
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer").finish_non_exhaustive()
    }
}

struct Printer {
    text: String,
}

impl Perform for Printer {
    fn print(&mut self, c: char) {
        // vte hands DEL to print
        if !c.is_control() {
            self.text.push(c);
        }
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.text.push(byte as char);
        }
    }
}

fn is_dropped_control(byte: u8) -> bool {
    (byte < 0x20 && !matches!(byte, b'\n' | b'\r' | b'\t')) || byte == 0x7f
}

/// Normalise line endings to `\n` and collapse runs of spaces and tabs
/// into a single space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_blank = false;

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                in_blank = false;
            }
            ' ' | '\t' => {
                if !in_blank {
                    out.push(' ');
                    in_blank = true;
                }
            }
            _ => {
                out.push(c);
                in_blank = false;
            }
        }
    }

    out
}

/// Strip control sequences and normalise in one pass over a complete text.
pub fn sanitize(raw: &str) -> String {
    normalize(&Sanitizer::new().feed(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_colour_codes() {
        assert_eq!(sanitize("\x1B[32mOK\x1B[0m"), "OK");
    }

    #[test]
    fn test_strips_cursor_and_title_sequences() {
        let raw = "\x1B]0;bank\x07\x1B[2J\x1B[HChoose an option: \x1B[?25l";
        assert_eq!(sanitize(raw), "Choose an option: ");
    }

    #[test]
    fn test_sequence_split_across_chunks() {
        let mut sanitizer = Sanitizer::new();
        let first = sanitizer.feed(b"Welcome\x1B[3");
        let second = sanitizer.feed(b"2m, alice\x1B[0m!");
        assert_eq!(format!("{first}{second}"), "Welcome, alice!");
    }

    #[test]
    fn test_normalizes_line_endings() {
        assert_eq!(normalize("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("Current   Balance:\t\t$5.0"), "Current Balance: $5.0");
    }

    #[test]
    fn test_drops_stray_controls() {
        assert_eq!(sanitize("be\x07ll\x00 ok\x7f"), "bell ok");
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "1. Login\n2. Register\n3. Exit\nChoose an option: ";
        assert_eq!(sanitize(text), text);
    }
}
