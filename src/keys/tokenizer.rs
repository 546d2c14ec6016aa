//! Field tokenizer for key file lines
//!
//! Splits one line into space/tab delimited fields. A `#` starts a comment
//! that runs to the end of the line; `\n` and `\r` also end the line.

/// Returns true for bytes that terminate the current line
fn is_line_end(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\n' | b'\r' | b'#')
}

fn is_blank(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

/// Cursor over one line of a key file
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    rest: &'a [u8],
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a [u8]) -> Self {
        Self { rest: line }
    }

    /// Return the next field, or `None` once only blanks or a comment remain
    ///
    /// The cursor is advanced past the field and past exactly one trailing
    /// blank. Nothing is allocated: fields borrow from the line buffer.
    pub fn next_token(&mut self) -> Option<&'a [u8]> {
        let start = self
            .rest
            .iter()
            .position(|&b| !is_blank(b))
            .unwrap_or(self.rest.len());
        let line = &self.rest[start..];

        let len = line
            .iter()
            .position(|&b| is_blank(b) || is_line_end(b))
            .unwrap_or(line.len());
        if len == 0 {
            self.rest = line;
            return None;
        }

        let (token, tail) = line.split_at(len);
        self.rest = match tail.first() {
            Some(&b) if is_blank(b) => &tail[1..],
            _ => tail,
        };
        Some(token)
    }

    /// Remaining, not yet tokenized bytes
    pub fn remainder(&self) -> &'a [u8] {
        self.rest
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<&str> {
        Tokenizer::new(line.as_bytes())
            .map(|t| std::str::from_utf8(t).unwrap())
            .collect()
    }

    #[test]
    fn test_splits_on_spaces_and_tabs() {
        assert_eq!(tokens("10 MD5\tsecret"), vec!["10", "MD5", "secret"]);
        assert_eq!(tokens("  \t 10   MD5  "), vec!["10", "MD5"]);
    }

    #[test]
    fn test_comment_ends_line() {
        assert_eq!(tokens("10 MD5 secret # trailing note"), vec!["10", "MD5", "secret"]);
        assert_eq!(tokens("10 MD5 secret#glued"), vec!["10", "MD5", "secret"]);
        assert!(tokens("# whole line comment").is_empty());
    }

    #[test]
    fn test_blank_line_has_no_tokens() {
        assert!(tokens("").is_empty());
        assert!(tokens(" \t  ").is_empty());
        assert!(tokens("\n").is_empty());
        assert!(tokens("\r\n").is_empty());
    }

    #[test]
    fn test_newline_and_carriage_return_end_line() {
        assert_eq!(tokens("10 MD5 secret\n"), vec!["10", "MD5", "secret"]);
        assert_eq!(tokens("10 MD5 secret\r\n"), vec!["10", "MD5", "secret"]);
    }

    #[test]
    fn test_cursor_advances_past_one_delimiter() {
        let mut tok = Tokenizer::new(b"ab  cd");
        assert_eq!(tok.next_token(), Some(&b"ab"[..]));
        assert_eq!(tok.remainder(), b" cd");
        assert_eq!(tok.next_token(), Some(&b"cd"[..]));
        assert_eq!(tok.next_token(), None);
        assert_eq!(tok.next_token(), None);
    }

    #[test]
    fn test_stops_at_comment_permanently() {
        let mut tok = Tokenizer::new(b"a #b c");
        assert_eq!(tok.next_token(), Some(&b"a"[..]));
        assert_eq!(tok.next_token(), None);
        assert_eq!(tok.next_token(), None);
    }
}
