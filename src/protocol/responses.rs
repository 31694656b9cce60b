//! FTP Response handling
//!
//! Defines FTP response codes, formatting and multi-line reply framing.

use std::borrow::Cow;

/// Standard FTP response codes
pub const OK: u16 = 200;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const ENTERING_PASSIVE: u16 = 227;
pub const ENTERING_EXTENDED_PASSIVE: u16 = 229;
pub const AUTH_OK: u16 = 234;
pub const SERVICE_UNAVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const SYNTAX_ERROR: u16 = 500;
pub const PARAMETER_SYNTAX_ERROR: u16 = 501;
pub const BAD_SEQUENCE: u16 = 503;
pub const PARAMETER_NOT_IMPLEMENTED: u16 = 504;
pub const NOT_LOGGED_IN: u16 = 530;
pub const ACTION_NOT_TAKEN: u16 = 550;

/// One complete reply read from the origin, every line kept as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<Vec<u8>>,
}

impl Reply {
    /// First line without its terminator, decoded lossily.
    pub fn first_line(&self) -> Cow<'_, str> {
        let line = self.lines.first().map(|l| trim_eol(l)).unwrap_or(&[]);
        String::from_utf8_lossy(line)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Wire form with every line CRLF terminated. Line bodies are untouched.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        for line in &self.lines {
            wire.extend_from_slice(trim_eol(line));
            wire.extend_from_slice(b"\r\n");
        }
        wire
    }
}

/// Strips any trailing CR and LF bytes.
pub fn trim_eol(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| *b != b'\r' && *b != b'\n')
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

/// Extract the three-digit reply code from a reply line
pub fn reply_code(line: &[u8]) -> Option<u16> {
    let code = line.get(..3)?;
    if !code.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.iter()
        .try_fold(0u16, |acc, b| Some(acc * 10 + u16::from(b - b'0')))
}

/// Returns true when `line` closes a reply whose first line carried `code`.
///
/// A single-line reply is `ddd text`. A multi-line reply opens with `ddd-text`
/// and ends at the first line that starts with the same code followed by a space.
pub fn is_final_reply_line(code: u16, line: &[u8]) -> bool {
    let line = trim_eol(line);
    reply_code(line) == Some(code) && matches!(line.get(3), None | Some(b' '))
}

/// Preliminary (1yz) replies announce that a data transfer is about to start.
pub fn is_preliminary(code: u16) -> bool {
    (100..200).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_response() {
        assert_eq!(format_response(OK, "PORT command successful"), "200 PORT command successful\r\n");
    }

    #[test]
    fn test_reply_code() {
        assert_eq!(reply_code(b"226 Transfer complete"), Some(226));
        assert_eq!(reply_code(b"211-Features:"), Some(211));
        assert_eq!(reply_code(b" MDTM"), None);
        assert_eq!(reply_code(b"ab"), None);
    }

    #[test]
    fn test_reply_wire_form() {
        let reply = Reply {
            code: 211,
            lines: vec![b"211-Features:\n".to_vec(), b" UTF8\r\n".to_vec(), b"211 End".to_vec()],
        };
        assert_eq!(reply.first_line(), "211-Features:");
        assert_eq!(reply.to_wire(), b"211-Features:\r\n UTF8\r\n211 End\r\n");
        assert!(reply.is_success());
    }

    #[test]
    fn test_non_utf8_lines_kept_verbatim() {
        let reply = Reply {
            code: 250,
            lines: vec![b"250 Deleted caf\xe9.txt\r\n".to_vec()],
        };
        assert_eq!(reply.to_wire(), b"250 Deleted caf\xe9.txt\r\n");
        assert_eq!(reply.first_line(), "250 Deleted caf\u{fffd}.txt");
        assert!(is_final_reply_line(250, &reply.lines[0]));
    }

    #[test]
    fn test_final_line_detection() {
        assert!(is_final_reply_line(226, b"226 Transfer complete\r\n"));
        assert!(is_final_reply_line(200, b"200"));
        assert!(!is_final_reply_line(211, b"211-Features:\r\n"));
        assert!(!is_final_reply_line(211, b" 211 indented text\r\n"));
        assert!(is_final_reply_line(211, b"211 End\r\n"));
        assert!(!is_final_reply_line(211, b"226 Other code\r\n"));
    }

    #[test]
    fn test_trim_eol() {
        assert_eq!(trim_eol(b"NOOP\r\n"), b"NOOP");
        assert_eq!(trim_eol(b"\r\n"), b"");
        assert_eq!(trim_eol(b"PWD"), b"PWD");
    }
}
