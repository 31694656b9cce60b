//! Error handlers
//!
//! Maps classified errors to FTP reply codes and client-visible text.

use crate::error::types::CommandError;
use crate::protocol::responses;
use log::error;

/// Log a command error
pub fn handle_error(err: &CommandError) {
    error!("FTP Proxy Error: {}", err);
}

/// Convert error to FTP response code
pub fn error_to_ftp_code(err: &CommandError) -> u16 {
    match err {
        CommandError::Syntax(_) => responses::SYNTAX_ERROR,
        CommandError::Codec(_) => responses::SYNTAX_ERROR,
        CommandError::InvalidParameter(_) => responses::PARAMETER_SYNTAX_ERROR,
        CommandError::Unsupported(_) => responses::PARAMETER_NOT_IMPLEMENTED,
        CommandError::NotConnected => responses::NOT_LOGGED_IN,
        CommandError::BadSequence(_) => responses::BAD_SEQUENCE,
        CommandError::Relay(_) => responses::SERVICE_UNAVAILABLE,
        CommandError::Transfer(_) => responses::CANT_OPEN_DATA,
        CommandError::Tls(_) => responses::ACTION_NOT_TAKEN,
        CommandError::ClientIo(_) => responses::SERVICE_UNAVAILABLE,
    }
}

/// Whether the error ends the session rather than just the command
pub fn is_terminal(err: &CommandError) -> bool {
    matches!(err, CommandError::ClientIo(_))
}

/// Render the reply sent to the client for a failed command
pub fn error_reply(err: &CommandError) -> String {
    let text = match err {
        CommandError::Codec(e) => format!("Bad PORT syntax: {}", e),
        other => other.to_string(),
    };
    responses::format_response(error_to_ftp_code(err), &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::types::{CodecError, RelayError, TransferError};
    use std::io;

    #[test]
    fn test_codes_for_each_class() {
        assert_eq!(error_to_ftp_code(&CommandError::Syntax("x".into())), 500);
        assert_eq!(error_to_ftp_code(&CommandError::Codec(CodecError::FieldCount(3))), 500);
        assert_eq!(error_to_ftp_code(&CommandError::NotConnected), 530);
        assert_eq!(
            error_to_ftp_code(&CommandError::Transfer(TransferError::NoTransferDeclared)),
            425
        );
        assert_eq!(
            error_to_ftp_code(&CommandError::Relay(RelayError::OriginClosed)),
            421
        );
    }

    #[test]
    fn test_only_client_io_is_terminal() {
        let client_io = CommandError::ClientIo(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(is_terminal(&client_io));
        assert!(!is_terminal(&CommandError::NotConnected));
        assert!(!is_terminal(&CommandError::Relay(RelayError::OriginClosed)));
    }

    #[test]
    fn test_syntax_and_tls_replies() {
        assert_eq!(
            error_reply(&CommandError::Syntax("Command too long".into())),
            "500 Command too long\r\n"
        );
        let reply = error_reply(&CommandError::Tls("Cannot get a TLS config".into()));
        assert!(reply.starts_with("550 "));
        assert!(reply.contains("Cannot get a TLS config"));
    }

    #[test]
    fn test_codec_reply_mentions_port_syntax() {
        let reply = error_reply(&CommandError::Codec(CodecError::FieldCount(5)));
        assert!(reply.starts_with("500 Bad PORT syntax"));
        assert!(reply.ends_with("\r\n"));
    }
}
