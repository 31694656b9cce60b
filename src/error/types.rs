//! Error types
//!
//! Defines domain-specific error types for each module of the FTP proxy.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Address wire-format errors (PORT arguments and PASV replies)
#[derive(Debug, PartialEq)]
pub enum CodecError {
    FieldCount(usize),
    InvalidField(String),
    OutOfRange(String),
    MissingAddress(String),
    NotIpv4(SocketAddr),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::FieldCount(n) => write!(f, "expected 6 fields, got {}", n),
            CodecError::InvalidField(s) => write!(f, "non-numeric field: {:?}", s),
            CodecError::OutOfRange(s) => write!(f, "field out of range 0-255: {}", s),
            CodecError::MissingAddress(s) => write!(f, "no address found in reply: {}", s),
            CodecError::NotIpv4(addr) => write!(f, "address {} is not IPv4", addr),
        }
    }
}

impl std::error::Error for CodecError {}

/// Origin connectivity errors
#[derive(Debug)]
pub enum RelayError {
    ConnectFailed(String, io::Error),
    ConnectTimeout(String),
    OriginClosed,
    MalformedReply(String),
    LineTooLong(usize),
    Io(io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::ConnectFailed(addr, e) => write!(f, "Failed to connect to {}: {}", addr, e),
            RelayError::ConnectTimeout(addr) => write!(f, "Timeout connecting to {}", addr),
            RelayError::OriginClosed => write!(f, "Origin closed the control connection"),
            RelayError::MalformedReply(line) => write!(f, "Malformed origin reply: {:?}", line),
            RelayError::LineTooLong(limit) => {
                write!(f, "Origin reply line exceeds {} bytes", limit)
            }
            RelayError::Io(e) => write!(f, "Origin I/O error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}

/// Data connection errors
#[derive(Debug)]
pub enum TransferError {
    NoTransferDeclared,
    PortBindingFailed(SocketAddr, io::Error),
    AcceptTimeout(SocketAddr),
    AcceptFailed(io::Error),
    DialFailed(SocketAddr, io::Error),
    DialTimeout(SocketAddr),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::NoTransferDeclared => write!(f, "No data connection declared"),
            TransferError::PortBindingFailed(addr, e) => {
                write!(f, "Failed to bind to {}: {}", addr, e)
            }
            TransferError::AcceptTimeout(addr) => {
                write!(f, "Timeout waiting for data connection on {}", addr)
            }
            TransferError::AcceptFailed(e) => write!(f, "Failed to accept data connection: {}", e),
            TransferError::DialFailed(addr, e) => write!(f, "Failed to connect to {}: {}", addr, e),
            TransferError::DialTimeout(addr) => write!(f, "Timeout connecting to {}", addr),
        }
    }
}

impl std::error::Error for TransferError {}

/// Startup errors: configuration, TLS material and the control listener
#[derive(Debug)]
pub enum StartupError {
    Load(config::ConfigError),
    Invalid(String),
    Tls(String),
    Bind(String, io::Error),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Load(e) => write!(f, "Failed to load configuration: {}", e),
            StartupError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
            StartupError::Tls(msg) => write!(f, "TLS setup failed: {}", msg),
            StartupError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<config::ConfigError> for StartupError {
    fn from(error: config::ConfigError) -> Self {
        StartupError::Load(error)
    }
}

/// Classified outcome of a failed command handler
#[derive(Debug)]
pub enum CommandError {
    /// Malformed command
    Syntax(String),
    /// Command parameter that cannot be interpreted
    InvalidParameter(String),
    /// Parameter understood but not supported
    Unsupported(String),
    /// Command needs a Control Relay and none is bound yet
    NotConnected,
    /// Command issued in the wrong order
    BadSequence(String),
    Codec(CodecError),
    Relay(RelayError),
    Transfer(TransferError),
    Tls(String),
    /// The client control socket failed; the session cannot continue
    ClientIo(io::Error),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Syntax(msg) => write!(f, "{}", msg),
            CommandError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            CommandError::Unsupported(msg) => write!(f, "Not implemented for that parameter: {}", msg),
            CommandError::NotConnected => write!(f, "Please login with USER first"),
            CommandError::BadSequence(msg) => write!(f, "Bad sequence of commands: {}", msg),
            CommandError::Codec(e) => write!(f, "Bad address: {}", e),
            CommandError::Relay(e) => write!(f, "Origin error: {}", e),
            CommandError::Transfer(e) => write!(f, "Transfer error: {}", e),
            CommandError::Tls(msg) => write!(f, "TLS error: {}", msg),
            CommandError::ClientIo(e) => write!(f, "Client I/O error: {}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<CodecError> for CommandError {
    fn from(error: CodecError) -> Self {
        CommandError::Codec(error)
    }
}

impl From<RelayError> for CommandError {
    fn from(error: RelayError) -> Self {
        CommandError::Relay(error)
    }
}

impl From<TransferError> for CommandError {
    fn from(error: TransferError) -> Self {
        CommandError::Transfer(error)
    }
}

impl From<io::Error> for CommandError {
    fn from(error: io::Error) -> Self {
        CommandError::ClientIo(error)
    }
}
