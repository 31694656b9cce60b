//! Address codec
//!
//! Converts between FTP's six-field comma-separated address format
//! (`h1,h2,h3,h4,p1,p2`) and native socket addresses.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::CodecError;

/// Parses a PORT argument such as `192,168,1,5,200,25`.
pub fn parse_port_argument(param: &str) -> Result<SocketAddrV4, CodecError> {
    let fields: Vec<&str> = param.trim().split(',').collect();
    if fields.len() != 6 {
        return Err(CodecError::FieldCount(fields.len()));
    }

    let mut octets = [0u8; 6];
    for (slot, field) in octets.iter_mut().zip(&fields) {
        let field = field.trim();
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::InvalidField(field.to_string()));
        }
        *slot = field
            .parse::<u8>()
            .map_err(|_| CodecError::OutOfRange(field.to_string()))?;
    }

    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = u16::from(octets[4]) * 256 + u16::from(octets[5]);
    Ok(SocketAddrV4::new(ip, port))
}

/// Renders an address as the six wire fields.
pub fn render_address(ip: Ipv4Addr, port: u16) -> String {
    let [a, b, c, d] = ip.octets();
    let p1 = port / 256;
    let p2 = port - p1 * 256;
    format!("{},{},{},{},{},{}", a, b, c, d, p1, p2)
}

/// Renders the PORT command sent to the origin, without line terminator.
pub fn render_port_command(addr: SocketAddr) -> Result<String, CodecError> {
    match addr {
        SocketAddr::V4(v4) => Ok(format!("PORT {}", render_address(*v4.ip(), v4.port()))),
        SocketAddr::V6(_) => Err(CodecError::NotIpv4(addr)),
    }
}

/// Renders the 227 reply text announcing a passive listener.
pub fn render_pasv_reply(addr: SocketAddr) -> Result<String, CodecError> {
    match addr {
        SocketAddr::V4(v4) => Ok(format!(
            "Entering Passive Mode ({})",
            render_address(*v4.ip(), v4.port())
        )),
        SocketAddr::V6(_) => Err(CodecError::NotIpv4(addr)),
    }
}

/// Renders the 229 reply text announcing a passive listener port.
pub fn render_epsv_reply(port: u16) -> String {
    format!("Entering Extended Passive Mode (|||{}|)", port)
}

/// Extracts the data address from an origin `227` reply.
///
/// Servers disagree on punctuation, so the six fields are taken from the
/// first run of digits and commas rather than from the parentheses.
pub fn parse_pasv_reply(line: &str) -> Result<SocketAddrV4, CodecError> {
    let text = line.trim_end_matches(['\r', '\n']);
    let body = text.get(4..).unwrap_or("");
    let start = body
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| CodecError::MissingAddress(text.to_string()))?;
    let rest = &body[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == ' '))
        .unwrap_or(rest.len());
    parse_port_argument(&rest[..end].replace(' ', ""))
}
