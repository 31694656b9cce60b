//! Command handlers module for the RAX FTP proxy.
//!
//! Each handler runs against one `ClientSession` and returns whether the raw
//! line still has to be relayed to the origin. Commands with no handler are
//! relayed as-is by the session loop.

use futures::FutureExt;
use log::{debug, error, info, warn};
use std::net::SocketAddr;

use crate::client::ClientSession;
use crate::error::{CommandError, TransferError};
use crate::protocol::address::{
    parse_pasv_reply, parse_port_argument, render_epsv_reply, render_pasv_reply,
    render_port_command,
};
use crate::protocol::commands::{CommandStatus, HandlerFuture};
use crate::protocol::responses::{
    AUTH_OK, ENTERING_EXTENDED_PASSIVE, ENTERING_PASSIVE, GOODBYE, NOT_LOGGED_IN, OK,
    is_preliminary, trim_eol,
};
use crate::relay::ControlRelay;
use crate::transfer::{ActiveTransfer, PassiveTransfer, Transfer};

/// USER: opens the control relay to the origin on first use, then lets the
/// line through so the origin sees the username.
pub fn handle_cmd_user(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        if session.has_control() {
            return Ok(CommandStatus::Forward);
        }

        let origin = session.config().origin_address.clone();
        let timeout = session.config().proxy_timeout();

        let mut relay = match ControlRelay::connect(&origin, timeout).await {
            Ok(relay) => relay,
            Err(e) => {
                warn!("Session {}: cannot reach origin {}: {}", session.id(), origin, e);
                session
                    .reply(NOT_LOGGED_IN, "Cannot proceed: origin unavailable")
                    .await?;
                return Ok(CommandStatus::Handled);
            }
        };

        match relay.read_reply().await {
            Ok(banner) => info!(
                "Session {}: origin {} says {}",
                session.id(),
                origin,
                banner.first_line()
            ),
            Err(e) => {
                warn!("Session {}: no banner from origin {}: {}", session.id(), origin, e);
                session
                    .reply(NOT_LOGGED_IN, "Cannot proceed: origin unavailable")
                    .await?;
                return Ok(CommandStatus::Handled);
            }
        }

        session.bind_control(relay);
        Ok(CommandStatus::Forward)
    }
    .boxed()
}

/// AUTH TLS: terminates TLS at the proxy. Never relayed to the origin.
pub fn handle_cmd_auth(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        let mechanism = session.command().param.trim().to_ascii_uppercase();
        if !matches!(mechanism.as_str(), "TLS" | "TLS-C" | "SSL") {
            return Err(CommandError::Unsupported(format!("AUTH {}", mechanism)));
        }

        if session.is_secure() {
            return Err(CommandError::BadSequence("TLS already active".into()));
        }

        let Some(acceptor) = session.tls_acceptor() else {
            return Err(CommandError::Tls("Cannot get a TLS config".into()));
        };

        if session.has_buffered_input() {
            return Err(CommandError::BadSequence(
                "commands pipelined after AUTH".into(),
            ));
        }

        session
            .reply(AUTH_OK, "AUTH command ok. Expecting TLS Negotiation.")
            .await?;
        session.upgrade_tls(acceptor).await?;
        Ok(CommandStatus::Handled)
    }
    .boxed()
}

/// PBSZ: only the zero buffer size exists for TLS.
pub fn handle_cmd_pbsz(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        if !session.is_secure() {
            return Err(CommandError::BadSequence("PBSZ requires AUTH first".into()));
        }
        session.reply(OK, "PBSZ=0").await?;
        Ok(CommandStatus::Handled)
    }
    .boxed()
}

/// PROT: selects whether data connections to the client are TLS-protected.
pub fn handle_cmd_prot(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        if !session.is_secure() {
            return Err(CommandError::BadSequence("PROT requires AUTH first".into()));
        }

        let level = session.command().param.trim().to_ascii_uppercase();
        match level.as_str() {
            "P" => {
                session.state_mut().set_transfer_tls(true);
                session.reply(OK, "PROT now Private").await?;
            }
            "C" => {
                session.state_mut().set_transfer_tls(false);
                session.reply(OK, "PROT now Clear").await?;
            }
            _ => return Err(CommandError::Unsupported(format!("PROT {}", level))),
        }
        Ok(CommandStatus::Handled)
    }
    .boxed()
}

/// FEAT: relays the origin's feature list line by line.
///
/// Stops after a line starting with `5` or ending in `END`. A read error
/// ends the command without writing anything further to the client.
pub fn handle_cmd_feat(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        let line = session.command().wire_line();
        session.control_mut()?.send_line(&line).await?;

        loop {
            let reply_line = match session.control_mut()?.read_line().await {
                Ok(reply_line) => reply_line,
                Err(e) => {
                    error!("Session {}: FEAT aborted: {}", session.id(), e);
                    session.drop_control();
                    return Ok(CommandStatus::Handled);
                }
            };

            session.write_line(&reply_line).await?;

            let text = trim_eol(&reply_line);
            let ends_feature_list =
                text.len() >= 3 && text[text.len() - 3..].eq_ignore_ascii_case(b"END");
            if ends_feature_list || text.starts_with(b"5") {
                return Ok(CommandStatus::Handled);
            }
        }
    }
    .boxed()
}

/// QUIT: says goodbye through the origin when connected, then ends the session.
pub fn handle_cmd_quit(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        if session.has_control() {
            let line = session.command().wire_line();
            match session.control_mut()?.exchange(&line).await {
                Ok(reply) => session.relay_reply(&reply).await?,
                Err(e) => {
                    warn!("Session {}: origin QUIT failed: {}", session.id(), e);
                    session.reply(GOODBYE, "Goodbye").await?;
                }
            }
        } else {
            session.reply(GOODBYE, "Goodbye").await?;
        }
        Ok(CommandStatus::CloseConnection)
    }
    .boxed()
}

/// PORT: parses the client's data address, listens on the proxy's behalf
/// and hands the origin a PORT pointing at that listener.
///
/// The advertised IP is the proxy's end of the origin connection, not of the
/// client connection: only the former is known to be reachable from the origin.
pub fn handle_cmd_port(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        let client_addr = parse_port_argument(&session.command().param)?;
        let advertised_ip = session.control_mut()?.local_addr().ip();
        let ephemeral = session.config().use_unknown_active_data_port;

        let active = ActiveTransfer::bind(ephemeral, client_addr).await?;
        let listen_port = active.local_addr().port();
        let port_command = render_port_command(SocketAddr::new(advertised_ip, listen_port))?;
        session.set_transfer(Transfer::Active(active));

        let reply = session.control_mut()?.exchange(&port_command).await?;
        if !reply.is_success() {
            session.set_transfer(Transfer::None);
            session.relay_reply(&reply).await?;
            return Ok(CommandStatus::Handled);
        }

        info!(
            "Session {}: PORT {} translated to {}",
            session.id(),
            client_addr,
            port_command
        );
        session.reply(OK, "PORT command successful").await?;
        Ok(CommandStatus::Handled)
    }
    .boxed()
}

/// PASV and EPSV: asks the origin for a passive address, then listens on
/// the client-facing interface and announces that listener instead.
pub fn handle_cmd_pasv(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        let extended = session.command().verb == "EPSV";

        let control = session.control_mut()?;
        let origin_ip = control.peer_addr().ip();
        let reply = control.exchange("PASV").await?;
        if reply.code != ENTERING_PASSIVE {
            session.relay_reply(&reply).await?;
            return Ok(CommandStatus::Handled);
        }

        let announced = parse_pasv_reply(&reply.first_line())?;
        let origin_data = if announced.ip().is_unspecified() {
            SocketAddr::new(origin_ip, announced.port())
        } else {
            SocketAddr::V4(announced)
        };

        let passive = PassiveTransfer::bind(session.local_addr().ip(), origin_data).await?;
        let listen_addr = passive.local_addr();
        info!(
            "Session {}: {} {} announced as {}",
            session.id(),
            session.command().verb,
            passive.origin_addr(),
            listen_addr
        );

        if extended {
            session.set_transfer(Transfer::Passive(passive));
            session
                .reply(ENTERING_EXTENDED_PASSIVE, &render_epsv_reply(listen_addr.port()))
                .await?;
        } else {
            let text = render_pasv_reply(listen_addr)?;
            session.set_transfer(Transfer::Passive(passive));
            session.reply(ENTERING_PASSIVE, &text).await?;
        }
        Ok(CommandStatus::Handled)
    }
    .boxed()
}

/// LIST and the other data commands: relays the command, bridges the data
/// connection and relays replies until the completion reply arrives.
pub fn handle_cmd_data(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        if !session.transfer().is_declared() {
            return Err(CommandError::Transfer(TransferError::NoTransferDeclared));
        }

        let offset = session.state().restart_offset();
        if offset > 0 {
            debug!("Session {}: data command resumes at byte {}", session.id(), offset);
        }

        let line = session.command().wire_line();
        session.control_mut()?.send_line(&line).await?;

        let mut opened = session.transfer().opens_before_reply();
        if opened {
            open_data_relay(session).await;
        }

        loop {
            let reply = session.control_mut()?.read_reply().await?;
            session.relay_reply(&reply).await?;

            if !is_preliminary(reply.code) {
                break;
            }
            if !opened {
                open_data_relay(session).await;
                opened = true;
            }
        }

        session.state_mut().set_restart_offset(0);
        Ok(CommandStatus::Handled)
    }
    .boxed()
}

/// Opens the current transfer and starts its bridge. Failures are logged;
/// the origin reports them to the client through its own reply.
async fn open_data_relay(session: &mut ClientSession) {
    let timeout = session.config().proxy_timeout();
    let tls = if session.state().transfer_tls() {
        session.tls_acceptor()
    } else {
        None
    };

    let id = session.id();
    match session.transfer_mut().open(timeout).await {
        Ok(relay) => relay.start(tls),
        Err(e) => {
            warn!("Session {}: data connection failed: {}", id, e);
            session.transfer_mut().close();
        }
    }
}

/// REST: remembers the restart offset, then relays.
pub fn handle_cmd_rest(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        let param = session.command().param;
        let offset = param
            .trim()
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidParameter(format!("REST {}", param)))?;
        session.state_mut().set_restart_offset(offset);
        Ok(CommandStatus::Forward)
    }
    .boxed()
}

/// RNFR: remembers the rename source, then relays.
pub fn handle_cmd_rnfr(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        let path = session.command().param;
        session.state_mut().set_rename_from(Some(path));
        Ok(CommandStatus::Forward)
    }
    .boxed()
}

/// RNTO: clears the rename source; the origin decides whether the pair is valid.
pub fn handle_cmd_rnto(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        if let Some(from) = session.state().rename_from() {
            info!(
                "Session {}: rename {} -> {}",
                session.id(),
                from,
                session.command().param
            );
        }
        session.state_mut().set_rename_from(None);
        Ok(CommandStatus::Forward)
    }
    .boxed()
}
