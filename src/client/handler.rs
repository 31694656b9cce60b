use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::time;

use crate::client::ClientSession;
use crate::error::{CommandError, error_reply, handle_error, is_terminal};
use crate::protocol::parser::{LineRead, read_bounded_line, skip_line};
use crate::protocol::responses::{READY, SERVICE_UNAVAILABLE, SYNTAX_ERROR, format_response};
use crate::protocol::{CommandLine, CommandStatus, parse_line};

impl ClientSession {
    /// Drives the session until the client leaves, times out or the
    /// connection fails.
    ///
    /// - Declines the client up front when the connection ceiling is exceeded.
    /// - Reads one line at a time, dispatching through the command registry.
    /// - Relays every command not fully answered by a handler to the origin.
    pub async fn run(mut self) {
        info!("Session {} started for {}", self.id, self.peer_addr);

        if self.welcome().await {
            while let Some(line) = self.read_command().await {
                match self.dispatch(line).await {
                    Ok(true) => {}
                    Ok(false) => {
                        info!("Session {}: client {} requested to quit", self.id, self.peer_addr);
                        break;
                    }
                    Err(e) => {
                        error!("Session {}: {}", self.id, e);
                        break;
                    }
                }
            }
        }

        self.teardown().await;
    }

    async fn welcome(&mut self) -> bool {
        let live = self.guard.count_at_accept();
        let max = self.context.config.max_connections;

        if live > max {
            warn!(
                "Session {}: too many clients ({} > {}), declining {}",
                self.id, live, max, self.peer_addr
            );
            let _ = self
                .reply(SERVICE_UNAVAILABLE, "Cannot accept any additional client")
                .await;
            return false;
        }

        match self.reply(READY, "Welcome to RAX FTP Proxy").await {
            Ok(()) => true,
            Err(e) => {
                error!("Session {}: failed to send greeting: {}", self.id, e);
                false
            }
        }
    }

    /// Reads the next command line, at most `max_command_length` bytes of
    /// it. `None` ends the session.
    async fn read_command(&mut self) -> Option<LineRead> {
        let read = read_bounded_line(&mut self.conn, self.context.config.max_command_length);

        let result = match self.context.config.idle_timeout() {
            Some(limit) => match time::timeout(limit, read).await {
                Ok(result) => result,
                Err(_) => {
                    self.idle_timeout(limit.as_secs()).await;
                    return None;
                }
            },
            None => read.await,
        };

        match result {
            Ok(LineRead::Closed) => {
                debug!("Session {}: TCP disconnect from {}", self.id, self.peer_addr);
                None
            }
            Ok(incoming) => Some(incoming),
            Err(e) => {
                error!("Session {}: failed to read from {}: {}", self.id, self.peer_addr, e);
                None
            }
        }
    }

    /// Drops the remainder of an over-long line. `false` ends the session.
    async fn discard_line(&mut self) -> bool {
        let skip = skip_line(&mut self.conn);

        let result = match self.context.config.idle_timeout() {
            Some(limit) => match time::timeout(limit, skip).await {
                Ok(result) => result,
                Err(_) => {
                    self.idle_timeout(limit.as_secs()).await;
                    return false;
                }
            },
            None => skip.await,
        };

        match result {
            Ok(found) => found,
            Err(e) => {
                error!("Session {}: failed to read from {}: {}", self.id, self.peer_addr, e);
                false
            }
        }
    }

    async fn idle_timeout(&mut self, secs: u64) {
        info!("Session {}: IDLE timeout for {}", self.id, self.peer_addr);
        let message = format_response(
            SERVICE_UNAVAILABLE,
            &format!("Command timeout ({} seconds): closing control connection", secs),
        );
        if let Err(e) = self.write_raw(message.as_bytes()).await {
            error!("Session {}: network flush error: {}", self.id, e);
        }
        if let Err(e) = self.conn.get_mut().shutdown().await {
            error!("Session {}: network close error: {}", self.id, e);
        }
    }

    /// Handles one line. `Ok(false)` asks the loop to stop; `Err` is a
    /// transport failure on the client socket.
    async fn dispatch(&mut self, incoming: LineRead) -> Result<bool, CommandError> {
        let raw = match incoming {
            LineRead::Line(raw) => raw,
            LineRead::TooLong { terminated } => {
                self.fail(CommandError::Syntax("Command too long".into())).await?;
                return Ok(terminated || self.discard_line().await);
            }
            LineRead::Closed => return Ok(false),
        };

        let command = parse_line(&raw);
        if command.verb.is_empty() {
            return self.fail(CommandError::Syntax("Empty command".into())).await;
        }

        debug!("Session {} received: {}", self.id, command.log_line());
        self.state.set_line(command.clone());

        let context = Arc::clone(&self.context);
        let status = match context.registry.get(&command.verb) {
            Some(spec) => {
                let handler = spec.handler;
                match AssertUnwindSafe(handler(self)).catch_unwind().await {
                    Ok(Ok(status)) => status,
                    Ok(Err(e)) => return self.fail(e).await,
                    Err(panic) => {
                        error!(
                            "Session {}: handler for {} panicked: {}",
                            self.id,
                            command.verb,
                            panic_message(panic.as_ref())
                        );
                        self.reply(SYNTAX_ERROR, "Internal error").await?;
                        return Ok(true);
                    }
                }
            }
            None => CommandStatus::Forward,
        };

        match status {
            CommandStatus::Forward => match self.forward(&command).await {
                Ok(()) => Ok(true),
                Err(e) => self.fail(e).await,
            },
            CommandStatus::Handled => Ok(true),
            CommandStatus::CloseConnection => Ok(false),
        }
    }

    /// Relays the raw line to the origin and its reply back to the client.
    async fn forward(&mut self, command: &CommandLine) -> Result<(), CommandError> {
        let reply = self.control_mut()?.exchange(&command.wire_line()).await?;
        self.relay_reply(&reply).await
    }

    /// Answers a failed command. Only client transport errors escape.
    async fn fail(&mut self, err: CommandError) -> Result<bool, CommandError> {
        if is_terminal(&err) {
            return Err(err);
        }

        handle_error(&err);
        if matches!(err, CommandError::Relay(_)) {
            self.drop_control();
        }
        self.write_raw(error_reply(&err).as_bytes()).await?;
        Ok(true)
    }

    async fn teardown(&mut self) {
        self.transfer.close();
        self.control = None;
        let _ = self.conn.get_mut().shutdown().await;

        let lifetime = self.connected_at.elapsed().unwrap_or_default();
        info!(
            "Session {}: client {} disconnected after {:.1}s",
            self.id,
            self.peer_addr,
            lifetime.as_secs_f64()
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
