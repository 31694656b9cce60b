use futures::FutureExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time;

use rax_ftp_proxy::client::ClientSession;
use rax_ftp_proxy::protocol::address::parse_port_argument;
use rax_ftp_proxy::protocol::{CommandRegistry, CommandStatus, HandlerFuture};
use rax_ftp_proxy::server::ConnectionCounter;
use rax_ftp_proxy::{ProxyConfig, Server};

const WAIT: Duration = Duration::from_secs(5);

type Script = Arc<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

// Mock origin: greets, records every line it receives and answers from the script.
// Lines are handled as bytes so non-UTF-8 paths survive the round trip.
async fn spawn_origin(script: Script) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let script = Arc::clone(&script);
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let (read_half, mut writer) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                writer.write_all(b"220 origin ready\r\n").await.unwrap();

                let mut line = Vec::new();
                loop {
                    line.clear();
                    match reader.read_until(b'\n', &mut line).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                    let received = line.trim_ascii_end().to_vec();
                    let _ = seen_tx.send(received.clone());
                    for mut reply in script(&received) {
                        reply.extend_from_slice(b"\r\n");
                        if writer.write_all(&reply).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    (addr, seen_rx)
}

fn lines(replies: &[&str]) -> Vec<Vec<u8>> {
    replies.iter().map(|r| r.as_bytes().to_vec()).collect()
}

fn verb_of(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.split_whitespace().next().unwrap_or("").to_ascii_uppercase()
}

fn standard_script() -> Script {
    Arc::new(|line: &[u8]| match verb_of(line).as_str() {
        "USER" => lines(&["331 Password required"]),
        "PASS" => lines(&["230 Logged in"]),
        "PORT" => lines(&["200 PORT ok"]),
        "NOOP" => lines(&["200 NOOP ok"]),
        "FEAT" => lines(&["211-Features:", " UTF8", " MDTM", "211 END"]),
        "HELP" => lines(&[
            "214-The following commands are recognized:",
            " USER PASS LIST",
            "214 Help OK.",
        ]),
        // Echo the path back unchanged, whatever its encoding
        "DELE" => {
            let mut reply = b"250 Deleted ".to_vec();
            reply.extend_from_slice(&line[5..]);
            vec![reply]
        }
        "QUIT" => lines(&["221 Bye from origin"]),
        _ => lines(&["502 Command not implemented"]),
    })
}

async fn start_proxy(
    origin: SocketAddr,
    registry: CommandRegistry,
    tweak: impl FnOnce(&mut ProxyConfig),
) -> (SocketAddr, ConnectionCounter) {
    let mut config = ProxyConfig {
        control_port: 0,
        origin_address: origin.to_string(),
        ..ProxyConfig::default()
    };
    tweak(&mut config);

    let server = Server::with_registry(config, registry).await.unwrap();
    let addr = server.local_addr().unwrap();
    let connections = server.connections();
    tokio::spawn(async move { server.start().await });
    (addr, connections)
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, command: &str) {
        self.send_raw(format!("{}\r\n", command).as_bytes()).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Next reply line as bytes, without its terminator; empty on EOF.
    async fn raw_line(&mut self) -> Vec<u8> {
        let mut line = Vec::new();
        time::timeout(WAIT, self.reader.read_until(b'\n', &mut line))
            .await
            .expect("timed out waiting for the proxy")
            .unwrap();
        line.trim_ascii_end().to_vec()
    }

    async fn line(&mut self) -> String {
        String::from_utf8_lossy(&self.raw_line().await).into_owned()
    }

    async fn command(&mut self, command: &str) -> String {
        self.send(command).await;
        self.line().await
    }
}

async fn wait_for_count(counter: &ConnectionCounter, expected: usize) {
    let deadline = time::Instant::now() + WAIT;
    while counter.current() != expected {
        assert!(time::Instant::now() < deadline, "live count stuck at {}", counter.current());
        time::sleep(Duration::from_millis(20)).await;
    }
}

async fn dead_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_greeting() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    assert_eq!(client.line().await, "220 Welcome to RAX FTP Proxy");
}

#[tokio::test]
async fn test_connection_ceiling() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, connections) = start_proxy(origin, CommandRegistry::standard(), |c| {
        c.max_connections = 1
    })
    .await;

    let mut first = TestClient::connect(proxy).await;
    assert!(first.line().await.starts_with("220"));

    let mut second = TestClient::connect(proxy).await;
    assert_eq!(second.line().await, "421 Cannot accept any additional client");
    assert_eq!(second.line().await, "");

    wait_for_count(&connections, 1).await;
    drop(first);
    wait_for_count(&connections, 0).await;
}

fn explode(session: &mut ClientSession) -> HandlerFuture<'_> {
    async move {
        if session.command().verb == "BOOM" {
            panic!("handler exploded");
        }
        Ok(CommandStatus::Handled)
    }
    .boxed()
}

#[tokio::test]
async fn test_panicking_handler_keeps_session() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let registry = CommandRegistry::standard().with("BOOM", true, explode);
    let (proxy, _) = start_proxy(origin, registry, |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;

    assert_eq!(client.command("BOOM").await, "500 Internal error");
    assert_eq!(client.command("USER alice").await, "331 Password required");
}

#[tokio::test]
async fn test_auth_without_certificate() {
    let (origin, mut seen) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;

    let reply = client.command("AUTH TLS").await;
    assert!(reply.starts_with("550 "), "{}", reply);
    assert!(reply.contains("Cannot get a TLS config"), "{}", reply);
    assert_eq!(client.command("USER alice").await, "331 Password required");
    assert_eq!(seen.recv().await.unwrap(), b"USER alice");
}

#[tokio::test]
async fn test_commands_before_user() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, connections) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;

    assert_eq!(client.command("PWD").await, "530 Please login with USER first");
    assert!(client.command("FEAT").await.starts_with("530"));
    assert!(client.command("PORT 127,0,0,1,4,1").await.starts_with("530"));
    assert_eq!(client.command("QUIT").await, "221 Goodbye");
    assert_eq!(client.line().await, "");
    wait_for_count(&connections, 0).await;
}

#[tokio::test]
async fn test_user_with_origin_down() {
    let origin = dead_origin().await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;

    assert_eq!(
        client.command("USER alice").await,
        "530 Cannot proceed: origin unavailable"
    );
    assert!(client.command("LIST").await.starts_with("425"));
}

#[tokio::test]
async fn test_feat_relayed_until_end() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    client.command("USER alice").await;

    assert_eq!(client.command("FEAT").await, "211-Features:");
    assert_eq!(client.line().await, " UTF8");
    assert_eq!(client.line().await, " MDTM");
    assert_eq!(client.line().await, "211 END");

    assert_eq!(client.command("PASS secret").await, "230 Logged in");
}

#[tokio::test]
async fn test_feat_stops_on_error_reply() {
    let script: Script = Arc::new(|line: &[u8]| {
        let reply = if line.starts_with(b"USER") {
            "331 Password required"
        } else if line.starts_with(b"FEAT") {
            "530 Not logged in"
        } else {
            "200 OK"
        };
        lines(&[reply])
    });
    let (origin, _) = spawn_origin(script).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    client.command("USER alice").await;

    assert_eq!(client.command("FEAT").await, "530 Not logged in");
    assert_eq!(client.command("NOOP").await, "200 OK");
}

#[tokio::test]
async fn test_port_translated_for_origin() {
    let (origin, mut seen) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    client.command("USER alice").await;
    assert_eq!(seen.recv().await.unwrap(), b"USER alice");

    assert_eq!(
        client.command("PORT 192,168,1,5,200,25").await,
        "200 PORT command successful"
    );

    let forwarded = String::from_utf8(seen.recv().await.unwrap()).unwrap();
    assert!(forwarded.starts_with("PORT 127,0,0,1,"), "{}", forwarded);
    let listener = parse_port_argument(forwarded.trim_start_matches("PORT ")).unwrap();
    assert_ne!(listener.port(), 51225);
}

#[tokio::test]
async fn test_bad_port_syntax() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    client.command("USER alice").await;

    let reply = client.command("PORT 1,2,3").await;
    assert!(reply.starts_with("500 Bad PORT syntax"), "{}", reply);
    let reply = client.command("PORT 1,2,3,4,5,256").await;
    assert!(reply.starts_with("500"), "{}", reply);
}

#[tokio::test]
async fn test_list_without_transfer() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    client.command("USER alice").await;

    assert_eq!(
        client.command("LIST").await,
        "425 Transfer error: No data connection declared"
    );
}

#[tokio::test]
async fn test_idle_timeout() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, connections) = start_proxy(origin, CommandRegistry::standard(), |c| {
        c.idle_timeout_secs = 1
    })
    .await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;

    assert_eq!(
        client.line().await,
        "421 Command timeout (1 seconds): closing control connection"
    );
    assert_eq!(client.line().await, "");
    wait_for_count(&connections, 0).await;
}

#[tokio::test]
async fn test_multiline_reply_passthrough() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, connections) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    client.command("USER alice").await;

    assert_eq!(
        client.command("HELP").await,
        "214-The following commands are recognized:"
    );
    assert_eq!(client.line().await, " USER PASS LIST");
    assert_eq!(client.line().await, "214 Help OK.");

    assert_eq!(client.command("QUIT").await, "221 Bye from origin");
    assert_eq!(client.line().await, "");
    wait_for_count(&connections, 0).await;
}

#[tokio::test]
async fn test_command_too_long() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |c| {
        c.max_command_length = 32
    })
    .await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;

    let long = format!("USER {}", "x".repeat(64));
    assert_eq!(client.command(&long).await, "500 Command too long");
    assert_eq!(client.command("").await, "500 Empty command");
}

#[tokio::test]
async fn test_unterminated_flood_is_discarded() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, connections) = start_proxy(origin, CommandRegistry::standard(), |c| {
        c.max_command_length = 32
    })
    .await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;

    client.send_raw(&vec![b'x'; 1024 * 1024]).await;
    assert_eq!(client.line().await, "500 Command too long");

    // The tail of the flood is dropped, not parsed as commands
    client.send_raw(b"\r\nPWD\r\n").await;
    assert_eq!(client.line().await, "530 Please login with USER first");
    assert_eq!(connections.current(), 1);
}

#[tokio::test]
async fn test_non_utf8_command_keeps_session() {
    let (origin, mut seen) = spawn_origin(standard_script()).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    assert_eq!(client.command("USER alice").await, "331 Password required");
    assert_eq!(seen.recv().await.unwrap(), b"USER alice");

    client.send_raw(b"RETR caf\xe9.txt\r\n").await;
    assert_eq!(
        client.line().await,
        "425 Transfer error: No data connection declared"
    );
    assert_eq!(client.command("NOOP").await, "200 NOOP ok");
    assert_eq!(seen.recv().await.unwrap(), b"NOOP");

    // Latin-1 path reaches the origin and comes back byte for byte
    client.send_raw(b"DELE caf\xe9.txt\r\n").await;
    assert_eq!(client.raw_line().await, b"250 Deleted caf\xe9.txt");
    assert_eq!(seen.recv().await.unwrap(), b"DELE caf\xe9.txt");
}

#[tokio::test]
async fn test_client_reset_releases_slot() {
    let (origin, _) = spawn_origin(standard_script()).await;
    let (proxy, connections) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let stream = TcpStream::connect(proxy).await.unwrap();
    // Zero linger turns the close into an RST
    #[allow(deprecated)]
    stream.set_linger(Some(Duration::ZERO)).unwrap();
    let mut client = BufReader::new(stream);
    let mut greeting = Vec::new();
    time::timeout(WAIT, client.read_until(b'\n', &mut greeting))
        .await
        .unwrap()
        .unwrap();
    assert!(greeting.starts_with(b"220"));

    wait_for_count(&connections, 1).await;
    drop(client);
    wait_for_count(&connections, 0).await;
}

// Origin that serves one LIST over an active data connection
async fn spawn_listing_origin(listing: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        writer.write_all(b"220 origin ready\r\n").await.unwrap();

        let mut data_addr = None;
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await.unwrap_or(0) == 0 {
                return;
            }
            let received = String::from_utf8_lossy(line.trim_ascii_end()).into_owned();
            if received.starts_with("USER") {
                writer.write_all(b"331 Password required\r\n").await.unwrap();
            } else if let Some(param) = received.strip_prefix("PORT ") {
                data_addr = Some(parse_port_argument(param).unwrap());
                writer.write_all(b"200 PORT ok\r\n").await.unwrap();
            } else if received.starts_with("LIST") {
                writer
                    .write_all(b"150 Opening ASCII mode data connection\r\n")
                    .await
                    .unwrap();
                let target = data_addr.take().unwrap();
                let mut data = TcpStream::connect(target).await.unwrap();
                data.write_all(listing.as_bytes()).await.unwrap();
                drop(data);
                writer.write_all(b"226 Transfer complete\r\n").await.unwrap();
            } else {
                writer.write_all(b"200 OK\r\n").await.unwrap();
            }
        }
    });

    addr
}

#[tokio::test]
async fn test_active_list_end_to_end() {
    let listing = "-rw-r--r-- 1 ftp ftp 12 report.txt\r\n-rw-r--r-- 1 ftp ftp 7 notes.md\r\n";
    let origin = spawn_listing_origin(listing).await;
    let (proxy, _) = start_proxy(origin, CommandRegistry::standard(), |_| {}).await;

    let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = data_listener.local_addr().unwrap().port();

    let mut client = TestClient::connect(proxy).await;
    client.line().await;
    assert_eq!(client.command("USER alice").await, "331 Password required");

    let port_command = format!("PORT 127,0,0,1,{},{}", port / 256, port % 256);
    assert_eq!(
        client.command(&port_command).await,
        "200 PORT command successful"
    );

    assert_eq!(
        client.command("LIST").await,
        "150 Opening ASCII mode data connection"
    );

    let (mut data, _) = time::timeout(WAIT, data_listener.accept())
        .await
        .unwrap()
        .unwrap();
    let mut received = String::new();
    time::timeout(WAIT, data.read_to_string(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, listing);

    assert_eq!(client.line().await, "226 Transfer complete");
}
