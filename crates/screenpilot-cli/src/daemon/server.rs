//! Unix socket server for the daemon process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use screenpilot_core::error::ApiError;
use screenpilot_core::protocol::{Command, Request, Response, ResponseData};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::daemon::paths;
use crate::engine::Engine;

/// Maximum number of concurrent client connections.
const MAX_CONNECTIONS: usize = 100;

/// How long the daemon waits with no handles and no clients before exiting.
const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for in-flight connections to complete during shutdown.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum request line size in bytes.
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Gestures run on blocking threads; the mutex keeps them from interleaving.
type SharedEngine = Arc<Mutex<Engine>>;

/// The daemon server that listens for client connections.
pub struct DaemonServer {
    listener: UnixListener,
    socket_path: PathBuf,
    pid_path: PathBuf,
    engine: SharedEngine,
    connection_semaphore: Arc<Semaphore>,
    /// Shutdown signal for graceful termination (lets Drop clean up files).
    shutdown: Arc<Notify>,
}

impl DaemonServer {
    /// Create a new daemon server bound to the default socket path.
    pub async fn bind(engine: Engine) -> Result<Self> {
        let socket_path = paths::get_socket_path(None);
        let pid_path = paths::get_pid_path(None);
        paths::ensure_socket_dir().context("Failed to create socket directory")?;
        Self::bind_to(socket_path, pid_path, engine).await
    }

    /// Create a new daemon server bound to a specific socket path.
    ///
    /// Binds first and only then inspects a conflicting socket:
    /// 1. Try to bind directly
    /// 2. If the socket is in use, check the PID file to see if a daemon is alive
    /// 3. If it is dead, remove the stale socket and retry
    /// 4. If it is alive, return an error
    pub async fn bind_to(socket_path: PathBuf, pid_path: PathBuf, engine: Engine) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create socket directory for {:?}", socket_path)
            })?;
        }

        // The PID file is written right after a successful bind so a second
        // daemon never sees our socket without a live PID next to it.
        let write_pid = |pid_path: &PathBuf| -> Result<()> {
            std::fs::write(pid_path, std::process::id().to_string())
                .with_context(|| format!("Failed to write PID file: {:?}", pid_path))
        };

        let listener = match UnixListener::bind(&socket_path) {
            Ok(l) => {
                write_pid(&pid_path)?;
                l
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                if is_daemon_alive(&pid_path) {
                    anyhow::bail!(
                        "Daemon already running (socket {:?} in use, PID file valid)",
                        socket_path
                    );
                }

                // Never follow symlinks when removing the stale socket.
                let metadata = std::fs::symlink_metadata(&socket_path)
                    .with_context(|| format!("Failed to stat socket path: {:?}", socket_path))?;

                if metadata.file_type().is_symlink() {
                    anyhow::bail!(
                        "Socket path {:?} is a symlink, refusing to delete for safety",
                        socket_path
                    );
                }

                #[cfg(unix)]
                {
                    use std::os::unix::fs::FileTypeExt;
                    if !metadata.file_type().is_socket() {
                        anyhow::bail!(
                            "Path {:?} exists but is not a socket file (type: {:?})",
                            socket_path,
                            metadata.file_type()
                        );
                    }
                }

                info!("Removing stale socket from dead daemon");
                std::fs::remove_file(&socket_path)
                    .with_context(|| format!("Failed to remove stale socket: {:?}", socket_path))?;

                let l = UnixListener::bind(&socket_path)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path))?;
                write_pid(&pid_path)?;
                l
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path));
            }
        };

        info!("Daemon listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
            pid_path,
            engine: Arc::new(Mutex::new(engine)),
            connection_semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Run the server, accepting connections and handling requests.
    ///
    /// Returns once shutdown is signaled, after in-flight connections finish
    /// or the graceful timeout expires.
    pub async fn run(&self) -> Result<()> {
        self.spawn_idle_shutdown_task();

        let mut connection_tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        "Connection limit ({}) reached, rejecting new connection",
                                        MAX_CONNECTIONS
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };

                            debug!("Accepted new connection");
                            let engine = self.engine.clone();
                            let shutdown = self.shutdown.clone();
                            connection_tasks.spawn(async move {
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, engine, shutdown).await {
                                    error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(_) = connection_tasks.join_next(), if !connection_tasks.is_empty() => {}
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received, waiting for in-flight connections");
                    break;
                }
            }
        }

        if !connection_tasks.is_empty() {
            info!(
                "Waiting for {} in-flight connection(s) to complete",
                connection_tasks.len()
            );

            let drained = tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, async {
                while connection_tasks.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                warn!(
                    "Graceful shutdown timed out after {:?}, aborting {} connection(s)",
                    GRACEFUL_SHUTDOWN_TIMEOUT,
                    connection_tasks.len()
                );
                connection_tasks.abort_all();
            }
        }

        Ok(())
    }

    /// Exit after [`IDLE_TIMEOUT`] with no open handles and no clients.
    fn spawn_idle_shutdown_task(&self) {
        let engine = self.engine.clone();
        let shutdown = self.shutdown.clone();
        let semaphore = self.connection_semaphore.clone();

        tokio::spawn(async move {
            let mut idle_since: Option<Instant> = None;

            loop {
                tokio::time::sleep(IDLE_CHECK_INTERVAL).await;

                let busy = has_handles(&engine)
                    || semaphore.available_permits() < MAX_CONNECTIONS;

                if busy {
                    if idle_since.is_some() {
                        debug!("Activity detected, resetting idle timer");
                    }
                    idle_since = None;
                    continue;
                }

                let idle_start = *idle_since.get_or_insert_with(Instant::now);

                if idle_start.elapsed() >= IDLE_TIMEOUT {
                    info!(
                        "No activity for {} seconds, shutting down",
                        IDLE_TIMEOUT.as_secs()
                    );
                    shutdown.notify_waiters();
                    break;
                }

                debug!(
                    "Idle for {} seconds (shutdown in {} seconds)",
                    idle_start.elapsed().as_secs(),
                    IDLE_TIMEOUT.saturating_sub(idle_start.elapsed()).as_secs()
                );
            }
        });
    }
}

/// A locked engine is mid-gesture, which counts as activity.
fn has_handles(engine: &Mutex<Engine>) -> bool {
    match engine.try_lock() {
        Ok(engine) => !engine.handles().is_empty(),
        Err(_) => true,
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        if self.socket_path.exists() && std::fs::remove_file(&self.socket_path).is_err() {
            warn!("Failed to remove socket on shutdown");
        }
        if self.pid_path.exists() && std::fs::remove_file(&self.pid_path).is_err() {
            warn!("Failed to remove PID file on shutdown");
        }
    }
}

/// Check if a daemon process is still alive by reading its PID file.
fn is_daemon_alive(pid_path: &Path) -> bool {
    let pid_str = match std::fs::read_to_string(pid_path) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let pid: i32 = match pid_str.trim().parse() {
        Ok(p) => p,
        Err(_) => return false,
    };

    // SAFETY: kill with signal 0 delivers nothing; it only checks that the
    // process exists and may be signaled.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Read a line with a maximum size limit.
///
/// Returns the number of bytes read (0 means EOF), or an error if the line
/// exceeds `max_size` before a newline is found.
async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut String,
    max_size: usize,
) -> Result<usize> {
    use tokio::io::AsyncBufReadExt;

    let mut total = 0;
    let mut bytes = Vec::new();

    loop {
        let available = reader
            .fill_buf()
            .await
            .context("Failed to read from client")?;

        if available.is_empty() {
            if !bytes.is_empty() {
                let line = std::str::from_utf8(&bytes).context("Invalid UTF-8 in request")?;
                buf.push_str(line);
            }
            return Ok(total);
        }

        let newline_pos = available.iter().position(|&b| b == b'\n');
        let bytes_to_consume = newline_pos.map(|p| p + 1).unwrap_or(available.len());

        if total + bytes_to_consume > max_size {
            anyhow::bail!("Request too large: exceeded {} byte limit", max_size);
        }

        // UTF-8 is validated once the whole line is in, so multi-byte
        // characters split across reads are fine.
        bytes.extend_from_slice(&available[..bytes_to_consume]);
        total += bytes_to_consume;

        reader.consume(bytes_to_consume);

        if newline_pos.is_some() {
            break;
        }
    }

    let line = std::str::from_utf8(&bytes).context("Invalid UTF-8 in request")?;
    buf.push_str(line);
    Ok(total)
}

/// Handle a single client connection.
async fn handle_connection(
    stream: UnixStream,
    engine: SharedEngine,
    shutdown: Arc<Notify>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();

        let bytes_read = read_line_bounded(&mut reader, &mut line, MAX_REQUEST_SIZE).await?;

        if bytes_read == 0 {
            debug!("Client disconnected");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received: {} bytes", trimmed.len());

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => handle_request(request, engine.clone(), shutdown.clone()).await,
            Err(e) => Response::error(
                "unknown",
                ApiError::unsupported_usage_with_suggestion(
                    format!("Invalid JSON request: {}", e),
                    "Send one JSON object per line with 'id' and 'command' fields. Example: {\"id\":\"1\",\"command\":{\"action\":\"list_handles\"}}",
                ),
            ),
        };

        let response_json =
            serde_json::to_string(&response).context("Failed to serialize response")?;
        debug!("Sending: {}", response_json);

        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline")?;
        writer.flush().await.context("Failed to flush")?;
    }

    Ok(())
}

/// Handle a single request and return a response.
async fn handle_request(request: Request, engine: SharedEngine, shutdown: Arc<Notify>) -> Response {
    debug!("Handling command: {:?}", request.command);

    if let Command::Shutdown = request.command {
        return handle_shutdown(&request.id, engine, shutdown);
    }

    match execute(engine, request.command).await {
        Ok(data) => Response::success(request.id, data),
        Err(e) => Response::error(request.id, e),
    }
}

/// Run a command on a blocking thread; gestures sleep between events.
async fn execute(engine: SharedEngine, command: Command) -> Result<ResponseData, ApiError> {
    let joined = tokio::task::spawn_blocking(move || {
        let mut engine = engine
            .lock()
            .map_err(|_| ApiError::internal("Gesture engine lock poisoned"))?;
        engine.execute(command)
    })
    .await;

    joined.unwrap_or_else(|e| Err(ApiError::internal(format!("Gesture task failed: {}", e))))
}

fn handle_shutdown(request_id: &str, engine: SharedEngine, shutdown: Arc<Notify>) -> Response {
    info!("Received shutdown command, stopping daemon");

    tokio::spawn(async move {
        // Releases any button still held by an open drag.
        if let Err(e) = execute(engine, Command::Shutdown).await {
            warn!("Failed to close handles during shutdown: {}", e);
        }

        // Let the response flush before the server loop exits.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_waiters();
    });

    Response::success(request_id, ResponseData::ok("Daemon shutting down"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{self, Backend};
    use screenpilot_core::error::ErrorCode;
    use screenpilot_core::gesture::{ButtonState, Destination, ScrollDirection};
    use screenpilot_core::port::Button;
    use screenpilot_core::timing::TimingPolicy;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::time::timeout;
    use uuid::Uuid;

    fn record_engine() -> Engine {
        Engine::new(
            backend::open(Backend::Record).unwrap(),
            TimingPolicy::instant(),
        )
    }

    fn temp_socket(tag: &str) -> (PathBuf, PathBuf) {
        let short_id = Uuid::new_v4().simple().to_string();
        let socket_path = PathBuf::from("/tmp")
            .join(format!("screenpilot-{}-{}.sock", tag, &short_id[..8]));
        let pid_path = socket_path.with_extension("pid");
        (socket_path, pid_path)
    }

    async fn start_server(tag: &str) -> (PathBuf, PathBuf, tokio::task::JoinHandle<()>) {
        let (socket_path, pid_path) = temp_socket(tag);
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), record_engine())
            .await
            .expect("Failed to bind server");

        let handle = tokio::spawn(async move {
            let _ = timeout(Duration::from_secs(5), server.run()).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        (socket_path, pid_path, handle)
    }

    struct TestClient {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(socket_path: &Path) -> Self {
            let stream = UnixStream::connect(socket_path)
                .await
                .expect("Failed to connect");
            let (reader, writer) = stream.into_split();
            Self {
                reader: BufReader::new(reader),
                writer,
            }
        }

        async fn send_line(&mut self, line: &str) -> Response {
            self.writer.write_all(line.as_bytes()).await.expect("write");
            self.writer.write_all(b"\n").await.expect("newline");
            self.writer.flush().await.expect("flush");

            let mut response_line = String::new();
            timeout(
                Duration::from_secs(2),
                self.reader.read_line(&mut response_line),
            )
            .await
            .expect("timeout")
            .expect("read");
            serde_json::from_str(&response_line).expect("parse response")
        }

        async fn send(&mut self, id: &str, command: Command) -> Response {
            let request = Request {
                id: id.to_string(),
                command,
            };
            let line = serde_json::to_string(&request).unwrap();
            self.send_line(&line).await
        }
    }

    fn cleanup(socket_path: &Path, pid_path: &Path) {
        let _ = std::fs::remove_file(socket_path);
        let _ = std::fs::remove_file(pid_path);
    }

    #[tokio::test]
    async fn test_daemon_accepts_and_responds() {
        let (socket_path, pid_path, server) = start_server("accept").await;
        let mut client = TestClient::connect(&socket_path).await;

        let response = client.send("test-1", Command::ListHandles).await;
        assert!(response.success);
        assert_eq!(response.id, "test-1");
        assert_eq!(
            response.data,
            Some(ResponseData::Handles { handles: vec![] })
        );

        server.abort();
        cleanup(&socket_path, &pid_path);
    }

    #[tokio::test]
    async fn test_read_line_bounded_handles_utf8_chunks() {
        let data = "click 点击\n".as_bytes().to_vec();
        let cursor = std::io::Cursor::new(data);
        let mut reader = BufReader::with_capacity(1, cursor);
        let mut buf = String::new();

        let bytes = read_line_bounded(&mut reader, &mut buf, 1024)
            .await
            .expect("read line");

        assert!(bytes > 0);
        assert_eq!(buf, "click 点击\n");
    }

    #[tokio::test]
    async fn test_read_line_bounded_rejects_oversized() {
        let data = vec![b'a'; 64];
        let mut reader = BufReader::new(std::io::Cursor::new(data));
        let mut buf = String::new();

        let err = read_line_bounded(&mut reader, &mut buf, 16)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_bind_to_creates_socket_parent_dir() {
        let short_id = Uuid::new_v4().simple().to_string();
        let base_dir =
            PathBuf::from("/tmp").join(format!("screenpilot-custom-{}", &short_id[..8]));
        let socket_dir = base_dir.join("nested");
        let socket_path = socket_dir.join("screenpilot.sock");
        let pid_path = socket_path.with_extension("pid");

        let server = DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), record_engine())
            .await
            .expect("Failed to bind server");

        assert!(socket_dir.exists());
        assert!(pid_path.exists());

        drop(server);
        assert!(!socket_path.exists());
        let _ = std::fs::remove_dir_all(&base_dir);
    }

    #[tokio::test]
    async fn test_invalid_json_is_unsupported_usage() {
        let (socket_path, pid_path, server) = start_server("badjson").await;
        let mut client = TestClient::connect(&socket_path).await;

        let response = client.send_line("{not json").await;
        assert!(!response.success);
        assert_eq!(response.id, "unknown");
        assert_eq!(
            response.error.expect("error").code,
            ErrorCode::UnsupportedUsage
        );

        server.abort();
        cleanup(&socket_path, &pid_path);
    }

    #[tokio::test]
    async fn test_scroll_rejects_large_count() {
        let (socket_path, pid_path, server) = start_server("scroll").await;
        let mut client = TestClient::connect(&socket_path).await;

        let response = client
            .send(
                "scroll-1",
                Command::Scroll {
                    x: 0,
                    y: 0,
                    direction: ScrollDirection::Backward,
                    count: crate::engine::MAX_SCROLL_COUNT + 1,
                    click: true,
                    modifiers: None,
                },
            )
            .await;
        assert!(!response.success);
        assert_eq!(
            response.error.expect("error").code,
            ErrorCode::InvalidArgument
        );

        server.abort();
        cleanup(&socket_path, &pid_path);
    }

    #[tokio::test]
    async fn test_drag_across_requests() {
        let (socket_path, pid_path, server) = start_server("drag").await;
        let mut client = TestClient::connect(&socket_path).await;

        let opened = client
            .send(
                "open",
                Command::OpenHandle {
                    x: 0,
                    y: 0,
                    label: None,
                    name: Some("slider".into()),
                },
            )
            .await;
        assert!(opened.success);

        let dragged = client
            .send(
                "drag",
                Command::DragTo {
                    destination: Destination::Point { x: 10, y: 0 },
                    handle: Some("slider".into()),
                },
            )
            .await;
        match dragged.data {
            Some(ResponseData::Handle { handle }) => {
                assert_eq!(handle.state, ButtonState::Held(Button::Left));
                assert_eq!(handle.point.xy(), (10, 0));
            }
            other => panic!("Expected handle data, got {:?}", other),
        }

        // A second connection sees the same handle.
        let mut other = TestClient::connect(&socket_path).await;
        let dropped = other.send("drop", Command::Drop { handle: None }).await;
        assert!(dropped.success);

        let again = other.send("drop-2", Command::Drop { handle: None }).await;
        assert_eq!(again.error.expect("error").code, ErrorCode::InvalidState);

        server.abort();
        cleanup(&socket_path, &pid_path);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_session_not_found() {
        let (socket_path, pid_path, server) = start_server("nohandle").await;
        let mut client = TestClient::connect(&socket_path).await;

        let response = client
            .send(
                "drop",
                Command::Drop {
                    handle: Some("ghost".into()),
                },
            )
            .await;
        assert_eq!(
            response.error.expect("error").code,
            ErrorCode::SessionNotFound
        );

        server.abort();
        cleanup(&socket_path, &pid_path);
    }

    #[tokio::test]
    async fn test_shutdown_stops_server() {
        let (socket_path, pid_path) = temp_socket("shutdown");
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), record_engine())
            .await
            .expect("Failed to bind server");

        let run = tokio::spawn(async move {
            server.run().await.expect("run");
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = TestClient::connect(&socket_path).await;
        let response = client.send("bye", Command::Shutdown).await;
        assert!(response.success);
        drop(client);

        timeout(Duration::from_secs(5), run)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert!(!socket_path.exists());
        assert!(!pid_path.exists());
    }
}
