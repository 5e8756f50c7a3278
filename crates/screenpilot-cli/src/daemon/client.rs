//! Client for connecting to the daemon process.

use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use screenpilot_core::protocol::{Command, Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::daemon::paths;

/// How long a freshly spawned daemon gets to create its socket.
const STARTUP_GRACE: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Long enough for the slowest gesture: a scroll of the maximum count at the
/// default pacing.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// One connection to the daemon. Requests on it are answered in order.
pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    /// Connect to the daemon for the current instance, spawning it if no
    /// socket answers.
    pub async fn connect() -> Result<Self> {
        let socket_path = paths::get_socket_path(None);
        if let Some(client) = Self::connect_to(&socket_path).await {
            return Ok(client);
        }

        info!("No daemon listening on {:?}, spawning one", socket_path);
        let child = spawn_daemon()?;
        let client = Self::await_socket(socket_path, child).await?;
        Ok(client)
    }

    /// Connect only if a daemon is already listening.
    pub async fn connect_existing() -> Result<Option<Self>> {
        Ok(Self::connect_to(&paths::get_socket_path(None)).await)
    }

    async fn connect_to(socket_path: &Path) -> Option<Self> {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => {
                debug!("Connected to daemon at {:?}", socket_path);
                Some(Self { stream })
            }
            Err(e) => {
                debug!("Connect to {:?} failed: {}", socket_path, e);
                None
            }
        }
    }

    /// Poll for the socket of a daemon we just spawned. Gives up early when
    /// the child has already exited.
    async fn await_socket(socket_path: PathBuf, mut child: Child) -> Result<Self> {
        let started = Instant::now();

        loop {
            if let Ok(Some(status)) = child.try_wait() {
                bail!(
                    "Daemon exited during startup with {} (run 'screenpilot daemon' in the foreground to see why)",
                    status
                );
            }

            if let Ok(stream) = UnixStream::connect(&socket_path).await {
                info!("Daemon ready after {:?}", started.elapsed());
                return Ok(Self { stream });
            }

            if started.elapsed() > STARTUP_GRACE {
                bail!("Daemon did not open {:?} within {:?}", socket_path, STARTUP_GRACE);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Send `command` under a fresh request id.
    pub async fn send(&mut self, command: Command) -> Result<Response> {
        let request = Request {
            id: Uuid::new_v4().to_string(),
            command,
        };
        self.request(request).await
    }

    pub async fn request(&mut self, request: Request) -> Result<Response> {
        self.request_with_timeout(request, REQUEST_TIMEOUT).await
    }

    /// Write one request line and read one response line.
    pub async fn request_with_timeout(
        &mut self,
        request: Request,
        limit: Duration,
    ) -> Result<Response> {
        let mut line = serde_json::to_string(&request).context("Failed to encode request")?;
        debug!("-> {}", line);
        line.push('\n');

        self.stream
            .write_all(line.as_bytes())
            .await
            .context("Failed to send request to daemon")?;
        self.stream.flush().await.context("Failed to flush request")?;

        let mut reply = String::new();
        let read = {
            let mut reader = BufReader::new(&mut self.stream);
            timeout(limit, reader.read_line(&mut reply))
                .await
                .with_context(|| format!("No reply from daemon within {:?}", limit))?
                .context("Failed to read reply from daemon")?
        };
        if read == 0 {
            bail!("Daemon hung up before replying");
        }

        debug!("<- {}", reply.trim_end());
        serde_json::from_str(&reply).context("Daemon sent a malformed reply")
    }
}

/// Spawn `screenpilot daemon` detached from this terminal.
fn spawn_daemon() -> Result<Child> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().context("Cannot locate the screenpilot executable")?;

    // Own process group, so closing the launching terminal does not take the
    // daemon (and any held drag) down with it.
    std::process::Command::new(exe)
        .arg("daemon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .context("Failed to spawn daemon process")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{self, Backend};
    use crate::daemon::DaemonServer;
    use crate::engine::Engine;
    use screenpilot_core::protocol::{Command, ResponseData};
    use screenpilot_core::timing::TimingPolicy;

    #[tokio::test]
    async fn test_client_round_trip_against_running_daemon() {
        let socket_path = std::env::temp_dir().join(format!(
            "screenpilot-client-test-{}.sock",
            uuid::Uuid::new_v4().simple()
        ));
        let pid_path = socket_path.with_extension("pid");

        let engine = Engine::new(
            backend::open(Backend::Record).unwrap(),
            TimingPolicy::instant(),
        );
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), engine)
            .await
            .expect("Failed to bind server");

        let server_handle = tokio::spawn(async move {
            let _ = timeout(Duration::from_secs(2), server.run()).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        // Connect directly; auto-start would target the default socket.
        let mut client = DaemonClient::connect_to(&socket_path)
            .await
            .expect("Failed to connect");

        let response = client
            .request(Request {
                id: "client-test-1".to_string(),
                command: Command::Click { x: 3, y: 4 },
            })
            .await
            .expect("Request failed");
        assert!(response.success);
        assert_eq!(response.id, "client-test-1");
        assert_eq!(
            response.data,
            Some(ResponseData::ok("Clicked ScreenPoint(3, 4)"))
        );

        // The same connection serves further requests.
        let response = client
            .send(Command::ListHandles)
            .await
            .expect("Request failed");
        assert!(response.success);
        assert_eq!(response.data, Some(ResponseData::Handles { handles: vec![] }));

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
        let _ = std::fs::remove_file(&pid_path);
    }
}
