//! Socket and PID file path resolution.
//!
//! Priority for socket directory:
//! 1. `SCREENPILOT_SOCKET_DIR` (explicit override)
//! 2. `XDG_RUNTIME_DIR/screenpilot` (Linux standard)
//! 3. `~/.screenpilot` (home directory fallback)
//! 4. `/tmp/screenpilot` (last resort)
//!
//! Several daemons can run side by side via the `SCREENPILOT_DAEMON` env var
//! (default: "default"). Each one gets its own socket file:
//! `{socket_dir}/{daemon}.sock`

use std::env;
use std::path::PathBuf;

/// Get the current daemon instance name from env or default.
pub fn get_instance() -> String {
    env::var("SCREENPILOT_DAEMON").unwrap_or_else(|_| "default".to_string())
}

/// Get socket directory with priority fallback.
pub fn get_socket_dir() -> PathBuf {
    if let Ok(dir) = env::var("SCREENPILOT_SOCKET_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir).join("screenpilot");
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".screenpilot");
    }

    env::temp_dir().join("screenpilot")
}

/// Validate an instance name to prevent path traversal.
///
/// Names must be non-empty, contain only alphanumerics, hyphens and
/// underscores, and not start with a hyphen. Anything else becomes
/// `"default"`.
pub(crate) fn sanitize_instance_name(name: &str) -> String {
    let is_valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if is_valid {
        name.to_string()
    } else {
        tracing::warn!(
            "Invalid daemon name '{}', using 'default'. Names must contain only alphanumeric, hyphen, underscore.",
            name
        );
        "default".to_string()
    }
}

/// Socket path for a daemon instance (current one if `None`).
pub fn get_socket_path(instance: Option<&str>) -> PathBuf {
    instance_file(instance, "sock")
}

/// PID file path for a daemon instance (current one if `None`).
pub fn get_pid_path(instance: Option<&str>) -> PathBuf {
    instance_file(instance, "pid")
}

fn instance_file(instance: Option<&str>, extension: &str) -> PathBuf {
    let name = match instance {
        Some(name) => sanitize_instance_name(name),
        None => sanitize_instance_name(&get_instance()),
    };
    get_socket_dir().join(name).with_extension(extension)
}

/// Ensure socket directory exists with secure permissions (0700 on Unix).
pub fn ensure_socket_dir() -> std::io::Result<()> {
    let dir = get_socket_dir();
    std::fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}
