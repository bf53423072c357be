//! XDG Base Directory paths for tunnler.
//!
//! CLI tools should use XDG paths for cross-platform consistency,
//! not platform-native paths. This matches tools like gh, docker, kubectl.

use std::path::PathBuf;

/// File name of the stored Cloudflare credentials.
pub const CREDENTIALS_FILE: &str = "credentials.toml";

/// Get the tunnler config directory.
///
/// Returns `$XDG_CONFIG_HOME/tunnler` if set, otherwise `~/.config/tunnler`.
///
/// # Examples
///
/// ```
/// use tunnler_paths::config_dir;
///
/// let config = config_dir();
/// assert!(config.ends_with("tunnler"));
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("tunnler")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/tunnler")
    } else {
        PathBuf::from(".config/tunnler")
    }
}

/// Get the path of the credentials file written by `tunnler init`.
pub fn credentials_path() -> PathBuf {
    config_dir().join(CREDENTIALS_FILE)
}
