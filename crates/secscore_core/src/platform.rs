//! Platform-specific path resolution for cached/bundled data files.

use std::env;
use std::path::PathBuf;

/// Directory SecScore uses for mutable runtime state (the KEV cache file).
///
/// - Linux/other Unix: `$XDG_DATA_HOME/secscore` or `~/.local/share/secscore`
/// - macOS: `~/Library/Application Support/secscore`
/// - Windows: `%APPDATA%\secscore`
///
/// Overridable with `SECSCORE_DATA_DIR` for tests and containerized deploys.
pub fn data_dir() -> PathBuf {
    if let Ok(custom) = env::var("SECSCORE_DATA_DIR") {
        return PathBuf::from(custom);
    }

    let base = match env::consts::OS {
        "windows" => env::var("APPDATA").map(PathBuf::from).unwrap_or_else(|_| {
            let home = env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join("AppData").join("Roaming")
        }),
        "macos" => env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("Library")
            .join("Application Support"),
        _ => env::var("XDG_DATA_HOME").map(PathBuf::from).unwrap_or_else(|_| {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local").join("share")
        }),
    };

    base.join("secscore")
}

/// Path to the persisted compact KEV cache file.
pub fn kev_cache_path() -> PathBuf {
    if let Ok(custom) = env::var("SECSCORE_KEV_CACHE_PATH") {
        return PathBuf::from(custom);
    }
    data_dir().join("kev-cache.json")
}

/// Ensure a directory exists, creating parents as needed.
pub fn ensure_dir_exists(path: &std::path::Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Best-effort resident set size for this process, in bytes.
///
/// Linux-only (`/proc/self/statm`); returns `None` elsewhere or on any read
/// failure. Used only for the `/api/health` report — never load-bearing.
pub fn resident_memory_bytes() -> Option<u64> {
    if env::consts::OS != "linux" {
        return None;
    }

    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = 4096u64;
    Some(pages * page_size)
}

/// Current platform identifier, e.g. "linux", "macos", "windows".
pub fn os() -> &'static str {
    env::consts::OS
}

/// Current platform architecture, e.g. "x86_64", "aarch64".
pub fn arch() -> &'static str {
    env::consts::ARCH
}
