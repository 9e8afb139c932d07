//! Host platform identification
//!
//! Descriptors may carry a `Platform` regex; it is matched against
//! [`platform_name`] to gate plugins to the operating systems they support.

use std::env::consts;

/// The broad operating system family the host runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    /// Windows
    Windows,
    /// Linux
    Linux,
    /// macOS
    MacOs,
    /// A Unix that is neither Linux nor macOS
    OtherUnix,
    /// Anything else
    Other,
}

/// The host's operating system family, decided at compile time.
pub const fn host_os_type() -> OsType {
    if cfg!(target_os = "windows") {
        OsType::Windows
    } else if cfg!(target_os = "linux") {
        OsType::Linux
    } else if cfg!(target_os = "macos") {
        OsType::MacOs
    } else if cfg!(unix) {
        OsType::OtherUnix
    } else {
        OsType::Other
    }
}

/// Whether the host is Windows.
pub const fn is_windows_host() -> bool {
    matches!(host_os_type(), OsType::Windows)
}

/// Whether the host is Linux.
pub const fn is_linux_host() -> bool {
    matches!(host_os_type(), OsType::Linux)
}

/// Whether the host is macOS.
pub const fn is_mac_host() -> bool {
    matches!(host_os_type(), OsType::MacOs)
}

/// Whether the host is any Unix.
pub const fn is_unix_host() -> bool {
    matches!(
        host_os_type(),
        OsType::Linux | OsType::MacOs | OsType::OtherUnix
    )
}

/// Human-readable platform string of the form `"<OS name> (<os> <arch>)"`,
/// e.g. `"Linux (linux x86_64)"`. This is the string descriptor platform
/// patterns are matched against.
pub fn platform_name() -> String {
    let os_name = match host_os_type() {
        OsType::Windows => "Windows",
        OsType::Linux => "Linux",
        OsType::MacOs => "macOS",
        OsType::OtherUnix => "Unix",
        OsType::Other => "Unknown",
    };
    format!("{} ({} {})", os_name, consts::OS, consts::ARCH)
}
