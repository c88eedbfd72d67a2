//! Domain types for planetsync.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem
//! paths. [`IpSet`] is the only way IP text enters the system — free-form
//! input is parsed, validated, and deduplicated at the boundary.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::PlatformNotSupported;

// ---------------------------------------------------------------------------
// IpSet
// ---------------------------------------------------------------------------

/// A deduplicated, order-irrelevant set of dotted-quad IPv4 address strings.
///
/// Built via [`IpSet::parse`]: candidate tokens are runs of digits and dots;
/// a token is kept only if it is exactly four groups of one to three digits
/// with every octet in `0..=255`. Malformed tokens are dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IpSet(BTreeSet<String>);

impl IpSet {
    /// Extract every valid dotted-quad address from free-form text.
    pub fn parse(text: &str) -> Self {
        let mut ips = BTreeSet::new();
        for token in text.split(|c: char| !c.is_ascii_digit() && c != '.') {
            let candidate = token.trim_matches('.');
            if is_dotted_quad(candidate) {
                ips.insert(candidate.to_string());
            }
        }
        Self(ips)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.0.contains(ip)
    }

    /// Addresses present in `self` but not in `other`, in sorted order.
    pub fn difference(&self, other: &IpSet) -> Vec<String> {
        self.0.difference(&other.0).cloned().collect()
    }

    /// Sorted iterator over the addresses.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for IpSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for IpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for ip in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{ip}")?;
            first = false;
        }
        Ok(())
    }
}

fn is_dotted_quad(token: &str) -> bool {
    let mut groups = 0;
    for group in token.split('.') {
        groups += 1;
        if groups > 4 || group.is_empty() || group.len() > 3 {
            return false;
        }
        if !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match group.parse::<u16>() {
            Ok(octet) if octet <= 255 => {}
            _ => return false,
        }
    }
    groups == 4
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Target platform the mesh client is installed on, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
}

impl Platform {
    /// Resolve the platform for the current OS.
    pub fn current() -> Result<Platform, PlatformNotSupported> {
        if cfg!(target_os = "macos") {
            Ok(Platform::MacOs)
        } else if cfg!(target_os = "windows") {
            Ok(Platform::Windows)
        } else {
            Err(PlatformNotSupported {
                os: std::env::consts::OS.to_string(),
            })
        }
    }

    /// Default installation directory of the mesh client.
    pub fn default_install_dir(&self) -> PathBuf {
        match self {
            Platform::MacOs => PathBuf::from("/Library/Application Support/ZeroTier/One"),
            Platform::Windows => PathBuf::from("C:/ProgramData/ZeroTier/One"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::MacOs => write!(f, "macos"),
            Platform::Windows => write!(f, "windows"),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceState
// ---------------------------------------------------------------------------

/// Observed state of the mesh client's background service.
///
/// `Starting` and `Stopping` are transient states reported while a sequence
/// is polling; status queries resolve to `Running`, `Stopped`, or `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Unknown,
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Unknown => write!(f, "unknown"),
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopping => write!(f, "stopping"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_valid_addresses() {
        let set = IpSet::parse("192.168.1.1,\n10.0.0.1\n172.16.0.1,");
        let expected: IpSet = ["192.168.1.1", "10.0.0.1", "172.16.0.1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn parse_drops_out_of_range_octets_and_junk() {
        let set = IpSet::parse("256.256.256.256, 192.168.1.1, invalid_ip");
        assert_eq!(set.len(), 1);
        assert!(set.contains("192.168.1.1"));
    }

    #[test]
    fn parse_empty_input_is_empty_set() {
        assert!(IpSet::parse("").is_empty());
    }

    #[test]
    fn parse_is_order_and_format_insensitive() {
        let a = IpSet::parse("192.168.1.1,\n10.0.0.1");
        let b = IpSet::parse("10.0.0.1, 192.168.1.1");
        assert_eq!(a, b);
    }

    #[test]
    fn parse_dedupes_repeated_addresses() {
        let set = IpSet::parse("10.0.0.1 10.0.0.1,10.0.0.1");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parse_rejects_five_group_runs() {
        let set = IpSet::parse("1.2.3.4.5");
        assert!(set.is_empty());
    }

    #[test]
    fn parse_accepts_trailing_dot_before_delimiter() {
        let set = IpSet::parse("reachable at 1.2.3.4.");
        assert!(set.contains("1.2.3.4"));
    }

    #[test]
    fn difference_is_symmetric_building_block() {
        let old = IpSet::parse("1.1.1.1, 2.2.2.2");
        let new = IpSet::parse("2.2.2.2, 3.3.3.3");
        assert_eq!(new.difference(&old), vec!["3.3.3.3".to_string()]);
        assert_eq!(old.difference(&new), vec!["1.1.1.1".to_string()]);
    }

    #[test]
    fn display_joins_sorted() {
        let set = IpSet::parse("9.9.9.9 1.1.1.1");
        assert_eq!(set.to_string(), "1.1.1.1, 9.9.9.9");
    }

    #[test]
    fn platform_default_paths() {
        assert_eq!(
            Platform::MacOs.default_install_dir(),
            PathBuf::from("/Library/Application Support/ZeroTier/One")
        );
        assert_eq!(
            Platform::Windows.default_install_dir(),
            PathBuf::from("C:/ProgramData/ZeroTier/One")
        );
    }

    #[test]
    fn service_state_display() {
        assert_eq!(ServiceState::Running.to_string(), "running");
        assert_eq!(ServiceState::Unknown.to_string(), "unknown");
    }
}
