//! Identity reported at login: display name and user.

use rollcall_core::config::IdentityConfig;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub name: String,
    pub user: String,
}

impl HostIdentity {
    /// Config overrides first, then the host.
    pub fn resolve(overrides: &IdentityConfig) -> Self {
        Self {
            name: overrides
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(host_name),
            user: overrides
                .user
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(user_name),
        }
    }
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn host_name() -> String {
    env_first(&["HOSTNAME", "COMPUTERNAME"])
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn user_name() -> String {
    env_first(&["USER", "USERNAME"]).unwrap_or_else(|| UNKNOWN.to_string())
}
