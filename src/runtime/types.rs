// ABOUTME: Runtime kind definitions for Docker, containerd, CRI-O and Podman.
// ABOUTME: Includes the RuntimeKind enum, socket override names, and the explicit RuntimeConfig.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The container runtime kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Containerd,
    Crio,
    Podman,
}

impl RuntimeKind {
    /// Every supported kind, in registry priority order.
    pub const ALL: [RuntimeKind; 4] = [
        RuntimeKind::Docker,
        RuntimeKind::Containerd,
        RuntimeKind::Crio,
        RuntimeKind::Podman,
    ];

    /// Lowercase name, also used as the `CONTAINER_RUNTIME` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Containerd => "containerd",
            RuntimeKind::Crio => "crio",
            RuntimeKind::Podman => "podman",
        }
    }

    /// Environment variable whose value is appended as an extra socket candidate.
    pub fn socket_env_var(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "DOCKER_SOCKET_PATH",
            RuntimeKind::Containerd => "CONTAINERD_SOCKET_PATH",
            RuntimeKind::Crio => "CRIO_SOCKET_PATH",
            RuntimeKind::Podman => "PODMAN_SOCKET_PATH",
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a runtime name is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown container runtime: {0}")]
pub struct UnknownRuntime(pub String);

impl FromStr for RuntimeKind {
    type Err = UnknownRuntime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(RuntimeKind::Docker),
            "containerd" => Ok(RuntimeKind::Containerd),
            "crio" | "cri-o" => Ok(RuntimeKind::Crio),
            "podman" => Ok(RuntimeKind::Podman),
            other => Err(UnknownRuntime(other.to_string())),
        }
    }
}

/// Configuration for explicit runtime override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit runtime kind (overrides auto-detection).
    pub runtime: Option<RuntimeKind>,
    /// Explicit endpoint (overrides the kind's default).
    pub socket: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        for kind in RuntimeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn parses_cri_o_spelling() {
        assert_eq!("cri-o".parse::<RuntimeKind>().unwrap(), RuntimeKind::Crio);
        assert_eq!("CRIO".parse::<RuntimeKind>().unwrap(), RuntimeKind::Crio);
        assert!("rkt".parse::<RuntimeKind>().is_err());
    }

    #[test]
    fn env_var_names() {
        assert_eq!(RuntimeKind::Docker.socket_env_var(), "DOCKER_SOCKET_PATH");
        assert_eq!(RuntimeKind::Podman.socket_env_var(), "PODMAN_SOCKET_PATH");
    }
}
