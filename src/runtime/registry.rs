// ABOUTME: Candidate socket endpoints for each runtime kind.
// ABOUTME: Built once from compiled-in defaults plus additive environment overrides.

use super::types::RuntimeKind;
use nonempty::NonEmpty;
use std::collections::HashMap;

pub const DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";
pub const CONTAINERD_SOCKET: &str = "unix:///run/containerd/containerd.sock";
pub const K3S_CONTAINERD_SOCKET: &str = "unix:///run/k3s/containerd/containerd.sock";
pub const CRIO_SOCKET: &str = "unix:///var/run/crio/crio.sock";
pub const PODMAN_SOCKET: &str = "unix:///run/podman/podman.sock";

/// First built-in endpoint of a kind.
pub fn default_endpoint(kind: RuntimeKind) -> &'static str {
    match kind {
        RuntimeKind::Docker => DOCKER_SOCKET,
        RuntimeKind::Containerd => CONTAINERD_SOCKET,
        RuntimeKind::Crio => CRIO_SOCKET,
        RuntimeKind::Podman => PODMAN_SOCKET,
    }
}

/// One (kind, endpoint) pair with its position in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub rank: usize,
    pub kind: RuntimeKind,
    pub endpoint: String,
}

/// Ordered mapping from runtime kind to candidate endpoints.
///
/// Kinds keep insertion order and endpoints keep priority order within a kind:
/// built-in defaults first, overrides appended after them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRegistry {
    entries: Vec<(RuntimeKind, NonEmpty<String>)>,
}

impl RuntimeRegistry {
    /// Create a registry from explicit entries. A kind listed twice is merged
    /// into its first position.
    pub fn new(entries: impl IntoIterator<Item = (RuntimeKind, NonEmpty<String>)>) -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        for (kind, endpoints) in entries {
            for endpoint in endpoints {
                registry.push(kind, endpoint);
            }
        }
        registry
    }

    /// Built-in defaults for every supported kind.
    ///
    /// `xdg_runtime_dir` adds the rootless Podman socket after the rootful one.
    pub fn defaults(xdg_runtime_dir: Option<&str>) -> Self {
        let mut podman = NonEmpty::new(PODMAN_SOCKET.to_string());
        if let Some(dir) = xdg_runtime_dir.filter(|d| !d.is_empty()) {
            podman.push(format!(
                "unix://{}/podman/podman.sock",
                dir.trim_end_matches('/')
            ));
        }

        Self::new([
            (RuntimeKind::Docker, NonEmpty::new(DOCKER_SOCKET.to_string())),
            (
                RuntimeKind::Containerd,
                NonEmpty::from((
                    CONTAINERD_SOCKET.to_string(),
                    vec![K3S_CONTAINERD_SOCKET.to_string()],
                )),
            ),
            (RuntimeKind::Crio, NonEmpty::new(CRIO_SOCKET.to_string())),
            (RuntimeKind::Podman, podman),
        ])
    }

    /// Build the registry from defaults and an environment lookup.
    ///
    /// Each `<KIND>_SOCKET_PATH` that is set and non-empty appends
    /// `unix://<value>` to that kind. Nothing is ever removed.
    pub fn build<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let xdg = lookup("XDG_RUNTIME_DIR");
        let mut registry = Self::defaults(xdg.as_deref());

        for kind in RuntimeKind::ALL {
            if let Some(path) = lookup(kind.socket_env_var()).filter(|p| !p.is_empty()) {
                tracing::debug!("adding {} endpoint from {}", kind, kind.socket_env_var());
                registry.push(kind, format!("unix://{}", path));
            }
        }

        registry
    }

    /// Build the registry from the process environment.
    pub fn from_env() -> Self {
        Self::build(|name| std::env::var(name).ok())
    }

    /// Append extra endpoints, typically from the configuration file.
    pub fn with_endpoints(mut self, extra: &HashMap<RuntimeKind, Vec<String>>) -> Self {
        for kind in RuntimeKind::ALL {
            if let Some(endpoints) = extra.get(&kind) {
                for endpoint in endpoints {
                    self.push(kind, endpoint.clone());
                }
            }
        }
        self
    }

    fn push(&mut self, kind: RuntimeKind, endpoint: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, endpoints)) => {
                if !endpoints.iter().any(|e| *e == endpoint) {
                    endpoints.push(endpoint);
                }
            }
            None => self.entries.push((kind, NonEmpty::new(endpoint))),
        }
    }

    /// Endpoints registered for a kind.
    pub fn endpoints(&self, kind: RuntimeKind) -> Option<&NonEmpty<String>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, endpoints)| endpoints)
    }

    /// Kinds in registry order.
    pub fn kinds(&self) -> impl Iterator<Item = RuntimeKind> + '_ {
        self.entries.iter().map(|(kind, _)| *kind)
    }

    /// Every (kind, endpoint) pair, flattened in priority order.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.entries
            .iter()
            .flat_map(|(kind, endpoints)| endpoints.iter().map(move |e| (*kind, e.clone())))
            .enumerate()
            .map(|(rank, (kind, endpoint))| Candidate {
                rank,
                kind,
                endpoint,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, endpoints)| endpoints.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
