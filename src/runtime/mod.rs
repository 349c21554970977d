// ABOUTME: Container runtime detection for Docker, containerd, CRI-O and Podman.
// ABOUTME: Probes candidate sockets concurrently and maps the winner to a runtime adapter.

mod containerd;
mod crio;
mod detection;
mod endpoint;
mod engine;
mod error;
mod mount;
mod oci;
mod probe;
mod process;
mod registry;
mod tools;
pub mod traits;
mod types;

use std::sync::Arc;

pub use containerd::{
    ContainerdRuntime, DEFAULT_NAMESPACE, SCRATCH_NAMESPACE, parse_imported_images,
};
pub use crio::CrioRuntime;
pub use detection::{
    DEFAULT_TIMEOUT, DetectionError, DetectionOutcome, Detector, Selection, detect_runtime, select,
};
pub use endpoint::{
    ParseError, ParsedEndpoint, Protocol, UNIX_PROTOCOL, parse, parse_unix, unix_socket_path,
};
pub use engine::{EngineRuntime, parse_loaded_image};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use mount::{MountSpec, ScratchMount};
pub use oci::{
    docker_archive_path, migrate_oci_tar_to_docker_v1, migrate_oci_to_docker_v1,
    tarball_is_readable,
};
pub use probe::{Confirmation, ProbeError, ProbePhase, ProbeResult, Prober, SocketProber};
pub use process::{CommandLine, CommandOutput, CommandRunner, HostRunner, pipe_checked, run_checked};
pub use registry::{
    CONTAINERD_SOCKET, CRIO_SOCKET, Candidate, DOCKER_SOCKET, K3S_CONTAINERD_SOCKET, PODMAN_SOCKET,
    RuntimeRegistry, default_endpoint,
};
pub use tools::ToolPaths;
pub use traits::{AdapterError, FilesystemOps, FullRuntime, ImageOps, RuntimeInfo};
pub use types::{RuntimeConfig, RuntimeKind, UnknownRuntime};

/// Build the adapter for a detected (kind, endpoint) pair.
///
/// The endpoint is normalized to its full `unix://` form first, so adapters never
/// see the deprecated bare-path spelling. `namespace` is the default containerd
/// namespace for container extraction; other kinds ignore it.
pub fn connect(
    kind: RuntimeKind,
    endpoint: &str,
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
    namespace: &str,
) -> Result<Box<dyn FullRuntime>, AdapterError> {
    let endpoint = parse_unix(endpoint)?.url();

    let runtime: Box<dyn FullRuntime> = match kind {
        RuntimeKind::Docker => Box::new(EngineRuntime::docker(endpoint, runner, tools)),
        RuntimeKind::Podman => Box::new(EngineRuntime::podman(endpoint, runner, tools)),
        RuntimeKind::Containerd => {
            Box::new(ContainerdRuntime::new(endpoint, namespace, runner, tools)?)
        }
        RuntimeKind::Crio => Box::new(CrioRuntime::new(endpoint, runner, tools)),
    };
    tracing::debug!("bound {} adapter to {}", runtime.kind(), runtime.socket());
    Ok(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_maps_every_kind() {
        for kind in RuntimeKind::ALL {
            let runtime = connect(
                kind,
                default_endpoint(kind),
                Arc::new(HostRunner),
                ToolPaths::default(),
                DEFAULT_NAMESPACE,
            )
            .unwrap();
            assert_eq!(runtime.kind(), kind);
            assert_eq!(runtime.socket(), default_endpoint(kind));
        }
    }

    #[test]
    fn connect_normalizes_bare_paths() {
        let runtime = connect(
            RuntimeKind::Docker,
            "/var/run/docker.sock",
            Arc::new(HostRunner),
            ToolPaths::default(),
            DEFAULT_NAMESPACE,
        )
        .unwrap();
        assert_eq!(runtime.socket(), "unix:///var/run/docker.sock");
    }

    #[test]
    fn connect_rejects_tcp() {
        let err = connect(
            RuntimeKind::Podman,
            "tcp://localhost:2375",
            Arc::new(HostRunner),
            ToolPaths::default(),
            DEFAULT_NAMESPACE,
        )
        .err()
        .unwrap();
        assert!(matches!(err, AdapterError::Endpoint(ParseError::NotUnix(_))));
    }
}
