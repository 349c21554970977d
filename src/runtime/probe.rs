// ABOUTME: Two-phase reachability probe for a single (runtime kind, endpoint) pair.
// ABOUTME: Connects to the socket, then asks the runtime one cheap question to confirm use.

use super::endpoint::{ParseError, ParsedEndpoint, parse_unix};
use super::process::{CommandLine, CommandRunner, run_checked};
use super::tools::ToolPaths;
use super::types::RuntimeKind;
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::ListContainersOptions;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::Request;
use hyper::header::CONTENT_TYPE;
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::time::{Instant, timeout_at};

/// Phase of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbePhase {
    Connect,
    Confirm,
}

/// Why a probe did not confirm its runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid endpoint {endpoint:?}: {source}")]
    Endpoint {
        endpoint: String,
        source: ParseError,
    },

    #[error("could not connect to endpoint {endpoint:?}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("runtime at {endpoint:?} did not answer: {reason}")]
    Confirm { endpoint: String, reason: String },

    #[error("{phase:?} phase for {endpoint:?} timed out after {timeout:?}")]
    Timeout {
        endpoint: String,
        phase: ProbePhase,
        timeout: Duration,
    },

    #[error("probe of {endpoint:?} overran its {budget:?} budget")]
    Overran { endpoint: String, budget: Duration },
}

impl ProbeError {
    /// Whether the failure happened after the socket accepted a connection.
    pub fn after_connect(&self) -> bool {
        matches!(
            self,
            ProbeError::Confirm { .. }
                | ProbeError::Timeout {
                    phase: ProbePhase::Confirm,
                    ..
                }
        )
    }
}

/// Outcome of probing one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub kind: RuntimeKind,
    pub endpoint: String,
    /// The socket accepted a connection.
    pub reachable: bool,
    /// The runtime answered its introspection call and reports objects in use.
    pub confirmed_active: bool,
    /// Number of containers/pods the introspection call reported, when known.
    pub object_count: Option<usize>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ProbeError>,
}

fn serialize_error<S: Serializer>(error: &Option<ProbeError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

impl ProbeResult {
    pub fn unreachable(kind: RuntimeKind, endpoint: &str, error: ProbeError) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            reachable: false,
            confirmed_active: false,
            object_count: None,
            error: Some(error),
        }
    }

    pub fn unconfirmed(kind: RuntimeKind, endpoint: &str, error: ProbeError) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            reachable: true,
            confirmed_active: false,
            object_count: None,
            error: Some(error),
        }
    }

    pub fn answered(kind: RuntimeKind, endpoint: &str, confirmation: Confirmation) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            reachable: true,
            confirmed_active: confirmation.active,
            object_count: confirmation.objects,
            error: None,
        }
    }

    /// Reachable, answered, but reporting nothing in use.
    pub fn is_idle(&self) -> bool {
        self.reachable && self.object_count == Some(0)
    }

    /// One-word summary used by the probe table.
    pub fn state(&self) -> &'static str {
        if self.is_idle() {
            "idle"
        } else if self.confirmed_active {
            "active"
        } else if self.reachable {
            "detected"
        } else {
            "unreachable"
        }
    }
}

/// Answer of a runtime's introspection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub active: bool,
    pub objects: Option<usize>,
}

/// Probes one candidate endpoint.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `endpoint` as a `kind` runtime; both phases share `timeout`.
    ///
    /// Never fails: every problem is reported inside the result.
    async fn probe(&self, kind: RuntimeKind, endpoint: &str, timeout: Duration) -> ProbeResult;
}

/// Prober that dials the socket and queries the runtime.
#[derive(Clone)]
pub struct SocketProber {
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
}

impl SocketProber {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: ToolPaths) -> Self {
        Self { runner, tools }
    }

    async fn confirm(
        &self,
        kind: RuntimeKind,
        endpoint: &str,
        parsed: &ParsedEndpoint,
        deadline: Instant,
    ) -> Result<Confirmation, String> {
        match kind {
            RuntimeKind::Docker => confirm_docker(parsed.socket_path(), deadline).await,
            RuntimeKind::Containerd => self.confirm_containerd(&parsed.address).await,
            RuntimeKind::Crio => self.confirm_crio(endpoint).await,
            RuntimeKind::Podman => self.confirm_podman(endpoint).await,
        }
    }

    /// Walk every namespace and count its containers.
    async fn confirm_containerd(&self, address: &str) -> Result<Confirmation, String> {
        let namespaces = run_checked(
            self.runner.as_ref(),
            "ctr namespaces ls",
            &CommandLine::new(&self.tools.ctr).args([
                "--address",
                address,
                "namespaces",
                "ls",
                "-q",
            ]),
        )
        .await
        .map_err(|e| e.to_string())?
        .lines();

        let mut total = 0;
        for namespace in &namespaces {
            let containers = run_checked(
                self.runner.as_ref(),
                "ctr containers ls",
                &CommandLine::new(&self.tools.ctr).args([
                    "--address",
                    address,
                    "-n",
                    namespace.as_str(),
                    "containers",
                    "ls",
                    "-q",
                ]),
            )
            .await
            .map_err(|e| e.to_string())?;
            total += containers.lines().len();
        }

        Ok(Confirmation {
            active: total > 0,
            objects: Some(total),
        })
    }

    /// A successful pod listing is enough for CRI-O.
    async fn confirm_crio(&self, endpoint: &str) -> Result<Confirmation, String> {
        let output = run_checked(
            self.runner.as_ref(),
            "crictl pods",
            &CommandLine::new(&self.tools.crictl).args([
                "--runtime-endpoint",
                endpoint,
                "pods",
                "-q",
            ]),
        )
        .await
        .map_err(|e| e.to_string())?;

        Ok(Confirmation {
            active: true,
            objects: Some(output.lines().len()),
        })
    }

    /// `podman ps` always prints a header; anything beyond it is a container.
    async fn confirm_podman(&self, endpoint: &str) -> Result<Confirmation, String> {
        let output = run_checked(
            self.runner.as_ref(),
            "podman ps",
            &CommandLine::new(&self.tools.podman).args(["--remote", "--url", endpoint, "ps"]),
        )
        .await
        .map_err(|e| e.to_string())?;

        let lines = output.lines().len();
        Ok(Confirmation {
            active: lines > 1,
            objects: Some(lines.saturating_sub(1)),
        })
    }
}

#[async_trait]
impl Prober for SocketProber {
    async fn probe(&self, kind: RuntimeKind, endpoint: &str, timeout: Duration) -> ProbeResult {
        tracing::debug!(
            "trying to connect to endpoint {:?} with timeout {:?}",
            endpoint,
            timeout
        );
        let deadline = Instant::now() + timeout;

        let parsed = match parse_unix(endpoint) {
            Ok(parsed) => parsed,
            Err(source) => {
                return ProbeResult::unreachable(
                    kind,
                    endpoint,
                    ProbeError::Endpoint {
                        endpoint: endpoint.to_string(),
                        source,
                    },
                );
            }
        };

        match timeout_at(deadline, connect(kind, parsed.socket_path())).await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                return ProbeResult::unreachable(
                    kind,
                    endpoint,
                    ProbeError::Connect {
                        endpoint: endpoint.to_string(),
                        reason,
                    },
                );
            }
            Err(_) => {
                return ProbeResult::unreachable(
                    kind,
                    endpoint,
                    ProbeError::Timeout {
                        endpoint: endpoint.to_string(),
                        phase: ProbePhase::Connect,
                        timeout,
                    },
                );
            }
        }

        match timeout_at(deadline, self.confirm(kind, endpoint, &parsed, deadline)).await {
            Ok(Ok(confirmation)) => {
                if !confirmation.active {
                    tracing::debug!("no running containers found with endpoint {}", endpoint);
                }
                ProbeResult::answered(kind, endpoint, confirmation)
            }
            Ok(Err(reason)) => ProbeResult::unconfirmed(
                kind,
                endpoint,
                ProbeError::Confirm {
                    endpoint: endpoint.to_string(),
                    reason,
                },
            ),
            Err(_) => ProbeResult::unconfirmed(
                kind,
                endpoint,
                ProbeError::Timeout {
                    endpoint: endpoint.to_string(),
                    phase: ProbePhase::Confirm,
                    timeout,
                },
            ),
        }
    }
}

const GRPC_VERSION_URI: &str = "http://localhost/containerd.services.version.v1.Version/Version";

/// Dial the socket; containerd additionally completes the HTTP/2 handshake gRPC runs on.
async fn connect(kind: RuntimeKind, path: &Path) -> Result<(), String> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|e| e.to_string())?;

    if kind == RuntimeKind::Containerd {
        grpc_handshake(stream).await?;
    }
    Ok(())
}

/// Any HTTP/2 response proves a gRPC-capable server; the status is irrelevant.
async fn grpc_handshake(stream: UnixStream) -> Result<(), String> {
    let (mut sender, conn) = hyper::client::conn::http2::handshake::<_, _, Empty<Bytes>>(
        TokioExecutor::new(),
        TokioIo::new(stream),
    )
    .await
    .map_err(|e| format!("HTTP/2 handshake failed: {}", e))?;

    let request = Request::post(GRPC_VERSION_URI)
        .header(CONTENT_TYPE, "application/grpc")
        .header("te", "trailers")
        .body(Empty::new())
        .map_err(|e| format!("invalid gRPC request: {}", e))?;

    let exchange = async {
        sender.ready().await?;
        sender.send_request(request).await
    };

    tokio::pin!(conn);
    tokio::select! {
        response = exchange => match response {
            Ok(response) => {
                tracing::debug!("gRPC server answered with status {}", response.status());
                Ok(())
            }
            Err(e) => Err(format!("HTTP/2 request failed: {}", e)),
        },
        closed = &mut conn => match closed {
            Ok(()) => Err("connection closed during handshake".to_string()),
            Err(e) => Err(format!("HTTP/2 connection failed: {}", e)),
        },
    }
}

async fn confirm_docker(path: &Path, deadline: Instant) -> Result<Confirmation, String> {
    let remaining = deadline
        .saturating_duration_since(Instant::now())
        .as_secs()
        .max(1);

    let client = Docker::connect_with_unix(
        &path.to_string_lossy(),
        remaining,
        bollard::API_DEFAULT_VERSION,
    )
    .map_err(|e| format!("error creating docker client: {}", e))?;

    let opts = ListContainersOptions {
        all: true,
        ..Default::default()
    };

    let containers = client
        .list_containers(Some(opts))
        .await
        .map_err(|e| format!("error listing containers: {}", e))?;

    Ok(Confirmation {
        active: true,
        objects: Some(containers.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_errors_count_as_after_connect() {
        let confirm = ProbeError::Confirm {
            endpoint: "unix:///x.sock".to_string(),
            reason: "boom".to_string(),
        };
        let connect = ProbeError::Connect {
            endpoint: "unix:///x.sock".to_string(),
            reason: "refused".to_string(),
        };
        assert!(confirm.after_connect());
        assert!(!connect.after_connect());
    }

    #[test]
    fn idle_means_answered_with_nothing() {
        let idle = ProbeResult::answered(
            RuntimeKind::Docker,
            "unix:///var/run/docker.sock",
            Confirmation {
                active: true,
                objects: Some(0),
            },
        );
        assert!(idle.is_idle());
        assert!(idle.confirmed_active);
    }

    #[test]
    fn state_reports_idle_before_active() {
        let endpoint = "unix:///var/run/docker.sock";
        let answered = |objects| {
            ProbeResult::answered(
                RuntimeKind::Docker,
                endpoint,
                Confirmation {
                    active: true,
                    objects: Some(objects),
                },
            )
        };
        let refused = ProbeError::Connect {
            endpoint: endpoint.to_string(),
            reason: "refused".to_string(),
        };
        let silent = ProbeError::Confirm {
            endpoint: endpoint.to_string(),
            reason: "no answer".to_string(),
        };

        assert_eq!(answered(0).state(), "idle");
        assert_eq!(answered(3).state(), "active");
        assert_eq!(
            ProbeResult::unconfirmed(RuntimeKind::Docker, endpoint, silent).state(),
            "detected"
        );
        assert_eq!(
            ProbeResult::unreachable(RuntimeKind::Docker, endpoint, refused).state(),
            "unreachable"
        );
    }

    #[test]
    fn overran_budget_is_not_after_connect() {
        let overran = ProbeError::Overran {
            endpoint: "unix:///x.sock".to_string(),
            budget: Duration::from_millis(250),
        };
        assert!(!overran.after_connect());
        assert!(overran.to_string().contains("overran its"));
    }

    #[test]
    fn result_serializes_error_as_text() {
        let result = ProbeResult::unreachable(
            RuntimeKind::Crio,
            "unix:///var/run/crio/crio.sock",
            ProbeError::Connect {
                endpoint: "unix:///var/run/crio/crio.sock".to_string(),
                reason: "No such file or directory".to_string(),
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "crio");
        assert_eq!(json["reachable"], false);
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .contains("could not connect to endpoint")
        );
    }
}
