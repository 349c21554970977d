// ABOUTME: Runtime detection: concurrent probing of every registered endpoint.
// ABOUTME: Prefers runtimes confirmed in use, else the first reachable one, in registry order.

use super::endpoint::{ParseError, UNIX_PROTOCOL, parse, parse_unix};
use super::probe::{ProbeError, ProbeResult, Prober};
use super::registry::{RuntimeRegistry, default_endpoint};
use super::types::{RuntimeConfig, RuntimeKind};
use crate::diagnostics::{Diagnostics, Warning};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Probe timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Slack given to a probe past its own budget before the detector reports it.
const PROBE_GRACE: Duration = Duration::from_millis(250);

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error(
        "could not detect container runtime (no reachable endpoint among {attempted} candidates)"
    )]
    NoRuntimeFound { attempted: usize },

    #[error("invalid runtime override: {0}")]
    InvalidOverride(#[from] ParseError),
}

/// How the winning runtime was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Reachable and confirmed in use.
    ConfirmedActive,
    /// Nothing confirmed; first reachable candidate in registry order.
    FirstDetected,
    /// Explicitly configured, not probed.
    Configured,
}

/// The runtime handed to the rest of the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionOutcome {
    pub kind: RuntimeKind,
    pub endpoint: String,
    pub selection: Selection,
    pub warnings: Vec<Warning>,
}

/// Fans probes out over a registry and picks a winner.
pub struct Detector {
    registry: RuntimeRegistry,
    prober: Arc<dyn Prober>,
    timeout: Duration,
}

impl Detector {
    pub fn new(registry: RuntimeRegistry, prober: Arc<dyn Prober>) -> Self {
        Self {
            registry,
            prober,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Per-probe timeout covering both the connect and confirm phases.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe every (kind, endpoint) pair concurrently.
    ///
    /// Waits for every probe to report or time out; results come back in registry
    /// order regardless of completion order.
    pub async fn probe_all(&self) -> Vec<ProbeResult> {
        let candidates = self.registry.candidates();
        let total = candidates.len();
        let (tx, mut rx) = mpsc::channel(total.max(1));

        for candidate in candidates {
            let tx = tx.clone();
            let prober = Arc::clone(&self.prober);
            let timeout = self.timeout;

            tokio::spawn(async move {
                let probe = prober.probe(candidate.kind, &candidate.endpoint, timeout);
                let result = match tokio::time::timeout(timeout + PROBE_GRACE, probe).await {
                    Ok(result) => result,
                    Err(_) => ProbeResult::unreachable(
                        candidate.kind,
                        &candidate.endpoint,
                        ProbeError::Overran {
                            endpoint: candidate.endpoint.clone(),
                            budget: timeout + PROBE_GRACE,
                        },
                    ),
                };

                if result.confirmed_active {
                    tracing::info!("connected successfully to endpoint: {}", candidate.endpoint);
                } else if let Some(ref error) = result.error {
                    tracing::debug!("{}", error);
                }

                // The receiver only goes away if detection itself was dropped.
                let _ = tx.send((candidate.rank, result)).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(message) = rx.recv().await {
            results.push(message);
        }
        if results.len() < total {
            tracing::warn!(
                "{} of {} probes ended without reporting",
                total - results.len(),
                total
            );
        }

        results.sort_by_key(|(rank, _)| *rank);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Probe everything and select the runtime to use.
    pub async fn detect(&self) -> Result<DetectionOutcome, DetectionError> {
        let results = self.probe_all().await;
        select(&results)
    }
}

/// Pick the winner from results given in registry order.
///
/// Confirmed-active beats merely reachable; ties go to the earlier registry
/// position. Nothing reachable is an error.
pub fn select(results: &[ProbeResult]) -> Result<DetectionOutcome, DetectionError> {
    let mut diagnostics = Diagnostics::default();

    let (winner, selection) =
        if let Some(active) = results.iter().find(|r| r.reachable && r.confirmed_active) {
            (active, Selection::ConfirmedActive)
        } else if let Some(detected) = results.iter().find(|r| r.reachable) {
            diagnostics.warn(Warning::no_active_runtime(format!(
                "no running runtimes, selecting first detected runtime {} at {}",
                detected.kind, detected.endpoint
            )));
            (detected, Selection::FirstDetected)
        } else {
            return Err(DetectionError::NoRuntimeFound {
                attempted: results.len(),
            });
        };

    if parse(&winner.endpoint, UNIX_PROTOCOL).is_ok_and(|p| p.deprecated_form) {
        diagnostics.warn(Warning::deprecated_endpoint(&winner.endpoint));
    }

    tracing::info!(
        "container runtime detected: {} at {}",
        winner.kind,
        winner.endpoint
    );

    Ok(DetectionOutcome {
        kind: winner.kind,
        endpoint: winner.endpoint.clone(),
        selection,
        warnings: diagnostics.into_warnings(),
    })
}

/// Detect the container runtime, honouring an explicit override.
///
/// When `config` names a runtime, no probing happens: the configured socket (or the
/// kind's first built-in endpoint) is validated and returned as is.
pub async fn detect_runtime(
    detector: &Detector,
    config: Option<&RuntimeConfig>,
) -> Result<DetectionOutcome, DetectionError> {
    if let Some(cfg) = config
        && let Some(kind) = cfg.runtime
    {
        let endpoint = cfg
            .socket
            .clone()
            .unwrap_or_else(|| default_endpoint(kind).to_string());
        let parsed = parse_unix(&endpoint)?;

        let mut diagnostics = Diagnostics::default();
        if parsed.deprecated_form {
            diagnostics.warn(Warning::deprecated_endpoint(&endpoint));
        }
        tracing::info!("using configured container runtime {} at {}", kind, endpoint);

        return Ok(DetectionOutcome {
            kind,
            endpoint,
            selection: Selection::Configured,
            warnings: diagnostics.into_warnings(),
        });
    }

    detector.detect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::probe::Confirmation;

    fn active(kind: RuntimeKind, endpoint: &str) -> ProbeResult {
        ProbeResult::answered(
            kind,
            endpoint,
            Confirmation {
                active: true,
                objects: Some(3),
            },
        )
    }

    fn idle(kind: RuntimeKind, endpoint: &str) -> ProbeResult {
        ProbeResult::answered(
            kind,
            endpoint,
            Confirmation {
                active: false,
                objects: Some(0),
            },
        )
    }

    fn down(kind: RuntimeKind, endpoint: &str) -> ProbeResult {
        ProbeResult::unreachable(
            kind,
            endpoint,
            ProbeError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            },
        )
    }

    #[test]
    fn active_beats_earlier_idle() {
        let results = [
            idle(RuntimeKind::Docker, "unix:///d.sock"),
            active(RuntimeKind::Podman, "unix:///p.sock"),
        ];
        let outcome = select(&results).unwrap();
        assert_eq!(outcome.kind, RuntimeKind::Podman);
        assert_eq!(outcome.selection, Selection::ConfirmedActive);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn first_detected_carries_warning() {
        let results = [
            down(RuntimeKind::Docker, "unix:///d.sock"),
            idle(RuntimeKind::Crio, "unix:///c.sock"),
        ];
        let outcome = select(&results).unwrap();
        assert_eq!(outcome.kind, RuntimeKind::Crio);
        assert_eq!(outcome.selection, Selection::FirstDetected);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn nothing_reachable_is_an_error() {
        let results = [down(RuntimeKind::Docker, "unix:///d.sock")];
        let err = select(&results).unwrap_err();
        assert!(err.to_string().starts_with("could not detect container runtime"));
    }

    #[test]
    fn bare_path_winner_is_flagged_deprecated() {
        let results = [active(RuntimeKind::Docker, "/var/run/docker.sock")];
        let outcome = select(&results).unwrap();
        assert_eq!(
            outcome.warnings[0].kind,
            crate::diagnostics::WarningKind::DeprecatedEndpoint
        );
    }
}
