// ABOUTME: Diagnostics accumulator for non-fatal warnings during detection.
// ABOUTME: Collects warnings that shouldn't fail detection but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during detection.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Endpoint written without a scheme.
    pub fn deprecated_endpoint(endpoint: &str) -> Self {
        Self {
            kind: WarningKind::DeprecatedEndpoint,
            message: format!(
                "endpoint {:?} has no scheme; use the full url form unix://{}",
                endpoint, endpoint
            ),
        }
    }

    /// Nothing was confirmed active, so the first reachable runtime was picked.
    pub fn no_active_runtime(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::NoActiveRuntime,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A candidate endpoint relied on the implicit unix:// scheme.
    DeprecatedEndpoint,
    /// No runtime reported containers; selection fell back to the first detected one.
    NoActiveRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::deprecated_endpoint("/var/run/docker.sock"));
        diag.warn(Warning::no_active_runtime("selecting first detected runtime"));

        assert!(diag.has_warnings());
        assert_eq!(diag.into_warnings().len(), 2);
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        let deprecated = Warning::deprecated_endpoint("/run/podman/podman.sock");
        assert_eq!(deprecated.kind, WarningKind::DeprecatedEndpoint);
        assert!(deprecated.message.contains("unix:///run/podman/podman.sock"));

        let fallback = Warning::no_active_runtime("test");
        assert_eq!(fallback.kind, WarningKind::NoActiveRuntime);
    }
}
