// ABOUTME: Names or paths of the external tools the probes and adapters invoke.
// ABOUTME: Defaults to bare program names resolved through PATH.

use serde::Deserialize;

/// Program used for each external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub docker: String,
    pub podman: String,
    pub nerdctl: String,
    pub ctr: String,
    pub crictl: String,
    pub skopeo: String,
    pub tar: String,
    pub mount: String,
    pub umount: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            podman: "podman".to_string(),
            nerdctl: "nerdctl".to_string(),
            ctr: "ctr".to_string(),
            crictl: "crictl".to_string(),
            skopeo: "skopeo".to_string(),
            tar: "tar".to_string(),
            mount: "mount".to_string(),
            umount: "umount".to_string(),
        }
    }
}
