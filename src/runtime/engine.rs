// ABOUTME: Adapter for Docker-compatible engines: Docker and Podman.
// ABOUTME: Drives the docker CLI (-H) or the remote podman CLI (--remote --url) at the endpoint.

use crate::runtime::process::{CommandLine, CommandRunner, pipe_checked, run_checked};
use crate::runtime::tools::ToolPaths;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{AdapterError, FilesystemOps, ImageOps, RuntimeInfo};
use crate::runtime::types::RuntimeKind;
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Extract the image reference from `load` output.
///
/// Looks for the first `Loaded image...: <ref>` line and returns everything after
/// its first colon, so `Loaded image: docker.io/library/nginx:latest` yields
/// `docker.io/library/nginx:latest`.
pub fn parse_loaded_image(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("Loaded image"))
        .find_map(|line| line.split_once(':'))
        .map(|(_, reference)| reference.trim().to_string())
        .filter(|reference| !reference.is_empty())
}

/// Container runtime adapter for Docker and Podman.
///
/// Both engines accept the same verbs; only the program and the way the endpoint
/// is passed differ.
pub struct EngineRuntime {
    kind: RuntimeKind,
    endpoint: String,
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
}

impl EngineRuntime {
    /// Adapter for a Docker daemon at `endpoint`.
    pub fn docker(
        endpoint: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        tools: ToolPaths,
    ) -> Self {
        Self {
            kind: RuntimeKind::Docker,
            endpoint: endpoint.into(),
            runner,
            tools,
        }
    }

    /// Adapter for a Podman service at `endpoint`.
    pub fn podman(
        endpoint: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        tools: ToolPaths,
    ) -> Self {
        Self {
            kind: RuntimeKind::Podman,
            endpoint: endpoint.into(),
            runner,
            tools,
        }
    }

    /// Program plus endpoint arguments, ready for a verb.
    fn cli(&self) -> CommandLine {
        match self.kind {
            RuntimeKind::Podman => CommandLine::new(&self.tools.podman).args([
                "--remote",
                "--url",
                self.endpoint.as_str(),
            ]),
            _ => CommandLine::new(&self.tools.docker).args(["-H", self.endpoint.as_str()]),
        }
    }

    fn op(&self, verb: &str) -> String {
        format!("{} {}", self.kind, verb)
    }

    async fn run(&self, verb: &str, cmd: CommandLine) -> Result<Vec<u8>, AdapterError> {
        run_checked(self.runner.as_ref(), &self.op(verb), &cmd)
            .await
            .map(|output| output.stdout)
    }

    async fn load(&self, image_tar: &Path) -> Result<ImageId, AdapterError> {
        let stdout = self
            .run("load", self.cli().args(["load", "-i"]).arg(image_tar))
            .await?;
        let output = String::from_utf8_lossy(&stdout);

        parse_loaded_image(&output)
            .map(ImageId::new)
            .ok_or_else(|| AdapterError::UnexpectedOutput {
                operation: self.op("load"),
                output: format!("image not found in load output: {}", output.trim()),
            })
    }

    async fn create(&self, image: &ImageId) -> Result<ContainerId, AdapterError> {
        let stdout = self
            .run("create", self.cli().args(["create", image.as_str()]))
            .await?;
        let id = String::from_utf8_lossy(&stdout).trim().to_string();
        if id.is_empty() {
            return Err(AdapterError::UnexpectedOutput {
                operation: self.op("create"),
                output: "empty container id".to_string(),
            });
        }
        Ok(ContainerId::new(id))
    }

    async fn export(&self, container_id: &str, output_tar: &Path) -> Result<(), AdapterError> {
        self.run(
            "export",
            self.cli()
                .args(["export", container_id.trim(), "-o"])
                .arg(output_tar),
        )
        .await?;
        Ok(())
    }

    /// Best-effort teardown; failures are logged.
    async fn remove_container(&self, container: &ContainerId) {
        let rm = self.cli().args(["container", "rm", container.as_str()]);
        if let Err(e) = run_checked(self.runner.as_ref(), &self.op("container rm"), &rm).await {
            tracing::warn!("failed to delete container {}: {}", container, e);
        }
    }

    /// Best-effort; failures are logged.
    async fn remove_image(&self, image: &ImageId) {
        let rm = self.cli().args(["image", "rm", image.as_str()]);
        if let Err(e) = run_checked(self.runner.as_ref(), &self.op("image rm"), &rm).await {
            tracing::warn!("failed to delete image {}: {}", image, e);
        }
    }
}

impl Sealed for EngineRuntime {}

impl RuntimeInfo for EngineRuntime {
    fn kind(&self) -> RuntimeKind {
        self.kind
    }

    fn socket(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageOps for EngineRuntime {
    async fn extract_image(
        &self,
        image_id: &str,
        _image_name: &str,
        dest: &Path,
    ) -> Result<(), AdapterError> {
        let save = self.cli().args(["save", image_id.trim()]);
        let untar = CommandLine::new(&self.tools.tar)
            .args(["xf", "-", "--warning=none"])
            .arg(format!("-C{}", dest.display()));

        pipe_checked(self.runner.as_ref(), &self.op("save | tar"), &save, &untar).await?;
        Ok(())
    }

    async fn get_image_id(&self, image_name: &str) -> Result<Vec<u8>, AdapterError> {
        self.run(
            "images",
            self.cli().args(["images", "-q", "--no-trunc", image_name]),
        )
        .await
    }

    async fn save(&self, image_name: &str, output: &Path) -> Result<Vec<u8>, AdapterError> {
        self.run("save", self.cli().args(["save", image_name, "-o"]).arg(output))
            .await
    }
}

#[async_trait]
impl FilesystemOps for EngineRuntime {
    async fn extract_file_system(
        &self,
        image_tar: &Path,
        output_tar: &Path,
        _image_name: &str,
    ) -> Result<(), AdapterError> {
        let image = self.load(image_tar).await?;
        let container = match self.create(&image).await {
            Ok(container) => container,
            Err(e) => {
                self.remove_image(&image).await;
                return Err(e);
            }
        };

        let exported = self.export(container.as_str(), output_tar).await;
        self.remove_container(&container).await;
        self.remove_image(&image).await;
        exported
    }

    async fn extract_file_system_container(
        &self,
        container_id: &str,
        _namespace: Option<&str>,
        output_tar: &Path,
    ) -> Result<(), AdapterError> {
        self.export(container_id, output_tar).await
    }
}
