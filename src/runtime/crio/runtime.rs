// ABOUTME: CrioRuntime struct and its image and filesystem operations.
// ABOUTME: Images live in the shared containers/storage, read directly by the local podman CLI.

use crate::runtime::oci::tarball_is_readable;
use crate::runtime::process::{CommandLine, CommandRunner, run_checked};
use crate::runtime::tools::ToolPaths;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{AdapterError, FilesystemOps, ImageOps, RuntimeInfo};
use crate::runtime::types::RuntimeKind;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

const ROOT_PATH_TEMPLATE: &str = "{{ .info.runtimeSpec.root.path }}";

/// Container runtime adapter for CRI-O.
pub struct CrioRuntime {
    endpoint: String,
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
}

impl CrioRuntime {
    pub fn new(
        endpoint: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        tools: ToolPaths,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            runner,
            tools,
        }
    }

    fn podman_save(&self, format: &str, output: &Path, image_name: &str) -> CommandLine {
        CommandLine::new(&self.tools.podman)
            .args(["save", "--events-backend", "file", "--format", format, "--output"])
            .arg(output)
            .arg(image_name)
    }

    async fn root_path(&self, container_id: &str) -> Result<String, AdapterError> {
        let cmd = CommandLine::new(&self.tools.crictl).args([
            "--runtime-endpoint",
            self.endpoint.as_str(),
            "inspect",
            "--output",
            "go-template",
            "--template",
            ROOT_PATH_TEMPLATE,
            container_id,
        ]);
        let output = run_checked(self.runner.as_ref(), "crictl inspect", &cmd).await?;

        let root = output.stdout_str().trim().trim_matches('"').to_string();
        if root.is_empty() {
            return Err(AdapterError::UnexpectedOutput {
                operation: "crictl inspect".to_string(),
                output: format!("container root path is empty for {}", container_id),
            });
        }
        tracing::debug!("container {} root path {}", container_id, root);
        Ok(root)
    }
}

impl Sealed for CrioRuntime {}

impl RuntimeInfo for CrioRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Crio
    }

    fn socket(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageOps for CrioRuntime {
    async fn extract_image(
        &self,
        _image_id: &str,
        image_name: &str,
        dest: &Path,
    ) -> Result<(), AdapterError> {
        let cmd = self.podman_save("docker-dir", dest, image_name);
        run_checked(self.runner.as_ref(), "podman save", &cmd).await?;
        Ok(())
    }

    async fn get_image_id(&self, image_name: &str) -> Result<Vec<u8>, AdapterError> {
        let cmd = CommandLine::new(&self.tools.podman).args([
            "inspect",
            image_name,
            "--type",
            "image",
            "--format",
            "{{ .ID }}",
        ]);
        Ok(run_checked(self.runner.as_ref(), "podman inspect", &cmd)
            .await?
            .stdout)
    }

    async fn save(&self, image_name: &str, output: &Path) -> Result<Vec<u8>, AdapterError> {
        let cmd = self.podman_save("docker-archive", output, image_name);
        Ok(run_checked(self.runner.as_ref(), "podman save", &cmd)
            .await?
            .stdout)
    }
}

#[async_trait]
impl FilesystemOps for CrioRuntime {
    async fn extract_file_system(
        &self,
        _image_tar: &Path,
        _output_tar: &Path,
        _image_name: &str,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported {
            operation: "extract_file_system",
            runtime: RuntimeKind::Crio,
        })
    }

    /// Archive the container's root path. `tar` often exits non-zero on files that
    /// vanish mid-read; that is only an error if the archive is unusable.
    async fn extract_file_system_container(
        &self,
        container_id: &str,
        _namespace: Option<&str>,
        output_tar: &Path,
    ) -> Result<(), AdapterError> {
        let root = self.root_path(container_id.trim()).await?;

        let cmd = CommandLine::new(&self.tools.tar)
            .arg("-cf")
            .arg(output_tar)
            .args(["-C", root.as_str(), "."]);
        let output = self.runner.run(&cmd).await?;
        if output.success() {
            return Ok(());
        }

        if tarball_is_readable(output_tar) {
            tracing::warn!(
                "tar exited with {:?} for container {} but {} is readable",
                output.code,
                container_id,
                output_tar.display()
            );
            return Ok(());
        }

        tracing::error!("command failed: {}", cmd);
        Err(AdapterError::CommandFailed {
            operation: "tar archive".to_string(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}
