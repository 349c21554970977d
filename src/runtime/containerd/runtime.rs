// ABOUTME: ContainerdRuntime struct and its image and filesystem operations.
// ABOUTME: Ephemeral extraction runs in a scratch namespace and always tears down what it created.

use crate::runtime::endpoint::unix_socket_path;
use crate::runtime::mount::{MountSpec, ScratchMount};
use crate::runtime::oci::migrate_oci_to_docker_v1;
use crate::runtime::process::{CommandLine, CommandRunner, pipe_checked, run_checked};
use crate::runtime::tools::ToolPaths;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{AdapterError, FilesystemOps, ImageOps, RuntimeInfo};
use crate::runtime::types::RuntimeKind;
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Namespace holding Kubernetes-managed containers.
pub const DEFAULT_NAMESPACE: &str = "k8s.io";

/// Namespace ephemeral extraction images and containers are created in.
pub const SCRATCH_NAMESPACE: &str = "keel-extract";

/// Image references printed by `ctr images import`.
///
/// Each imported image is reported as `unpacking <ref> (sha256:...)...done`.
pub fn parse_imported_images(output: &str) -> Vec<ImageId> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("unpacking "))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(ImageId::new)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ContainerRecord {
    #[serde(rename = "Snapshotter")]
    snapshotter: String,
    #[serde(rename = "SnapshotKey")]
    snapshot_key: String,
}

/// Container runtime adapter for containerd.
pub struct ContainerdRuntime {
    endpoint: String,
    address: String,
    namespace: String,
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
}

impl ContainerdRuntime {
    /// Bind to the containerd socket at `endpoint`.
    ///
    /// `namespace` is used by container extraction when the caller names none.
    pub fn new(
        endpoint: impl Into<String>,
        namespace: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        tools: ToolPaths,
    ) -> Result<Self, AdapterError> {
        let endpoint = endpoint.into();
        let address = unix_socket_path(&endpoint)?.display().to_string();
        Ok(Self {
            endpoint,
            address,
            namespace: namespace.into(),
            runner,
            tools,
        })
    }

    fn nerdctl(&self) -> CommandLine {
        CommandLine::new(&self.tools.nerdctl).args(["--address", self.address.as_str()])
    }

    fn ctr(&self, namespace: &str) -> CommandLine {
        CommandLine::new(&self.tools.ctr).args([
            "--address",
            self.address.as_str(),
            "-n",
            namespace,
        ])
    }

    async fn run(&self, operation: &str, cmd: CommandLine) -> Result<Vec<u8>, AdapterError> {
        run_checked(self.runner.as_ref(), operation, &cmd)
            .await
            .map(|output| output.stdout)
    }

    /// Namespaces known to the daemon.
    pub async fn namespaces(&self) -> Result<Vec<String>, AdapterError> {
        let cmd = CommandLine::new(&self.tools.ctr).args([
            "--address",
            self.address.as_str(),
            "namespaces",
            "ls",
            "-q",
        ]);
        Ok(run_checked(self.runner.as_ref(), "ctr namespaces ls", &cmd)
            .await?
            .lines())
    }

    async fn import(
        &self,
        image_tar: &Path,
        image_name: &str,
    ) -> Result<Vec<ImageId>, AdapterError> {
        let cmd = self
            .ctr(SCRATCH_NAMESPACE)
            .args(["images", "import", "--base-name", image_name, "--digests"])
            .arg(image_tar);
        let stdout = self.run("ctr images import", cmd).await?;

        let images = parse_imported_images(&String::from_utf8_lossy(&stdout));
        if images.is_empty() {
            return Err(AdapterError::UnexpectedOutput {
                operation: "ctr images import".to_string(),
                output: format!("image not imported from {}", image_tar.display()),
            });
        }
        Ok(images)
    }

    async fn remove_images(&self, images: &[ImageId]) {
        let cmd = self
            .ctr(SCRATCH_NAMESPACE)
            .args(["images", "rm", "--sync"])
            .args(images.iter().map(ImageId::as_str));
        if let Err(e) = run_checked(self.runner.as_ref(), "ctr images rm", &cmd).await {
            tracing::warn!("failed to delete imported images: {}", e);
        }
    }

    /// Create a never-started container from `image`, archive it, delete it.
    async fn flatten_ephemeral(
        &self,
        image: &ImageId,
        output_tar: &Path,
    ) -> Result<(), AdapterError> {
        let uuid = Uuid::new_v4().simple().to_string();
        let container = ContainerId::new(format!("keel-{}", &uuid[..12]));

        let create = self
            .ctr(SCRATCH_NAMESPACE)
            .args(["containers", "create", image.as_str(), container.as_str()]);
        self.run("ctr containers create", create).await?;

        let archived = self
            .archive_container(SCRATCH_NAMESPACE, &container, output_tar)
            .await;

        let rm = self
            .ctr(SCRATCH_NAMESPACE)
            .args(["containers", "rm", container.as_str()]);
        if let Err(e) = run_checked(self.runner.as_ref(), "ctr containers rm", &rm).await {
            tracing::warn!("failed to delete container {}: {}", container, e);
        }

        archived
    }

    async fn resolve_mount(
        &self,
        namespace: &str,
        container: &ContainerId,
        target: &Path,
    ) -> Result<MountSpec, AdapterError> {
        let info = self
            .run(
                "ctr containers info",
                self.ctr(namespace).args(["containers", "info", container.as_str()]),
            )
            .await?;
        let record: ContainerRecord =
            serde_json::from_slice(&info).map_err(|e| AdapterError::UnexpectedOutput {
                operation: "ctr containers info".to_string(),
                output: e.to_string(),
            })?;

        let mounts = self
            .run(
                "ctr snapshots mounts",
                self.ctr(namespace)
                    .args(["snapshots", "--snapshotter", record.snapshotter.as_str(), "mounts"])
                    .arg(target)
                    .arg(&record.snapshot_key),
            )
            .await?;
        MountSpec::parse(&String::from_utf8_lossy(&mounts))
    }

    /// Mount the container's snapshot next to `output_tar` and archive it.
    async fn archive_container(
        &self,
        namespace: &str,
        container: &ContainerId,
        output_tar: &Path,
    ) -> Result<(), AdapterError> {
        let target = scratch_target(output_tar, container.as_str());
        let spec = self.resolve_mount(namespace, container, &target).await?;

        let mount = ScratchMount::acquire(self.runner.as_ref(), &self.tools, &spec, target).await?;
        let tar = CommandLine::new(&self.tools.tar)
            .arg("-czf")
            .arg(output_tar)
            .arg("-C")
            .arg(mount.target())
            .arg(".");
        let archived = run_checked(self.runner.as_ref(), "tar archive", &tar).await;
        mount.release().await;

        archived.map(drop)
    }
}

/// Mount point for `id`, derived from the output path without its `.tar` suffix.
fn scratch_target(output_tar: &Path, id: &str) -> PathBuf {
    let output = output_tar.to_string_lossy();
    let stem = output.strip_suffix(".tar").unwrap_or(&output);
    PathBuf::from(format!("{}-{}", stem, id))
}

impl Sealed for ContainerdRuntime {}

impl RuntimeInfo for ContainerdRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Containerd
    }

    fn socket(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageOps for ContainerdRuntime {
    async fn extract_image(
        &self,
        image_id: &str,
        image_name: &str,
        dest: &Path,
    ) -> Result<(), AdapterError> {
        let save = self.nerdctl().args(["save", image_name]);
        let untar = CommandLine::new(&self.tools.tar)
            .args(["xf", "-", "--warning=none"])
            .arg(format!("-C{}", dest.display()));
        pipe_checked(self.runner.as_ref(), "nerdctl save | tar", &save, &untar).await?;

        migrate_oci_to_docker_v1(self.runner.as_ref(), &self.tools, dest, image_id).await
    }

    async fn get_image_id(&self, image_name: &str) -> Result<Vec<u8>, AdapterError> {
        self.run(
            "nerdctl images",
            self.nerdctl().args(["images", "-q", "--no-trunc", image_name]),
        )
        .await
    }

    /// Try every namespace in turn; the first that has the image wins.
    async fn save(&self, image_name: &str, output: &Path) -> Result<Vec<u8>, AdapterError> {
        let namespaces = self.namespaces().await?;

        let mut failures = Vec::with_capacity(namespaces.len());
        for namespace in &namespaces {
            let cmd = self
                .nerdctl()
                .args(["-n", namespace.as_str(), "save", "-o"])
                .arg(output)
                .arg(image_name);
            match run_checked(self.runner.as_ref(), "nerdctl save", &cmd).await {
                Ok(out) => return Ok(out.stdout),
                Err(e) => failures.push(format!("namespace {}: {}", namespace, e)),
            }
        }

        if failures.is_empty() {
            failures.push("no namespaces found".to_string());
        }
        Err(AdapterError::CommandFailed {
            operation: "nerdctl save".to_string(),
            code: None,
            stderr: failures.join("\n"),
        })
    }
}

#[async_trait]
impl FilesystemOps for ContainerdRuntime {
    async fn extract_file_system(
        &self,
        image_tar: &Path,
        output_tar: &Path,
        image_name: &str,
    ) -> Result<(), AdapterError> {
        let images = self.import(image_tar, image_name).await?;
        let flattened = self.flatten_ephemeral(&images[0], output_tar).await;
        self.remove_images(&images).await;
        flattened
    }

    async fn extract_file_system_container(
        &self,
        container_id: &str,
        namespace: Option<&str>,
        output_tar: &Path,
    ) -> Result<(), AdapterError> {
        let namespace = namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or(self.namespace.as_str());
        let container = ContainerId::new(container_id.trim());
        self.archive_container(namespace, &container, output_tar)
            .await
    }
}
