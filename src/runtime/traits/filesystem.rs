// ABOUTME: Filesystem flattening trait for container runtimes.
// ABOUTME: Produces a single tarball of an image's or a running container's merged filesystem.

use super::error::AdapterError;
use super::sealed::Sealed;
use async_trait::async_trait;
use std::path::Path;

/// Filesystem flattening operations.
#[async_trait]
pub trait FilesystemOps: Sealed + Send + Sync {
    /// Flatten an on-disk image archive into `output_tar`.
    ///
    /// Imports the archive, creates an ephemeral container that is never started,
    /// archives its filesystem, then removes the container and any scratch state on
    /// every exit path.
    async fn extract_file_system(
        &self,
        image_tar: &Path,
        output_tar: &Path,
        image_name: &str,
    ) -> Result<(), AdapterError>;

    /// Flatten the filesystem of an existing container into `output_tar`.
    ///
    /// `namespace` only matters for containerd; `None` uses the adapter default.
    async fn extract_file_system_container(
        &self,
        container_id: &str,
        namespace: Option<&str>,
        output_tar: &Path,
    ) -> Result<(), AdapterError>;
}
