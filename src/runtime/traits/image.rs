// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Resolve image IDs, save archives, and extract image layers to a directory.

use super::error::AdapterError;
use super::sealed::Sealed;
use async_trait::async_trait;
use std::path::Path;

/// Image operations: resolve, save, extract.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Materialize the image's layers as an extracted tree under `dest`.
    async fn extract_image(
        &self,
        image_id: &str,
        image_name: &str,
        dest: &Path,
    ) -> Result<(), AdapterError>;

    /// Resolve an image reference to its content-addressed ID (raw tool output).
    async fn get_image_id(&self, image_name: &str) -> Result<Vec<u8>, AdapterError>;

    /// Write the raw image archive to `output`.
    async fn save(&self, image_name: &str, output: &Path) -> Result<Vec<u8>, AdapterError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, image_name: &str) -> Result<bool, AdapterError> {
        let id = self.get_image_id(image_name).await?;
        Ok(!String::from_utf8_lossy(&id).trim().is_empty())
    }
}
