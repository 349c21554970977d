// ABOUTME: Composable capability traits for container runtime adapters.
// ABOUTME: Defines ImageOps, FilesystemOps, RuntimeInfo and the FullRuntime bundle.

mod error;
mod filesystem;
mod image;
mod runtime_info;
pub(crate) mod sealed;

pub use error::AdapterError;
pub use filesystem::FilesystemOps;
pub use image::ImageOps;
pub use runtime_info::RuntimeInfo;

/// Every capability an adapter offers. Implemented automatically.
pub trait FullRuntime: RuntimeInfo + ImageOps + FilesystemOps {}

impl<T> FullRuntime for T where T: RuntimeInfo + ImageOps + FilesystemOps {}
