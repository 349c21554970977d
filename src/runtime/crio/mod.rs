// ABOUTME: CRI-O runtime implementation using podman for images and crictl for containers.
// ABOUTME: Image-archive flattening is not available for CRI-O.

mod runtime;

pub use runtime::CrioRuntime;
