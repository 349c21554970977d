// ABOUTME: Sealed marker for the adapter capability traits.
// ABOUTME: Only the in-crate Docker, Podman, containerd and CRI-O adapters implement it.

/// Marker that keeps the capability traits closed to outside implementations,
/// so methods can be added to them without breaking callers.
pub trait Sealed {}
