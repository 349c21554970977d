// ABOUTME: containerd runtime implementation using nerdctl and ctr.
// ABOUTME: Image operations go through nerdctl; filesystem flattening through ctr snapshots.

mod runtime;

pub use runtime::{ContainerdRuntime, DEFAULT_NAMESPACE, SCRATCH_NAMESPACE, parse_imported_images};
