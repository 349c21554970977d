// ABOUTME: Runtime identity trait for container runtime adapters.
// ABOUTME: Exposes the kind and the endpoint an adapter is bound to.

use super::sealed::Sealed;
use crate::runtime::types::RuntimeKind;

/// Identity of a bound runtime adapter.
pub trait RuntimeInfo: Sealed + Send + Sync {
    /// The runtime kind this adapter drives.
    fn kind(&self) -> RuntimeKind;

    /// The endpoint this adapter was bound to.
    fn socket(&self) -> &str;
}
