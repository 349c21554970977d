// ABOUTME: Integration tests for building the candidate registry from the environment.
// ABOUTME: Environment variables are scoped per test with temp-env.

use keel::runtime::{
    CONTAINERD_SOCKET, DOCKER_SOCKET, K3S_CONTAINERD_SOCKET, PODMAN_SOCKET, RuntimeKind,
    RuntimeRegistry,
};

const SOCKET_VARS: [&str; 4] = [
    "DOCKER_SOCKET_PATH",
    "CONTAINERD_SOCKET_PATH",
    "CRIO_SOCKET_PATH",
    "PODMAN_SOCKET_PATH",
];

fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
    let mut all: Vec<(&str, Option<&str>)> = SOCKET_VARS.iter().map(|v| (*v, None)).collect();
    all.push(("XDG_RUNTIME_DIR", None));
    for (name, value) in vars {
        all.retain(|(n, _)| n != name);
        all.push((*name, *value));
    }
    temp_env::with_vars(all, f)
}

fn endpoints(registry: &RuntimeRegistry, kind: RuntimeKind) -> Vec<String> {
    registry.endpoints(kind).unwrap().iter().cloned().collect()
}

#[test]
fn clean_environment_gives_builtin_candidates() {
    let registry = with_env(&[], RuntimeRegistry::from_env);

    assert_eq!(endpoints(&registry, RuntimeKind::Docker), vec![DOCKER_SOCKET]);
    assert_eq!(
        endpoints(&registry, RuntimeKind::Containerd),
        vec![CONTAINERD_SOCKET, K3S_CONTAINERD_SOCKET]
    );
    assert_eq!(endpoints(&registry, RuntimeKind::Podman), vec![PODMAN_SOCKET]);
    assert_eq!(registry.len(), 5);
}

#[test]
fn xdg_runtime_dir_adds_rootless_podman() {
    let registry = with_env(&[("XDG_RUNTIME_DIR", Some("/run/user/1000"))], || {
        RuntimeRegistry::from_env()
    });

    assert_eq!(
        endpoints(&registry, RuntimeKind::Podman),
        vec![PODMAN_SOCKET, "unix:///run/user/1000/podman/podman.sock"]
    );
}

#[test]
fn socket_overrides_extend_without_replacing() {
    let registry = with_env(
        &[
            ("CONTAINERD_SOCKET_PATH", Some("/custom/containerd.sock")),
            ("CRIO_SOCKET_PATH", Some("")),
        ],
        RuntimeRegistry::from_env,
    );

    assert_eq!(
        endpoints(&registry, RuntimeKind::Containerd),
        vec![
            CONTAINERD_SOCKET,
            K3S_CONTAINERD_SOCKET,
            "unix:///custom/containerd.sock"
        ]
    );
    assert_eq!(endpoints(&registry, RuntimeKind::Crio).len(), 1);
}

#[test]
fn candidates_are_ranked_in_registry_order() {
    let registry = with_env(&[], RuntimeRegistry::from_env);

    let candidates = registry.candidates();
    let ranks: Vec<_> = candidates.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, (0..candidates.len()).collect::<Vec<_>>());
    assert_eq!(candidates[0].kind, RuntimeKind::Docker);
    assert_eq!(candidates[2].endpoint, K3S_CONTAINERD_SOCKET);
    assert_eq!(candidates.last().unwrap().kind, RuntimeKind::Podman);
}
