// ABOUTME: Endpoint string parsing for runtime control sockets.
// ABOUTME: Normalizes unix:// and tcp:// URLs, falling back to a default scheme for bare paths.

use std::path::{Path, PathBuf};
use url::Url;

/// Scheme assumed for endpoints written without one.
pub const UNIX_PROTOCOL: &str = "unix";

/// Transport named by an endpoint scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Unix,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Unix => "unix",
            Protocol::Tcp => "tcp",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of parsing an endpoint string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEndpoint {
    pub protocol: Protocol,
    /// Socket path for `unix`, `host[:port]` for `tcp`.
    pub address: String,
    /// True when the raw string had no scheme and the fallback protocol was applied.
    pub deprecated_form: bool,
}

impl ParsedEndpoint {
    /// Socket path of a unix endpoint.
    pub fn socket_path(&self) -> &Path {
        Path::new(&self.address)
    }

    /// Canonical `scheme://address` form, as the runtime CLIs expect it.
    pub fn url(&self) -> String {
        format!("{}://{}", self.protocol, self.address)
    }
}

/// Errors from endpoint parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("protocol {0:?} not supported")]
    UnsupportedProtocol(String),

    #[error("malformed endpoint {endpoint:?}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("only unix socket endpoints are supported, got {0:?}")]
    NotUnix(String),
}

enum Failure {
    NoScheme,
    Unsupported(String),
    Malformed(String),
}

/// Parse `raw` into protocol and address.
///
/// A string without a scheme is retried as `<fallback>://<raw>`; when that
/// succeeds the result is flagged as deprecated and a warning is logged.
/// Pure apart from that log line.
pub fn parse(raw: &str, fallback: &str) -> Result<ParsedEndpoint, ParseError> {
    match parse_direct(raw) {
        Ok((protocol, address)) => Ok(ParsedEndpoint {
            protocol,
            address,
            deprecated_form: false,
        }),
        Err(Failure::NoScheme) => {
            let fallback_endpoint = format!("{fallback}://{raw}");
            match parse_direct(&fallback_endpoint) {
                Ok((protocol, address)) => {
                    tracing::warn!(
                        "using {:?} as endpoint is deprecated, \
                         please consider using full url format {:?}",
                        raw,
                        fallback_endpoint
                    );
                    Ok(ParsedEndpoint {
                        protocol,
                        address,
                        deprecated_form: true,
                    })
                }
                Err(Failure::Unsupported(scheme)) => Err(ParseError::UnsupportedProtocol(scheme)),
                Err(Failure::Malformed(reason)) => Err(ParseError::Malformed {
                    endpoint: raw.to_string(),
                    reason,
                }),
                Err(Failure::NoScheme) => Err(ParseError::Malformed {
                    endpoint: raw.to_string(),
                    reason: "missing scheme".to_string(),
                }),
            }
        }
        Err(Failure::Unsupported(scheme)) => Err(ParseError::UnsupportedProtocol(scheme)),
        Err(Failure::Malformed(reason)) => Err(ParseError::Malformed {
            endpoint: raw.to_string(),
            reason,
        }),
    }
}

/// Parse an endpoint that must resolve to a unix socket.
pub fn parse_unix(raw: &str) -> Result<ParsedEndpoint, ParseError> {
    let parsed = parse(raw, UNIX_PROTOCOL)?;
    if parsed.protocol != Protocol::Unix {
        return Err(ParseError::NotUnix(raw.to_string()));
    }
    Ok(parsed)
}

/// Socket path of a unix endpoint, for tools that want a bare path.
pub fn unix_socket_path(raw: &str) -> Result<PathBuf, ParseError> {
    parse_unix(raw).map(|parsed| PathBuf::from(parsed.address))
}

fn parse_direct(raw: &str) -> Result<(Protocol, String), Failure> {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => return Err(Failure::NoScheme),
        Err(e) => return Err(Failure::Malformed(e.to_string())),
    };

    match url.scheme() {
        "tcp" => {
            let host = url
                .host_str()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| Failure::Malformed("missing host".to_string()))?;
            let address = match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            Ok((Protocol::Tcp, address))
        }
        "unix" => {
            if url.host_str().is_some_and(|h| !h.is_empty()) {
                return Err(Failure::Malformed(
                    "unix endpoints need an absolute path (unix:///path)".to_string(),
                ));
            }
            let path = urlencoding::decode(url.path())
                .map_err(|e| Failure::Malformed(e.to_string()))?;
            if path.is_empty() || path == "/" {
                return Err(Failure::Malformed("missing socket path".to_string()));
            }
            Ok((Protocol::Unix, path.into_owned()))
        }
        other => Err(Failure::Unsupported(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_url() {
        let parsed = parse("unix:///var/run/docker.sock", UNIX_PROTOCOL).unwrap();
        assert_eq!(parsed.protocol, Protocol::Unix);
        assert_eq!(parsed.address, "/var/run/docker.sock");
        assert!(!parsed.deprecated_form);
    }

    #[test]
    fn tcp_url_keeps_port() {
        let parsed = parse("tcp://127.0.0.1:2375", UNIX_PROTOCOL).unwrap();
        assert_eq!(parsed.protocol, Protocol::Tcp);
        assert_eq!(parsed.address, "127.0.0.1:2375");
    }

    #[test]
    fn bare_path_uses_fallback() {
        let bare = parse("/run/containerd/containerd.sock", UNIX_PROTOCOL).unwrap();
        let full = parse("unix:///run/containerd/containerd.sock", UNIX_PROTOCOL).unwrap();
        assert_eq!(bare.protocol, full.protocol);
        assert_eq!(bare.address, full.address);
        assert!(bare.deprecated_form);
    }

    #[test]
    fn unsupported_scheme() {
        let err = parse("http://localhost/", UNIX_PROTOCOL).unwrap_err();
        assert_eq!(err, ParseError::UnsupportedProtocol("http".to_string()));
    }

    #[test]
    fn empty_is_malformed() {
        assert!(matches!(
            parse("", UNIX_PROTOCOL),
            Err(ParseError::Malformed { .. })
        ));
    }

    #[test]
    fn relative_unix_path_rejected() {
        assert!(matches!(
            parse("unix://var/run/docker.sock", UNIX_PROTOCOL),
            Err(ParseError::Malformed { .. })
        ));
    }

    #[test]
    fn percent_encoded_path_is_decoded() {
        let parsed = parse("unix:///tmp/my%20dir/rt.sock", UNIX_PROTOCOL).unwrap();
        assert_eq!(parsed.address, "/tmp/my dir/rt.sock");
    }

    #[test]
    fn tcp_is_not_unix() {
        assert_eq!(
            parse_unix("tcp://localhost:2375").unwrap_err(),
            ParseError::NotUnix("tcp://localhost:2375".to_string())
        );
        assert_eq!(
            unix_socket_path("unix:///run/podman/podman.sock").unwrap(),
            PathBuf::from("/run/podman/podman.sock")
        );
    }
}
