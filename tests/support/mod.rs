// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup, scripted probers and runners, and fake runtime sockets.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use keel::runtime::{
    AdapterError, CommandLine, CommandOutput, CommandRunner, Confirmation, ProbeError, ProbeResult,
    Prober, RuntimeKind,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Mutex, Once};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("keel=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
#[derive(Clone)]
enum Script {
    Active(usize),
    Idle,
    Unconfirmed,
    Unreachable,
}

/// Prober answering from a script keyed by endpoint.
///
/// Endpoints without a script are reported unreachable.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockProber {
    scripts: HashMap<String, (Script, Duration)>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(mut self, endpoint: &str, script: Script) -> Self {
        let delay = self
            .scripts
            .get(endpoint)
            .map(|(_, d)| *d)
            .unwrap_or_default();
        self.scripts.insert(endpoint.to_string(), (script, delay));
        self
    }

    /// Reachable and confirmed with `objects` containers.
    pub fn active(self, endpoint: &str, objects: usize) -> Self {
        self.script(endpoint, Script::Active(objects))
    }

    /// Reachable, answered, nothing running.
    pub fn idle(self, endpoint: &str) -> Self {
        self.script(endpoint, Script::Idle)
    }

    /// Reachable but the introspection call failed.
    pub fn unconfirmed(self, endpoint: &str) -> Self {
        self.script(endpoint, Script::Unconfirmed)
    }

    pub fn unreachable(self, endpoint: &str) -> Self {
        self.script(endpoint, Script::Unreachable)
    }

    /// Delay the answer for `endpoint`.
    pub fn delay(mut self, endpoint: &str, delay: Duration) -> Self {
        let entry = self
            .scripts
            .entry(endpoint.to_string())
            .or_insert((Script::Unreachable, Duration::ZERO));
        entry.1 = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(&self, kind: RuntimeKind, endpoint: &str, _timeout: Duration) -> ProbeResult {
        self.calls.lock().unwrap().push(endpoint.to_string());
        let (script, delay) = self
            .scripts
            .get(endpoint)
            .cloned()
            .unwrap_or((Script::Unreachable, Duration::ZERO));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match script {
            Script::Active(objects) => ProbeResult::answered(
                kind,
                endpoint,
                Confirmation {
                    active: true,
                    objects: Some(objects),
                },
            ),
            Script::Idle => ProbeResult::answered(
                kind,
                endpoint,
                Confirmation {
                    active: false,
                    objects: Some(0),
                },
            ),
            Script::Unconfirmed => ProbeResult::unconfirmed(
                kind,
                endpoint,
                ProbeError::Confirm {
                    endpoint: endpoint.to_string(),
                    reason: "scripted failure".to_string(),
                },
            ),
            Script::Unreachable => ProbeResult::unreachable(
                kind,
                endpoint,
                ProbeError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".to_string(),
                },
            ),
        }
    }
}

#[allow(dead_code)]
struct Rule {
    program: String,
    args: Vec<String>,
    output: CommandOutput,
}

#[allow(dead_code)]
impl Rule {
    fn matches(&self, command: &CommandLine) -> bool {
        command.program == self.program && self.args.iter().all(|a| command.has_arg(a))
    }
}

/// Command runner that records every invocation and answers from rules.
///
/// The first rule whose program matches and whose arguments all appear in the
/// command wins; unmatched commands succeed with empty output.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandLine>>,
}

#[allow(dead_code)]
impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(mut self, program: &str, args: &[&str], output: CommandOutput) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            output,
        });
        self
    }

    /// Succeed with `stdout`.
    pub fn respond(self, program: &str, args: &[&str], stdout: &str) -> Self {
        self.rule(
            program,
            args,
            CommandOutput {
                code: Some(0),
                stdout: stdout.as_bytes().to_vec(),
                stderr: String::new(),
            },
        )
    }

    /// Exit 1 with `stderr`.
    pub fn fail(self, program: &str, args: &[&str], stderr: &str) -> Self {
        self.rule(
            program,
            args,
            CommandOutput {
                code: Some(1),
                stdout: Vec::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    fn answer(&self, command: &CommandLine) -> CommandOutput {
        self.calls.lock().unwrap().push(command.clone());
        self.rules
            .iter()
            .find(|r| r.matches(command))
            .map(|r| r.output.clone())
            .unwrap_or(CommandOutput {
                code: Some(0),
                stdout: Vec::new(),
                stderr: String::new(),
            })
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls to `program` carrying every one of `args`.
    pub fn count(&self, program: &str, args: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == program && args.iter().all(|a| c.has_arg(a)))
            .count()
    }

    /// First recorded call to `program` carrying every one of `args`.
    pub fn find(&self, program: &str, args: &[&str]) -> Option<CommandLine> {
        self.calls()
            .into_iter()
            .find(|c| c.program == program && args.iter().all(|a| c.has_arg(a)))
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput, AdapterError> {
        Ok(self.answer(command))
    }

    async fn pipe(
        &self,
        producer: &CommandLine,
        consumer: &CommandLine,
    ) -> Result<CommandOutput, AdapterError> {
        let upstream = self.answer(producer);
        let downstream = self.answer(consumer);
        if upstream.success() {
            Ok(downstream)
        } else {
            Ok(upstream)
        }
    }
}

/// Serve HTTP/2 on `listener`, answering every request with an empty gRPC response.
#[allow(dead_code)]
pub fn serve_grpc(listener: UnixListener) {
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(|_request: Request<Incoming>| async {
                    let mut response = Response::new(Empty::<Bytes>::new());
                    response
                        .headers_mut()
                        .insert("content-type", "application/grpc".parse().unwrap());
                    Ok::<_, Infallible>(response)
                });
                let _ = hyper::server::conn::http2::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
}

/// Answer every connection on `listener` with one raw HTTP/1.1 `response`, then close.
#[allow(dead_code)]
pub fn serve_http1(listener: UnixListener, response: impl Into<String>) {
    let response = response.into();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
}

/// A `200 OK` carrying a JSON `body`.
#[allow(dead_code)]
pub fn json_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}
