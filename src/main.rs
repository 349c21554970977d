// ABOUTME: Entry point for the keel CLI application.
// ABOUTME: Parses arguments, wires config, detector and adapters, and dispatches commands.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use keel::config::Config;
use keel::envfile::EnvFile;
use keel::error::Result;
use keel::output::Output;
use keel::runtime::{
    AdapterError, CommandRunner, DetectionOutcome, Detector, FullRuntime, HostRunner, SocketProber,
    connect, detect_runtime,
};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.format);
    let result = run(cli, &mut output).await;

    if let Err(e) = result {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

/// Everything a command needs once configuration is loaded.
struct Context {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    detector: Detector,
}

impl Context {
    fn new(config: Config) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(HostRunner);
        let prober = SocketProber::new(Arc::clone(&runner), config.tools.clone());
        let detector = Detector::new(config.registry(|name| env::var(name).ok()), Arc::new(prober))
            .with_timeout(config.timeout);
        Self {
            config,
            runner,
            detector,
        }
    }

    async fn detect(&self, output: &Output) -> Result<DetectionOutcome> {
        let outcome =
            detect_runtime(&self.detector, self.config.runtime_override().as_ref()).await?;
        for warning in &outcome.warnings {
            output.warning(&warning.message);
        }
        Ok(outcome)
    }

    /// Detect, then bind the matching adapter.
    async fn adapter(&self, output: &Output) -> Result<Box<dyn FullRuntime>> {
        let outcome = self.detect(output).await?;
        output.progress(&format!(
            "Using {} at {}",
            outcome.kind, outcome.endpoint
        ));
        Ok(connect(
            outcome.kind,
            &outcome.endpoint,
            Arc::clone(&self.runner),
            self.config.tools.clone(),
            &self.config.namespace,
        )?)
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover_or_default(&env::current_dir()?),
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let ctx = Context::new(load_config(cli.config.as_deref())?);
    output.start_timer();

    match cli.command {
        Commands::Detect { env_file } => {
            let outcome = ctx.detect(output).await?;
            let path = env_file.unwrap_or_else(|| ctx.config.env_file.clone());
            let mut env_file = EnvFile::read_or_default(&path)?;
            env_file.record(&outcome);
            env_file.write(&path)?;

            output.progress(&format!("Wrote {}", path.display()));
            output.result(
                &format!("{} detected at {}", outcome.kind, outcome.endpoint),
                &outcome,
            );
        }
        Commands::Probe => {
            let results = ctx.detector.probe_all().await;
            let lines: Vec<String> = results
                .iter()
                .map(|r| {
                    let state = r.state();
                    match &r.error {
                        Some(e) => format!("{:<10} {:<48} {} ({})", r.kind, r.endpoint, state, e),
                        None => format!("{:<10} {:<48} {}", r.kind, r.endpoint, state),
                    }
                })
                .collect();
            output.result(&lines.join("\n"), &results);
        }
        Commands::ImageId { image } => {
            let runtime = ctx.adapter(output).await?;
            let id = image_id(runtime.as_ref(), &image).await?;
            output.result(&id, &serde_json::json!({ "image": image, "id": id }));
        }
        Commands::ImageExists { image } => {
            let runtime = ctx.adapter(output).await?;
            let exists = runtime.image_exists(&image).await?;
            let message = if exists {
                format!("Image {} exists", image)
            } else {
                format!("Image {} does not exist", image)
            };
            output.result(&message, &serde_json::json!({ "image": image, "exists": exists }));
        }
        Commands::Save {
            image,
            output: archive,
        } => {
            let runtime = ctx.adapter(output).await?;
            runtime.save(&image, &archive).await?;
            output.success(&format!("Saved {} to {}", image, archive.display()));
        }
        Commands::ExtractImage {
            image,
            image_id: id,
            dest,
        } => {
            let runtime = ctx.adapter(output).await?;
            let id = match id {
                Some(id) => id,
                None => image_id(runtime.as_ref(), &image).await?,
            };
            tokio::fs::create_dir_all(&dest).await?;
            runtime.extract_image(&id, &image, &dest).await?;
            output.success(&format!("Extracted {} into {}", image, dest.display()));
        }
        Commands::ExtractFs {
            image_tar,
            image,
            output: tarball,
        } => {
            let runtime = ctx.adapter(output).await?;
            runtime
                .extract_file_system(&image_tar, &tarball, &image)
                .await?;
            output.success(&format!("Flattened {} into {}", image, tarball.display()));
        }
        Commands::ExtractContainer {
            container,
            namespace,
            output: tarball,
        } => {
            let runtime = ctx.adapter(output).await?;
            runtime
                .extract_file_system_container(&container, namespace.as_deref(), &tarball)
                .await?;
            output.success(&format!(
                "Flattened container {} into {}",
                container,
                tarball.display()
            ));
        }
    }

    Ok(())
}

/// Resolve an image reference to its ID; an empty answer means the image is absent.
async fn image_id(runtime: &dyn FullRuntime, image: &str) -> Result<String> {
    let raw = runtime.get_image_id(image).await?;
    let id = String::from_utf8_lossy(&raw)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if id.is_empty() {
        return Err(AdapterError::UnexpectedOutput {
            operation: format!("{} image lookup", runtime.kind()),
            output: format!("image {} not found", image),
        }
        .into());
    }
    Ok(id)
}
