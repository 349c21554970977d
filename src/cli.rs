// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use keel::output::OutputMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Detect the local container runtime and extract image and container filesystems")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: keel.yml, keel.yaml or .keel/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputMode::Normal, global = true)]
    pub format: OutputMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the container runtime and record it in the env file
    Detect {
        /// Env file to write (overrides the configured one)
        #[arg(long)]
        env_file: Option<PathBuf>,
    },

    /// Probe every candidate endpoint and report the results
    Probe,

    /// Print the ID of a local image
    ImageId {
        /// Image reference
        image: String,
    },

    /// Check whether an image exists locally
    ImageExists {
        /// Image reference
        image: String,
    },

    /// Save an image archive
    Save {
        /// Image reference
        image: String,

        /// Archive path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Extract an image's layers into a directory
    ExtractImage {
        /// Image reference
        image: String,

        /// Image ID (resolved from the reference when omitted)
        #[arg(long)]
        image_id: Option<String>,

        /// Destination directory
        #[arg(short, long)]
        dest: PathBuf,
    },

    /// Flatten an image archive into a single filesystem tarball
    ExtractFs {
        /// Image archive
        image_tar: PathBuf,

        /// Image name recorded on import
        #[arg(long)]
        image: String,

        /// Output tarball
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Flatten an existing container's filesystem into a tarball
    ExtractContainer {
        /// Container ID
        container: String,

        /// containerd namespace (default from config)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Output tarball
        #[arg(short, long)]
        output: PathBuf,
    },
}
