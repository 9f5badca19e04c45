//! Command-line surface: one `build` subcommand mapping 1:1 onto the build
//! options, plus a thin `tag` subcommand delegating to the backend.

use clap::{Args, Parser, Subcommand};

use crate::constants::DEFAULT_BACKEND_ADDR;
use crate::progress::ProgressMode;
use crate::solve::BuildOptions;

#[derive(Debug, Parser)]
#[command(
    name = "imagectl",
    version,
    about = "Build and tag container images on a remote build backend"
)]
pub struct Cli {
    /// Backend address
    #[arg(long, env = "IMAGECTL_ADDR", default_value = DEFAULT_BACKEND_ADDR, global = true)]
    pub addr: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build an image from a context directory
    Build(BuildArgs),
    /// Tag an image
    #[command(arg_required_else_help = true)]
    Tag(TagArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Build context path
    pub path: String,

    /// Name of the Dockerfile (default is 'PATH/Dockerfile')
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Set build-time variables
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_arg: Vec<String>,

    /// Set metadata for an image
    #[arg(long = "label", value_name = "KEY=VALUE")]
    pub label: Vec<String>,

    /// Add a custom host-to-IP mapping (host:ip)
    #[arg(long = "add-host", value_name = "HOST:IP")]
    pub add_host: Vec<String>,

    /// Name and optionally a tag in the 'name:tag' format
    #[arg(short = 't', long = "tag")]
    pub tag: Vec<String>,

    /// Set the target build stage to build
    #[arg(long)]
    pub target: Option<String>,

    /// Set type of progress output
    #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
    pub progress: ProgressMode,

    /// Always attempt to pull a newer version of the image
    #[arg(long)]
    pub pull: bool,
}

impl BuildArgs {
    pub fn into_options(self) -> BuildOptions {
        BuildOptions {
            context: self.path,
            file: self.file,
            target: self.target,
            build_args: self.build_arg,
            labels: self.label,
            add_hosts: self.add_host,
            tags: self.tag,
            pull: self.pull,
            progress: self.progress,
        }
    }
}

#[derive(Debug, Args)]
pub struct TagArgs {
    /// Source image reference
    pub source: String,

    /// Target references to apply
    #[arg(required = true)]
    pub targets: Vec<String>,
}
