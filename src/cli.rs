use clap::{Parser, Subcommand};
use std::path::PathBuf;
use upbox::MimePattern;
use upbox::humanize::ByteSize;

#[derive(Parser, Debug)]
#[command(name = "upbox")]
#[command(about = "Multipart file upload client", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $UPBOX_CONFIG or config/upbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload files to the configured endpoint as one multipart request
    Send(SendArgs),
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Files to upload, sent as file1, file2, ... in this order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Endpoint URL (overrides config)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Post to this URL instead of the configured endpoint, which must still be set
    #[arg(long, conflicts_with = "param")]
    pub url: Option<String>,

    /// Maximum number of files, 0 = unbounded
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Maximum total size (e.g. 50MB), 0 = unbounded
    #[arg(long)]
    pub max_bytes: Option<ByteSize>,

    /// Accepted MIME pattern, repeatable (e.g. --accept 'image/*')
    #[arg(long)]
    pub accept: Vec<MimePattern>,

    /// Query parameter appended to the endpoint, KEY=VALUE, repeatable
    #[arg(long, value_parser = parse_key_val)]
    pub param: Vec<(String, String)>,

    /// Extra form field sent with the files, KEY=VALUE, repeatable
    #[arg(long, value_parser = parse_key_val)]
    pub field: Vec<(String, String)>,

    /// Emit events as JSON lines
    #[arg(long)]
    pub json: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}
