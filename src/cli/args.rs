use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::fetch::{Browser, MediaFormat};

#[derive(Parser, Debug)]
#[command(name = "universal-downloader")]
#[command(version)]
#[command(about = "Download audio or video from almost any website through yt-dlp", long_about = None)]
#[command(arg_required_else_help = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub download: DownloadArgs,

    /// Show debug logs and the raw yt-dlp output on failure
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress log output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Use custom config file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default)]
pub struct DownloadArgs {
    /// Page URL to download from
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Save directory (default: ~/Downloads/Audio|Video/<site>)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Extract audio only (the default; wins over --video)
    #[arg(short = 'a', long)]
    pub audio: bool,

    /// Download video instead of audio
    #[arg(short = 'v', long)]
    pub video: bool,

    /// Audio: mp3|m4a|wav|flac|opus, video: mp4|mkv|webm
    #[arg(short = 'f', long, value_enum, ignore_case = true)]
    pub format: Option<MediaFormat>,

    /// best|worst, or for video a height: 144p..2160p
    #[arg(short = 'q', long, default_value = "best")]
    pub quality: String,

    /// Browser to take cookies from first
    #[arg(short = 'b', long, value_enum, ignore_case = true)]
    pub browser: Option<Browser>,

    /// Netscape cookies.txt file; disables browser fallback
    #[arg(short = 'c', long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Print title, uploader and duration without downloading
    #[arg(short = 'i', long)]
    pub info: bool,

    /// Seconds without yt-dlp output before it is stopped
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Initialize default configuration file
    #[arg(long)]
    pub init: bool,

    /// Show configuration file path
    #[arg(long)]
    pub path: bool,
}
