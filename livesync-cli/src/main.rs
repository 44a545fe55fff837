//! livesync: keep an on-disk project workspace and a running editor in sync.
//!
//! # Usage
//!
//! ```text
//! livesync serve [ARCHIVE] [--workspace <dir>] [--template <dir>] [--port <n>] [--socket <path>]
//! livesync pack <out> [--workspace <dir>]
//! livesync unpack <archive> [--workspace <dir>] [--fresh]
//! livesync status | stop
//! livesync import <archive>
//! livesync export <out>
//! livesync follow [URL] --into <dir>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    control::{ExportArgs, ImportArgs, StatusArgs, StopArgs},
    follow::FollowArgs,
    pack::{PackArgs, UnpackArgs},
    serve::ServeArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "livesync",
    version,
    about = "Live sync between an on-disk project workspace and a running editor",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon in the foreground (watcher + WebSocket + host socket).
    Serve(ServeArgs),

    /// Pack a workspace directory into an archive file.
    Pack(PackArgs),

    /// Unpack an archive file into a workspace directory.
    Unpack(UnpackArgs),

    /// Query the running daemon.
    Status(StatusArgs),

    /// Ask the running daemon to shut down.
    Stop(StopArgs),

    /// Replace the running daemon's workspace with an archive and push it.
    Import(ImportArgs),

    /// Write the running daemon's freshly built archive to a file.
    Export(ExportArgs),

    /// Mirror every archive a daemon pushes into a directory.
    Follow(FollowArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Pack(args) => args.run(),
        Commands::Unpack(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Stop(args) => args.run(),
        Commands::Import(args) => args.run(),
        Commands::Export(args) => args.run(),
        Commands::Follow(args) => args.run(),
    }
}
