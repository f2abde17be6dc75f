//! Command line interface for the `streamframe` demo binary.
//!
//! The binary runs a named-pipe echo server or sends a single request to one.
//! This file is also compiled by the build script to generate the man page,
//! so it may only depend on `clap` and `std`.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `streamframe` binary.
#[derive(Debug, Parser)]
#[command(name = "streamframe", version, about = "Streaming request/response over named pipes")]
pub struct Cli {
    /// Directory holding the pipe sockets (defaults to the temp dir).
    #[arg(long, global = true)]
    pub pipe_root: Option<PathBuf>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept clients on a named pipe and echo request bodies back.
    Serve(ServeArgs),
    /// Send one request and print the response.
    Send(SendArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Base name of the pipe pair.
    pub name: String,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Base name of the pipe pair.
    pub name: String,

    #[arg(long, default_value = "POST")]
    pub verb: String,

    #[arg(long, default_value = "/api/messages")]
    pub path: String,

    /// Request body sent as a text attachment.
    #[arg(long)]
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_send_command() {
        let cli = Cli::parse_from([
            "streamframe",
            "send",
            "bot",
            "--verb",
            "GET",
            "--body",
            "hi",
        ]);
        let Command::Send(args) = cli.command else {
            panic!("expected send command");
        };
        assert_eq!(args.name, "bot");
        assert_eq!(args.verb, "GET");
        assert_eq!(args.path, "/api/messages");
        assert_eq!(args.body.as_deref(), Some("hi"));
    }

    #[test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "streamframe",
            "serve",
            "bot",
            "--pipe-root",
            "/run/bots",
            "--metrics-addr",
            "127.0.0.1:9000",
        ]);
        assert!(matches!(cli.command, Command::Serve(ref args) if args.name == "bot"));
        assert_eq!(cli.pipe_root.as_deref(), Some(std::path::Path::new("/run/bots")));
        assert_eq!(cli.metrics_addr.map(|addr| addr.port()), Some(9000));
    }
}
