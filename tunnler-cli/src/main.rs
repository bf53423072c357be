use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tunnler", about = "Expose a local service through Cloudflare Tunnel")]
#[command(version, propagate_version = true)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments for the default `tunnel` command
    #[command(flatten)]
    tunnel: commands::tunnel::TunnelArgs,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Save Cloudflare credentials
    Init(commands::init::InitArgs),
    /// Expose a local port on a public hostname (default)
    Tunnel(commands::tunnel::TunnelArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Init(args)) => commands::init::run(args),
        Some(Commands::Tunnel(args)) => commands::tunnel::run(args).await,
        None => commands::tunnel::run(cli.tunnel).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_flags_run_the_tunnel_command() {
        let cli = Cli::try_parse_from(["tunnler", "-p", "3000", "-s", "demo"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.tunnel.port, Some(3000));
        assert_eq!(cli.tunnel.subdomain.as_deref(), Some("demo"));
    }

    #[test]
    fn explicit_tunnel_subcommand() {
        let cli = Cli::try_parse_from(["tunnler", "tunnel", "--port", "8080", "-z", "example.com"])
            .unwrap();
        match cli.command {
            Some(Commands::Tunnel(args)) => {
                assert_eq!(args.port, Some(8080));
                assert_eq!(args.zone.as_deref(), Some("example.com"));
            }
            _ => panic!("expected tunnel command"),
        }
    }

    #[test]
    fn init_does_not_require_port() {
        let cli = Cli::try_parse_from(["tunnler", "init", "-a", "key", "-i", "acc"]).unwrap();
        match cli.command {
            Some(Commands::Init(args)) => {
                assert_eq!(args.api_key.as_deref(), Some("key"));
                assert_eq!(args.account_id.as_deref(), Some("acc"));
                assert!(args.zone.is_none());
            }
            _ => panic!("expected init command"),
        }
    }

    #[test]
    fn port_is_required_for_default_command() {
        assert!(Cli::try_parse_from(["tunnler"]).is_err());
    }

    #[test]
    fn port_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["tunnler", "-p", "0"]).is_err());
        assert!(Cli::try_parse_from(["tunnler", "-p", "65536"]).is_err());
    }

    #[test]
    fn verbose_flag() {
        let cli = Cli::try_parse_from(["tunnler", "-p", "3000", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
