//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for blockhand
#[derive(Parser, Debug)]
#[command(name = "blockhand")]
#[command(author, version, about = "Block-world agents that trade work for credits")]
#[command(long_about = r#"
blockhand runs a builder agent and its merchant peers in a simulated block
world. Lines typed on the console are spoken in chat by the configured
player; address an agent to give it a command:

  @Builder !harvest 8      gather 8 logs
  @Builder !platform 3     lay a 3x3 platform next to you
  @Builder !come           walk to you
  @Builder !follow         keep following you
  @Builder !stopfollow     stop following
  @Builder !throw          throw everything it holds to you

When the builder runs short it buys the missing logs from a merchant over
the credit ledger and waits for the handoff.

Configuration files are loaded from (in priority order):
1. BLOCKHAND_<SECTION>__<KEY>           Environment
2. --config <path>                      Explicit config file
3. ./blockhand.toml                     Project-level config
4. ~/.config/blockhand/config.toml      Global config
"#)]
pub struct Cli {
    /// Player the console speaks as (overrides [simulation].player)
    #[arg(short, long, value_name = "NAME")]
    pub player: Option<String>,

    /// Name of the driven agent (overrides [agent].name)
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Collaborator registry file (overrides [registry].path)
    #[arg(long, value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check_config: bool,
}
