//! netprov - interface provisioning for remote routers

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use netprov::commands::{
    CreateArgs, InfoCommand, InterfaceCommand, LedgerCommand, OutputFormat, ShowRunCommand,
};
use netprov::config::AppConfig;
use netprov::console::{resolve_password, resolve_username, ConsoleSelector};
use netprov::context::AppContext;
use netprov_core::{DeviceProfile, InterfaceFamily};

#[derive(Parser)]
#[command(name = "netprov")]
#[command(about = "Provision interfaces on remote routers")]
#[command(version)]
#[command(long_about = "
Provision loopback, physical, VLAN and DHCP pool configuration on Cisco
routers over SSH or telnet, keeping track of handed-out address ranges in a
local ledger.

Examples:
  netprov --host 10.0.0.1 info                              # Hostname and dialect
  netprov --host 10.0.0.1 view loopback                     # List loopbacks
  netprov --host 10.0.0.1 view physical -i                  # Pick and show a port
  netprov --host 10.0.0.1 create loopback --name Loopback5 --ip 10.1.1.0/30
  netprov --host 10.0.0.1 create vlan --parent Ethernet0/0 --vlan-id 10 --ip 192.168.10.0/24
  netprov --host 10.0.0.1 create dhcp --pool-id 7 --subnet 10.7.0.0/24 --subnet 10.8.0.0/24
  netprov --host 10.0.0.1 create loopback --from-file       # Use input.yaml
  netprov --host 10.0.0.1 delete loopback Loopback5
  netprov ledger list --format json                         # No device needed
")]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Device address
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Device port; 22 falls back to 23 for telnet
    #[arg(short, long, global = true, default_value_t = 22)]
    port: u16,

    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the device hostname and command dialect
    Info,

    /// Print the running configuration
    ShowRun {
        /// Also append it to the output file
        #[arg(short, long)]
        write: bool,
    },

    /// List the interfaces of one family
    View {
        #[arg(value_parser = parse_family)]
        family: InterfaceFamily,

        /// Pick one entry and show its configuration
        #[arg(short, long)]
        interactive: bool,
    },

    /// Create an interface or DHCP pool
    Create {
        #[arg(value_parser = parse_family)]
        family: InterfaceFamily,

        #[command(flatten)]
        args: CreateArgs,
    },

    /// Delete an interface or DHCP pool
    Delete {
        #[arg(value_parser = parse_family)]
        family: InterfaceFamily,

        /// Interface name or pool number; picked from a list when omitted
        name: Option<String>,
    },

    /// Inspect the address ledger without contacting a device
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// List every reservation
    List,
    /// Check whether a network is still free
    Check { network: String },
    /// Release the reservation containing an address
    Release { address: String },
}

fn parse_family(value: &str) -> Result<InterfaceFamily, String> {
    value.parse().map_err(|_| {
        format!(
            "unknown interface family '{}', expected one of: loopback, physical, vlan, dhcp",
            value
        )
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let context = AppContext::bootstrap(config).await?;

    if let Commands::Ledger { action, format } = &cli.command {
        let cmd = LedgerCommand::new(context.ledger.clone());
        return match action {
            LedgerAction::List => cmd.list(*format).await,
            LedgerAction::Check { network } => cmd.check(network).await,
            LedgerAction::Release { address } => cmd.release(address).await.map(|_| ()),
        };
    }

    let host = cli
        .host
        .clone()
        .context("--host is required for device commands")?;
    let username = resolve_username(cli.username.clone(), context.config.username.clone())?;
    let password = resolve_password()?;
    let profile = DeviceProfile::new(host, cli.port, username, password);

    let mut session = context.connect(profile).await?;
    let mut selector = ConsoleSelector::stdio();

    let result = match cli.command {
        Commands::Info => InfoCommand::new().execute(&mut session).await,
        Commands::ShowRun { write } => ShowRunCommand::new(context.clone())
            .execute(&mut session, write)
            .await
            .map(|_| ()),
        Commands::View {
            family,
            interactive,
        } => InterfaceCommand::new(context.clone(), family)
            .view(&mut session, &mut selector, interactive)
            .await
            .map(|_| ()),
        Commands::Create { family, args } => InterfaceCommand::new(context.clone(), family)
            .create(&mut session, &mut selector, &args)
            .await
            .map(|_| ()),
        Commands::Delete { family, name } => InterfaceCommand::new(context.clone(), family)
            .delete(&mut session, &mut selector, name.as_deref())
            .await
            .map(|_| ()),
        Commands::Ledger { .. } => Ok(()),
    };

    if let Err(e) = session.disconnect().await {
        log::warn!("Disconnect from {} failed: {}", session.host(), e);
    }
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let quiet = cli.quiet;
    let show_chain = cli.verbose || cli.debug;

    // Handle errors with appropriate exit codes
    match run(cli).await {
        Ok(()) => {
            if !quiet {
                log::info!("Command completed successfully");
            }
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);

            // Print error chain if in verbose mode
            if show_chain {
                for cause in e.chain().skip(1) {
                    eprintln!("  Caused by: {}", cause);
                }
            }
            std::process::exit(1);
        }
    }
}
