use crate::ca::{Authority, CaStatus};
use crate::error::{Error, Result};
use crate::lifecycle::Issuance;
use crate::store::Domains;
use crate::types::{
    CertificateOptions, DeleteOptions, InitOptions, KeyOptions, RequestOptions, Subject,
    DEFAULT_CERTIFICATE_DAYS, DEFAULT_KEY_LENGTH, DEFAULT_ROOT_DAYS,
};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "caman")]
#[command(version, about = "Local certificate authority manager", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "CAMAN_DIR",
        default_value = "ca",
        help = "CA directory"
    )]
    pub dir: PathBuf,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "More log output on stderr (-v info, -vv debug)"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Generate root key and root certificate")]
    Init {
        #[arg(short, long, help = "Force initialize, replacing an existing root")]
        force: bool,

        #[arg(short, long, default_value_t = DEFAULT_ROOT_DAYS, help = "Valid for number of days")]
        days: u32,

        #[arg(help = "Uppercase two letter country code")]
        country: Option<String>,

        #[arg(help = "The state, either as string or short")]
        state: Option<String>,

        #[arg(help = "City of origin")]
        city: Option<String>,

        #[arg(help = "Name of the CA")]
        organization: Option<String>,
    },

    #[command(about = "Manage private keys")]
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },

    #[command(about = "Manage certificate requests")]
    Request {
        #[command(subcommand)]
        command: RequestCommand,
    },

    #[command(about = "Manage certificates")]
    Certificate {
        #[command(subcommand)]
        command: CertificateCommand,
    },

    #[command(about = "Show whether the root CA is complete")]
    Status,
}

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    #[command(about = "List all keys")]
    List,

    #[command(about = "Create a new key")]
    Create {
        #[arg(short, long, help = "Overwrite existing files")]
        force: bool,

        #[arg(short, long, default_value_t = DEFAULT_KEY_LENGTH, help = "Key length")]
        length: u32,

        #[arg(help = "Domain name")]
        domain: Option<String>,
    },

    #[command(about = "Delete existing key")]
    Delete {
        #[arg(help = "Domain name")]
        domain: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RequestCommand {
    #[command(about = "List all requests")]
    List,

    #[command(about = "Create a new request")]
    Create {
        #[arg(short, long, help = "Overwrite existing files")]
        force: bool,

        #[arg(help = "Domain name")]
        domain: Option<String>,
    },

    #[command(about = "Delete existing request")]
    Delete {
        #[arg(help = "Domain name")]
        domain: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CertificateCommand {
    #[command(about = "List all certificates")]
    List,

    #[command(about = "Create a new certificate")]
    Create {
        #[arg(short, long, help = "Overwrite existing files")]
        force: bool,

        #[arg(short, long, default_value_t = DEFAULT_CERTIFICATE_DAYS, help = "Valid for number of days")]
        days: u32,

        #[arg(help = "Domain name")]
        domain: Option<String>,
    },

    #[command(about = "Delete existing certificate")]
    Delete {
        #[arg(short, long, help = "Delete key and request as well")]
        all: bool,

        #[arg(short, long, help = "Delete key as well")]
        key: bool,

        #[arg(short, long, help = "Delete request as well")]
        request: bool,

        #[arg(help = "Domain name")]
        domain: Option<String>,
    },

    #[command(about = "Revoke existing certificate (not supported)")]
    Revoke {
        #[arg(help = "Domain name")]
        domain: Option<String>,
    },
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = std::env::var("CAMAN_LOG")
        .ok()
        .and_then(|filter| tracing_subscriber::EnvFilter::try_new(filter).ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    let ca = Authority::open(&cli.dir);

    match cli.command {
        Commands::Init {
            force,
            days,
            country,
            state,
            city,
            organization,
        } => {
            if is_help(&country) {
                return print_help(&["init"]);
            }

            let subject = Subject::from_args(country, state, city, organization)?;
            ca.init(
                &subject,
                InitOptions::default().with_force(force).with_days(days),
            )?;

            println!("{}", "Root CA created successfully!".green().bold());
            println!(
                "  {}: {}",
                "Certificate".cyan(),
                ca.store().root_certificate_path().display()
            );
            println!(
                "  {}: {}",
                "Private Key".cyan(),
                ca.store().root_key_path().display()
            );
            println!("  {}: {}", "Subject".cyan(), subject.root_name());
            println!("  {}: {} days", "Validity".cyan(), days);
        }

        Commands::Key { command } => match command {
            KeyCommand::List => print_domains("KEYS", ca.keys().list()?)?,
            KeyCommand::Create {
                force,
                length,
                domain,
            } => {
                if is_help(&domain) {
                    return print_help(&["key", "create"]);
                }
                let domain = require_domain(domain)?;
                let issued = ca.keys().create(
                    &domain,
                    KeyOptions::default().with_force(force).with_length(length),
                )?;
                print_issuance("Key created successfully!", &issued);
            }
            KeyCommand::Delete { domain } => {
                if is_help(&domain) {
                    return print_help(&["key", "delete"]);
                }
                let domain = require_domain(domain)?;
                ca.keys().delete(&domain)?;
                println!("{} {}", "Key deleted:".green().bold(), domain);
            }
        },

        Commands::Request { command } => match command {
            RequestCommand::List => print_domains("REQUESTS", ca.requests().list()?)?,
            RequestCommand::Create { force, domain } => {
                if is_help(&domain) {
                    return print_help(&["request", "create"]);
                }
                let domain = require_domain(domain)?;
                let issued = ca
                    .requests()
                    .create(&domain, RequestOptions::default().with_force(force))?;
                print_issuance("Request created successfully!", &issued);
            }
            RequestCommand::Delete { domain } => {
                if is_help(&domain) {
                    return print_help(&["request", "delete"]);
                }
                let domain = require_domain(domain)?;
                ca.requests().delete(&domain)?;
                println!("{} {}", "Request deleted:".green().bold(), domain);
            }
        },

        Commands::Certificate { command } => match command {
            CertificateCommand::List => {
                print_domains("CERTIFICATES", ca.certificates().list()?)?
            }
            CertificateCommand::Create {
                force,
                days,
                domain,
            } => {
                if is_help(&domain) {
                    return print_help(&["certificate", "create"]);
                }
                let domain = require_domain(domain)?;
                let issued = ca.certificates().create(
                    &domain,
                    CertificateOptions::default()
                        .with_force(force)
                        .with_days(days),
                )?;
                print_issuance("Certificate issued successfully!", &issued);
                println!("  {}: {} days", "Validity".cyan(), days);
            }
            CertificateCommand::Delete {
                all,
                key,
                request,
                domain,
            } => {
                if is_help(&domain) {
                    return print_help(&["certificate", "delete"]);
                }
                let domain = require_domain(domain)?;
                let options = DeleteOptions {
                    all,
                    key,
                    request,
                };
                let removed = ca.certificates().delete(&domain, options)?;
                println!("{} {}", "Deleted:".green().bold(), domain);
                for kind in removed {
                    println!(
                        "  {}: {}",
                        kind.name().cyan(),
                        ca.store().path(kind, &domain).display()
                    );
                }
            }
            CertificateCommand::Revoke { domain } => {
                if is_help(&domain) {
                    return print_help(&["certificate", "revoke"]);
                }
                let domain = require_domain(domain)?;
                ca.certificates().revoke(&domain)?;
            }
        },

        Commands::Status => {
            println!("{}: {}", "CA directory".cyan(), ca.store().base().display());
            match ca.status() {
                CaStatus::Initialized => println!("{}", "Initialized".green().bold()),
                CaStatus::Uninitialized => println!("{}", "Not initialized".yellow().bold()),
                CaStatus::Incomplete {
                    subject,
                    root_key,
                    root_certificate,
                } => {
                    println!("{}", "Incomplete".red().bold());
                    println!("  {}: {}", "Subject template".cyan(), presence(subject));
                    println!("  {}: {}", "Root key".cyan(), presence(root_key));
                    println!(
                        "  {}: {}",
                        "Root certificate".cyan(),
                        presence(root_certificate)
                    );
                }
            }
        }
    }

    Ok(())
}

fn is_help(arg: &Option<String>) -> bool {
    arg.as_deref() == Some("help")
}

fn require_domain(domain: Option<String>) -> Result<String> {
    domain.ok_or(Error::MissingArgument("domain"))
}

/// Prints the long help of a nested subcommand, for `caman key create help`
/// style invocations.
fn print_help(path: &[&str]) -> Result<()> {
    let mut command = Cli::command();
    command.build();

    let mut current = &mut command;
    for name in path {
        current = current
            .find_subcommand_mut(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown command: {}", name)))?;
    }
    current.print_long_help()?;
    Ok(())
}

fn print_domains(title: &str, domains: Domains) -> Result<()> {
    println!("{}", title.bold());
    for domain in domains {
        println!("  {}", domain?);
    }
    Ok(())
}

fn print_issuance(message: &str, issued: &Issuance) {
    println!("{}", message.green().bold());
    println!("  {}: {}", "Domain".cyan(), issued.domain);
    println!("  {}: {}", "Path".cyan(), issued.path.display());
    for kind in issued.implicit() {
        println!("  {}: {}", "Also created".cyan(), kind.name());
    }
}

fn presence(present: bool) -> colored::ColoredString {
    if present {
        "present".green()
    } else {
        "missing".red()
    }
}
