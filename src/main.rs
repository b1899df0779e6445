//! # Textcast — bulk SMS campaign runner
//!
//! Usage:
//!   textcast merge ids.csv contacts.csv     # Reconcile sources into recipients.csv
//!   textcast show                           # List loaded recipients
//!   textcast send --link https://…          # Run the campaign
//!   textcast recover --link https://…       # Resume from the checkpoint
//!   textcast test +15551234567              # Send a single test message
//!   textcast settings set delay_secs 1.5    # Change and save a setting

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use textcast_campaign::{
    merge_files, store, CampaignQuote, DispatchOptions, Dispatcher, FixedDelay, MessageTemplate,
    Unpaced,
};
use textcast_core::config::{Settings, SettingsSource, DEFAULT_CONFIG_FILE};
use textcast_core::types::{Recipient, RecipientSet};

#[derive(Parser)]
#[command(
    name = "textcast",
    version,
    about = "📨 Textcast — bulk SMS campaigns with crash-safe resume"
)]
struct Cli {
    /// Settings file (created with defaults if missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbose console logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge an identifier export and a contact export into the recipients file
    Merge {
        /// CSV with Email, First Name, Last Name, UID
        identifiers: PathBuf,
        /// CSV with Email, First Name, Last Name, Phone Number
        contacts: PathBuf,
        /// Output file (defaults to the configured recipients file)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show recipients from the recipients file
    Show {
        /// File to read instead of the configured recipients file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Send the campaign to every recipient in the recipients file
    Send(MessageArgs),
    /// Resume an interrupted campaign from the checkpoint file
    Recover(MessageArgs),
    /// Send one test message to a phone number
    Test {
        phone: String,
        #[command(flatten)]
        message: MessageArgs,
        #[arg(long, default_value = "Test")]
        first_name: String,
        #[arg(long, default_value = "Recipient")]
        last_name: String,
        #[arg(long, default_value = "test@example.com")]
        email: String,
        #[arg(long, default_value = "0")]
        uid: String,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Args)]
struct MessageArgs {
    /// Value substituted for {link}
    #[arg(long, default_value = "")]
    link: String,
    /// Template file (defaults to the configured template file)
    #[arg(long)]
    template: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print current settings
    Show,
    /// Change one setting and save it
    Set { field: String, value: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                tracing::error!("{e:#}");
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (mut settings, source) = Settings::load_or_init(&cli.config)?;
    logging::init(&settings, cli.verbose)?;

    if source == SettingsSource::Created {
        tracing::warn!(
            "No configuration found; created '{}' with default values. Edit it and run again.",
            cli.config.display()
        );
        return Ok(ExitCode::SUCCESS);
    }
    tracing::debug!("Loaded configuration from '{}'", cli.config.display());

    match cli.command {
        Command::Merge {
            identifiers,
            contacts,
            out,
        } => {
            let recipients = merge_files(&identifiers, &contacts)?;
            let out = out.unwrap_or_else(|| settings.recipients_path());
            store::save(&out, &recipients)?;
            tracing::info!("Recipients have been saved in '{}'", out.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { file } => {
            let path = file.unwrap_or_else(|| settings.recipients_path());
            if let Some(recipients) = load_or_warn(&path)? {
                print_recipients(&recipients);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Send(args) => dispatch(&settings, &args, false).await,
        Command::Recover(args) => dispatch(&settings, &args, true).await,
        Command::Test {
            phone,
            message,
            first_name,
            last_name,
            email,
            uid,
        } => {
            let probe = Recipient::new(first_name, last_name, email, uid, phone);
            send_test(&settings, &message, &probe).await
        }
        Command::Settings { action } => {
            match action {
                SettingsAction::Show => {
                    println!("Settings from {}", settings.path().display());
                    for (field, value) in settings.describe() {
                        println!("  {field:<20} {value}");
                    }
                }
                SettingsAction::Set { field, value } => settings.update_setting(&field, &value)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load a recipient file; a missing file is reported and treated as "nothing loaded".
fn load_or_warn(path: &Path) -> Result<Option<RecipientSet>> {
    match store::load(path) {
        Ok(recipients) => Ok(Some(recipients)),
        Err(e) if e.is_not_found() => {
            tracing::warn!(
                "File not found '{}', change the file name in settings.",
                path.display()
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn template_for(settings: &Settings, args: &MessageArgs) -> Result<MessageTemplate> {
    let path = args
        .template
        .clone()
        .unwrap_or_else(|| settings.template_path());
    MessageTemplate::load(&path)
        .with_context(|| format!("cannot load message template '{}'", path.display()))
}

fn options_for(
    settings: &Settings,
    args: &MessageArgs,
    checkpoint: Option<PathBuf>,
) -> Result<DispatchOptions> {
    if settings.sender.is_empty() {
        bail!("no sender configured; run `textcast settings set sender <number>`");
    }
    Ok(DispatchOptions {
        sender: settings.sender.clone(),
        cost_per_message: settings.cost_per_message,
        link: args.link.clone(),
        checkpoint,
    })
}

async fn dispatch(settings: &Settings, args: &MessageArgs, resume: bool) -> Result<ExitCode> {
    let source = if resume {
        settings.recovery_path()
    } else {
        settings.recipients_path()
    };
    let Some(pending) = load_or_warn(&source)? else {
        return Ok(ExitCode::SUCCESS);
    };
    if pending.is_empty() {
        tracing::warn!("No recipient loaded");
        return Ok(ExitCode::SUCCESS);
    }

    // Resuming always keeps checkpointing into the file it resumed from.
    let checkpoint = (resume || settings.recovery).then(|| settings.recovery_path());
    let options = options_for(settings, args, checkpoint)?;
    let template = template_for(settings, args)?;
    let gateway = textcast_channels::create_gateway(settings)?;
    let mut dispatcher = Dispatcher::new(gateway.as_ref(), FixedDelay::new(settings.delay()));

    let report = tokio::select! {
        biased;
        result = dispatcher.run(&pending, &template, &options, prompt_operator) => result?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            match &options.checkpoint {
                Some(path) => tracing::warn!(
                    "Interrupted; run `textcast recover` to resume from '{}'",
                    path.display()
                ),
                None => tracing::warn!("Interrupted; recovery is disabled, nothing was checkpointed"),
            }
            return Ok(ExitCode::from(130));
        }
    };

    if report.confirmed && report.failed > 0 {
        tracing::warn!(
            "{} recipients were not sent; they remain pending{}",
            report.failed,
            if options.checkpoint.is_some() {
                " in the checkpoint (use `textcast recover`)"
            } else {
                ""
            }
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn send_test(settings: &Settings, args: &MessageArgs, probe: &Recipient) -> Result<ExitCode> {
    let options = options_for(settings, args, None)?;
    let template = template_for(settings, args)?;
    let gateway = textcast_channels::create_gateway(settings)?;
    let dispatcher = Dispatcher::new(gateway.as_ref(), Unpaced);

    if dispatcher.send_one(probe, &template, &options).await? {
        tracing::info!("Test SMS accepted for {}", probe.phone_number());
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Ask on stdin. Read failures count as "no".
fn prompt_operator(quote: &CampaignQuote) -> String {
    print!("{quote}");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    match std::io::stdin().read_line(&mut answer) {
        Ok(_) => answer,
        Err(_) => String::new(),
    }
}

fn print_recipients(recipients: &RecipientSet) {
    println!(
        "{:<16} {:<16} {:<28} {:<10} {}",
        "First Name", "Last Name", "Email", "UID", "Phone Number"
    );
    for r in recipients {
        println!(
            "{:<16} {:<16} {:<28} {:<10} {}",
            r.first_name(),
            r.last_name(),
            r.email(),
            r.uid(),
            r.phone_number()
        );
    }
    println!("{} recipients", recipients.len());
}
