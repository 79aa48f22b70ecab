use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{self, fmt::format::FmtSpan};

use iot_flasher::catalog::Catalog;
use iot_flasher::device::{DeviceLink, StubSerialLink};
use iot_flasher::engine::{SelectionEngine, SelectionSeed};
use iot_flasher::flasher::FlashEvent;

/// CLI front end for the IoT Playground firmware flasher core
#[derive(Parser, Debug)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Path to a JSON project catalog (defaults to the built-in showcase catalog)
    #[clap(short, long)]
    catalog: Option<PathBuf>,

    /// List available projects and firmware versions, then exit
    #[clap(short, long)]
    list: bool,

    /// Project id to pre-select
    #[clap(short, long)]
    project: Option<String>,

    /// Firmware version id to pre-select (requires --project)
    #[clap(long)]
    version: Option<String>,

    /// Firmware URL to validate and use instead of a version's default
    #[clap(short, long)]
    firmware: Option<String>,

    /// Connect the stub device link and run the simulated flash sequence
    #[clap(long)]
    flash: bool,

    /// Skip the flash confirmation prompt
    #[clap(short, long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up tracing
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let catalog = match &args.catalog {
        Some(path) => Catalog::load_from_file(path).map_err(anyhow::Error::msg)?,
        None => Catalog::builtin().clone(),
    };

    if args.list {
        print_catalog(&catalog);
        return Ok(());
    }

    let mut engine = SelectionEngine::new(catalog);

    engine.apply_seed(&SelectionSeed {
        project: args.project.clone(),
        version: args.version.clone(),
        firmware: None,
    });
    if args.project.is_some() && engine.state().selected_project.is_none() {
        bail!("unknown project id: {}", args.project.as_deref().unwrap_or_default());
    }
    if args.version.is_some() && engine.state().selected_version.is_none() {
        bail!("unknown version id: {}", args.version.as_deref().unwrap_or_default());
    }

    // An explicit firmware URL takes the same validation path as any
    // pasted input, it just reports the verdict on the command line.
    if let Some(url) = &args.firmware {
        match engine.set_candidate_url(url) {
            Some(check) if check.is_ok() => {
                if check.insecure_transport {
                    println!("Warning: unencrypted HTTP connection, HTTPS is recommended");
                }
            }
            Some(check) => bail!("{}: {}", check.verdict, url),
            None => {}
        }
    }

    let Some(candidate) = engine.state().candidate_url.clone() else {
        println!("No firmware selected.");
        println!("Pick a version that ships a firmware URL or pass one with --firmware.");
        println!("Use --list to see the catalog.");
        return Ok(());
    };
    println!("Firmware URL validated: {}", candidate);

    if !args.flash {
        return Ok(());
    }

    let chip_hint = engine
        .state()
        .selected_project
        .as_deref()
        .and_then(|id| engine.catalog().project(id))
        .map(|p| p.chip_family.clone());

    if !args.yes && !confirm_flash(chip_hint.as_deref(), &candidate)? {
        println!("Flashing cancelled by user");
        return Ok(());
    }

    let mut link = StubSerialLink::new(chip_hint);
    let device = link
        .request_connection()
        .map_err(anyhow::Error::msg)
        .context("failed to connect to device")?;
    engine.set_connected(true);

    println!("Device connected:");
    println!("  Chip type:   {}", device.chip_type);
    println!("  MAC address: {}", device.mac_address);
    println!("  Flash size:  {}", device.flash_size);

    let mut handle = engine.start_flash()?;
    info!("Flash sequence started, press Ctrl-C to cancel");

    let mut cancel_requested = false;
    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                engine.apply_flash_event(&event);
                match &event {
                    FlashEvent::Progress { percent, label, speed_kb_s, seconds_remaining, .. } => {
                        println!(
                            "  [{:>3}%] {} ({} KB/s, {}s remaining)",
                            percent, label, speed_kb_s, seconds_remaining
                        );
                    }
                    FlashEvent::Completed => {
                        println!("Firmware flashed successfully! Device will reboot.");
                    }
                    FlashEvent::Cancelled => println!("Flashing cancelled"),
                    FlashEvent::Failed(error) => println!("Flashing failed: {}", error),
                }
                if event.is_terminal() {
                    break;
                }
            }
            result = tokio::signal::ctrl_c(), if !cancel_requested => {
                result.context("failed to listen for Ctrl-C")?;
                cancel_requested = true;
                handle.cancel();
                println!("Cancel requested, stopping at the next stage boundary...");
            }
        }
    }

    link.close();
    engine.set_connected(false);

    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    for project in &catalog.projects {
        println!("{} [{}]", project, project.id);
        for version in &project.versions {
            println!(
                "    {:<14} {}  {}",
                version.id, version.release_date, version.description
            );
            if let Some(url) = &version.firmware_url {
                println!("    {:<14} firmware: {}", "", url);
            }
        }
    }
}

fn confirm_flash(chip_hint: Option<&str>, firmware_url: &str) -> Result<bool> {
    let file_name = firmware_url.rsplit('/').next().unwrap_or(firmware_url);
    let source = firmware_url
        .split_once("://")
        .map(|(_, rest)| rest.split(['/', '?']).next().unwrap_or(rest))
        .unwrap_or(firmware_url);

    println!("FIRMWARE FLASH CONFIRMATION");
    println!();
    println!("This will ERASE ALL DATA on your device and install new firmware.");
    println!();
    println!("  Device:   {}", chip_hint.unwrap_or("Unknown"));
    println!("  Firmware: {}", file_name);
    println!("  Source:   {}", source);
    println!();
    println!("Only flash firmware from trusted sources; incorrect firmware can");
    println!("brick your device. Keep it connected during the entire process.");
    print!("Continue? [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;

    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
