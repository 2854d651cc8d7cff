//! event_dump: print what the Vigil sensor captured.
//!
//! ```text
//! event_dump capture.bin             decode a file of exported records
//! event_dump --live                  poll \\.\VigilSensor (Windows, run as Admin)
//! event_dump --live --watch 4242     seed a tracking root first
//! ```

use std::path::PathBuf;
use std::{fs, process, thread};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use fern::Dispatch;
use log::LevelFilter;

use event_dump::render::RecordView;

#[derive(Parser, Debug)]
#[command(name = "event_dump", version, about)]
struct Cli {
    /// Capture file of back-to-back exported records.
    #[arg(required_unless_present = "live")]
    capture: Option<PathBuf>,

    /// Poll the control device instead of reading a file.
    #[arg(long, conflicts_with = "capture")]
    live: bool,

    /// Pids to track (with their descendants) before polling.
    #[arg(long, requires = "live")]
    watch: Vec<u32>,

    /// Milliseconds between polls once every queue is empty.
    #[arg(long, default_value_t = 250)]
    interval: u64,

    /// Print the driver's counters and exit.
    #[arg(long, requires = "live")]
    stats: bool,

    /// One JSON object per line.
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Also append log lines to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Log lines go to stderr so record output stays clean on stdout.
fn setup_logging(level: LevelFilter, file: Option<&PathBuf>) -> Result<(), fern::InitError> {
    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}][pid={}][tid={:?}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                process::id(),
                thread::current().id(),
                msg
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

fn print(view: &RecordView, json: bool) -> Result<()> {
    if json {
        println!("{}", view.json()?);
    } else {
        println!("{}", view.line());
    }
    Ok(())
}

fn dump_file(path: &PathBuf, json: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    log::info!("decoding {} bytes from {}", bytes.len(), path.display());

    let mut records = event_dump::records(&bytes);
    let mut count = 0usize;
    while let Some(record) = records.next() {
        let offset = records.offset();
        let record = record.with_context(|| format!("record {count} at byte {offset}"))?;
        print(&RecordView::from(&record), json)?;
        count += 1;
    }
    log::info!("{count} records");
    Ok(())
}

#[cfg(windows)]
fn dump_live(cli: &Cli) -> Result<()> {
    use std::time::Duration;

    use event_dump::device::Device;
    use event_dump::render::stats_lines;
    use vigil_shared::wire::EventKind;

    let device = Device::open().context("opening the sensor device (driver loaded? running as Admin?)")?;
    for &pid in &cli.watch {
        device.watch(pid).with_context(|| format!("watching pid {pid}"))?;
        log::info!("watching pid {pid}");
    }

    if cli.stats {
        for line in stats_lines(&device.stats()?) {
            println!("{line}");
        }
        return Ok(());
    }

    log::info!("polling every {} ms", cli.interval);
    loop {
        let mut drained = true;
        for kind in EventKind::ALL {
            if let Some(record) = device.next_event(kind)? {
                print(&RecordView::from(&record), cli.json)?;
                drained = false;
            }
        }
        if drained {
            thread::sleep(Duration::from_millis(cli.interval));
        }
    }
}

#[cfg(not(windows))]
fn dump_live(_: &Cli) -> Result<()> {
    bail!("--live needs the Windows control device")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level, cli.log_file.as_ref()).context("setting up logging")?;

    match (&cli.capture, cli.live) {
        (_, true) => dump_live(&cli),
        (Some(path), false) => dump_file(path, cli.json),
        (None, false) => bail!("nothing to read"),
    }
}
