use anyhow::Context;
use chipscan_core::{Bytes, ReadMode, ScanResult, TagScanner, TagTransport};
use clap::{Subcommand, ValueEnum};
use tracing::debug;

use crate::display;

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Read UID and payload from the tag
    Read {
        /// Read mode, defaults to the configured mode
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Write a payload to the tag
    Write {
        /// Payload as hex, or as text with --text
        data: String,

        /// Treat the payload as UTF-8 text
        #[arg(long)]
        text: bool,
    },

    /// Check that the tag works with the current keys
    Test,

    /// Write a payload and read it back in one session with the tag
    Roundtrip {
        /// Payload as hex, or as text with --text
        data: String,

        /// Treat the payload as UTF-8 text
        #[arg(long)]
        text: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ModeArg {
    /// Anticollision UID only
    Fast,
    /// Authenticated, MAC verified read
    Full,
    /// Payload read without authentication
    FullNoauth,
    /// Authenticated read without response MAC checks
    FullNocmac,
}

impl From<ModeArg> for ReadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fast => Self::Fast,
            ModeArg::Full => Self::secure(),
            ModeArg::FullNoauth => Self::Full {
                auth: false,
                cmac: false,
            },
            ModeArg::FullNocmac => Self::Full {
                auth: true,
                cmac: false,
            },
        }
    }
}

/// Run a subcommand against `scanner`
pub(crate) async fn run<T: TagTransport>(
    scanner: &TagScanner<T>,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "Running command");
    match command {
        Command::Read { mode } => {
            let result = match mode {
                Some(mode) => scanner.read_with_mode(mode.into()).await,
                None => scanner.read().await,
            };
            report("Read", result)
        }
        Command::Write { data, text } => {
            let payload = parse_payload(&data, text)?;
            report("Write", scanner.write(payload).await)
        }
        Command::Test => report("Test", scanner.test().await),
        Command::Roundtrip { data, text } => {
            let payload = parse_payload(&data, text)?;
            report("Write", scanner.write(payload).await)?;
            report("Read", scanner.read().await)?;
            Ok(())
        }
    }
}

fn report(operation: &str, result: ScanResult) -> anyhow::Result<()> {
    let tag = result.with_context(|| format!("{operation} failed"))?;
    println!("{}", display::success(&format!("{operation} succeeded")));
    println!("{}", display::tag_summary(&tag));
    Ok(())
}

fn parse_payload(data: &str, text: bool) -> anyhow::Result<Bytes> {
    if text {
        return Ok(Bytes::copy_from_slice(data.as_bytes()));
    }
    let decoded = hex::decode(data.trim_start_matches("0x"))
        .context("payload is not valid hex, pass --text for text payloads")?;
    Ok(Bytes::from(decoded))
}
