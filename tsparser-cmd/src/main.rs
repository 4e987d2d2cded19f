mod info;
mod tables;

use std::collections::HashSet;
use std::fs::File;
use std::io::{stderr, stdin, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tsparser::{Pid, ScanOpts};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show packet and table statistics for a transport stream.
    Info {
        /// Input transport stream file, or - for stdin.
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: info::Format,

        /// Only reassemble tables on these PIDs or PID ranges.
        ///
        /// This accepts a CSV of PIDs as well as ranges of the format <start>-<end>
        /// where start and end are inclusive. For example, you can specify
        /// --pids 0,16,17 or --pids 0,256-260
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        pids: Vec<String>,

        /// Reject long-form sections with a bad CRC-32.
        #[arg(long, action)]
        verify_crc: bool,
    },
    /// Print each reassembled table as a line of JSON.
    ///
    /// Program association and program map tables include their decoded contents.
    /// PMT PIDs are taken from the most recent PAT.
    Tables {
        /// Input transport stream file, or - for stdin.
        input: PathBuf,

        /// Only reassemble tables on these PIDs or PID ranges. See `info --help`.
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        pids: Vec<String>,

        /// Reject long-form sections with a bad CRC-32.
        #[arg(long, action)]
        verify_crc: bool,
    },
}

const MAX_PID: Pid = 0x1fff;

/// Parse PIDs and inclusive PID ranges of the form `<start>-<end>`.
fn parse_pids(list: &[String]) -> Result<HashSet<Pid>> {
    let rx = regex::Regex::new(r"^(\d+)(?:-(\d+))?$").context("compiling PID pattern")?;
    let pid = |s: &str| match s.parse::<Pid>() {
        Ok(pid) if pid <= MAX_PID => Ok(pid),
        _ => Err(anyhow!("PID {s} out of range")),
    };

    let mut pids = HashSet::default();
    for item in list {
        let Some(cap) = rx.captures(item.trim()) else {
            bail!("invalid PID or range '{item}'");
        };
        let start = pid(&cap[1])?;
        let end = match cap.get(2) {
            Some(end) => pid(end.as_str())?,
            None => start,
        };
        if end < start {
            bail!("invalid PID range '{item}'");
        }
        pids.extend(start..=end);
    }
    Ok(pids)
}

fn scan_opts(pids: &[String], verify_crc: bool) -> Result<ScanOpts> {
    let pids = parse_pids(pids)?;
    debug!("pids {:?}", pids);
    Ok(ScanOpts::builder().pids(pids).verify_crc(verify_crc).build())
}

fn open_input(path: &Path) -> Result<Box<dyn Read + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(stdin()));
    }
    let file = File::open(path).with_context(|| format!("opening input {path:?}"))?;
    Ok(Box::new(BufReader::new(file)))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("TSPARSER_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Info {
            input,
            format,
            pids,
            verify_crc,
        } => {
            let opts = scan_opts(pids, *verify_crc)?;
            info::info(input, open_input(input)?, opts, format)
        }
        Commands::Tables {
            input,
            pids,
            verify_crc,
        } => {
            let opts = scan_opts(pids, *verify_crc)?;
            tables::tables(open_input(input)?, opts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_ranges() {
        let list = ["0", "256-258", " 17", "5-5"].map(String::from);

        let pids = parse_pids(&list).unwrap();

        assert_eq!(pids, HashSet::from([0, 5, 17, 256, 257, 258]));
    }

    #[test]
    fn invalid_pid_ranges() {
        assert!(parse_pids(&["x".to_string()]).is_err());
        assert!(parse_pids(&["5-1".to_string()]).is_err());
        assert!(parse_pids(&["1-".to_string()]).is_err());
        assert!(parse_pids(&["8190-8192".to_string()]).is_err());
        assert!(parse_pids(&["70000".to_string()]).is_err());
    }

    #[test]
    fn pid_out_of_range() {
        assert!(scan_opts(&["8192".to_string()], false).is_err());
        let opts = scan_opts(&["0".to_string(), "8191".to_string()], true).unwrap();
        assert_eq!(opts.pids.len(), 2);
        assert!(opts.verify_crc);
    }
}
