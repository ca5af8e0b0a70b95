use std::{net::IpAddr, path::PathBuf, time::Duration};

use byte_unit::Byte;
use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Options {
    /// Base path to stored photos, one directory per archive.
    pub photo_path: PathBuf,
    /// HTTP listening address.
    #[arg(short = 'a', long, default_value = "0.0.0.0")]
    pub address: IpAddr,
    /// HTTP listening port.
    #[arg(short = 'p', long, default_value = "8080")]
    pub port: u16,
    /// Enable verbose debug logging.
    #[arg(short = 'l', long)]
    pub debug_logging: bool,
    /// Pause inserted after every sent chunk, in seconds or as a duration (e.g. 250ms).
    #[arg(short = 'd', long, default_value = "0", value_parser(parse_delay))]
    pub throttling_delay: Duration,
    /// Streaming response chunk size, in bytes or as a size (e.g. 4KiB).
    #[arg(short = 'c', long, default_value = "4096", value_parser(parse_chunk_size))]
    pub chunk_size: usize,
    /// Gracefully close connection on server shutdown to keep partially downloaded file.
    #[arg(short = 'k', long)]
    pub keep_broken_download: bool,
    /// Program used to stream zip archives to its standard output.
    #[arg(short = 'z', long, default_value = "zip")]
    pub zip_program: String,
}

impl Options {
    pub fn log_level(&self) -> LevelFilter {
        if self.debug_logging {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    pub fn throttling_delay(&self) -> Option<Duration> {
        Some(self.throttling_delay).filter(|delay| !delay.is_zero())
    }
}

fn parse_delay(s: &str) -> Result<Duration, String> {
    match s.parse::<f64>() {
        Ok(secs) => Duration::try_from_secs_f64(secs).map_err(|err| err.to_string()),
        Err(_) => humantime::parse_duration(s).map_err(|err| err.to_string()),
    }
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let bytes = s
        .parse::<Byte>()
        .map_err(|err| err.to_string())?
        .get_bytes();
    match usize::try_from(bytes) {
        Ok(0) => Err(String::from("chunk size must be greater than zero")),
        Ok(size) => Ok(size),
        Err(err) => Err(err.to_string()),
    }
}
