//! Command line interface for the `sdalink` binary.
//!
//! The binary runs a workflow job file against simulated devices, which is
//! enough to exercise the whole protocol stack without a radio.

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for the `sdalink` binary.
#[derive(Debug, Parser)]
#[command(
    name = "sdalink",
    version,
    about = "Run an SDA workflow job against simulated BLE devices"
)]
pub struct Cli {
    /// Workflow job as JSON.
    pub job: PathBuf,

    /// Directory holding task assets and receiving read outputs.
    #[arg(short, long, default_value = ".")]
    pub assets: PathBuf,

    /// Address of a device to run against, in scan order. Defaults to the
    /// demonstration device.
    #[arg(short, long = "device", value_name = "ADDRESS")]
    pub devices: Vec<String>,

    /// Seconds to wait for a connection.
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Seconds to wait for a command response.
    #[arg(long, default_value_t = 20)]
    pub response_timeout_secs: u64,

    /// Milliseconds between consecutive transport unit writes.
    #[arg(long, default_value_t = 200)]
    pub write_interval_ms: u64,
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_apply() {
        let cli = Cli::parse_from(["sdalink", "job.json"]);
        assert_eq!(cli.job, Path::new("job.json"));
        assert_eq!(cli.assets, Path::new("."));
        assert!(cli.devices.is_empty());
        assert_eq!(cli.response_timeout_secs, 20);
        assert_eq!(cli.write_interval_ms, 200);
    }

    #[test]
    fn devices_keep_their_order() {
        let cli = Cli::parse_from([
            "sdalink",
            "job.json",
            "--device",
            "AA:02",
            "-d",
            "AA:01",
            "--write-interval-ms",
            "50",
        ]);
        assert_eq!(cli.devices, ["AA:02", "AA:01"]);
        assert_eq!(cli.write_interval_ms, 50);
    }
}
