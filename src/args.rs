//! Commandline argument parsers using clap for the coordinator and monitor

use crate::{config::HubConfig, error::HubError};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
/// Broadcasts study commands to the headsets and republishes their gaze
pub struct CoordinatorArgs {
    /// RON config file, anything it leaves out keeps its default
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Port the commands and gaze ticks are published on
    #[arg(short = 'b', long = "broadcast-port")]
    pub broadcast_port: Option<u16>,

    /// Port the headsets send their handshakes and gaze to
    #[arg(short = 'i', long = "ingest-port")]
    pub ingest_port: Option<u16>,

    /// Operation the panel can start and stop, may be repeated. Replaces the
    /// config's list
    #[arg(short = 'o', long = "operation")]
    pub operations: Vec<String>,

    /// Read commands from stdin instead of opening the terminal panel
    #[arg(long)]
    pub headless: bool,

    /// Where logs go while the terminal panel owns the screen
    #[arg(long = "log-file", default_value = "coordinator.log")]
    pub log_file: PathBuf,

    /// Print the effective config as RON and exit
    #[arg(long = "print-config")]
    pub print_config: bool,
}

impl CoordinatorArgs {
    /// The config file (or the defaults) with the commandline overrides
    /// applied.
    pub fn hub_config(&self) -> Result<HubConfig, HubError> {
        let mut config = match &self.config {
            Some(path) => HubConfig::load(path)?,
            None => HubConfig::default(),
        };
        if let Some(port) = self.broadcast_port {
            config.broadcast_port = port;
        }
        if let Some(port) = self.ingest_port {
            config.ingest_port = port;
        }
        if !self.operations.is_empty() {
            config.operations = self.operations.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
/// Prints everything the coordinator broadcasts, optionally feeding it
/// simulated headsets
pub struct MonitorArgs {
    /// Host the coordinator runs on
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// The coordinator's broadcast port
    #[arg(short = 'b', long = "broadcast-port", default_value_t = 7788)]
    pub broadcast_port: u16,

    /// The coordinator's ingest port
    #[arg(short = 'i', long = "ingest-port", default_value_t = 7789)]
    pub ingest_port: u16,

    /// Number of simulated headsets to run
    #[arg(short = 'n', long = "dummies", default_value_t = 0)]
    pub dummies: usize,

    /// Build number the simulated headsets report
    #[arg(long = "build", default_value_t = 1)]
    pub build: u64,

    /// How often each simulated headset reports gaze, in milliseconds
    #[arg(short = 'p', long = "period", default_value_t = 100)]
    pub period_ms: u64,

    /// Don't print gaze ticks
    #[arg(short = 'q', long = "quiet-gaze")]
    pub quiet_gaze: bool,

    /// Exit after this many messages
    #[arg(short = 'l', long = "limit")]
    pub limit: Option<usize>,
}

impl MonitorArgs {
    /// Where the coordinator publishes, as a connect endpoint.
    pub fn broadcast_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.broadcast_port)
    }

    /// Where the coordinator listens for headsets.
    pub fn ingest_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.ingest_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_the_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(broadcast_port: 9000, ingest_port: 9001)").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let args = CoordinatorArgs::try_parse_from([
            "coordinator",
            "--config",
            &path,
            "-b",
            "9100",
            "-o",
            "Suturing",
            "-o",
            "Incision",
        ])
        .unwrap();
        let cfg = args.hub_config().unwrap();

        assert_eq!(cfg.broadcast_port, 9100);
        assert_eq!(cfg.ingest_port, 9001);
        assert_eq!(cfg.operations, vec!["Suturing", "Incision"]);
        assert!(!args.headless);
    }

    #[test]
    fn no_flags_means_defaults() {
        let args = CoordinatorArgs::try_parse_from(["coordinator"]).unwrap();
        assert_eq!(args.hub_config().unwrap(), HubConfig::default());
        assert_eq!(args.log_file, PathBuf::from("coordinator.log"));
    }

    #[test]
    fn monitor_endpoints() {
        let args =
            MonitorArgs::try_parse_from(["monitor", "--host", "10.0.0.2", "-n", "2"]).unwrap();
        assert_eq!(args.broadcast_endpoint(), "tcp://10.0.0.2:7788");
        assert_eq!(args.ingest_endpoint(), "tcp://10.0.0.2:7789");
        assert_eq!(args.dummies, 2);
    }
}
