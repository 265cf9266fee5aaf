//! Command-line flags, each falling back to an environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use ferry_core::app::LinkBuilder;
use ferry_core::config::DEFAULT_MAX_PAYLOAD_BYTES;
use ferry_core::domain::ConfigError;
use ferry_core::{FileFormat, StoreConfig};

#[derive(Debug, Parser)]
#[command(name = "ferry", version, about = "Serve uploaded files behind short-lived download links")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Directory holding the stored blobs (wiped on startup)
    #[arg(long, env = "UPLOAD_DIRECTORY", default_value = "./uploads")]
    pub upload_directory: PathBuf,

    /// Minutes a link stays valid
    #[arg(long, env = "EXPIRY_MINUTES", default_value_t = 10)]
    pub expiry_minutes: u64,

    /// Seconds between background sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECONDS", default_value_t = 300)]
    pub sweep_interval_seconds: u64,

    /// The only accepted file extension
    #[arg(long, env = "REQUIRED_SUFFIX", default_value = ".pdf")]
    pub required_suffix: String,

    /// Content type served for downloads; guessed from the suffix if unset
    #[arg(long, env = "CONTENT_TYPE")]
    pub content_type: Option<String>,

    /// Base of the links handed out, e.g. https://files.example.com
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8000")]
    pub public_base_url: String,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8000")]
    pub bind_address: SocketAddr,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    pub max_upload_bytes: u64,
}

impl Settings {
    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        let format = match &self.content_type {
            Some(content_type) => FileFormat::new(&self.required_suffix, content_type)?,
            None => FileFormat::from_suffix(&self.required_suffix)?,
        };
        let config = StoreConfig {
            ttl: Duration::from_secs(self.expiry_minutes.saturating_mul(60)),
            sweep_interval: Duration::from_secs(self.sweep_interval_seconds),
            format,
            max_payload_bytes: self.max_upload_bytes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn link_builder(&self) -> Result<LinkBuilder, ConfigError> {
        LinkBuilder::new(&self.public_base_url)
    }
}

/// Load `.env` from the working directory. A missing file is fine; any
/// other failure is handed back to be logged once tracing is up.
pub fn load_dotenv() -> Option<dotenvy::Error> {
    dotenv_failure(dotenvy::dotenv())
}

fn dotenv_failure<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    result.err().filter(|e| !e.not_found())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dotenv_is_not_reported() {
        let missing = dotenvy::from_path("/nonexistent/ferry/.env");
        assert!(dotenv_failure(missing).is_none());
    }

    #[test]
    fn malformed_dotenv_is_reported() {
        let malformed: Result<(), _> = Err(dotenvy::Error::LineParse("=oops".into(), 0));
        assert!(dotenv_failure(malformed).is_some());
    }

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("ferry").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--expiry-minutes",
            "5",
            "--sweep-interval-seconds",
            "30",
            "--required-suffix",
            ".PNG",
            "--public-base-url",
            "https://files.example.com/",
        ]);

        let config = cli.settings.store_config().unwrap();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.format.suffix(), ".png");
        assert_eq!(config.format.content_type(), "image/png");

        let links = cli.settings.link_builder().unwrap();
        assert_eq!(links.base(), "https://files.example.com");
    }

    #[test]
    fn explicit_content_type_wins() {
        let cli = parse(&["--content-type", "application/x-custom"]);
        let config = cli.settings.store_config().unwrap();
        assert_eq!(config.format.content_type(), "application/x-custom");
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let cli = parse(&["--expiry-minutes", "0"]);
        assert!(matches!(
            cli.settings.store_config(),
            Err(ConfigError::Zero("ttl"))
        ));
    }

    #[test]
    fn malformed_bind_address_fails_to_parse() {
        let argv = ["ferry", "--bind-address", "not-an-address"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
