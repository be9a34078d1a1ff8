//! Configuration management
//!
//! Settings resolve from built-in defaults, then an optional TOML file, then
//! environment variables and command-line flags (through clap, flags win).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use s3ftp_auth::CredentialStore;
use s3ftp_s3::backend::FtpSettings;
use serde::Deserialize;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "s3ftp";

const DEFAULT_FTP_HOST: &str = "localhost";
const DEFAULT_FTP_PORT: u16 = 21;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 10;

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

#[derive(Parser, Debug, Default)]
#[command(name = "s3ftp")]
#[command(about = "S3 protocol gateway in front of an FTP server", long_about = None)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// FTP server host
    #[arg(long, env = "FTP_HOST")]
    pub ftp_host: Option<String>,

    /// FTP server port
    #[arg(long, env = "FTP_PORT")]
    pub ftp_port: Option<u16>,

    /// FTP login user
    #[arg(long, env = "FTP_USER")]
    pub ftp_user: Option<String>,

    /// FTP login password
    #[arg(long, env = "FTP_PASSWORD", hide_env_values = true)]
    pub ftp_password: Option<String>,

    /// Address to listen on
    #[arg(long = "listen", env = "LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Access key clients must sign with
    #[arg(long, env = "S3_ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,

    /// Secret for the access key
    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Log level (DEBUG, INFO, WARN, ERROR)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// FTP connect timeout in seconds
    #[arg(long = "ftp-connect-timeout", value_name = "SECS")]
    pub ftp_connect_timeout: Option<u32>,
}

/// Resolved settings, fixed for the life of the process
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub ftp_host: String,
    pub ftp_port: u16,
    #[serde(default)]
    pub ftp_user: String,
    #[serde(default)]
    pub ftp_password: String,
    pub listen_addr: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_key: String,
    pub log_level: String,
    pub log_json: bool,
    pub ftp_connect_timeout_secs: u64,
}

impl Config {
    /// Load configuration from defaults, file and arguments, then validate it
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("ftp_host", DEFAULT_FTP_HOST)?
            .set_default("ftp_port", i64::from(DEFAULT_FTP_PORT))?
            .set_default("listen_addr", DEFAULT_LISTEN_ADDR)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("log_json", false)?
            .set_default(
                "ftp_connect_timeout_secs",
                i64::from(DEFAULT_CONNECT_TIMEOUT_SECS),
            )?;

        builder = match &args.config {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder
            .set_override_option("ftp_host", args.ftp_host.clone())?
            .set_override_option("ftp_port", args.ftp_port.map(i64::from))?
            .set_override_option("ftp_user", args.ftp_user.clone())?
            .set_override_option("ftp_password", args.ftp_password.clone())?
            .set_override_option("listen_addr", args.listen_addr.clone())?
            .set_override_option("access_key_id", args.access_key_id.clone())?
            .set_override_option("secret_key", args.secret_key.clone())?
            .set_override_option("log_level", args.log_level.clone())?
            .set_override_option(
                "ftp_connect_timeout_secs",
                args.ftp_connect_timeout.map(i64::from),
            )?;
        if args.log_json {
            builder = builder.set_override("log_json", true)?;
        }

        let config = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize::<Config>()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ftp_user.is_empty() {
            bail!("FTP user is required (--ftp-user or FTP_USER)");
        }
        if self.ftp_password.is_empty() {
            bail!("FTP password is required (--ftp-password or FTP_PASSWORD)");
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("unknown log level '{}'", self.log_level);
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.listen_addr))
    }

    pub fn ftp_settings(&self) -> FtpSettings {
        FtpSettings {
            host: self.ftp_host.clone(),
            port: self.ftp_port,
            user: self.ftp_user.clone(),
            password: self.ftp_password.clone(),
            connect_timeout: Duration::from_secs(self.ftp_connect_timeout_secs),
        }
    }

    /// The configured key pair, registered only when both halves are set
    pub fn credentials(&self) -> CredentialStore {
        if self.access_key_id.is_empty() || self.secret_key.is_empty() {
            return CredentialStore::empty();
        }
        CredentialStore::new([(self.access_key_id.clone(), self.secret_key.clone())])
    }

    /// Filter directive for the workspace crates and the HTTP trace layer
    pub fn log_filter(&self) -> String {
        let level = self.log_level.to_lowercase();
        format!(
            "s3ftp={level},s3ftp_s3={level},s3ftp_auth={level},s3ftp_core={level},tower_http={level}"
        )
    }
}
