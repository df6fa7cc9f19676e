use crate::{
    api::validate_inactivity_timeout,
    authorization::{ServerSettings, DEFAULT_TOKEN_AUDIENCE},
    etcd_encoding::StorageEncoding,
};
use anyhow::{ensure, Context, Result};
use clap::Parser;
use clio::ClioPath;
use log::LevelFilter;
use serde_json::Value;
use std::{env, path::PathBuf, str::FromStr};

pub(crate) use self::cli::Command;
use self::cli::{Cli, CommandOnly};

mod cli;

pub(crate) const CONFIG_ENV_VAR: &str = "OAUTH_MODEL_CONFIG";

fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// All settings, from either the CLI or the config file, coalesced into a single struct
#[derive(serde::Serialize)]
pub(crate) struct OAuthModelConfig {
    pub(crate) etcd_endpoint: Option<String>,
    pub(crate) seed_files: Vec<PathBuf>,
    pub(crate) storage_encoding: StorageEncoding,
    pub(crate) server: ServerSettings,
    pub(crate) threads: Option<usize>,
    #[serde(serialize_with = "serialize_display")]
    pub(crate) log_level: LevelFilter,

    #[serde(skip)]
    pub(crate) command: Command,
    pub(crate) config_file_raw: Option<String>,
    pub(crate) cli_raw: Option<String>,
}

fn check_server_settings(server: &ServerSettings) -> Result<()> {
    ensure!(
        server.access_token_max_age_seconds >= 0,
        "access_token_max_age_seconds must not be negative"
    );
    ensure!(
        server.authorize_token_max_age_seconds > 0,
        "authorize_token_max_age_seconds must be positive"
    );
    if let Some(timeout) = server.access_token_inactivity_timeout_seconds {
        validate_inactivity_timeout(timeout)
            .map_err(anyhow::Error::msg)
            .context("access_token_inactivity_timeout_seconds")?;
    }
    ensure!(!server.token_audiences.is_empty(), "token_audiences must not be empty");
    ensure!(server.conflict_retries > 0, "conflict_retries must be at least 1");

    Ok(())
}

fn seed_file(path: &str) -> Result<PathBuf> {
    let clio_path = ClioPath::new(path).context(format!("seed file {}", path))?;

    ensure!(clio_path.try_exists()?, "seed_file must exist: {}", clio_path);
    ensure!(clio_path.is_file(), "seed_file must be a file: {}", clio_path);

    Ok(clio_path.path().to_path_buf())
}

impl OAuthModelConfig {
    pub(crate) fn parse_from_config_file(config_bytes: &[u8], command: Command) -> Result<Self> {
        let value: Value = serde_yaml::from_slice(config_bytes)?;

        let mut value = value.as_object().context("config file must be a YAML object")?.clone();

        let etcd_endpoint = match value.remove("etcd_endpoint") {
            Some(value) => Some(value.as_str().context("etcd_endpoint must be a string")?.to_string()),
            None => None,
        };

        let seed_files = match value.remove("seed_files") {
            Some(value) => value
                .as_array()
                .context("seed_files must be an array")?
                .iter()
                .map(|value| seed_file(value.as_str().context("seed_files must be an array of strings")?))
                .collect::<Result<Vec<PathBuf>>>()?,
            None => vec![],
        };

        let storage_encoding = match value.remove("storage_encoding") {
            Some(value) => {
                let storage_encoding = value.as_str().context("storage_encoding must be a string")?;
                StorageEncoding::from_str(storage_encoding).context(format!("storage_encoding {}", storage_encoding))?
            }
            None => StorageEncoding::default(),
        };

        let defaults = ServerSettings::default();

        let access_token_max_age_seconds = match value.remove("access_token_max_age_seconds") {
            Some(value) => value.as_i64().context("access_token_max_age_seconds must be an integer")?,
            None => defaults.access_token_max_age_seconds,
        };

        let access_token_inactivity_timeout_seconds = match value.remove("access_token_inactivity_timeout_seconds") {
            Some(value) => Some(
                value
                    .as_i64()
                    .context("access_token_inactivity_timeout_seconds must be an integer")?
                    .try_into()
                    .context("access_token_inactivity_timeout_seconds out of range")?,
            ),
            None => defaults.access_token_inactivity_timeout_seconds,
        };

        let authorize_token_max_age_seconds = match value.remove("authorize_token_max_age_seconds") {
            Some(value) => value.as_i64().context("authorize_token_max_age_seconds must be an integer")?,
            None => defaults.authorize_token_max_age_seconds,
        };

        let token_audiences = match value.remove("token_audiences") {
            Some(value) => value
                .as_array()
                .context("token_audiences must be an array")?
                .iter()
                .map(|value| {
                    Ok(value
                        .as_str()
                        .context("token_audiences must be an array of strings")?
                        .to_string())
                })
                .collect::<Result<Vec<String>>>()?,
            None => defaults.token_audiences,
        };

        let conflict_retries = match value.remove("conflict_retries") {
            Some(value) => value
                .as_u64()
                .context("conflict_retries must be an integer")?
                .try_into()
                .context("conflict_retries out of range")?,
            None => defaults.conflict_retries,
        };

        let threads = match value.remove("threads") {
            Some(value) => Some(
                value
                    .as_u64()
                    .context("threads must be an integer")?
                    .try_into()
                    .context("threads must be an integer")?,
            ),
            None => None,
        };

        let log_level = match value.remove("log_level") {
            Some(value) => {
                let log_level = value.as_str().context("log_level must be a string")?;
                LevelFilter::from_str(log_level).context(format!("log_level {}", log_level))?
            }
            None => LevelFilter::Info,
        };

        ensure!(
            value.is_empty(),
            "unknown keys {:?} in config file",
            value.keys().map(|key| key.to_string()).collect::<Vec<String>>().join(", ")
        );

        let config = Self {
            etcd_endpoint,
            seed_files,
            storage_encoding,
            server: ServerSettings {
                access_token_max_age_seconds,
                access_token_inactivity_timeout_seconds,
                authorize_token_max_age_seconds,
                token_audiences,
                conflict_retries,
            },
            threads,
            log_level,
            command,
            config_file_raw: Some(String::from_utf8_lossy(config_bytes).to_string()),
            cli_raw: None,
        };

        check_server_settings(&config.server)?;
        ensure!(
            !(config.etcd_endpoint.is_some() && !config.seed_files.is_empty()),
            "etcd_endpoint and seed_files are mutually exclusive"
        );

        Ok(config)
    }

    pub(crate) fn parse_from_cli(cli: Cli) -> Result<Self> {
        let config = Self {
            etcd_endpoint: cli.etcd_endpoint,
            seed_files: cli.seed_file.iter().map(|path| path.path().to_path_buf()).collect(),
            storage_encoding: cli.storage_encoding,
            server: ServerSettings {
                access_token_max_age_seconds: cli.access_token_max_age_seconds,
                access_token_inactivity_timeout_seconds: cli.access_token_inactivity_timeout_seconds,
                authorize_token_max_age_seconds: cli.authorize_token_max_age_seconds,
                token_audiences: if cli.token_audience.is_empty() {
                    vec![DEFAULT_TOKEN_AUDIENCE.to_string()]
                } else {
                    cli.token_audience
                },
                conflict_retries: cli.conflict_retries,
            },
            threads: cli.threads,
            log_level: cli.log_level,
            command: cli.command,
            config_file_raw: None,
            cli_raw: Some(serde_json::to_string(&env::args().collect::<Vec<String>>())?),
        };

        check_server_settings(&config.server)?;

        Ok(config)
    }

    pub(crate) fn new() -> Result<Self> {
        Ok(match env::var(CONFIG_ENV_VAR) {
            Ok(var) => {
                // Settings come from the file, the command line only picks the subcommand
                let command = CommandOnly::try_parse()
                    .context(format!("{} is set, only a subcommand may be given on the command line", CONFIG_ENV_VAR))?
                    .command;

                Self::parse_from_config_file(
                    &std::fs::read(&var).context(format!("reading {} file {}", CONFIG_ENV_VAR, var))?,
                    command,
                )
                .context(format!("parsing {} file {}", CONFIG_ENV_VAR, var))?
            }
            Err(_) => Self::parse_from_cli(Cli::parse()).context("CLI parsing")?,
        })
    }
}
