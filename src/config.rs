use axum_server::tls_rustls::RustlsConfig;
use concread::cowcell::asynch::{CowCell, CowCellWriteTxn};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::IbexError;

const CONFIG_LOCATIONS: [&str; 2] = ["~/.config/ibexdns.json", "./ibexdns.json"];

/// One upstream recursor to forward unanswered queries to.
#[derive(Debug, Deserialize, Eq, PartialEq, Clone, Serialize)]
pub struct Upstream {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Eq, PartialEq, Clone, Serialize)]
#[serde(default)]
/// The main config blob for ibexdns, write this as a JSON file and load it and it'll make things go.
pub struct ConfigFile {
    /// DNS listener address, UDP and TCP both bind here
    pub address: String,
    /// Listen for DNS queries on this port, default is 8053
    pub port: u16,
    /// HTTPS listener address for DoH and the admin API
    pub api_address: String,
    /// HTTPS port, default is 8443
    pub api_port: u16,
    /// Certificate path
    pub api_tls_cert: PathBuf,
    /// TLS key path
    pub api_tls_key: PathBuf,
    /// Upstream resolvers, tried in order
    pub upstreams: Vec<Upstream>,
    /// The location of the records sqlite file
    pub sqlite_path: String,
    /// Where the query log lands
    pub log_directory: String,
    /// Bearer token for the admin API - it'll randomly generate on startup by default
    #[serde(default = "generate_admin_token")]
    pub admin_token: String,
    /// Default is "info"
    pub log_level: String,
    /// How long until we drop TCP client connections, defaults to 10 seconds.
    pub tcp_client_timeout: u64,
    /// Upper bound on concurrently handled UDP queries
    pub max_in_flight: usize,
}

fn generate_admin_token() -> String {
    format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            address: "0.0.0.0".to_string(),
            port: 8053,
            api_address: "0.0.0.0".to_string(),
            api_port: 8443,
            api_tls_cert: PathBuf::from("./certs/server.crt"),
            api_tls_key: PathBuf::from("./certs/server.key"),
            upstreams: vec![
                Upstream {
                    host: "1.1.1.1".to_string(),
                    port: 53,
                },
                Upstream {
                    host: "8.8.8.8".to_string(),
                    port: 53,
                },
            ],
            sqlite_path: "./ibexdns.sqlite".to_string(),
            log_directory: "./logs".to_string(),
            admin_token: generate_admin_token(),
            log_level: "info".to_string(),
            tcp_client_timeout: 10,
            max_in_flight: crate::MAX_IN_FLIGHT,
        }
    }
}

impl ConfigFile {
    /// JSONify the configfile in a pretty way using serde
    pub fn as_json_pretty(&self) -> Result<String, IbexError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| IbexError::StartupError(format!("Failed to serialize config: {err:?}")))
    }

    /// Get a bindable SocketAddr for use in the DNS listeners
    pub fn dns_listener_address(&self) -> Result<SocketAddr, IbexError> {
        let listen_addr = format!("{}:{}", &self.address, &self.port);
        listen_addr.parse::<SocketAddr>().map_err(|err| {
            IbexError::StartupError(format!("Failed to parse DNS listener address: {err:?}"))
        })
    }

    /// Where the HTTPS side listens
    pub fn api_listener_address(&self) -> Result<SocketAddr, IbexError> {
        SocketAddr::from_str(&format!("{}:{}", self.api_address, self.api_port)).map_err(|err| {
            IbexError::StartupError(format!("Failed to parse API listener address: {err:?}"))
        })
    }

    /// The upstream list in the (host, port) form the forwarder takes
    pub fn upstream_list(&self) -> Vec<(String, u16)> {
        self.upstreams
            .iter()
            .map(|upstream| (upstream.host.clone(), upstream.port))
            .collect()
    }

    pub async fn get_tls_config(&self) -> Result<RustlsConfig, IbexError> {
        RustlsConfig::from_pem_file(self.api_tls_cert.clone(), self.api_tls_key.clone())
            .await
            .map_err(|err| {
                IbexError::StartupError(format!("Failed to load TLS cert/key: {err:?}"))
            })
    }

    /// Expand tildes in the TLS paths and make sure the files exist,
    /// committing the cleaned-up config back.
    pub async fn check_config(
        mut config: CowCellWriteTxn<'_, ConfigFile>,
    ) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = vec![];

        if let Some(cert) = config.api_tls_cert.to_str() {
            config.api_tls_cert = PathBuf::from(shellexpand::tilde(cert).to_string());
        }
        if let Some(key) = config.api_tls_key.to_str() {
            config.api_tls_key = PathBuf::from(shellexpand::tilde(key).to_string());
        }

        if !config.api_tls_key.exists() {
            errors.push(format!(
                "Failed to find API TLS key file: {:?}",
                config.api_tls_key
            ));
        };
        if !config.api_tls_cert.exists() {
            errors.push(format!(
                "Failed to find API TLS cert file: {:?}",
                config.api_tls_cert
            ));
        };
        if config.upstreams.is_empty() {
            errors.push("No upstream resolvers configured".to_string());
        }

        config.commit().await;
        match errors.is_empty() {
            true => Ok(()),
            false => Err(errors),
        }
    }

    /// Uses [Self::try_from] and wraps it in a CowCell (moo)
    pub fn try_as_cowcell(
        config_path: Option<&String>,
    ) -> Result<CowCell<ConfigFile>, std::io::Error> {
        Ok(CowCell::new(ConfigFile::try_from(config_path)?))
    }

    /// Loads the configuration from a given file or from some default locations.
    ///
    /// The default locations are `~/.config/ibexdns.json` and `./ibexdns.json`.
    pub fn try_from(config_path: Option<&String>) -> Result<ConfigFile, std::io::Error> {
        let file_locations = match config_path {
            Some(value) => vec![value.to_owned()],
            None => CONFIG_LOCATIONS.iter().map(|x| x.to_string()).collect(),
        };

        let found_files: Vec<String> = file_locations
            .iter()
            .filter_map(|f| {
                let path = shellexpand::tilde(&f).into_owned();
                let filepath = std::path::Path::new(&path);
                match filepath.exists() {
                    false => {
                        eprintln!("Config file {path} doesn't exist, skipping.");
                        None
                    }
                    true => Some(path),
                }
            })
            .collect();

        if found_files.is_empty() {
            eprintln!(
                "No configuration files exist, tried: {}. Using defaults.",
                file_locations.join(", ")
            );
            return Ok(ConfigFile::default());
        }

        let config_filename = &found_files[0];
        let builder = Config::builder()
            .add_source(File::new(config_filename, config::FileFormat::Json))
            .add_source(config::Environment::with_prefix("ibexdns"));

        let config = builder.build().map_err(|e| {
            std::io::Error::new(
                ErrorKind::InvalidData,
                format!("Couldn't load config from {config_filename}: {e:?}"),
            )
        })?;

        config.try_deserialize::<ConfigFile>().map_err(|e| {
            std::io::Error::new(
                ErrorKind::InvalidData,
                format!("Couldn't parse config from {config_filename}: {e:?}"),
            )
        })
    }
}
