use clap::Parser;
use ibexdns::cache::AnswerCache;
use ibexdns::cli::{Cli, Commands, SharedOpts};
use ibexdns::config::ConfigFile;
use ibexdns::querylog::QueryLog;
use ibexdns::resolver::Resolver;
use ibexdns::{datastore, servers, web, MAX_IN_FLIGHT};
use std::io::ErrorKind;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let cli = Cli::parse();
    match cli.command.unwrap_or_default() {
        Commands::Server { sopt } => run_server(sopt).await,
        Commands::ConfigCheck { sopt } => config_check(sopt).await,
        Commands::ExportConfig { .. } => {
            println!("{}", ConfigFile::default().as_json_pretty()?);
            Ok(())
        }
    }
}

async fn config_check(sopt: SharedOpts) -> Result<(), std::io::Error> {
    let config = ConfigFile::try_as_cowcell(sopt.config.as_ref())?;
    match ConfigFile::check_config(config.write().await).await {
        Ok(()) => {
            println!("Config check OK");
            println!("{}", config.read().await.as_json_pretty()?);
            Ok(())
        }
        Err(errors) => {
            for error in errors {
                eprintln!("{error}");
            }
            Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "configuration check failed",
            ))
        }
    }
}

async fn run_server(sopt: SharedOpts) -> Result<(), std::io::Error> {
    let config = ConfigFile::try_as_cowcell(sopt.config.as_ref())?;
    if let Err(errors) = ConfigFile::check_config(config.write().await).await {
        for error in errors {
            eprintln!("{error}");
        }
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "configuration check failed",
        ));
    }
    let config_read = config.read().await;

    let log_level = match sopt.debug {
        true => "debug".to_string(),
        false => config_read.log_level.clone(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider was already installed");
    }

    let pool = datastore::open_pool(&config_read.sqlite_path).await?;
    let (store_tx, store_rx) = mpsc::channel(MAX_IN_FLIGHT);
    let datastore_handle = tokio::spawn(datastore::manager(store_rx, pool));
    info!("Record store ready at {}", config_read.sqlite_path);

    let (qlog, _qlog_handle) = QueryLog::start(Path::new(&config_read.log_directory)).await?;

    let resolver = Resolver::new(
        AnswerCache::new(),
        store_tx.clone(),
        config_read.upstream_list(),
        qlog,
    );

    let dns_addr = config_read.dns_listener_address()?;
    let udp_handle = tokio::spawn(servers::udp_server(
        dns_addr,
        resolver.clone(),
        config_read.max_in_flight,
    ));
    let tcp_handle = tokio::spawn(servers::tcp_server(
        dns_addr,
        resolver.clone(),
        config_read.tcp_client_timeout,
    ));
    let web_handle = web::build(resolver, store_tx, config.read().await).await?;

    // all of these run until something goes badly wrong
    tokio::select! {
        res = udp_handle => error!("UDP server exited: {res:?}"),
        res = tcp_handle => error!("TCP server exited: {res:?}"),
        res = web_handle => error!("Web server exited: {res:?}"),
        res = datastore_handle => error!("Record store exited: {res:?}"),
    }
    Ok(())
}
