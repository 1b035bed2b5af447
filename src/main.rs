//! kvops demo
//!
//! Walks every operation set once against a store and logs what comes back.
//! Point it at a running server with `--host`/`--port`, or pass `--embedded`
//! to use the in-process store.

use anyhow::Context;
use futures::StreamExt;
use kvops::connection::config::parse_port;
use kvops::embedded::Store;
use kvops::{
    ConnectionConfig, ConnectionFactory, ScoredMember, SerializationContext, StreamOffset,
    StreamReadOptions, TypedClient,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Demo configuration
struct Config {
    /// Store coordinates, seeded from `KVOPS_HOST`/`KVOPS_PORT`
    connection: ConnectionConfig,
    /// Use the in-process store instead of connecting
    embedded: bool,
}

impl Config {
    /// Parse configuration from the environment, then command-line arguments
    fn from_args() -> Self {
        let connection = ConnectionConfig::from_env().unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
        let mut config = Config {
            connection,
            embedded: false,
        };
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.connection.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.connection.port = parse_port(&args[i + 1]).unwrap_or_else(|e| {
                            eprintln!("Error: {e}");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--embedded" => {
                    config.embedded = true;
                    i += 1;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("kvops version {}", kvops::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }
}

fn print_help() {
    println!(
        r#"
kvops - typed operation sets for a Redis-compatible store

USAGE:
    kvops [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Store host (default: 127.0.0.1, env KVOPS_HOST)
    -p, --port <PORT>    Store port (default: 6379, env KVOPS_PORT)
        --embedded       Run against an in-process store
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    kvops --embedded               # No server needed
    kvops --port 6380              # Walk a server on port 6380

Set RUST_LOG=kvops=debug to see each command.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let factory = if config.embedded {
        info!("Using the embedded store");
        ConnectionFactory::embedded(Arc::new(Store::new()))
    } else {
        ConnectionFactory::create(config.connection.clone())
            .context("invalid connection settings")?
    };
    let factory = Arc::new(factory);

    let strings = TypedClient::string(Arc::clone(&factory));
    strings
        .ping()
        .await
        .with_context(|| format!("store at {} is not answering", config.connection.addr()))?;

    value_walkthrough(&strings).await?;
    list_walkthrough(&strings).await?;
    hash_walkthrough(&factory).await?;
    zset_walkthrough(&strings).await?;
    stream_walkthrough(&strings).await?;
    hyper_log_log_walkthrough(&strings).await?;

    let stats = factory.stats();
    info!(
        commands = stats.commands_sent,
        connections = stats.connections_opened,
        bytes_written = stats.bytes_written,
        bytes_read = stats.bytes_read,
        "Done"
    );
    factory.shutdown().await;
    Ok(())
}

fn key(s: &str) -> String {
    s.to_string()
}

async fn value_walkthrough(client: &TypedClient<String, String>) -> anyhow::Result<()> {
    let values = client.ops_for_value();
    let (name, price) = (key("book:1:name"), key("book:1:price"));

    values.set(&name, &"바람과 함께 사라지다".to_string()).await?;
    values.set(&price, &"13000".to_string()).await?;
    let written = values.set_if_absent(&name, &"undefined".to_string()).await?;
    info!(written, "setIfAbsent on an existing key");

    let both = values.multi_get(&[name, price.clone()]).await?;
    info!(?both, "multiGet");

    let total = values.increment(&price, 1000).await?;
    info!(total, "increment");
    Ok(())
}

async fn list_walkthrough(client: &TypedClient<String, String>) -> anyhow::Result<()> {
    let list = client.ops_for_list();
    let queue = key("QUEUE###1");
    client.delete(std::slice::from_ref(&queue)).await?;

    list.left_push(&queue, &"33000".to_string()).await?;
    list.left_push(&queue, &"34000".to_string()).await?;
    info!(size = list.size(&queue).await?, "list size");

    while let Some(item) = list.right_pop(&queue).await? {
        info!(%item, "rightPop");
    }
    Ok(())
}

async fn hash_walkthrough(factory: &Arc<ConnectionFactory>) -> anyhow::Result<()> {
    let client: TypedClient<String, Value> =
        TypedClient::bind(Arc::clone(factory), SerializationContext::json());
    let hash = client.ops_for_hash::<String, Value>();
    let book = key("BOOK###1");

    let properties = HashMap::from([
        (key("name"), Value::from("바람과 함께 사라지다")),
        (key("price"), Value::from(2000)),
    ]);
    hash.put_all(&book, &properties).await?;
    info!(values = ?hash.values(&book).await?, "hash values");
    info!(size = hash.size(&book).await?, "hash size");

    let price = hash.increment_float(&book, &key("price"), 100.0).await?;
    info!(price, "hash increment");

    let fields = hash.multi_get(&book, &[key("name"), key("price")]).await?;
    info!(?fields, "hash multiGet");

    if let Err(e) = hash.increment(&book, &key("name"), 1).await {
        warn!(error = %e, "increment on a text field is refused");
    }

    let removed = hash.remove(&book, &[key("price")]).await?;
    info!(removed, "hash remove");
    Ok(())
}

async fn zset_walkthrough(client: &TypedClient<String, String>) -> anyhow::Result<()> {
    let zset = client.ops_for_zset();
    let publishers = key("BOOK:1");
    client.delete(std::slice::from_ref(&publishers)).await?;

    let members = [
        ScoredMember::new(key("Paramount"), 1.0),
        ScoredMember::new(key("Apple"), 1.1),
        ScoredMember::new(key("Manning"), 1.3),
    ];
    zset.add_all(&publishers, &members).await?;
    let removed = zset.remove(&publishers, &[key("Paramount")]).await?;
    info!(removed, size = zset.size(&publishers).await?, "zset remove");

    for scored in zset.range_with_scores(&publishers, 0, -1).await? {
        info!(member = %scored.member, score = scored.score, "zset range");
    }
    let rank = zset.rank(&publishers, &key("Manning")).await?;
    info!(?rank, "zset rank");
    Ok(())
}

async fn stream_walkthrough(client: &TypedClient<String, String>) -> anyhow::Result<()> {
    let streams = client.ops_for_stream::<String, String>();
    let name = key("stream:1");

    let options = StreamReadOptions::empty()
        .block(Duration::from_secs(2))
        .count(2);
    let mut subscription = streams.read(options, StreamOffset::latest(name.clone())).await?;
    info!("subscribed");

    let record = HashMap::from([(key("1"), key("100")), (key("2"), key("200"))]);
    let id = streams.add(&name, &record).await?;
    info!(%id, "stream add");

    match tokio::time::timeout(Duration::from_secs(3), subscription.next()).await {
        Ok(Some(message)) => {
            let message = message?;
            info!(id = %message.id, fields = ?message.fields, "stream message");
        }
        Ok(None) => warn!("stream read ended without a message"),
        Err(_) => warn!("no stream message within 3s"),
    }
    subscription.unsubscribe();
    Ok(())
}

async fn hyper_log_log_walkthrough(client: &TypedClient<String, String>) -> anyhow::Result<()> {
    let counter = client.ops_for_hyper_log_log();
    let visitors = key("B:300");
    client.delete(std::slice::from_ref(&visitors)).await?;

    let first: Vec<String> = (1..=5).map(|n| n.to_string()).collect();
    counter.add(&visitors, &first).await?;
    info!(size = counter.size(&visitors).await?, "hyperloglog size");

    let second: Vec<String> = (1..=10).map(|n| n.to_string()).collect();
    counter.add(&visitors, &second).await?;
    info!(size = counter.size(&visitors).await?, "hyperloglog size");
    Ok(())
}
