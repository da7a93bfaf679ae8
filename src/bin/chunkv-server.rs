//! CHUNKV Server Binary
//!
//! Sharded in-memory JSON key/value store over HTTP.

use chunkv::{Config, Server};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// CHUNKV Server - Sharded In-Memory JSON Key/Value Store
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of chunks in the concurrent map
    #[arg(long, env = "CHUNKS")]
    chunks: u32,

    /// Logging level (DEBUG, INFO, WARN or ERROR)
    #[arg(long = "loggingLevel", env = "LOGGING_LEVEL", default_value = "INFO")]
    logging_level: String,

    /// MongoDB connection string
    #[arg(long = "mdbConnectionString", env = "MDB_CONNECTION_STRING")]
    mdb_connection_string: String,

    /// MongoDB database name
    #[arg(long = "mdbDbName", env = "MDB_DATABASE")]
    mdb_db_name: String,

    /// MongoDB collection name
    #[arg(long = "mdbCollection", env = "MDB_COLLECTION")]
    mdb_collection: String,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port number
    #[arg(short, long, default_value_t = 8081)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(args.logging_level.to_lowercase().parse()?),
        )
        .init();

    info!(
        "starting chunkv server on {}:{} with {} chunks",
        args.bind, args.port, args.chunks
    );

    let config = Config::new(args.chunks)
        .with_bind(&args.bind)
        .with_port(args.port)
        .with_mongo(
            &args.mdb_connection_string,
            &args.mdb_db_name,
            &args.mdb_collection,
        );

    let server = Server::new(config);
    server.run().await?;

    Ok(())
}
