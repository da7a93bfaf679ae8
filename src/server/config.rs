//! Server Configuration

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub bind: String,

    /// Port number
    pub port: u16,

    /// Number of chunks in each concurrent map
    pub chunks: u32,

    /// MongoDB connection string
    pub mongo_uri: String,

    /// MongoDB database name
    pub mongo_db: String,

    /// MongoDB collection holding snapshots
    pub mongo_collection: String,
}

impl Config {
    /// Create a config with the given chunk count and default listen address.
    pub fn new(chunks: u32) -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8081,
            chunks,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_db: "chunkv".to_string(),
            mongo_collection: "snapshot".to_string(),
        }
    }

    /// Set the bind address
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the MongoDB connection parameters
    pub fn with_mongo(
        mut self,
        uri: impl Into<String>,
        db: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        self.mongo_uri = uri.into();
        self.mongo_db = db.into();
        self.mongo_collection = collection.into();
        self
    }
}
