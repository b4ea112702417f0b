pub mod assemble;
pub mod diff;
pub mod error;
pub mod normalize;
pub mod rules;
pub mod store;

pub use assemble::{assemble, build_design, sanitize, Assembly, ScanOrigin};
pub use diff::{diff_designs, DesignDiff};
pub use error::CoreError;
pub use normalize::{is_active, normalize, normalize_all, Normalized, RawResource, SourceKind};
pub use rules::{infer, infer_connections, FanOut, Inference, Rule, RULES};
pub use store::{validate_name, DesignStore, ScanSettings};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// --- Types ---

/// Closed set of node categories in an architecture design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Service,
    Database,
    Function,
    Storage,
    LoadBalancer,
    Queue,
    Cache,
    Api,
    External,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Service,
        Category::Database,
        Category::Function,
        Category::Storage,
        Category::LoadBalancer,
        Category::Queue,
        Category::Cache,
        Category::Api,
        Category::External,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Service => "service",
            Category::Database => "database",
            Category::Function => "function",
            Category::Storage => "storage",
            Category::LoadBalancer => "load_balancer",
            Category::Queue => "queue",
            Category::Cache => "cache",
            Category::Api => "api",
            Category::External => "external",
        }
    }

    /// Map any label to the closest category. Unknown labels become `External`
    /// so a component is never left uncategorized.
    pub fn from_label(label: &str) -> Category {
        let key = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "service" | "compute" | "container" | "server" | "worker" | "web" => Category::Service,
            "database" | "db" | "rds" | "sql" => Category::Database,
            "function" | "lambda" | "serverless" => Category::Function,
            "storage" | "s3" | "bucket" | "object_store" | "blob" => Category::Storage,
            "load_balancer" | "loadbalancer" | "lb" | "alb" | "elb" | "nlb" => {
                Category::LoadBalancer
            }
            "queue" | "sqs" | "topic" | "stream" | "event_bus" => Category::Queue,
            "cache" | "redis" | "memcached" | "elasticache" => Category::Cache,
            "api" | "gateway" | "api_gateway" => Category::Api,
            _ => Category::External,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Category::from_label(&label))
    }
}

/// Edge type. The named variants are the ones the inference rules emit;
/// `Other` keeps whatever label an external producer used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionType {
    Http,
    Grpc,
    Async,
    Sql,
    CacheProtocol,
    Internal,
    Other(String),
}

impl ConnectionType {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionType::Http => "http",
            ConnectionType::Grpc => "grpc",
            ConnectionType::Async => "async",
            ConnectionType::Sql => "sql",
            ConnectionType::CacheProtocol => "cache_protocol",
            ConnectionType::Internal => "internal",
            ConnectionType::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> ConnectionType {
        match label.trim().to_ascii_lowercase().as_str() {
            "http" | "https" | "rest" => ConnectionType::Http,
            "grpc" => ConnectionType::Grpc,
            "async" => ConnectionType::Async,
            "sql" => ConnectionType::Sql,
            "cache_protocol" => ConnectionType::CacheProtocol,
            "internal" => ConnectionType::Internal,
            other => ConnectionType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConnectionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConnectionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(ConnectionType::from_label(&label))
    }
}

/// A node in the design. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Component {
    #[serde(alias = "name")]
    pub identifier: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(alias = "type")]
    pub category: Category,
    #[serde(default)]
    pub description: String,
}

/// A directed, typed edge between two components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    #[serde(alias = "from_component")]
    pub source_identifier: String,
    #[serde(alias = "to_component")]
    pub target_identifier: String,
    #[serde(alias = "type")]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub description: String,
}

impl Connection {
    /// The `(source, target, type)` triple that must be unique within a design.
    pub fn key(&self) -> (&str, &str, &ConnectionType) {
        (
            &self.source_identifier,
            &self.target_identifier,
            &self.connection_type,
        )
    }
}

/// The shared contract between scanners, drafting tools and renderers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ArchitectureDesign {
    pub title: String,
    #[serde(default, alias = "description")]
    pub summary: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ArchitectureDesign {
    pub fn component(&self, identifier: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.identifier == identifier)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.connections.is_empty()
    }
}
