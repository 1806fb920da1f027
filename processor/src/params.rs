//! Runtime configuration held in a central parameter store.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

pub const EVENT_TABLE: &str = "DynamoDBTableName";
pub const BUCKET: &str = "S3BucketName";
pub const TOPIC_ARN: &str = "SNSTopicARN";
pub const DB_HOST: &str = "RDSHost";
pub const DB_USERNAME: &str = "RDSUsername";
pub const DB_PASSWORD: &str = "RDSPassword";
pub const DB_DATABASE: &str = "RDSDatabase";
pub const DB_TABLE: &str = "RDSTable";

const DEFAULT_MYSQL_PORT: u16 = 3306;

/// A named-value lookup.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<String>;
}

/// AWS SSM Parameter Store, values decrypted on read.
#[derive(Clone)]
pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get(&self, name: &str) -> Result<String> {
        self.client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| Error::Config(DisplayErrorContext(e).to_string()))?
            .parameter()
            .and_then(|p| p.value().map(String::from))
            .ok_or_else(|| Error::MissingParameter(name.to_string()))
    }
}

/// Resolves parameters under a common hierarchical prefix.
#[derive(Clone)]
pub struct ParameterResolver {
    store: Arc<dyn ParameterStore>,
    prefix: String,
}

impl ParameterResolver {
    pub fn new(store: Arc<dyn ParameterStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Full parameter name for `key`.
    pub fn name(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key)
    }

    /// Looks up `name`. Any failure is logged and reported as `None`.
    pub async fn resolve(&self, name: &str) -> Option<String> {
        match self.store.get(name).await {
            Ok(value) => {
                debug!(name, "parameter resolved");
                Some(value)
            }
            Err(e) => {
                error!(name, error = %e, "failed to retrieve parameter");
                None
            }
        }
    }

    /// Looks up `key` under the prefix; a missing value is an error.
    pub async fn require(&self, key: &str) -> Result<String> {
        let name = self.name(key);
        match self.resolve(&name).await {
            Some(value) => Ok(value),
            None => Err(Error::MissingParameter(name)),
        }
    }
}

/// Backend identifiers used by the ingestion handler.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub table: String,
    pub bucket: String,
    pub topic_arn: String,
}

impl IngestSettings {
    pub async fn resolve(params: &ParameterResolver) -> Result<Self> {
        Ok(Self {
            table: params.require(EVENT_TABLE).await?,
            bucket: params.require(BUCKET).await?,
            topic_arn: params.require(TOPIC_ARN).await?,
        })
    }
}

/// Backend identifiers used by the batch processor.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    pub table: String,
    pub bucket: String,
    pub database: DatabaseSettings,
}

impl BatchSettings {
    pub async fn resolve(params: &ParameterResolver) -> Result<Self> {
        Ok(Self {
            table: params.require(EVENT_TABLE).await?,
            bucket: params.require(BUCKET).await?,
            database: DatabaseSettings::resolve(params).await?,
        })
    }
}

/// Relational database location, credentials and target table.
#[derive(Clone, PartialEq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub table: String,
}

impl DatabaseSettings {
    pub async fn resolve(params: &ParameterResolver) -> Result<Self> {
        let (host, port) = split_host(&params.require(DB_HOST).await?)?;
        let table = params.require(DB_TABLE).await?;
        validate_identifier(&table)?;

        Ok(Self {
            host,
            port,
            username: params.require(DB_USERNAME).await?,
            password: params.require(DB_PASSWORD).await?,
            database: params.require(DB_DATABASE).await?,
            table,
        })
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("table", &self.table)
            .finish()
    }
}

/// Splits `host`, `host:port`, `[v6]` or `[v6]:port`. A bare IPv6 address
/// takes the default port, since its last group cannot be told from a port.
fn split_host(raw: &str) -> Result<(String, u16)> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| Error::Config(format!("invalid database port in `{}`", raw)))
    };

    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("unterminated IPv6 address in `{}`", raw)))?;
        let port = match tail {
            "" => DEFAULT_MYSQL_PORT,
            _ => match tail.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None => return Err(Error::Config(format!("invalid database host `{}`", raw))),
            },
        };
        return Ok((host.to_string(), port));
    }

    if raw.matches(':').count() > 1 {
        return Ok((raw.to_string(), DEFAULT_MYSQL_PORT));
    }

    match raw.split_once(':') {
        Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
        None => Ok((raw.to_string(), DEFAULT_MYSQL_PORT)),
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("`{}` is not a valid table name", name)))
    }
}
