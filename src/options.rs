//! Server, user mapping and table options.
//!
//! Options arrive as `name = value` pairs attached to one of three catalog
//! objects. `validate_options` checks them against the context they were
//! given in; the typed structs below are what the rest of the crate reads.
//! `Settings` layers the same server and user options from defaults, an
//! optional TOML file and `CQLBRIDGE_*` environment variables.

use crate::core::{BridgeError, OptionError, RelationDescriptor};
use crate::planner::ClassifyOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9042;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 12000;

/// Per-statement consistency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    #[default]
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl Consistency {
    pub const ALL: [Self; 11] = [
        Self::Any,
        Self::One,
        Self::Two,
        Self::Three,
        Self::Quorum,
        Self::All,
        Self::LocalQuorum,
        Self::EachQuorum,
        Self::Serial,
        Self::LocalSerial,
        Self::LocalOne,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::One => "one",
            Self::Two => "two",
            Self::Three => "three",
            Self::Quorum => "quorum",
            Self::All => "all",
            Self::LocalQuorum => "local_quorum",
            Self::EachQuorum => "each_quorum",
            Self::Serial => "serial",
            Self::LocalSerial => "local_serial",
            Self::LocalOne => "local_one",
        }
    }

    fn valid_names() -> String {
        Self::ALL.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("invalid consistency level: {s} (valid values are: {})", Self::valid_names()))
    }
}

impl TryFrom<String> for Consistency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Consistency> for String {
    fn from(value: Consistency) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Catalog object an option is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionContext {
    Server,
    UserMapping,
    Table,
}

impl FromStr for OptionContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "user" | "user_mapping" | "user mapping" => Ok(Self::UserMapping),
            "table" | "foreign_table" | "foreign table" => Ok(Self::Table),
            other => Err(format!("unknown option context '{other}'")),
        }
    }
}

impl fmt::Display for OptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Server => "foreign server",
            Self::UserMapping => "user mapping",
            Self::Table => "foreign table",
        };
        write!(f, "{name}")
    }
}

/// Every recognised option and where it may appear
pub const OPTIONS: &[(&str, OptionContext)] = &[
    ("host", OptionContext::Server),
    ("port", OptionContext::Server),
    ("protocol_version", OptionContext::Server),
    ("ssl", OptionContext::Server),
    ("ssl_cert", OptionContext::Server),
    ("ssl_key", OptionContext::Server),
    ("ssl_ca", OptionContext::Server),
    ("connect_timeout", OptionContext::Server),
    ("request_timeout", OptionContext::Server),
    ("consistency", OptionContext::Server),
    ("username", OptionContext::UserMapping),
    ("password", OptionContext::UserMapping),
    ("keyspace", OptionContext::Table),
    ("table", OptionContext::Table),
    ("primary_key", OptionContext::Table),
    ("clustering_key", OptionContext::Table),
    ("pushdown_not_equal", OptionContext::Table),
];

#[must_use]
pub fn options_for(context: OptionContext) -> Vec<&'static str> {
    OPTIONS
        .iter()
        .filter(|(_, ctx)| *ctx == context)
        .map(|(name, _)| *name)
        .collect()
}

fn invalid(name: &str, value: &str, reason: impl Into<String>) -> OptionError {
    OptionError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_port(value: &str) -> Result<u16, OptionError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(invalid("port", value, "must be between 1 and 65535")),
    }
}

fn parse_timeout(name: &str, value: &str) -> Result<u64, OptionError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(invalid(name, value, "must be a positive number of milliseconds")),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, OptionError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" | "t" => Ok(true),
        "false" | "off" | "no" | "0" | "f" => Ok(false),
        _ => Err(invalid(name, value, "must be a boolean")),
    }
}

fn parse_protocol_version(value: &str) -> Result<u8, OptionError> {
    match value.trim().parse::<u8>() {
        Ok(v) if (1..=5).contains(&v) => Ok(v),
        _ => Err(invalid("protocol_version", value, "must be between 1 and 5")),
    }
}

fn parse_consistency(value: &str) -> Result<Consistency, OptionError> {
    value.parse().map_err(|reason: String| invalid("consistency", value, reason))
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn check_value(name: &str, value: &str) -> Result<(), OptionError> {
    match name {
        "port" => parse_port(value).map(drop),
        "connect_timeout" | "request_timeout" => parse_timeout(name, value).map(drop),
        "ssl" | "pushdown_not_equal" => parse_bool(name, value).map(drop),
        "protocol_version" => parse_protocol_version(value).map(drop),
        "consistency" => parse_consistency(value).map(drop),
        _ => Ok(()),
    }
}

/// Reject options that are unknown in `context` or carry a malformed value.
pub fn validate_options(context: OptionContext, options: &[(String, String)]) -> Result<(), OptionError> {
    for (name, value) in options {
        let known = OPTIONS.iter().any(|(n, ctx)| n == name && *ctx == context);
        let result = if known {
            check_value(name, value)
        } else {
            Err(OptionError::UnknownOption {
                name: name.clone(),
                context: context.to_string(),
                valid: options_for(context).join(", "),
            })
        };
        if let Err(e) = result {
            tracing::warn!(%context, option = %name, error = %e, "rejected option");
            return Err(e);
        }
    }
    Ok(())
}

/// Parse `name=value`
pub fn parse_option_pair(text: &str) -> Result<(String, String), OptionError> {
    match text.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_lowercase(), value.trim().to_string()))
        }
        _ => Err(invalid(text, text, "expected name=value")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// One or more comma-separated contact points
    pub host: String,
    pub port: u16,
    pub protocol_version: Option<u8>,
    pub ssl: bool,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
    pub ssl_ca: Option<String>,
    pub connect_timeout: u64,
    pub request_timeout: u64,
    pub consistency: Consistency,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol_version: None,
            ssl: false,
            ssl_cert: None,
            ssl_key: None,
            ssl_ca: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_MS,
            consistency: Consistency::default(),
        }
    }
}

impl ServerOptions {
    pub fn from_options(options: &[(String, String)]) -> Result<Self, OptionError> {
        validate_options(OptionContext::Server, options)?;
        let mut server = Self::default();
        for (name, value) in options {
            match name.as_str() {
                "host" => server.host.clone_from(value),
                "port" => server.port = parse_port(value)?,
                "protocol_version" => server.protocol_version = Some(parse_protocol_version(value)?),
                "ssl" => server.ssl = parse_bool(name, value)?,
                "ssl_cert" => server.ssl_cert = Some(value.clone()),
                "ssl_key" => server.ssl_key = Some(value.clone()),
                "ssl_ca" => server.ssl_ca = Some(value.clone()),
                "connect_timeout" => server.connect_timeout = parse_timeout(name, value)?,
                "request_timeout" => server.request_timeout = parse_timeout(name, value)?,
                "consistency" => server.consistency = parse_consistency(value)?,
                _ => {}
            }
        }
        Ok(server)
    }

    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        split_list(&self.host)
    }

    fn check(&self) -> Result<(), OptionError> {
        if self.hosts().is_empty() {
            return Err(invalid("host", &self.host, "no contact points"));
        }
        check_value("port", &self.port.to_string())?;
        check_value("connect_timeout", &self.connect_timeout.to_string())?;
        check_value("request_timeout", &self.request_timeout.to_string())?;
        if let Some(v) = self.protocol_version {
            check_value("protocol_version", &v.to_string())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMapping {
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl UserMapping {
    pub fn from_options(options: &[(String, String)]) -> Result<Self, OptionError> {
        validate_options(OptionContext::UserMapping, options)?;
        let mut user = Self::default();
        for (name, value) in options {
            match name.as_str() {
                "username" => user.username = Some(value.clone()),
                "password" => user.password = Some(value.clone()),
                _ => {}
            }
        }
        Ok(user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    pub keyspace: String,
    pub table: String,
    pub primary_key: Vec<String>,
    pub clustering_key: Vec<String>,
    pub pushdown_not_equal: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            keyspace: String::new(),
            table: String::new(),
            primary_key: Vec::new(),
            clustering_key: Vec::new(),
            pushdown_not_equal: true,
        }
    }
}

impl TableOptions {
    /// Table options; `keyspace` and `table` are required.
    pub fn from_options(options: &[(String, String)]) -> Result<Self, OptionError> {
        validate_options(OptionContext::Table, options)?;
        let mut table = Self::default();
        for (name, value) in options {
            match name.as_str() {
                "keyspace" => table.keyspace.clone_from(value),
                "table" => table.table.clone_from(value),
                "primary_key" => table.primary_key = split_list(value),
                "clustering_key" => table.clustering_key = split_list(value),
                "pushdown_not_equal" => table.pushdown_not_equal = parse_bool(name, value)?,
                _ => {}
            }
        }
        if table.keyspace.is_empty() {
            return Err(OptionError::MissingOption("keyspace".to_string()));
        }
        if table.table.is_empty() {
            return Err(OptionError::MissingOption("table".to_string()));
        }
        Ok(table)
    }

    #[must_use]
    pub const fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            pushdown_not_equal: self.pushdown_not_equal,
        }
    }

    /// Apply the declared remote location and key layout to `relation`.
    #[must_use]
    pub fn apply(&self, mut relation: RelationDescriptor) -> RelationDescriptor {
        relation.keyspace.clone_from(&self.keyspace);
        relation.table.clone_from(&self.table);
        relation
            .with_partition_key(&self.primary_key)
            .with_clustering_key(&self.clustering_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsConfig {
    pub cert: Option<String>,
    pub key: Option<String>,
    pub ca: Option<String>,
}

/// Everything a connection provider needs to open a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionConfig {
    pub hosts: Vec<String>,
    pub port: u16,
    pub protocol_version: Option<u8>,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsConfig>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub consistency: Consistency,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(server: &ServerOptions, user: &UserMapping) -> Self {
        let credentials = user.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: user.password.clone().unwrap_or_default(),
        });
        let tls = server.ssl.then(|| TlsConfig {
            cert: server.ssl_cert.clone(),
            key: server.ssl_key.clone(),
            ca: server.ssl_ca.clone(),
        });
        Self {
            hosts: server.hosts(),
            port: server.port,
            protocol_version: server.protocol_version,
            credentials,
            tls,
            connect_timeout_ms: server.connect_timeout,
            request_timeout_ms: server.request_timeout,
            consistency: server.consistency,
        }
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(&ServerOptions::default(), &UserMapping::default())
    }
}

/// Layered server and user settings for the binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerOptions,
    pub user: UserMapping,
}

impl Settings {
    /// Defaults, then `cqlbridge.toml` in the working directory if present,
    /// then `path`, then `CQLBRIDGE_SERVER__PORT`-style environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, BridgeError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("cqlbridge").required(false));
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CQLBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.server.check()?;
        tracing::debug!(hosts = %settings.server.host, port = settings.server.port, "loaded settings");
        Ok(settings)
    }

    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.server, &self.user)
    }
}
