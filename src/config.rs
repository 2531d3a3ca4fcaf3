use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::mcp::ToolProvider;

pub const DEFAULT_CLIENT_ID: &str = "todoist-mcp-client";
pub const READ_SCOPE: &str = "read:tasks";
pub const WRITE_SCOPE: &str = "write:tasks";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoistConfig {
    /// Personal API token used against the Todoist REST API
    pub api_token: String,
    pub base_url: String,
    /// Todoist filter expression selecting the tasks to list
    pub filter: String,
    /// Connect and read timeout for each upstream request
    pub timeout_secs: u64,
}

impl TodoistConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TodoistConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: "https://api.todoist.com/api/v1".to_owned(),
            filter: "(today | overdue)".to_owned(),
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for TodoistConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoistConfig")
            .field("api_token", &redacted(&self.api_token))
            .field("base_url", &self.base_url)
            .field("filter", &self.filter)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path the JSON-RPC endpoint is mounted on
    pub path: String,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
            path: "/mcp".to_owned(),
        }
    }
}

/// A bearer token accepted by the server, bound to one client identity.
#[derive(Clone, Serialize, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub client_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &redacted(&self.token))
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted tokens. Empty means the server is open.
    pub tokens: Vec<StaticToken>,
    /// Scopes every caller must hold
    pub required_scopes: Vec<String>,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log the (redacted) JSON-RPC payload of each call
    pub log_payloads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_payloads: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTodayConfig {
    /// Number of tasks returned when the caller gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    /// Larger limits are clamped to this
    #[serde(default = "max_limit")]
    pub max_limit: u32,
}

fn default_limit() -> u32 {
    25
}

// Largest page the Todoist filter endpoint serves.
fn max_limit() -> u32 {
    200
}

impl Default for ListTodayConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: max_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub list_today: Option<ListTodayConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            list_today: Some(ListTodayConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub todoist: TodoistConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load the config file (if any), overlay the environment and validate.
    ///
    /// Variables from `./.env` fill in whatever the process environment
    /// leaves unset.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_default()?;
        let dotenv = read_env_file(".env")?;
        config.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| "Failed to parse config file as JSON")?;

        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(path) = std::env::var("TODOIST_MCP_CONFIG") {
            return Self::load_from_file(path);
        }

        let mut config_paths = vec![PathBuf::from("./todoist-mcp-config.json")];
        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("todoist-mcp/config.json"));
        }

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading configuration from {}", path.display());
                return Self::load_from_file(path);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Overlay values from the process environment.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TODOIST_API_TOKEN") {
            self.todoist.api_token = token;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {port}"))?;
        }
        if let Some(token) = lookup("MCP_BEARER_TOKEN").filter(|t| !t.is_empty()) {
            if !self.auth.tokens.iter().any(|t| t.token == token) {
                self.auth.tokens.push(StaticToken {
                    token,
                    client_id: DEFAULT_CLIENT_ID.to_owned(),
                    scopes: vec![READ_SCOPE.to_owned(), WRITE_SCOPE.to_owned()],
                });
            }
        }
        if self.auth.is_enabled() && self.auth.required_scopes.is_empty() {
            self.auth.required_scopes = vec![READ_SCOPE.to_owned()];
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.todoist.api_token.trim().is_empty() {
            bail!("TODOIST_API_TOKEN is not set");
        }
        if self.todoist.timeout_secs == 0 {
            bail!("todoist.timeout_secs must be positive");
        }
        if !self.server.path.starts_with('/') {
            bail!("server.path must start with '/': {}", self.server.path);
        }
        if self.auth.tokens.iter().any(|t| t.token.is_empty()) {
            bail!("auth.tokens must not contain empty tokens");
        }
        if let Some(list_today) = &self.tools.list_today {
            if list_today.default_limit == 0 || list_today.max_limit == 0 {
                bail!("tools.list_today limits must be positive");
            }
            if list_today.default_limit > list_today.max_limit {
                bail!(
                    "tools.list_today.default_limit ({}) exceeds max_limit ({})",
                    list_today.default_limit,
                    list_today.max_limit
                );
            }
        }
        Ok(())
    }

    pub fn is_tool_enabled<T: ToolProvider>(&self) -> bool {
        match T::NAME {
            crate::tools::today::ListToday::NAME => self.tools.list_today.is_some(),
            _ => true, // Unknown tools are enabled by default
        }
    }

    pub fn get_list_today_config(&self) -> ListTodayConfig {
        self.tools.list_today.clone().unwrap_or_default()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Parse a dotenv file without touching the process environment.
///
/// A missing file yields an empty map.
pub fn read_env_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(HashMap::new());
    }

    tracing::info!("Loading environment from {}", path.display());
    dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?
        .map(|item| item.with_context(|| format!("Invalid line in {}", path.display())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::today::ListToday;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.todoist.base_url, "https://api.todoist.com/api/v1");
        assert_eq!(config.todoist.filter, "(today | overdue)");
        assert_eq!(config.todoist.timeout(), Duration::from_secs(10));
        assert_eq!(config.server.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.server.path, "/mcp");
        assert!(!config.auth.is_enabled());
        assert!(config.logging.log_payloads);
        assert!(config.is_tool_enabled::<ListToday>());

        let list_today = config.get_list_today_config();
        assert_eq!(list_today.default_limit, 25);
        assert_eq!(list_today.max_limit, 200);
    }

    #[test]
    fn test_example_config_file_is_parseable() {
        let example_config = include_str!("../todoist-mcp-config.example.json");
        let config: Config = serde_json::from_str(example_config).unwrap();

        assert_eq!(config.todoist.filter, "(today | overdue)");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.tokens.len(), 2);
        assert_eq!(config.auth.tokens[1].client_id, "ci-bot");
        assert_eq!(config.auth.required_scopes, vec![READ_SCOPE.to_owned()]);
        assert!(config.is_tool_enabled::<ListToday>());
        assert_eq!(config.get_list_today_config().default_limit, 25);
    }

    #[test]
    fn test_config_parsing() {
        let json = r#"{
            "todoist": {
                "filter": "(today)",
                "timeout_secs": 5
            },
            "server": {
                "port": 9000
            },
            "tools": {
                "list_today": {
                    "max_limit": 50
                }
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.todoist.filter, "(today)");
        assert_eq!(config.todoist.timeout_secs, 5);
        assert_eq!(config.todoist.base_url, "https://api.todoist.com/api/v1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");

        let list_today = config.get_list_today_config();
        assert_eq!(list_today.default_limit, 25);
        assert_eq!(list_today.max_limit, 50);
    }

    #[test]
    fn test_tool_disabled_when_tools_section_omits_it() {
        let config: Config = serde_json::from_str(r#"{"tools": {}}"#).unwrap();
        assert!(!config.is_tool_enabled::<ListToday>());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("TODOIST_API_TOKEN", "todoist-secret"),
                ("PORT", "8080"),
                ("HOST", "127.0.0.1"),
                ("MCP_BEARER_TOKEN", "abc"),
            ]))
            .unwrap();

        assert_eq!(config.todoist.api_token, "todoist-secret");
        assert_eq!(config.server.listen_addr(), "127.0.0.1:8080");
        assert!(config.auth.is_enabled());
        assert_eq!(config.auth.tokens[0].client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.auth.tokens[0].scopes, vec![READ_SCOPE, WRITE_SCOPE]);
        assert_eq!(config.auth.required_scopes, vec![READ_SCOPE]);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overlay_without_bearer_stays_open() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("TODOIST_API_TOKEN", "t"), ("MCP_BEARER_TOKEN", "")]))
            .unwrap();
        assert!(!config.auth.is_enabled());
        assert!(config.auth.required_scopes.is_empty());
    }

    #[test]
    fn test_env_file_feeds_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            concat!(
                "# local secrets\n",
                "TODOIST_API_TOKEN=from-file\n",
                "MCP_BEARER_TOKEN=\"file bearer\"\n",
                "PORT=9100\n",
            ),
        )
        .unwrap();

        let dotenv = read_env_file(&path).unwrap();
        assert_eq!(dotenv.len(), 3);

        // The process environment wins over the file.
        let process = env(&[("PORT", "8080")]);
        let mut config = Config::default();
        config
            .apply_env(|key| process(key).or_else(|| dotenv.get(key).cloned()))
            .unwrap();

        assert_eq!(config.todoist.api_token, "from-file");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.tokens[0].token, "file bearer");
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_file(dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_err(), "missing todoist token");

        config.todoist.api_token = "t".to_owned();
        config.validate().unwrap();

        config.tools.list_today = Some(ListTodayConfig {
            default_limit: 300,
            max_limit: 200,
        });
        assert!(config.validate().is_err());

        config.tools.list_today = Some(ListTodayConfig {
            default_limit: 0,
            max_limit: 200,
        });
        assert!(config.validate().is_err());

        config.tools.list_today = None;
        config.server.path = "mcp".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("TODOIST_API_TOKEN", "todoist-secret"),
                ("MCP_BEARER_TOKEN", "bearer-secret"),
            ]))
            .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("todoist-secret"));
        assert!(!debug.contains("bearer-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
