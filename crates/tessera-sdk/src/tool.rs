//! Tools exposed by agents.
//!
//! A [`Tool`] wraps either a synchronous or an asynchronous handler. The
//! synchronous entry points ([`Tool::call`], [`Tool::invoke`]) refuse async
//! handlers; [`Tool::ainvoke`] runs sync handlers on the blocking pool and
//! awaits async handlers in place.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ToolError, ToolResult};

/// Arguments passed to a tool handler.
pub type ToolArgs = Map<String, Value>;

type SyncFn = dyn Fn(ToolArgs) -> ToolResult<Value> + Send + Sync;
type AsyncFn = dyn Fn(ToolArgs) -> BoxFuture<'static, ToolResult<Value>> + Send + Sync;

/// The callable behind a tool.
#[derive(Clone)]
pub enum ToolHandler {
    /// A blocking handler.
    Sync(Arc<SyncFn>),
    /// An async handler.
    Async(Arc<AsyncFn>),
}

impl ToolHandler {
    /// Wrap a blocking closure.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(ToolArgs) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap an async closure.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| -> BoxFuture<'static, ToolResult<Value>> {
            Box::pin(f(args))
        }))
    }

    /// Whether the handler is async.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("ToolHandler::Sync"),
            Self::Async(_) => f.write_str("ToolHandler::Async"),
        }
    }
}

/// Semantic result-cache settings for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Entry lifetime in seconds.
    pub ttl: u64,
    /// Minimum similarity (0.0 to 1.0) for a cached result to be reused.
    pub similarity_threshold: f64,
    /// Argument fields that form the cache key. `None` means all arguments.
    pub cache_key_fields: Option<Vec<String>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: 3600,
            similarity_threshold: 0.85,
            cache_key_fields: None,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> ToolResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ToolError::InvalidCache(format!(
                "similarity_threshold {} must be between 0.0 and 1.0",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Ways to declare caching for a tool.
#[derive(Debug, Clone)]
pub enum CacheSetting {
    /// `true` enables default caching, `false` disables it.
    Enabled(bool),
    /// Partial settings; missing fields take their defaults.
    Custom(Map<String, Value>),
    /// Fully specified settings.
    Config(CacheConfig),
}

impl CacheSetting {
    fn into_config(self) -> ToolResult<Option<CacheConfig>> {
        let config = match self {
            Self::Enabled(false) => return Ok(None),
            Self::Enabled(true) => CacheConfig::default(),
            Self::Custom(map) => serde_json::from_value(Value::Object(map))
                .map_err(|e| ToolError::InvalidCache(e.to_string()))?,
            Self::Config(config) => config,
        };
        config.validate()?;
        Ok(config.enabled.then_some(config))
    }
}

impl From<bool> for CacheSetting {
    fn from(enabled: bool) -> Self {
        Self::Enabled(enabled)
    }
}

impl From<Map<String, Value>> for CacheSetting {
    fn from(map: Map<String, Value>) -> Self {
        Self::Custom(map)
    }
}

impl From<CacheConfig> for CacheSetting {
    fn from(config: CacheConfig) -> Self {
        Self::Config(config)
    }
}

/// A named, invocable tool.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    handler: ToolHandler,
    args_schema: Option<Value>,
    cache: Option<CacheConfig>,
    metadata: Map<String, Value>,
}

impl Tool {
    /// Start building a tool.
    #[must_use]
    pub fn builder(name: impl Into<String>, handler: ToolHandler) -> ToolBuilder {
        ToolBuilder {
            name: name.into(),
            description: None,
            handler,
            args_schema: None,
            cache: None,
            metadata: Map::new(),
        }
    }

    /// A tool backed by a blocking closure, without caching.
    pub fn sync<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(ToolArgs) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: ToolHandler::sync(f),
            args_schema: None,
            cache: None,
            metadata: Map::new(),
        }
    }

    /// A tool backed by an async closure, without caching.
    pub fn from_async<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: ToolHandler::from_async(f),
            args_schema: None,
            cache: None,
            metadata: Map::new(),
        }
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON schema of the arguments, if declared.
    #[must_use]
    pub fn args_schema(&self) -> Option<&Value> {
        self.args_schema.as_ref()
    }

    /// Effective cache settings, or `None` when caching is disabled.
    #[must_use]
    pub fn cache(&self) -> Option<&CacheConfig> {
        self.cache.as_ref()
    }

    /// Free-form metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Whether the handler is async.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.handler.is_async()
    }

    /// Call the tool synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::AsyncTool`] for async handlers, or whatever the
    /// handler returns.
    pub fn call(&self, args: ToolArgs) -> ToolResult<Value> {
        match &self.handler {
            ToolHandler::Sync(f) => f(args),
            ToolHandler::Async(_) => Err(ToolError::AsyncTool(self.name.clone())),
        }
    }

    /// Alias of [`Tool::call`].
    ///
    /// # Errors
    ///
    /// See [`Tool::call`].
    pub fn invoke(&self, args: ToolArgs) -> ToolResult<Value> {
        self.call(args)
    }

    /// Call the tool from async code.
    ///
    /// Sync handlers run on the tokio blocking pool so the caller's executor
    /// is not blocked. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, or [`ToolError::Worker`] if the blocking
    /// task panicked.
    pub async fn ainvoke(&self, args: ToolArgs) -> ToolResult<Value> {
        match &self.handler {
            ToolHandler::Async(f) => f(args).await,
            ToolHandler::Sync(f) => {
                let f = Arc::clone(f);
                tokio::task::spawn_blocking(move || f(args))
                    .await
                    .map_err(|e| ToolError::Worker(e.to_string()))?
            },
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("is_async", &self.is_async())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Tool`].
#[must_use]
pub struct ToolBuilder {
    name: String,
    description: Option<String>,
    handler: ToolHandler,
    args_schema: Option<Value>,
    cache: Option<CacheSetting>,
    metadata: Map<String, Value>,
}

impl ToolBuilder {
    /// Set the description. Defaults to `"Tool: {name}"`.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the JSON schema of the arguments.
    pub fn args_schema(mut self, schema: Value) -> Self {
        self.args_schema = Some(schema);
        self
    }

    /// Configure result caching.
    pub fn cache(mut self, setting: impl Into<CacheSetting>) -> Self {
        self.cache = Some(setting.into());
        self
    }

    /// Add a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Build the tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidCache`] if the cache settings are malformed.
    pub fn build(self) -> ToolResult<Tool> {
        let cache = match self.cache {
            Some(setting) => setting.into_config()?,
            None => None,
        };
        let description = self
            .description
            .unwrap_or_else(|| format!("Tool: {}", self.name));

        Ok(Tool {
            name: self.name,
            description,
            handler: self.handler,
            args_schema: self.args_schema,
            cache,
            metadata: self.metadata,
        })
    }
}
