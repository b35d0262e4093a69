//! Error types for plugins, tools and dependency installation.

use std::path::PathBuf;

/// Errors from plugin contract, registry and module-loading operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin metadata failed validation.
    #[error("invalid plugin metadata: {0}")]
    InvalidMetadata(String),

    /// A module export was offered as a plugin but does not implement one.
    #[error("export '{name}' is not a plugin (found {found})")]
    NotAPlugin {
        /// Export name.
        name: String,
        /// What the export actually is.
        found: &'static str,
    },

    /// A plugin module could not be read.
    #[error("failed to load plugin module {path}: {message}")]
    ModuleLoad {
        /// Path to the module file.
        path: PathBuf,
        /// Failure reason.
        message: String,
    },

    /// A plugin module file is malformed.
    #[error("plugin module parse error in {path}: {message}")]
    ModuleParse {
        /// Path to the module file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// A plugin module declares no plugin export.
    #[error("no plugin export found in {0}")]
    NoPluginExport(PathBuf),

    /// A plugin export names an agent factory the host does not provide.
    #[error("agent factory '{agent}' for export '{export}' is not in the agent catalog")]
    AgentFactoryNotFound {
        /// Export that referenced the factory.
        export: String,
        /// Requested factory name.
        agent: String,
    },

    /// A module import could not be resolved against the search path.
    #[error("import '{import}' of {path} not found on the module search path")]
    ImportNotFound {
        /// Import as written in the module.
        import: String,
        /// Module that declared the import.
        path: PathBuf,
    },

    /// The plugin's agent factory failed.
    #[error("agent creation failed for {pid}: {message}")]
    AgentCreation {
        /// Plugin whose factory failed.
        pid: String,
        /// Failure reason.
        message: String,
    },

    /// A settings schema is malformed.
    #[error("invalid settings schema: {0}")]
    InvalidSettings(String),

    /// A required setting has neither a value nor a default.
    #[error("missing required setting: {0}")]
    MissingSetting(String),
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors from tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A synchronous call was made on a tool backed by an async handler.
    #[error("tool '{0}' is async; use ainvoke instead")]
    AsyncTool(String),

    /// The tool handler returned an error.
    #[error("tool execution failed: {0}")]
    Execution(String),

    /// Cache settings are malformed.
    #[error("invalid cache settings: {0}")]
    InvalidCache(String),

    /// The worker running a synchronous handler panicked or was cancelled.
    #[error("tool worker failed: {0}")]
    Worker(String),
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors from package-manager invocations.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The package manager could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The package manager did not finish in time and was killed.
    #[error("{program} timed out after {secs}s")]
    Timeout {
        /// Program that timed out.
        program: String,
        /// Timeout that elapsed.
        secs: u64,
    },

    /// The package manager exited unsuccessfully.
    #[error("{program} exited with status {status:?}: {stderr}")]
    Failed {
        /// Program that failed.
        program: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

/// Result type for installer operations.
pub type InstallResult<T> = Result<T, InstallError>;
