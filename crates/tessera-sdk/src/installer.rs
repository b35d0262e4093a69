//! Plugin dependency installation through an external package manager.
//!
//! Every invocation runs under a hard timeout; a package manager that
//! outlives it is killed.

use std::process::{Output, Stdio};
use std::time::Duration;

use tessera_config::InstallerSection;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{InstallError, InstallResult};

/// Default limit on a single package-manager run.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Characters that end the package name in a dependency spec.
const PACKAGE_SPEC_SEPARATORS: &[char] = &['>', '<', '=', '!', '~', '[', ';'];

/// How to drive a package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManager {
    program: String,
    install_args: Vec<String>,
    probe_args: Vec<String>,
    upgrade_flag: Option<String>,
    quiet_flag: Option<String>,
    upgrade: bool,
    quiet: bool,
    timeout: Duration,
}

impl Default for PackageManager {
    fn default() -> Self {
        Self::pip()
    }
}

impl PackageManager {
    /// A package manager run as `program`, with no arguments or flags.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            install_args: Vec::new(),
            probe_args: Vec::new(),
            upgrade_flag: None,
            quiet_flag: None,
            upgrade: false,
            quiet: true,
            timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }

    /// `python3 -m pip`.
    #[must_use]
    pub fn pip() -> Self {
        Self::new("python3")
            .install_args(["-m", "pip", "install"])
            .probe_args(["-m", "pip", "show"])
            .upgrade_flag("--upgrade")
            .quiet_flag("--quiet")
    }

    /// The pip preset with timeout and flags from the `[installer]` section.
    #[must_use]
    pub fn from_config(config: &InstallerSection) -> Self {
        Self::pip()
            .with_timeout(config.timeout())
            .with_upgrade(config.upgrade)
            .with_quiet(config.quiet)
    }

    /// Arguments placed before the package list on install.
    #[must_use]
    pub fn install_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments placed before a package name to query it.
    ///
    /// The probe must exit successfully only when the package is installed.
    #[must_use]
    pub fn probe_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probe_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Flag passed when upgrading.
    #[must_use]
    pub fn upgrade_flag(mut self, flag: impl Into<String>) -> Self {
        self.upgrade_flag = Some(flag.into());
        self
    }

    /// Flag passed for quiet output.
    #[must_use]
    pub fn quiet_flag(mut self, flag: impl Into<String>) -> Self {
        self.quiet_flag = Some(flag.into());
        self
    }

    /// Whether [`install_plugin_dependencies`](Self::install_plugin_dependencies) upgrades.
    #[must_use]
    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    /// Whether [`install_plugin_dependencies`](Self::install_plugin_dependencies) runs quietly.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Limit on a single run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Limit on a single run.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Install `packages` and return the package manager's output.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] if the program cannot start, exceeds the
    /// timeout, or exits unsuccessfully.
    pub async fn install_dependencies(
        &self,
        packages: &[String],
        upgrade: bool,
        quiet: bool,
    ) -> InstallResult<String> {
        if packages.is_empty() {
            return Ok("No packages to install".to_string());
        }

        let mut args = self.install_args.clone();
        if upgrade && let Some(flag) = &self.upgrade_flag {
            args.push(flag.clone());
        }
        if quiet && let Some(flag) = &self.quiet_flag {
            args.push(flag.clone());
        }
        args.extend(packages.iter().cloned());

        let output = self.run(&args).await?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if stdout.is_empty() {
                Ok("Installation successful".to_string())
            } else {
                Ok(stdout)
            }
        } else {
            Err(InstallError::Failed {
                program: self.program.clone(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Whether `package` is installed.
    ///
    /// A probe that cannot run or times out counts as not installed.
    pub async fn check_dependency_installed(&self, package: &str) -> bool {
        match self.probe(package).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(package = %package, error = %e, "Dependency probe failed");
                false
            },
        }
    }

    /// Installed version of `package`, read from a `Version:` line in the
    /// probe output.
    pub async fn installed_version(&self, package: &str) -> Option<String> {
        let output = self.probe(package).await.ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find_map(|line| line.strip_prefix("Version:"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Make sure every dependency spec is installed.
    ///
    /// Returns whether all are satisfied and the specs still missing. With
    /// `auto_install` off, missing specs are only reported.
    pub async fn install_plugin_dependencies(
        &self,
        dependencies: &[String],
        plugin_name: &str,
        auto_install: bool,
    ) -> (bool, Vec<String>) {
        let missing = self.missing(dependencies).await;
        if missing.is_empty() {
            return (true, Vec::new());
        }
        if !auto_install {
            return (false, missing);
        }

        info!(plugin = %plugin_name, packages = ?missing, "Installing plugin dependencies");
        match self.install_dependencies(&missing, self.upgrade, self.quiet).await {
            Ok(_) => {
                let still_missing = self.missing(&missing).await;
                (still_missing.is_empty(), still_missing)
            },
            Err(e) => {
                warn!(plugin = %plugin_name, error = %e, "Dependency installation failed");
                (false, missing)
            },
        }
    }

    async fn missing(&self, specs: &[String]) -> Vec<String> {
        let mut missing = Vec::new();
        for spec in specs {
            if !self.check_dependency_installed(extract_package_name(spec)).await {
                missing.push(spec.clone());
            }
        }
        missing
    }

    async fn probe(&self, package: &str) -> InstallResult<Output> {
        let mut args = self.probe_args.clone();
        args.push(package.to_string());
        self.run(&args).await
    }

    async fn run(&self, args: &[String]) -> InstallResult<Output> {
        debug!(program = %self.program, args = ?args, "Running package manager");

        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| InstallError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(InstallError::Spawn {
                program: self.program.clone(),
                source,
            }),
            Err(_) => {
                warn!(program = %self.program, timeout_secs = self.timeout.as_secs(), "Package manager timed out");
                Err(InstallError::Timeout {
                    program: self.program.clone(),
                    secs: self.timeout.as_secs(),
                })
            },
        }
    }
}

/// The package name at the start of a dependency spec such as
/// `"requests>=2.28"` or `"uvicorn[standard]; python_version>'3.8'"`.
#[must_use]
pub fn extract_package_name(spec: &str) -> &str {
    spec.split(|c: char| c.is_whitespace() || PACKAGE_SPEC_SEPARATORS.contains(&c))
        .next()
        .unwrap_or(spec)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_package_name() {
        assert_eq!(extract_package_name("requests>=2.28"), "requests");
        assert_eq!(extract_package_name("numpy"), "numpy");
        assert_eq!(extract_package_name("uvicorn[standard]"), "uvicorn");
        assert_eq!(extract_package_name("pkg ; python_version>'3.8'"), "pkg");
        assert_eq!(extract_package_name("pkg!=1.0"), "pkg");
        assert_eq!(extract_package_name("pkg~=1.0"), "pkg");
        assert_eq!(extract_package_name(""), "");
    }

    #[test]
    fn test_from_config() {
        let config = InstallerSection {
            timeout_secs: 42,
            upgrade: true,
            ..InstallerSection::default()
        };
        let pm = PackageManager::from_config(&config);
        assert_eq!(pm.program(), "python3");
        assert_eq!(pm.timeout(), Duration::from_secs(42));
        assert_eq!(PackageManager::default().timeout(), DEFAULT_INSTALL_TIMEOUT);
    }

    #[tokio::test]
    async fn test_empty_install_is_noop() {
        let pm = PackageManager::new("tessera-no-such-program");
        let msg = pm.install_dependencies(&[], false, true).await.unwrap();
        assert_eq!(msg, "No packages to install");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let pm = PackageManager::new("tessera-no-such-program");
        let err = pm
            .install_dependencies(&["x".to_string()], false, true)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Spawn { .. }));
        assert!(!pm.check_dependency_installed("x").await);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn shell(script: &str) -> PackageManager {
            PackageManager::new("sh")
                .install_args(["-c", script, "sh"])
                .quiet_flag("--quiet")
        }

        #[tokio::test]
        async fn test_install_passes_flags_and_packages() {
            let pm = shell("echo \"$@\"").upgrade_flag("--upgrade");
            let out = pm
                .install_dependencies(&["a>=1".to_string(), "b".to_string()], true, true)
                .await
                .unwrap();
            assert_eq!(out, "--upgrade --quiet a>=1 b");
        }

        #[tokio::test]
        async fn test_install_failure_reports_stderr() {
            let pm = shell("echo boom >&2; exit 3");
            let err = pm
                .install_dependencies(&["a".to_string()], false, false)
                .await
                .unwrap_err();
            match err {
                InstallError::Failed { status, stderr, .. } => {
                    assert_eq!(status, Some(3));
                    assert_eq!(stderr, "boom");
                },
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_install_timeout() {
            let pm = shell("sleep 5").with_timeout(Duration::from_millis(100));
            let err = pm
                .install_dependencies(&["a".to_string()], false, true)
                .await
                .unwrap_err();
            assert!(matches!(err, InstallError::Timeout { .. }));
        }

        #[tokio::test]
        async fn test_probe_and_version() {
            let pm = PackageManager::new("sh").probe_args([
                "-c",
                "test \"$1\" = present && printf 'Name: present\\nVersion: 1.2.3\\n'",
                "sh",
            ]);
            assert!(pm.check_dependency_installed("present").await);
            assert!(!pm.check_dependency_installed("absent").await);
            assert_eq!(pm.installed_version("present").await.as_deref(), Some("1.2.3"));
            assert_eq!(pm.installed_version("absent").await, None);
        }

        #[tokio::test]
        async fn test_plugin_dependencies_report_missing_without_install() {
            let pm = PackageManager::new("sh")
                .probe_args(["-c", "test \"$1\" = present", "sh"])
                .install_args(["-c", "exit 0", "sh"]);
            let deps = vec!["present>=1".to_string(), "absent==2".to_string()];

            let (ok, missing) = pm.install_plugin_dependencies(&deps, "demo", false).await;
            assert!(!ok);
            assert_eq!(missing, vec!["absent==2"]);

            let (ok, missing) = pm.install_plugin_dependencies(&deps, "demo", true).await;
            assert!(!ok);
            assert_eq!(missing, vec!["absent==2"]);

            let (ok, missing) = pm
                .install_plugin_dependencies(&["present".to_string()], "demo", true)
                .await;
            assert!(ok);
            assert!(missing.is_empty());
        }
    }
}
