//! `windmill-ts.yaml` discovery and typed run configuration.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};

pub const CONFIG_FILE_NAMES: [&str; 2] = ["windmill-ts.yaml", "windmill-ts.yml"];

/// Files whose presence marks a project root; discovery never walks above them.
const BOUNDARY_MARKERS: [&str; 2] = ["package.json", ".git"];

pub const DEFAULT_CONCURRENCY: usize = 5;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub resources: ResourceOptions,
    pub scripts: RunnableOptions,
    pub flows: RunnableOptions,
    /// In-flight detail fetches per listing.
    pub concurrency: usize,
    pub fetch_retry: FetchRetryConfig,
    /// Where the configuration was loaded from, if anywhere.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceOptions {
    /// Resource type → default resource path; `null` disables the implicit default.
    pub defaults: IndexMap<String, Option<String>>,
    pub post_process: Option<PostProcessHook>,
}

/// A user function every fetched resource value is passed through before validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostProcessHook {
    /// Module specifier; relative paths are resolved against the config file.
    pub module: String,
    #[serde(default = "PostProcessHook::default_export")]
    pub export: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnableOptions {
    pub enabled: bool,
    /// Accept undeclared top-level arguments.
    pub loose_args: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FetchRetryConfig {
    pub enabled: bool,
    pub retries: u32,
    /// Milliseconds before the first retry.
    pub min_timeout: u64,
    /// Upper bound on any single backoff, in milliseconds.
    pub max_timeout: u64,
    pub factor: f64,
}

// ————————————————————————————————————————————————————————————————————————————
// DEFAULTS
// ————————————————————————————————————————————————————————————————————————————

impl Default for Config {
    fn default() -> Self {
        Self {
            resources: ResourceOptions::default(),
            scripts: RunnableOptions::default(),
            flows: RunnableOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
            fetch_retry: FetchRetryConfig::default(),
            config_path: None,
        }
    }
}

impl Default for RunnableOptions {
    fn default() -> Self {
        Self { enabled: true, loose_args: false }
    }
}

impl Default for FetchRetryConfig {
    fn default() -> Self {
        Self { enabled: true, retries: 3, min_timeout: 1000, max_timeout: 10_000, factor: 2.0 }
    }
}

impl PostProcessHook {
    fn default_export() -> String {
        "default".to_string()
    }

    /// Relative (`./`, `../`) and absolute specifiers point at local files;
    /// anything else is a package name.
    pub fn is_local(&self) -> bool {
        self.module.starts_with("./") || self.module.starts_with("../") || Path::new(&self.module).is_absolute()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LOADING
// ————————————————————————————————————————————————————————————————————————————

impl Config {
    pub fn from_yaml(source: &str, path: &Path) -> Result<Self> {
        // An empty file is a valid, all-defaults configuration.
        if source.trim().is_empty() {
            return Ok(Self { config_path: Some(path.to_path_buf()), ..Self::default() });
        }
        let mut config: Config = serde_yaml::from_str(source).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.config_path = Some(path.to_path_buf());
        if let (Some(hook), Some(dir)) = (config.resources.post_process.as_mut(), path.parent()) {
            if hook.is_local() {
                hook.module = dir.join(&hook.module).to_string_lossy().into_owned();
            }
        }
        if config.concurrency == 0 {
            config.concurrency = 1;
        }
        Ok(config)
    }
}

/// Load the nearest configuration above `cwd`, or defaults when there is none.
pub fn load(cwd: &Path) -> Result<Config> {
    match find_nearest_config(cwd)? {
        None => Ok(Config::default()),
        Some(path) => {
            let source = std::fs::read_to_string(&path)?;
            tracing::debug!(path = %path.display(), "loaded configuration");
            Config::from_yaml(&source, &path)
        }
    }
}

/// Walk up from `start` looking for a config file, stopping at the first
/// project boundary (`package.json` / `.git`) or the filesystem root.
pub fn find_nearest_config(start: &Path) -> Result<Option<PathBuf>> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let existing = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();

        match existing.len() {
            0 => {}
            1 => return Ok(existing.into_iter().next()),
            _ => {
                let files = existing.iter().map(|p| p.display().to_string()).collect::<Vec<_>>();
                return Err(Error::AmbiguousConfig { dir: dir.to_path_buf(), files: files.join(", ") });
            }
        }

        if BOUNDARY_MARKERS.iter().any(|marker| dir.join(marker).exists()) {
            return Ok(None);
        }
        current = dir.parent();
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("package.json"), "{}").unwrap();
        let config = load(root.path()).unwrap();
        assert!(config.scripts.enabled && config.flows.enabled);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.fetch_retry, FetchRetryConfig::default());
        assert!(config.config_path.is_none());
    }

    #[test]
    fn discovery_walks_up_to_the_config() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("windmill-ts.yml"), "flows:\n  enabled: false\n").unwrap();

        let config = load(&nested).unwrap();
        assert!(!config.flows.enabled);
        assert!(config.scripts.enabled);
        assert_eq!(config.config_path, Some(root.path().join("windmill-ts.yml")));
    }

    #[test]
    fn discovery_stops_at_project_boundary() {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("project");
        std::fs::create_dir_all(project.join(".git")).unwrap();
        std::fs::write(root.path().join("windmill-ts.yaml"), "scripts:\n  enabled: false\n").unwrap();

        assert_eq!(find_nearest_config(&project).unwrap(), None);
    }

    #[test]
    fn two_config_files_are_ambiguous() {
        let root = tempfile::tempdir().unwrap();
        for name in CONFIG_FILE_NAMES {
            std::fs::write(root.path().join(name), "").unwrap();
        }
        let err = find_nearest_config(root.path()).unwrap_err();
        assert!(matches!(err, Error::AmbiguousConfig { .. }), "{err}");
    }

    #[test]
    fn parses_every_section() {
        let yaml = r#"
resources:
  defaults:
    postgresql: f/db/main
    s3: null
  postProcess:
    module: ./hooks/resource.ts
    export: decrypt
scripts:
  looseArgs: true
concurrency: 8
fetchRetry:
  retries: 5
  factor: 1.5
"#;
        let path = Path::new("/repo/windmill-ts.yaml");
        let config = Config::from_yaml(yaml, path).unwrap();
        assert_eq!(config.resources.defaults.get("postgresql"), Some(&Some("f/db/main".to_string())));
        assert_eq!(config.resources.defaults.get("s3"), Some(&None));
        let hook = config.resources.post_process.unwrap();
        assert_eq!(Path::new(&hook.module), Path::new("/repo/./hooks/resource.ts"));
        assert_eq!(hook.export, "decrypt");
        assert!(config.scripts.loose_args && config.scripts.enabled);
        assert!(!config.flows.loose_args);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.fetch_retry.retries, 5);
        assert_eq!(config.fetch_retry.min_timeout, 1000);
    }

    #[test]
    fn package_hooks_stay_untouched() {
        let yaml = "resources:\n  postProcess:\n    module: '@acme/hooks'\n";
        let config = Config::from_yaml(yaml, Path::new("/repo/windmill-ts.yaml")).unwrap();
        let hook = config.resources.post_process.unwrap();
        assert_eq!(hook.module, "@acme/hooks");
        assert_eq!(hook.export, "default");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_yaml("script:\n  enabled: false\n", Path::new("/x/windmill-ts.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
