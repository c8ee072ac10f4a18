use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Config, ProviderKind};

/// Name of the per-directory config file.
pub const LOCAL_CONFIG_NAME: &str = ".scholar-ai.toml";

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub provider: Option<ProviderConfig>,
    pub api_keys: Option<ApiKeysConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// `gemini` or `openai`.
    pub kind: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: Option<String>,
    pub max_upload_mb: Option<u32>,
}

/// Platform config directory path: `<config_dir>/scholar-ai/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scholar-ai").join("config.toml"))
}

/// Load config by cascading CWD `.scholar-ai.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(LOCAL_CONFIG_NAME));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

fn pick<S, T>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bp, op) = (&base.provider, &overlay.provider);
    let (bk, ok) = (&base.api_keys, &overlay.api_keys);
    let (bs, os) = (&base.server, &overlay.server);
    ConfigFile {
        provider: Some(ProviderConfig {
            kind: pick(op, bp, |p| p.kind.clone()),
            model: pick(op, bp, |p| p.model.clone()),
            base_url: pick(op, bp, |p| p.base_url.clone()),
            timeout_secs: pick(op, bp, |p| p.timeout_secs),
            temperature: pick(op, bp, |p| p.temperature),
        }),
        api_keys: Some(ApiKeysConfig {
            gemini_api_key: pick(ok, bk, |k| k.gemini_api_key.clone()),
            openai_api_key: pick(ok, bk, |k| k.openai_api_key.clone()),
        }),
        server: Some(ServerConfig {
            bind_addr: pick(os, bs, |s| s.bind_addr.clone()),
            max_upload_mb: pick(os, bs, |s| s.max_upload_mb),
        }),
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_to_path(config, &path)?;
    Ok(path)
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}

/// A config with every non-secret default written out, for `config init`.
pub fn starter_config() -> ConfigFile {
    let defaults = Config::default();
    ConfigFile {
        provider: Some(ProviderConfig {
            kind: Some(defaults.provider.as_str().to_string()),
            model: Some(defaults.model),
            base_url: None,
            timeout_secs: Some(defaults.request_timeout_secs),
            temperature: None,
        }),
        api_keys: Some(ApiKeysConfig::default()),
        server: Some(ServerConfig {
            bind_addr: Some(defaults.bind_addr),
            max_upload_mb: Some(defaults.max_upload_mb),
        }),
    }
}

/// Build the runtime [`Config`]: defaults, then file values, then the
/// process environment.
pub fn resolve(file: &ConfigFile) -> Result<Config, String> {
    resolve_with_env(file, |name| {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    })
}

/// [`resolve`] with an explicit environment lookup.
pub fn resolve_with_env(
    file: &ConfigFile,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, String> {
    let mut config = Config::default();
    let provider = file.provider.clone().unwrap_or_default();
    let keys = file.api_keys.clone().unwrap_or_default();
    let server = file.server.clone().unwrap_or_default();

    if let Some(kind) = env("SCHOLAR_PROVIDER").or(provider.kind) {
        config.provider = kind.parse::<ProviderKind>()?;
    }
    config.model = env("SCHOLAR_MODEL")
        .or(provider.model)
        .unwrap_or_else(|| config.provider.default_model().to_string());
    config.base_url = env("SCHOLAR_BASE_URL").or(provider.base_url);
    config.api_key = match config.provider {
        ProviderKind::Gemini => env("GEMINI_API_KEY")
            .or_else(|| env("GOOGLE_API_KEY"))
            .or(keys.gemini_api_key),
        ProviderKind::OpenAiCompat => env("OPENAI_API_KEY").or(keys.openai_api_key),
    };
    if let Some(secs) = provider.timeout_secs {
        config.request_timeout_secs = secs;
    }
    config.temperature = provider.temperature;
    if let Some(addr) = server.bind_addr {
        config.bind_addr = addr;
    }
    if let Some(mb) = server.max_upload_mb {
        config.max_upload_mb = mb;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn partial_toml_parses() {
        let toml_str = "[provider]\nkind = \"openai\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.provider.unwrap().kind.as_deref(), Some("openai"));
        assert!(parsed.api_keys.is_none());
    }

    #[test]
    fn merge_overlay_wins_and_base_is_kept() {
        let base = ConfigFile {
            provider: Some(ProviderConfig {
                model: Some("base-model".into()),
                timeout_secs: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            provider: Some(ProviderConfig {
                model: Some("overlay-model".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let provider = merged.provider.unwrap();
        assert_eq!(provider.model.as_deref(), Some("overlay-model"));
        assert_eq!(provider.timeout_secs, Some(30));
    }

    #[test]
    fn resolve_defaults() {
        let config = resolve_with_env(&ConfigFile::default(), env_from(&[])).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.bind_addr, "0.0.0.0:9002");
        assert_eq!(config.max_upload_mb, 25);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let file = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                gemini_api_key: Some("from-file".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = resolve_with_env(&file, env_from(&[])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-file"));

        let config =
            resolve_with_env(&file, env_from(&[("GOOGLE_API_KEY", "from-env")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn openai_provider_uses_its_own_key_and_model() {
        let file = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                gemini_api_key: Some("g".into()),
                openai_api_key: Some("o".into()),
            }),
            ..Default::default()
        };
        let config =
            resolve_with_env(&file, env_from(&[("SCHOLAR_PROVIDER", "openai")])).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAiCompat);
        assert_eq!(config.api_key.as_deref(), Some("o"));
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let err = resolve_with_env(&ConfigFile::default(), env_from(&[("SCHOLAR_PROVIDER", "x")]))
            .unwrap_err();
        assert!(err.contains("unknown provider"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        save_to_path(&starter_config(), &path).unwrap();
        let loaded = load_from_path(&path).unwrap();
        let server = loaded.server.unwrap();
        assert_eq!(server.bind_addr.as_deref(), Some("0.0.0.0:9002"));
        assert_eq!(server.max_upload_mb, Some(25));
    }

    #[test]
    fn unparseable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(load_from_path(&path).is_none());
    }
}
