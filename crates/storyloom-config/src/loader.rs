use crate::schema::StoryloomConfig;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: StoryloomConfig,
    pub path: PathBuf,
    pub format: ConfigFormat,
}

pub fn load_config(config_path: Option<&Path>) -> Result<StoryloomConfig> {
    resolve_config(config_path).map(|r| r.config)
}

/// Load the explicit or discovered config, or defaults when none exists
///
/// An explicit path that cannot be loaded is still an error.
pub fn load_config_or_default(config_path: Option<&Path>) -> Result<StoryloomConfig> {
    match config_path {
        Some(path) => load_config_from_file(path).map(|r| r.config),
        None => match find_config_file() {
            Some(path) => load_config_from_file(&path).map(|r| r.config),
            None => Ok(StoryloomConfig::default()),
        },
    }
}

pub fn resolve_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .or_else(find_config_file)
        .ok_or_else(|| anyhow!("No configuration file found"))?;

    load_config_from_file(&path)
}

pub fn load_config_from_file(path: &Path) -> Result<ResolvedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    let config = parse_config_content(&content, format)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(ResolvedConfig {
        config: expand_env_vars(config),
        path: path.to_path_buf(),
        format,
    })
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<StoryloomConfig> {
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}

const CONFIG_CANDIDATES: &[&str] = &[
    "storyloom.jsonc",
    "storyloom.json",
    "storyloom.yml",
    "storyloom.yaml",
    ".storyloom.jsonc",
    ".storyloom.json",
    ".storyloom.yml",
    ".storyloom.yaml",
];

fn global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("storyloom"))
}

fn candidate_paths() -> impl Iterator<Item = PathBuf> {
    let local = CONFIG_CANDIDATES.iter().map(PathBuf::from);
    let global = global_config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_CANDIDATES.iter().map(move |candidate| dir.join(candidate)));
    local.chain(global)
}

fn find_config_file() -> Option<PathBuf> {
    candidate_paths().find(|path| path.exists())
}

pub fn find_all_config_files() -> Vec<PathBuf> {
    candidate_paths().filter(|path| path.exists()).collect()
}

fn expand_env_vars(mut config: StoryloomConfig) -> StoryloomConfig {
    config.horde.api_key = expand_env_string(&config.horde.api_key);
    config.horde.base_url = expand_env_string(&config.horde.base_url);
    config
}

fn expand_env_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if chars.peek() == Some(&'{') {
            // ${VAR} syntax
            chars.next();
            let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
            match env::var(&var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    result.push_str("${");
                    result.push_str(&var_name);
                    result.push('}');
                }
            }
            continue;
        }

        // $VAR syntax; peek so the delimiter is kept
        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                var_name.push(c);
                chars.next();
            } else {
                break;
            }
        }

        if var_name.is_empty() {
            result.push('$');
        } else if let Ok(value) = env::var(&var_name) {
            result.push_str(&value);
        } else {
            result.push('$');
            result.push_str(&var_name);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_expand_env_string_with_braces() {
        env::set_var("STORYLOOM_TEST_KEY", "secret");
        let result = expand_env_string("key-${STORYLOOM_TEST_KEY}-end");
        assert_eq!(result, "key-secret-end");
    }

    #[test]
    fn test_expand_env_string_without_braces() {
        env::set_var("STORYLOOM_TEST_HOST", "localhost");
        let result = expand_env_string("http://$STORYLOOM_TEST_HOST:8080/api");
        assert_eq!(result, "http://localhost:8080/api");
    }

    #[test]
    fn test_expand_env_string_missing_var() {
        let result = expand_env_string("prefix_${STORYLOOM_NONEXISTENT}_suffix");
        assert_eq!(result, "prefix_${STORYLOOM_NONEXISTENT}_suffix");
    }

    #[test]
    fn test_expand_env_string_lone_dollar() {
        assert_eq!(expand_env_string("costs $ 5"), "costs $ 5");
        assert_eq!(expand_env_string("no_variables_here"), "no_variables_here");
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("storyloom.jsonc")),
            Some(ConfigFormat::Jsonc)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("storyloom.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("storyloom.yaml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("storyloom.toml")), None);
    }

    #[test]
    fn test_load_jsonc_with_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyloom.jsonc");
        fs::write(
            &path,
            r#"{
  // pinned models
  "horde": { "models": ["m-1"], "poll_interval_ms": 500 },
  /* quieter output */
  "logging": { "level": "warn" }
}"#,
        )
        .unwrap();

        let resolved = load_config_from_file(&path).unwrap();
        assert_eq!(resolved.format, ConfigFormat::Jsonc);
        assert_eq!(resolved.config.horde.models, vec!["m-1"]);
        assert_eq!(resolved.config.horde.poll_interval_ms, 500);
        assert_eq!(resolved.config.logging.level, "warn");
    }

    #[test]
    fn test_load_yaml_expands_api_key() {
        env::set_var("STORYLOOM_TEST_HORDE_KEY", "abc123");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyloom.yml");
        fs::write(&path, "horde:\n  api_key: \"${STORYLOOM_TEST_HORDE_KEY}\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.horde.api_key, "abc123");
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyloom.json");
        fs::write(&path, r#"{"generation": {"max_tokens": 200}}"#).unwrap();

        let resolved = load_config_from_file(&path).unwrap();
        assert_eq!(resolved.format, ConfigFormat::Json);
        assert_eq!(resolved.config.generation.max_tokens, 200);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyloom.json");
        fs::write(&path, "{not json").unwrap();

        let err = load_config_from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("storyloom.json"));
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(load_config_or_default(Some(&path)).is_err());
    }

    #[test]
    fn test_config_priority_order() {
        assert_eq!(CONFIG_CANDIDATES[0], "storyloom.jsonc");
        assert_eq!(CONFIG_CANDIDATES[1], "storyloom.json");
        assert_eq!(CONFIG_CANDIDATES[2], "storyloom.yml");
        assert_eq!(CONFIG_CANDIDATES[3], "storyloom.yaml");
        assert_eq!(CONFIG_CANDIDATES[4], ".storyloom.jsonc");
    }
}
