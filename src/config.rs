#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_SETTINGS_PATH: &str = "tubetrack.toml";
pub const DEFAULT_DB_PATH: &str = "tubetrack.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_RESULTS: usize = 30;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Options threaded into every ingestion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Data API key; `None` keeps every lookup on the keyless paths.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_results: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Options for the chat-completions backed summaries and questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantOptions {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AssistantOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    pub fetch: FetchOptions,
    pub assistant: AssistantOptions,
}

pub fn load_config() -> Result<TrackerConfig> {
    resolve_config(ConfigOverrides::default())
}

/// Values given on the command line. They beat every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub env_path: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
}

/// Optional TOML settings file; the lowest-priority source before defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub db_path: Option<String>,
    pub youtube_api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_results: Option<usize>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
}

pub fn resolve_config(overrides: ConfigOverrides) -> Result<TrackerConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let settings_path = overrides
        .settings_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_PATH));
    let file_vars = read_env_file(env_path)?;
    let settings = read_settings_file(settings_path)?;
    Ok(build_config(&file_vars, &settings, env_var_string, overrides))
}

fn build_config(
    file_vars: &HashMap<String, String>,
    settings: &SettingsFile,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> TrackerConfig {
    let lookup = |key: &str, fallback: Option<&String>| {
        lookup_value(key, file_vars, &env_lookup)
            .or_else(|| fallback.cloned())
            .and_then(non_blank)
    };

    let db_path = overrides
        .db_path
        .or_else(|| lookup("TUBETRACK_DB", settings.db_path.as_ref()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let api_key = overrides
        .api_key
        .and_then(non_blank)
        .or_else(|| lookup("YOUTUBE_API_KEY", settings.youtube_api_key.as_ref()));
    let timeout_secs = lookup_value("TUBETRACK_TIMEOUT_SECS", file_vars, &env_lookup)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .or(settings.timeout_secs)
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let max_results = lookup_value("TUBETRACK_MAX_RESULTS", file_vars, &env_lookup)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .or(settings.max_results)
        .filter(|count| *count > 0)
        .unwrap_or(DEFAULT_MAX_RESULTS);
    let model = overrides
        .model
        .and_then(non_blank)
        .or_else(|| lookup("OPENAI_MODEL", settings.openai_model.as_ref()))
        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
    let base_url = lookup("OPENAI_BASE_URL", settings.openai_base_url.as_ref())
        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
    // never read from the settings file so the key stays out of checked-in config
    let openai_key = lookup("OPENAI_API_KEY", None);

    TrackerConfig {
        db_path,
        fetch: FetchOptions {
            api_key,
            timeout: Duration::from_secs(timeout_secs),
            max_results,
        },
        assistant: AssistantOptions {
            model,
            api_key: openai_key,
            base_url,
            ..AssistantOptions::default()
        },
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_settings_file(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Parsing {}", path.display()))
}

/// Reads `KEY=value` pairs from a dotenv-style file. A missing file yields no
/// values; lines that are blank, comments or lack `=` are ignored.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    Ok(content
        .lines()
        .filter_map(parse_env_line)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect())
}

fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").map_or(line, str::trim_start);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(value.trim())))
}

/// Strips one matching pair of surrounding single or double quotes.
fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(env_contents: &str, settings: SettingsFile) -> TrackerConfig {
        let vars = read_env_file(make_file(env_contents).path()).unwrap();
        build_config(&vars, &settings, |_| None, ConfigOverrides::default())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from("", SettingsFile::default());
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.fetch, FetchOptions::default());
        assert_eq!(config.assistant.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.assistant.api_key, None);
    }

    #[test]
    fn env_file_values_are_read() {
        let config = config_from(
            "TUBETRACK_DB=\"/data/tracker.db\"\nYOUTUBE_API_KEY='abc'\nTUBETRACK_TIMEOUT_SECS=12\nTUBETRACK_MAX_RESULTS=10\nOPENAI_MODEL=gpt-3.5-turbo\n",
            SettingsFile::default(),
        );
        assert_eq!(config.db_path, PathBuf::from("/data/tracker.db"));
        assert_eq!(config.fetch.api_key.as_deref(), Some("abc"));
        assert_eq!(config.fetch.timeout, Duration::from_secs(12));
        assert_eq!(config.fetch.max_results, 10);
        assert_eq!(config.assistant.model, "gpt-3.5-turbo");
    }

    #[test]
    fn blank_api_key_counts_as_absent() {
        let config = config_from("YOUTUBE_API_KEY=\"   \"\n", SettingsFile::default());
        assert_eq!(config.fetch.api_key, None);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from(
            "TUBETRACK_TIMEOUT_SECS=soon\nTUBETRACK_MAX_RESULTS=0\n",
            SettingsFile::default(),
        );
        assert_eq!(config.fetch.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.fetch.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn settings_file_fills_gaps_below_env() {
        let settings_file = make_file(
            "db_path = \"/toml.db\"\nyoutube_api_key = \"toml-key\"\ntimeout_secs = 5\nopenai_model = \"gpt-4o\"\n",
        );
        let settings = read_settings_file(settings_file.path()).unwrap();
        let vars = read_env_file(make_file("YOUTUBE_API_KEY=env-file-key\n").path()).unwrap();
        let config = build_config(&vars, &settings, |_| None, ConfigOverrides::default());
        assert_eq!(config.db_path, PathBuf::from("/toml.db"));
        assert_eq!(config.fetch.api_key.as_deref(), Some("env-file-key"));
        assert_eq!(config.fetch.timeout, Duration::from_secs(5));
        assert_eq!(config.assistant.model, "gpt-4o");
    }

    #[test]
    fn process_env_beats_env_file() {
        let vars = read_env_file(make_file("YOUTUBE_API_KEY=file\n").path()).unwrap();
        let config = build_config(
            &vars,
            &SettingsFile::default(),
            |key| (key == "YOUTUBE_API_KEY").then(|| "process".to_string()),
            ConfigOverrides::default(),
        );
        assert_eq!(config.fetch.api_key.as_deref(), Some("process"));
    }

    #[test]
    fn overrides_take_precedence() {
        let vars = read_env_file(
            make_file("TUBETRACK_DB=/file.db\nYOUTUBE_API_KEY=file\nOPENAI_MODEL=file-model\n").path(),
        )
        .unwrap();
        let config = build_config(
            &vars,
            &SettingsFile::default(),
            |_| None,
            ConfigOverrides {
                db_path: Some(PathBuf::from("/cli.db")),
                api_key: Some("cli".into()),
                model: Some("cli-model".into()),
                ..ConfigOverrides::default()
            },
        );
        assert_eq!(config.db_path, PathBuf::from("/cli.db"));
        assert_eq!(config.fetch.api_key.as_deref(), Some("cli"));
        assert_eq!(config.assistant.model, "cli-model");
    }

    #[test]
    fn openai_key_comes_from_env_only() {
        let config = config_from("OPENAI_API_KEY=sk-test\n", SettingsFile::default());
        assert_eq!(config.assistant.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn env_lines_parse_exports_and_quoting() {
        assert_eq!(
            parse_env_line("export TUBETRACK_DB=\"/srv/t.db\""),
            Some(("TUBETRACK_DB", "/srv/t.db"))
        );
        assert_eq!(
            parse_env_line("  OPENAI_MODEL =  'gpt-4o'  "),
            Some(("OPENAI_MODEL", "gpt-4o"))
        );
        assert_eq!(
            parse_env_line("KEY=\"unbalanced'"),
            Some(("KEY", "\"unbalanced'"))
        );
        assert_eq!(parse_env_line("EMPTY="), Some(("EMPTY", "")));
        assert_eq!(parse_env_line("# YOUTUBE_API_KEY=x"), None);
        assert_eq!(parse_env_line("=value"), None);
        assert_eq!(parse_env_line("NO_EQUALS_SIGN"), None);
        assert_eq!(parse_env_line(""), None);
    }

    #[test]
    fn env_file_collects_valid_lines() {
        let file = make_file(
            "# tracker settings\nYOUTUBE_API_KEY='abc'\n\nbroken line\nTUBETRACK_MAX_RESULTS=12\n",
        );
        let vars = read_env_file(file.path()).unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["YOUTUBE_API_KEY"], "abc");
        assert_eq!(vars["TUBETRACK_MAX_RESULTS"], "12");
    }

    #[test]
    fn missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_file(&dir.path().join("missing.env")).unwrap().is_empty());
        assert!(
            read_settings_file(&dir.path().join("missing.toml"))
                .unwrap()
                .db_path
                .is_none()
        );
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let file = make_file("timeout_secs = \"soon\"\n");
        assert!(read_settings_file(file.path()).is_err());
    }
}
