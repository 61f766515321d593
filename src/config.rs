use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    Ollama,
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    #[serde(default = "default_store_config")]
    pub store: StoreConfig,
    #[serde(default = "default_gate_config")]
    pub gate: GateConfig,
    #[serde(default)]
    pub announce: Option<AnnounceConfig>,
    #[serde(default)]
    pub idle_nudge: Option<IdleNudgeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat that receives broadcasts: announcements, idle nudges and
    /// cooldown-recovery notices
    pub broadcast_chat_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GateConfig {
    /// Seconds to stop accepting messages after a provider rate limit
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// When to wipe quota claims and the response cache (6-field cron)
    #[serde(default = "default_purge_cron")]
    pub purge_cron: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnounceConfig {
    pub cron: String,
    #[serde(default = "default_announce_text")]
    pub text: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdleNudgeConfig {
    /// How long the gate must sit idle before a nudge fires
    #[serde(default = "default_idle_threshold_secs")]
    pub threshold_secs: u64,
    /// How often to check for idleness (6-field cron)
    #[serde(default = "default_idle_check_cron")]
    pub check_cron: String,
}

fn default_max_tokens() -> u32 {
    512
}

fn default_db_path() -> PathBuf {
    PathBuf::from("wordbot.db")
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_purge_cron() -> String {
    // Daily at midnight
    "0 0 0 * * *".to_string()
}

fn default_announce_text() -> String {
    "Hi! I am a bot which provides a new word every day in any language you choose".to_string()
}

fn default_idle_threshold_secs() -> u64 {
    3600
}

fn default_idle_check_cron() -> String {
    // Every minute
    "0 * * * * *".to_string()
}

fn default_store_config() -> StoreConfig {
    StoreConfig {
        database_path: default_db_path(),
    }
}

fn default_gate_config() -> GateConfig {
    GateConfig {
        cooldown_secs: default_cooldown_secs(),
        purge_cron: default_purge_cron(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [telegram]
        bot_token = "tg-token"
        broadcast_chat_id = 123456

        [llm]
        model = "gpt-4o-mini"
        api_key = "sk-or-abc"
    "#;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();

        assert_eq!(config.telegram.bot_token, "tg-token");
        assert_eq!(config.telegram.broadcast_chat_id, 123456);
        assert_eq!(config.llm.provider, LlmProvider::Openrouter);
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.store.database_path, PathBuf::from("wordbot.db"));
        assert_eq!(config.gate.cooldown_secs, 60);
        assert_eq!(config.gate.purge_cron, "0 0 0 * * *");
    }

    #[test]
    fn test_optional_jobs_default_to_disabled() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert!(config.announce.is_none());
        assert!(config.idle_nudge.is_none());
    }

    #[test]
    fn test_effective_base_url_follows_provider() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(
            config.llm.effective_base_url(),
            "https://openrouter.ai/api/v1"
        );

        config.llm.provider = LlmProvider::Ollama;
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434/v1");

        config.llm.base_url = "https://proxy.example/v1".to_string();
        assert_eq!(config.llm.effective_base_url(), "https://proxy.example/v1");
    }

    #[test]
    fn test_announce_and_idle_nudge_sections() {
        let toml_text = format!(
            "{MINIMAL}\n\
             [announce]\n\
             cron = \"0 0 9 * * *\"\n\n\
             [idle_nudge]\n\
             threshold_secs = 900\n"
        );
        let config: Config = toml::from_str(&toml_text).unwrap();

        let announce = config.announce.unwrap();
        assert_eq!(announce.cron, "0 0 9 * * *");
        assert!(announce.text.contains("new word every day"));

        let nudge = config.idle_nudge.unwrap();
        assert_eq!(nudge.threshold_secs, 900);
        assert_eq!(nudge.check_cron, "0 * * * * *");
    }

    #[test]
    fn test_gate_overrides() {
        let toml_text = format!(
            "{MINIMAL}\n\
             [gate]\n\
             cooldown_secs = 5\n\
             purge_cron = \"0 30 4 * * *\"\n"
        );
        let config: Config = toml::from_str(&toml_text).unwrap();
        assert_eq!(config.gate.cooldown_secs, 5);
        assert_eq!(config.gate.purge_cron, "0 30 4 * * *");
    }
}
