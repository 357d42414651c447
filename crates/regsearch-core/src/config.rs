//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys). Provides helpers to expand
//! `~` and `${VAR}` and to resolve relative paths against the config directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::data_processor::ChunkingConfig;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> { Self::load_from(Path::new(".")) }

    /// Merge defaults, `<base>/config.toml`, `<base>/config.<env>.toml` and `APP_*` env vars.
    pub fn load_from(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf() };
        config.validate()?;
        Ok(config)
    }

    /// Typed settings with every path resolved against the config directory.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.resolve_paths(&self.base_dir);
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if settings.retrieval.top_k == 0 {
            return Err(crate::error::Error::InvalidConfig("retrieval.top_k must be positive".into()).into());
        }
        if settings.llm.max_calls == 0 {
            return Err(crate::error::Error::InvalidConfig("llm.max_calls must be positive".into()).into());
        }
        if !(0.0..1.0).contains(&settings.chunking.overlap_percent) {
            return Err(crate::error::Error::InvalidConfig("chunking.overlap_percent must be in [0, 1)".into()).into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub models: ModelSettings,
    pub llm: LlmSettings,
}

impl Settings {
    pub fn resolve_paths(&mut self, base: &Path) {
        self.corpus.doc_dir = resolve_with_base(base, self.corpus.doc_dir.to_string_lossy());
        self.retrieval.cache_dir = resolve_with_base(base, self.retrieval.cache_dir.to_string_lossy());
        if let Some(dir) = self.models.embed_dir.take() { self.models.embed_dir = Some(resolve_with_base(base, dir.to_string_lossy())); }
        if let Some(dir) = self.models.cross_encoder_dir.take() { self.models.cross_encoder_dir = Some(resolve_with_base(base, dir.to_string_lossy())); }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSpec {
    pub title: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSettings {
    pub doc_dir: PathBuf,
    /// Title -> tree file. Empty means "every `*.json` tree under `doc_dir`".
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
    #[serde(default)]
    pub glossary: Option<String>,
    #[serde(default)]
    pub leaf_min_chars: Option<usize>,
    #[serde(default)]
    pub paragraph_min_chars: Option<usize>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self { doc_dir: PathBuf::from("data/docs"), documents: Vec::new(), glossary: None, leaf_min_chars: None, paragraph_min_chars: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub cache_dir: PathBuf,
    pub pre_expand: bool,
    pub post_expand: bool,
    pub top_k: usize,
    pub definitions_k: usize,
    pub similarity_model: String,
    pub rerank: bool,
    pub cross_encoder: String,
    pub rerank_floor: f32,
    pub similarity_floor: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data"),
            pre_expand: false,
            post_expand: true,
            top_k: 10,
            definitions_k: 5,
            similarity_model: "bge-m3".to_string(),
            rerank: true,
            cross_encoder: "ms-marco-MiniLM-L-12-v2".to_string(),
            rerank_floor: -2.0,
            similarity_floor: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub embed_dir: Option<PathBuf>,
    #[serde(default)]
    pub cross_encoder_dir: Option<PathBuf>,
    #[serde(default)]
    pub use_fake: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerMode {
    LlmOnly,
    Search,
    Agentic,
}

impl std::str::FromStr for AnswerMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm-only" => Ok(Self::LlmOnly),
            "search" => Ok(Self::Search),
            "agentic" => Ok(Self::Agentic),
            other => Err(crate::error::Error::InvalidConfig(format!("unknown answer mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub max_calls: usize,
    pub mode: AnswerMode,
    pub include_definitions: bool,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-0125-preview".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_calls: 5,
            mode: AnswerMode::Agentic,
            include_definitions: true,
            timeout_secs: 120,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
