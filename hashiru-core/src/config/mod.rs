//! HASHIRU-specific runtime configuration: the manager's system prompt, tool/catalog paths,
//! and the default expense budget. Generic env/XDG loading lives in the separate `env_config`
//! crate (`env_config::load_and_apply`), called once by `hashiru-cli` before this struct is
//! built.

use std::path::PathBuf;

/// Default system prompt baked into the binary, overridable via `HASHIRU_SYSTEM_PROMPT_FILE`.
const DEFAULT_SYSTEM_PROMPT: &str = include_str!("default_system_prompt.md");

/// Runtime configuration for one HASHIRU process. Paths are relative to `base_dir` unless
/// overridden by an environment variable.
#[derive(Clone, Debug)]
pub struct HashiruConfig {
    pub system_prompt: String,
    pub default_tools_dir: PathBuf,
    pub user_tools_dir: PathBuf,
    pub agent_catalog_path: PathBuf,
    pub memory_store_path: PathBuf,
    pub total_expense_budget: f64,
    pub vram_gb_override: f64,
    pub gemini_key: Option<String>,
    pub groq_api_key: Option<String>,
    /// Read but unused by the core; belongs to the excluded OAuth/session surface.
    pub auth0_domain: Option<String>,
    pub auth0_client_id: Option<String>,
    pub auth0_client_secret: Option<String>,
    pub auth0_audience: Option<String>,
    pub session_secret_key: Option<String>,
}

impl HashiruConfig {
    /// Builds config from environment variables layered over `base_dir`-relative defaults.
    /// Call `env_config::load_and_apply` first so `.env`/XDG values are already in `std::env`.
    pub fn from_env(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();

        let system_prompt = std::env::var("HASHIRU_SYSTEM_PROMPT_FILE")
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        Self {
            system_prompt,
            default_tools_dir: env_path("HASHIRU_DEFAULT_TOOLS_DIR", base_dir.join("tools/default")),
            user_tools_dir: env_path("HASHIRU_USER_TOOLS_DIR", base_dir.join("tools/user")),
            agent_catalog_path: env_path("HASHIRU_AGENT_CATALOG", base_dir.join("agents.json")),
            memory_store_path: env_path("HASHIRU_MEMORY_STORE", base_dir.join("memory.json")),
            total_expense_budget: std::env::var("HASHIRU_TOTAL_EXPENSE_BUDGET")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
            vram_gb_override: std::env::var("HASHIRU_VRAM_GB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            gemini_key: std::env::var("GEMINI_KEY").ok(),
            groq_api_key: std::env::var("GROQ_API_KEY").ok(),
            auth0_domain: std::env::var("AUTH0_DOMAIN").ok(),
            auth0_client_id: std::env::var("AUTH0_CLIENT_ID").ok(),
            auth0_client_secret: std::env::var("AUTH0_CLIENT_SECRET").ok(),
            auth0_audience: std::env::var("AUTH0_AUDIENCE").ok(),
            session_secret_key: std::env::var("SESSION_SECRET_KEY").ok(),
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}
