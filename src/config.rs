use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub graph: GraphConfig,
    pub recommend: RecommendConfig,
    pub ranking: RankingConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. Empty means the in-memory store.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Traversal bounds. Carried over from the source system as policy, not law.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Maximum hop count explored by the social distance search.
    pub max_distance_depth: u32,
    /// Maximum comment nesting depth reconstructed in a thread.
    pub max_thread_depth: u32,
}

/// Friend recommendation scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    pub mutual_weight: f64,
    pub post_weight: f64,
    pub follower_weight: f64,
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Posts newer than this many days count as "recent".
    pub recent_window_days: i64,
    /// Rolling activity windows for the activity classification.
    pub active_window_days: i64,
    pub moderate_window_days: i64,
}

/// Bounded retry for counter-style updates under contention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_default(),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("SERVER_PORT", 3000),
            },
            graph: GraphConfig {
                max_distance_depth: env_parse("GRAPH_MAX_DISTANCE_DEPTH", 6),
                max_thread_depth: env_parse("THREAD_MAX_DEPTH", 10),
            },
            recommend: RecommendConfig {
                mutual_weight: env_parse("RECOMMEND_MUTUAL_WEIGHT", 10.0),
                post_weight: env_parse("RECOMMEND_POST_WEIGHT", 0.5),
                follower_weight: env_parse("RECOMMEND_FOLLOWER_WEIGHT", 0.1),
                max_results: env_parse("RECOMMEND_MAX_RESULTS", 50),
            },
            ranking: RankingConfig {
                recent_window_days: env_parse("RANKING_RECENT_WINDOW_DAYS", 7),
                active_window_days: env_parse("RANKING_ACTIVE_WINDOW_DAYS", 7),
                moderate_window_days: env_parse("RANKING_MODERATE_WINDOW_DAYS", 30),
            },
            retry: RetryConfig {
                max_attempts: env_parse("RETRY_MAX_ATTEMPTS", 3),
                base_backoff_ms: env_parse("RETRY_BASE_BACKOFF_MS", 10),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env().expect("default config")
    }
}
