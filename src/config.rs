use crate::error::{invalid_argument, StoreResult};
use crate::inmemory::{InMemoryPageCache, InMemoryPostStore, InMemorySessions};
use crate::paths::Paths;
use crate::store::{
    PageCache, PathRevalidator, PostRepository, SessionProvider, SessionRegistry, TopicCatalog,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const BACKEND_ENV: &str = "TOPIC_POSTS_BACKEND";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const NAMESPACE_ENV: &str = "TOPIC_POSTS_NAMESPACE";

/// Selects which storage backend `create_backends` builds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendConfig {
    InMemory,
    #[cfg(feature = "redis")]
    Redis { url: String, namespace: String },
}

impl BackendConfig {
    /// Reads `TOPIC_POSTS_BACKEND` (`memory` or `redis`), `REDIS_URL` and `TOPIC_POSTS_NAMESPACE`.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let backend = lookup(BACKEND_ENV).unwrap_or_else(|| "memory".to_string());
        match backend.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Ok(Self::InMemory),
            #[cfg(feature = "redis")]
            "redis" => {
                let url = lookup(REDIS_URL_ENV)
                    .ok_or_else(|| invalid_argument(format!("{REDIS_URL_ENV} must be set")))?;
                let namespace = lookup(NAMESPACE_ENV)
                    .unwrap_or_else(|| crate::redis_store::DEFAULT_NAMESPACE.to_string());
                Ok(Self::Redis { url, namespace })
            }
            other => Err(invalid_argument(format!("unsupported backend `{other}`"))),
        }
    }
}

/// Capabilities handed to the workflow and to the host application.
#[derive(Clone)]
pub struct Backends {
    pub sessions: Arc<dyn SessionProvider>,
    pub session_registry: Arc<dyn SessionRegistry>,
    pub posts: Arc<dyn PostRepository>,
    pub catalog: Arc<dyn TopicCatalog>,
    pub pages: Arc<dyn PageCache>,
    pub revalidator: Arc<dyn PathRevalidator>,
}

impl Backends {
    pub fn in_memory() -> Self {
        let sessions = Arc::new(InMemorySessions::new());
        let posts = Arc::new(InMemoryPostStore::new());
        let pages = Arc::new(InMemoryPageCache::new());
        Self {
            sessions: sessions.clone(),
            session_registry: sessions,
            posts: posts.clone(),
            catalog: posts,
            pages: pages.clone(),
            revalidator: pages,
        }
    }

    #[cfg(feature = "redis")]
    pub fn redis(store: crate::redis_store::RedisStore) -> Self {
        let store = Arc::new(store);
        Self {
            sessions: store.clone(),
            session_registry: store.clone(),
            posts: store.clone(),
            catalog: store.clone(),
            pages: store.clone(),
            revalidator: store,
        }
    }
}

/// Builds the backends selected by `config`.
pub fn create_backends(config: BackendConfig) -> StoreResult<Backends> {
    match config {
        BackendConfig::InMemory => Ok(Backends::in_memory()),
        #[cfg(feature = "redis")]
        BackendConfig::Redis { url, namespace } => {
            let store = crate::redis_store::RedisStore::from_url_with_namespace(url, namespace)?;
            Ok(Backends::redis(store))
        }
    }
}

/// Behavior knobs of the create-post action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Show store failure messages to the user verbatim. When false every store failure
    /// is reported as `something went wrong`.
    pub expose_store_errors: bool,
    pub paths: Paths,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            expose_store_errors: true,
            paths: Paths::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_to_memory() {
        let config = BackendConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, BackendConfig::InMemory);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = BackendConfig::from_lookup(lookup(&[(BACKEND_ENV, "sqlite")]))
            .expect_err("unknown backend");
        assert!(err.message.contains("sqlite"));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_requires_url() {
        let err = BackendConfig::from_lookup(lookup(&[(BACKEND_ENV, "redis")]))
            .expect_err("missing url");
        assert!(err.message.contains(REDIS_URL_ENV));

        let config = BackendConfig::from_lookup(lookup(&[
            (BACKEND_ENV, "redis"),
            (REDIS_URL_ENV, "redis://localhost/"),
        ]))
        .expect("config");
        assert_eq!(
            config,
            BackendConfig::Redis {
                url: "redis://localhost/".into(),
                namespace: crate::redis_store::DEFAULT_NAMESPACE.into(),
            }
        );
    }

    #[test]
    fn action_config_fills_missing_fields() {
        let config: ActionConfig =
            serde_json::from_str(r#"{"paths":{"base":"/forum"}}"#).expect("parse");
        assert!(config.expose_store_errors);
        assert_eq!(config.paths.topic_show("x"), "/forum/topics/x");
    }

    #[test]
    fn action_config_base_with_trailing_slash() {
        let config: ActionConfig =
            serde_json::from_str(r#"{"paths":{"base":"/forum/"}}"#).expect("parse");
        assert_eq!(config.paths.topic_show("x"), "/forum/topics/x");
    }
}
