//! Settings Registry: a typed, hot-reloadable key/value store layered
//! over an external DB, process env vars, and compiled-in defaults.
//!
//! The database itself is an out-of-scope collaborator (§"Out of scope"):
//! this module only defines the [`SettingsBackend`] contract a concrete
//! store must satisfy, plus the read/write layering and cache behavior
//! that sit in front of it.
//!
//! Read order: cache → last-known-DB → env var → default. The cache has
//! a short TTL, but the last-known-DB layer survives TTL expiry — so a
//! backend outage degrades reads to "whatever the last successful DB
//! fetch returned", never silently back to the compiled default.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use agentim_domain::error::{Error, Result};
use agentim_domain::setting::Setting;
use agentim_domain::trace::TraceEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

/// The external persistence contract. A production deployment backs this
/// with a relational table; tests use an in-memory stub.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<Value>>;
    async fn upsert(&self, key: &str, value: &Value, encrypted: bool) -> Result<()>;
}

struct CacheEntry {
    value: Value,
    cached_at: Instant,
}

struct LastKnown {
    value: Value,
}

/// Registry of [`Setting`] definitions plus the layered read/write logic.
pub struct SettingsRegistry {
    definitions: HashMap<String, Setting>,
    backend: Box<dyn SettingsBackend>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    last_known: RwLock<HashMap<String, LastKnown>>,
    cache_ttl: Duration,
}

impl SettingsRegistry {
    pub fn new(definitions: Vec<Setting>, backend: Box<dyn SettingsBackend>, cache_ttl_secs: u64) -> Self {
        Self {
            definitions: definitions.into_iter().map(|s| (s.key.clone(), s)).collect(),
            backend,
            cache: RwLock::new(HashMap::new()),
            last_known: RwLock::new(HashMap::new()),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        }
    }

    fn definition(&self, key: &str) -> Result<&Setting> {
        self.definitions
            .get(key)
            .ok_or_else(|| Error::Validation(format!("unknown setting '{key}'")))
    }

    /// Read a setting, following cache → last-known-DB → env → default.
    /// A DB miss on a cold cache falls through to `fetch_and_cache`,
    /// which is the only suspension point in this path.
    pub async fn get(&self, key: &str) -> Result<Value> {
        let def = self.definition(key)?;

        if let Some(entry) = self.cache.read().get(key) {
            if entry.cached_at.elapsed() < self.cache_ttl {
                TraceEvent::SettingRead {
                    key: key.to_string(),
                    source: "cache".into(),
                }
                .emit();
                return Ok(entry.value.clone());
            }
        }

        match self.backend.fetch(key).await {
            Ok(Some(value)) => {
                self.remember(key, value.clone());
                TraceEvent::SettingRead {
                    key: key.to_string(),
                    source: "db".into(),
                }
                .emit();
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key, error = %e, "settings backend unavailable, falling back");
            }
        }

        if let Some(last) = self.last_known.read().get(key) {
            TraceEvent::SettingRead {
                key: key.to_string(),
                source: "last_known_db".into(),
            }
            .emit();
            return Ok(last.value.clone());
        }

        if let Some(env_key) = &def.env_key {
            if let Ok(raw) = std::env::var(env_key) {
                TraceEvent::SettingRead {
                    key: key.to_string(),
                    source: "env".into(),
                }
                .emit();
                return Ok(coerce_env_value(def, &raw));
            }
        }

        TraceEvent::SettingRead {
            key: key.to_string(),
            source: "default".into(),
        }
        .emit();
        Ok(def.default_value.clone())
    }

    /// Write a setting: validate against its [`Setting`] definition, then
    /// upsert through the backend and refresh both cache layers so a
    /// subsequent `get` in this process observes the new value
    /// immediately (settings monotonicity).
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let def = self.definition(key)?.clone();
        def.validate(&value).map_err(Error::Validation)?;

        if def.key == "cors.origin" {
            if let Some(s) = value.as_str() {
                if s == "*" {
                    return Err(Error::Validation("cors.origin must not be the wildcard \"*\"".into()));
                }
            }
        }

        self.backend.upsert(key, &value, def.sensitive).await?;
        self.remember(key, value);
        TraceEvent::SettingWritten { key: key.to_string() }.emit();
        Ok(())
    }

    fn remember(&self, key: &str, value: Value) {
        let now = Instant::now();
        self.cache.write().insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                cached_at: now,
            },
        );
        self.last_known.write().insert(key.to_string(), LastKnown { value });
    }
}

/// Built-in setting definitions the registry is seeded with at startup.
/// Admin-facing setting definitions beyond these (e.g. per-deployment
/// custom knobs) are expected to come from the out-of-scope DB's own
/// seed data, not hardcoded here.
pub fn default_settings() -> Vec<Setting> {
    use agentim_domain::setting::SettingType;
    vec![
        Setting {
            key: "routing.maxChainDepth".into(),
            group: "routing".into(),
            setting_type: SettingType::Number,
            default_value: Value::from(8),
            env_key: Some("AGENTIM_MAX_CHAIN_DEPTH".into()),
            enum_values: None,
            min: Some(1.0),
            max: Some(64.0),
            sensitive: false,
        },
        Setting {
            key: "routing.maxMessagesPerMinutePerAgent".into(),
            group: "routing".into(),
            setting_type: SettingType::Number,
            default_value: Value::from(30),
            env_key: Some("AGENTIM_MAX_MESSAGES_PER_MINUTE".into()),
            enum_values: None,
            min: Some(1.0),
            max: Some(600.0),
            sensitive: false,
        },
        Setting {
            key: "cors.origin".into(),
            group: "server".into(),
            setting_type: SettingType::String,
            default_value: Value::String("http://localhost:3000".into()),
            env_key: Some("AGENTIM_CORS_ORIGIN".into()),
            enum_values: None,
            min: None,
            max: None,
            sensitive: false,
        },
        Setting {
            key: "permission.timeoutSecs".into(),
            group: "permission".into(),
            setting_type: SettingType::Number,
            default_value: Value::from(agentim_domain::permission::DEFAULT_PERMISSION_TIMEOUT_SECS),
            env_key: Some("AGENTIM_PERMISSION_TIMEOUT_SECS".into()),
            enum_values: None,
            min: Some(10.0),
            max: Some(3600.0),
            sensitive: false,
        },
        Setting {
            key: "aiRouter.apiKey".into(),
            group: "ai_router".into(),
            setting_type: SettingType::String,
            default_value: Value::Null,
            env_key: Some("AGENTIM_AI_ROUTER_API_KEY".into()),
            enum_values: None,
            min: None,
            max: None,
            sensitive: true,
        },
    ]
}

/// Dependency-free default backend: every fetch misses, every upsert
/// succeeds without persisting. The registry's last-known-DB cache layer
/// still makes writes observable for the lifetime of the process; a real
/// deployment swaps this for a DB-backed [`SettingsBackend`].
pub struct NullSettingsBackend;

#[async_trait]
impl SettingsBackend for NullSettingsBackend {
    async fn fetch(&self, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn upsert(&self, _key: &str, _value: &Value, _encrypted: bool) -> Result<()> {
        Ok(())
    }
}

fn coerce_env_value(def: &Setting, raw: &str) -> Value {
    use agentim_domain::setting::SettingType;
    match def.setting_type {
        SettingType::Boolean => Value::Bool(raw.eq_ignore_ascii_case("true") || raw == "1"),
        SettingType::Number => serde_json::Number::from_f64(raw.parse::<f64>().unwrap_or(0.0))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SettingType::String | SettingType::Enum => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentim_domain::setting::SettingType;
    use std::sync::Mutex;

    struct StubBackend {
        store: Mutex<HashMap<String, Value>>,
        fail: bool,
    }

    #[async_trait]
    impl SettingsBackend for StubBackend {
        async fn fetch(&self, key: &str) -> Result<Option<Value>> {
            if self.fail {
                return Err(Error::Transient("db down".into()));
            }
            Ok(self.store.lock().unwrap().get(key).cloned())
        }
        async fn upsert(&self, key: &str, value: &Value, _encrypted: bool) -> Result<()> {
            self.store.lock().unwrap().insert(key.to_string(), value.clone());
            Ok(())
        }
    }

    fn def(key: &str) -> Setting {
        Setting {
            key: key.to_string(),
            group: "general".into(),
            setting_type: SettingType::Number,
            default_value: Value::from(10),
            env_key: Some(format!("AGENTIM_{}", key.to_uppercase())),
            enum_values: None,
            min: Some(0.0),
            max: Some(100.0),
            sensitive: false,
        }
    }

    #[tokio::test]
    async fn unset_key_returns_default() {
        let backend = StubBackend {
            store: Mutex::new(HashMap::new()),
            fail: false,
        };
        let registry = SettingsRegistry::new(vec![def("max_depth")], Box::new(backend), 5);
        assert_eq!(registry.get("max_depth").await.unwrap(), Value::from(10));
    }

    #[tokio::test]
    async fn write_then_read_is_monotonic() {
        let backend = StubBackend {
            store: Mutex::new(HashMap::new()),
            fail: false,
        };
        let registry = SettingsRegistry::new(vec![def("max_depth")], Box::new(backend), 5);
        registry.set("max_depth", Value::from(42)).await.unwrap();
        assert_eq!(registry.get("max_depth").await.unwrap(), Value::from(42));
    }

    #[tokio::test]
    async fn out_of_range_write_is_rejected() {
        let backend = StubBackend {
            store: Mutex::new(HashMap::new()),
            fail: false,
        };
        let registry = SettingsRegistry::new(vec![def("max_depth")], Box::new(backend), 5);
        assert!(registry.set("max_depth", Value::from(999)).await.is_err());
    }

    #[tokio::test]
    async fn db_outage_falls_back_to_last_known() {
        let backend = StubBackend {
            store: Mutex::new(HashMap::new()),
            fail: false,
        };
        let registry = SettingsRegistry::new(vec![def("max_depth")], Box::new(backend), 0);
        registry.set("max_depth", Value::from(55)).await.unwrap();

        // Swap in a failing backend but keep the in-process last-known layer.
        let failing = StubBackend {
            store: Mutex::new(HashMap::new()),
            fail: true,
        };
        let registry2 = SettingsRegistry {
            definitions: registry.definitions.clone(),
            backend: Box::new(failing),
            cache: RwLock::new(HashMap::new()),
            last_known: registry.last_known,
            cache_ttl: Duration::from_secs(0),
        };
        assert_eq!(registry2.get("max_depth").await.unwrap(), Value::from(55));
    }

    #[tokio::test]
    async fn cors_wildcard_write_rejected() {
        let backend = StubBackend {
            store: Mutex::new(HashMap::new()),
            fail: false,
        };
        let mut cors_def = def("cors.origin");
        cors_def.setting_type = SettingType::String;
        cors_def.default_value = Value::String("https://example.com".into());
        cors_def.min = None;
        cors_def.max = None;
        let registry = SettingsRegistry::new(vec![cors_def], Box::new(backend), 5);
        assert!(registry.set("cors.origin", Value::String("*".into())).await.is_err());
    }
}
