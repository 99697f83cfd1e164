use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use zakazbot_db::models::SettingValue;
use zakazbot_db::repositories::SettingsRepository;

/// Read-through cache over the settings table. Writes update both the
/// store and the cache; a miss falls back to the database.
#[derive(Clone)]
pub struct SettingsService {
    repo: SettingsRepository,
    cache: Arc<RwLock<HashMap<String, SettingValue>>>,
}

impl SettingsService {
    pub fn new(repo: SettingsRepository) -> Self {
        Self {
            repo,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<SettingValue> {
        {
            let cache = self.cache.read().await;
            if let Some(val) = cache.get(key) {
                return Some(val.clone());
            }
        }

        match self.repo.get(key).await {
            Ok(Some(val)) => {
                let mut cache = self.cache.write().await;
                cache.insert(key.to_string(), val.clone());
                Some(val)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, "failed to load setting: {e:#}");
                None
            }
        }
    }

    pub async fn get_text_or(&self, key: &str, default: &str) -> String {
        match self.get(key).await {
            Some(SettingValue::Text(s)) => s,
            Some(other) => other.serialize_to_store(),
            None => default.to_string(),
        }
    }

    pub async fn set(&self, key: &str, value: SettingValue) -> anyhow::Result<()> {
        self.repo.set(key, &value).await?;
        let mut cache = self.cache.write().await;
        cache.insert(key.to_string(), value);
        Ok(())
    }
}
