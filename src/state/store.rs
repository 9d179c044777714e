//! Persistent key-value state and the typed settings facade over it.

use super::{Settings, TrackedProduct};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Key holding the API base URL.
pub const API_URL_KEY: &str = "apiUrl";
/// Key holding the ordered tracked-product list.
pub const TRACKED_PRODUCTS_KEY: &str = "trackedProducts";

/// Injected persistence interface.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// reader never observes a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::store(format!(
                "{} does not hold a JSON object (found {})",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(values))?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), key, "Settings written");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Typed access to the two settings keys.
///
/// Every mutation of the product list goes through [`SettingsStore::update_products`],
/// which serializes read-modify-write cycles so concurrent writers do not lose updates.
pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
    default_api_url: String,
    products_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, default_api_url: impl Into<String>) -> Self {
        Self {
            kv,
            default_api_url: default_api_url.into(),
            products_lock: Mutex::new(()),
        }
    }

    /// Load both keys, failing on unreadable or malformed state.
    pub async fn load(&self) -> Result<Settings> {
        Ok(Settings {
            api_base_url: self.api_base_url().await?,
            tracked_products: self.tracked_products().await?,
        })
    }

    /// Load both keys; a broken product list is logged and treated as empty.
    pub async fn load_or_empty(&self) -> Settings {
        let api_base_url = match self.api_base_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Could not read API URL, using default");
                self.default_api_url.clone()
            }
        };
        let tracked_products = match self.tracked_products().await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "Could not read tracked products, treating list as empty");
                Vec::new()
            }
        };
        Settings {
            api_base_url,
            tracked_products,
        }
    }

    /// The stored API base URL, or the configured default.
    pub async fn api_base_url(&self) -> Result<String> {
        match self.kv.get(API_URL_KEY).await? {
            Some(Value::String(url)) if !url.trim().is_empty() => Ok(url),
            Some(Value::String(_)) | Some(Value::Null) | None => Ok(self.default_api_url.clone()),
            Some(other) => Err(Error::store(format!(
                "{API_URL_KEY} must be a string, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub async fn set_api_base_url(&self, url: &str) -> Result<()> {
        let url = url.trim();
        url::Url::parse(url).map_err(|e| Error::invalid_input(format!("{url}: {e}")))?;
        self.kv
            .set(API_URL_KEY, Value::String(url.trim_end_matches('/').to_string()))
            .await
    }

    pub async fn tracked_products(&self) -> Result<Vec<TrackedProduct>> {
        match self.kv.get(TRACKED_PRODUCTS_KEY).await? {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// Apply `f` to the stored product list and write the result back.
    pub async fn update_products<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<TrackedProduct>) -> T + Send,
        T: Send,
    {
        let _guard = self.products_lock.lock().await;

        let mut products = self.tracked_products().await?;
        let out = f(&mut products);
        self.kv
            .set(TRACKED_PRODUCTS_KEY, serde_json::to_value(&products)?)
            .await?;
        Ok(out)
    }

    /// Append a product; an existing entry with the same id is replaced in place.
    pub async fn add_product(&self, product: TrackedProduct) -> Result<()> {
        self.update_products(move |products| {
            match products.iter_mut().find(|p| p.id == product.id) {
                Some(existing) => *existing = product,
                None => products.push(product),
            }
        })
        .await
    }

    /// Remove a product, returning whether it was present.
    pub async fn remove_product(&self, product_id: &str) -> Result<bool> {
        self.update_products(|products| {
            let before = products.len();
            products.retain(|p| p.id != product_id);
            products.len() != before
        })
        .await
    }

    /// Set the muted flag of a product, returning whether it was present.
    pub async fn set_muted(&self, product_id: &str, muted: bool) -> Result<bool> {
        self.update_products(|products| match products.iter_mut().find(|p| p.id == product_id) {
            Some(product) => {
                product.muted = muted;
                true
            }
            None => false,
        })
        .await
    }
}
