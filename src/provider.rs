//! Backend provider seam.
//!
//! A [`BackendProvider`] plays the role of a vendor SDK: it initialises named
//! apps and hands out a store client and an auth client per app. Both
//! sub-clients can be pointed at a local emulator before first use.
//!
//! Two providers ship with the crate:
//!
//! | Provider | Store | Auth |
//! |----------|-------|------|
//! | [`MemoryProvider`] | in-process [`MemoryStore`] per app | local anonymous sessions |
//! | [`RestProvider`](crate::rest::RestProvider) | Firestore v1 REST | Identity Toolkit REST |

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use folio_core::{DocumentStore, MemoryStore, StoreError, StoreResult};

use crate::config::{Endpoint, ProjectConfig};

/// An initialised app: a name plus the project settings it was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle {
    pub name: String,
    pub project: ProjectConfig,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub uid: String,
    pub id_token: String,
}

/// Store sub-client of an app.
pub trait StoreClient: Send + Sync {
    /// Point this client at a local emulator.
    ///
    /// Errors if the client was already connected or has already issued a
    /// request.
    fn connect_emulator(&self, endpoint: &Endpoint) -> StoreResult<()>;

    fn emulator_endpoint(&self) -> Option<Endpoint>;

    /// The document store operations are issued through.
    fn document_store(&self) -> Arc<dyn DocumentStore>;
}

/// Auth sub-client of an app.
#[async_trait]
pub trait AuthClient: Send + Sync {
    fn connect_emulator(&self, url: &str) -> StoreResult<()>;

    fn emulator_url(&self) -> Option<String>;

    async fn sign_in_anonymously(&self) -> StoreResult<AuthSession>;
}

/// Creates apps and their sub-clients.
pub trait BackendProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// An app previously initialised under `name`, if any.
    fn get_app(&self, name: &str) -> Option<Arc<AppHandle>>;

    /// Initialise a new app. Fails if `name` is already taken.
    fn initialize_app(&self, name: &str, project: &ProjectConfig) -> StoreResult<Arc<AppHandle>>;

    /// The store client of `app`; repeated calls return the same client.
    fn store(&self, app: &AppHandle) -> StoreResult<Arc<dyn StoreClient>>;

    /// The auth client of `app`; repeated calls return the same client.
    fn auth(&self, app: &AppHandle) -> StoreResult<Arc<dyn AuthClient>>;
}

/// Per-provider tables of apps and their sub-clients, keyed by app name.
pub(crate) struct Instances {
    apps: Mutex<HashMap<String, Arc<AppHandle>>>,
    stores: Mutex<HashMap<String, Arc<dyn StoreClient>>>,
    auths: Mutex<HashMap<String, Arc<dyn AuthClient>>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Instances {
    pub(crate) fn new() -> Self {
        Self {
            apps: Mutex::new(HashMap::new()),
            stores: Mutex::new(HashMap::new()),
            auths: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get_app(&self, name: &str) -> Option<Arc<AppHandle>> {
        lock(&self.apps).get(name).cloned()
    }

    pub(crate) fn initialize_app(
        &self,
        name: &str,
        project: &ProjectConfig,
    ) -> StoreResult<Arc<AppHandle>> {
        let mut apps = lock(&self.apps);
        if apps.contains_key(name) {
            return Err(StoreError::Configuration(format!(
                "app '{}' already exists",
                name
            )));
        }
        let app = Arc::new(AppHandle {
            name: name.to_string(),
            project: project.clone(),
        });
        apps.insert(name.to_string(), app.clone());
        Ok(app)
    }

    fn require_app(&self, app: &AppHandle) -> StoreResult<()> {
        if lock(&self.apps).contains_key(&app.name) {
            Ok(())
        } else {
            Err(StoreError::Configuration(format!(
                "app '{}' was not initialised by this provider",
                app.name
            )))
        }
    }

    pub(crate) fn store_or_init(
        &self,
        app: &AppHandle,
        init: impl FnOnce() -> StoreResult<Arc<dyn StoreClient>>,
    ) -> StoreResult<Arc<dyn StoreClient>> {
        self.require_app(app)?;
        let mut stores = lock(&self.stores);
        if let Some(existing) = stores.get(&app.name) {
            return Ok(existing.clone());
        }
        let client = init()?;
        stores.insert(app.name.clone(), client.clone());
        Ok(client)
    }

    pub(crate) fn auth_or_init(
        &self,
        app: &AppHandle,
        init: impl FnOnce() -> StoreResult<Arc<dyn AuthClient>>,
    ) -> StoreResult<Arc<dyn AuthClient>> {
        self.require_app(app)?;
        let mut auths = lock(&self.auths);
        if let Some(existing) = auths.get(&app.name) {
            return Ok(existing.clone());
        }
        let client = init()?;
        auths.insert(app.name.clone(), client.clone());
        Ok(client)
    }
}

// ============ In-memory provider ============

/// Provider whose apps each own an independent in-memory store.
pub struct MemoryProvider {
    instances: Instances,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            instances: Instances::new(),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get_app(&self, name: &str) -> Option<Arc<AppHandle>> {
        self.instances.get_app(name)
    }

    fn initialize_app(&self, name: &str, project: &ProjectConfig) -> StoreResult<Arc<AppHandle>> {
        self.instances.initialize_app(name, project)
    }

    fn store(&self, app: &AppHandle) -> StoreResult<Arc<dyn StoreClient>> {
        self.instances
            .store_or_init(app, || Ok(Arc::new(MemoryStoreClient::new())))
    }

    fn auth(&self, app: &AppHandle) -> StoreResult<Arc<dyn AuthClient>> {
        self.instances
            .auth_or_init(app, || Ok(Arc::new(MemoryAuthClient::new())))
    }
}

/// Store client backed by a [`MemoryStore`]. Connecting to an emulator only
/// records the endpoint.
pub struct MemoryStoreClient {
    store: MemoryStore,
    emulator: Mutex<Option<Endpoint>>,
}

impl MemoryStoreClient {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            emulator: Mutex::new(None),
        }
    }

    pub fn memory_store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Default for MemoryStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for MemoryStoreClient {
    fn connect_emulator(&self, endpoint: &Endpoint) -> StoreResult<()> {
        let mut emulator = lock(&self.emulator);
        if let Some(existing) = emulator.as_ref() {
            return Err(StoreError::Configuration(format!(
                "store already connected to emulator at {}",
                existing.url()
            )));
        }
        *emulator = Some(endpoint.clone());
        Ok(())
    }

    fn emulator_endpoint(&self) -> Option<Endpoint> {
        lock(&self.emulator).clone()
    }

    fn document_store(&self) -> Arc<dyn DocumentStore> {
        Arc::new(self.store.clone())
    }
}

/// Auth client that mints local anonymous sessions.
pub struct MemoryAuthClient {
    emulator: Mutex<Option<String>>,
}

impl MemoryAuthClient {
    pub fn new() -> Self {
        Self {
            emulator: Mutex::new(None),
        }
    }
}

impl Default for MemoryAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthClient for MemoryAuthClient {
    fn connect_emulator(&self, url: &str) -> StoreResult<()> {
        let mut emulator = lock(&self.emulator);
        if let Some(existing) = emulator.as_ref() {
            return Err(StoreError::Configuration(format!(
                "auth already connected to emulator at {}",
                existing
            )));
        }
        *emulator = Some(url.to_string());
        Ok(())
    }

    fn emulator_url(&self) -> Option<String> {
        lock(&self.emulator).clone()
    }

    async fn sign_in_anonymously(&self) -> StoreResult<AuthSession> {
        let uid = uuid::Uuid::new_v4().simple().to_string();
        Ok(AuthSession {
            id_token: format!("memory.{}", uid),
            uid,
        })
    }
}
