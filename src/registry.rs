//! Client registry: one cached handle per (project, environment).
//!
//! The registry is owned by the composition root (the CLI or the HTTP
//! service) and shared behind an `Arc`. The first request for a key
//! initialises an app through the [`BackendProvider`], obtains its store and
//! auth sub-clients, and for the emulator environment points both at the
//! configured emulator endpoints. Later requests return the same handle.
//!
//! ```text
//! get_client("demo", Emulator)
//!   ├─ cache hit  → Arc<ClientHandle>
//!   └─ cache miss → provider.get_app / initialize_app("demo::emulator")
//!                   → store + auth → connect emulators → cache
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use folio_core::{StoreError, StoreResult};

use crate::adapter::DocumentAdapter;
use crate::config::{BackendKind, Config};
use crate::provider::{AppHandle, AuthClient, BackendProvider, MemoryProvider, StoreClient};
use crate::rest::{RestOptions, RestProvider};

/// Which backend deployment a handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Emulator,
    Live,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Emulator => "emulator",
            Environment::Live => "live",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emulator" => Ok(Environment::Emulator),
            "live" => Ok(Environment::Live),
            other => Err(StoreError::Configuration(format!(
                "unknown environment '{}', expected 'emulator' or 'live'",
                other
            ))),
        }
    }
}

/// Cache key, rendered as `project::environment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub project: String,
    pub environment: Environment,
}

impl ClientKey {
    pub fn new(project: impl Into<String>, environment: Environment) -> Self {
        Self {
            project: project.into(),
            environment,
        }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.project, self.environment)
    }
}

/// The app plus its store and auth sub-clients for one key.
pub struct ClientHandle {
    pub key: ClientKey,
    pub app: Arc<AppHandle>,
    pub store: Arc<dyn StoreClient>,
    pub auth: Arc<dyn AuthClient>,
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("key", &self.key.to_string())
            .field("app", &self.app.name)
            .field("store_emulator", &self.store.emulator_endpoint())
            .field("auth_emulator", &self.auth.emulator_url())
            .finish()
    }
}

pub struct ClientRegistry {
    config: Arc<Config>,
    provider: Arc<dyn BackendProvider>,
    clients: Mutex<HashMap<ClientKey, Arc<ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new(config: Arc<Config>, provider: Arc<dyn BackendProvider>) -> Self {
        Self {
            config,
            provider,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Build a registry with the provider named by `[store].backend`.
    pub fn from_config(config: Config) -> StoreResult<Self> {
        let provider: Arc<dyn BackendProvider> = match config.store.backend {
            BackendKind::Memory => Arc::new(MemoryProvider::new()),
            BackendKind::Rest => Arc::new(RestProvider::new(RestOptions::from(&config.store))?),
        };
        Ok(Self::new(Arc::new(config), provider))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Return the cached handle for `(project_key, environment)`, creating it
    /// on first use.
    pub fn get_client(
        &self,
        project_key: &str,
        environment: Environment,
    ) -> StoreResult<Arc<ClientHandle>> {
        let key = ClientKey::new(project_key, environment);
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = clients.get(&key) {
            return Ok(existing.clone());
        }

        let project = self.config.projects.get(project_key).ok_or_else(|| {
            StoreError::Configuration(format!("no configuration for project '{}'", project_key))
        })?;

        let app_name = key.to_string();
        let app = match self.provider.get_app(&app_name) {
            Some(app) => app,
            None => self.provider.initialize_app(&app_name, project)?,
        };
        let store = self.provider.store(&app)?;
        let auth = self.provider.auth(&app)?;

        if environment == Environment::Emulator {
            self.connect_emulators(&key, store.as_ref(), auth.as_ref())?;
        }

        tracing::info!(client = %key, provider = self.provider.name(), "created client handle");
        let handle = Arc::new(ClientHandle {
            key: key.clone(),
            app,
            store,
            auth,
        });
        clients.insert(key, handle.clone());
        Ok(handle)
    }

    fn connect_emulators(
        &self,
        key: &ClientKey,
        store: &dyn StoreClient,
        auth: &dyn AuthClient,
    ) -> StoreResult<()> {
        let emulators = &self.config.emulators;
        if !emulators.enabled {
            tracing::warn!(
                client = %key,
                "emulators are disabled in config; handle is not connected to an emulator"
            );
            return Ok(());
        }

        if store.emulator_endpoint().is_none() {
            store.connect_emulator(&emulators.firestore)?;
            tracing::info!(
                client = %key,
                endpoint = %emulators.firestore.url(),
                "store connected to emulator"
            );
        }
        if auth.emulator_url().is_none() {
            let url = emulators.auth.url();
            auth.connect_emulator(&url)?;
            tracing::info!(client = %key, endpoint = %url, "auth connected to emulator");
        }
        Ok(())
    }

    /// The named project, or the default one when `project` is `None`.
    pub fn resolve_project(&self, project: Option<&str>) -> StoreResult<String> {
        match project {
            Some(key) if self.config.projects.contains_key(key) => Ok(key.to_string()),
            Some(key) => Err(StoreError::Configuration(format!(
                "no configuration for project '{}'",
                key
            ))),
            None => self
                .config
                .default_project_key()
                .map(str::to_string)
                .ok_or_else(|| StoreError::Configuration("no projects configured".to_string())),
        }
    }

    /// A document adapter bound to the handle for `(project, environment)`.
    pub fn adapter(
        &self,
        project: Option<&str>,
        environment: Environment,
    ) -> StoreResult<DocumentAdapter> {
        let project = self.resolve_project(project)?;
        let handle = self.get_client(&project, environment)?;
        Ok(
            DocumentAdapter::new(handle.store.document_store(), handle.key.to_string())
                .with_chunk_size(self.config.store.chunk_size),
        )
    }

    pub fn project_keys(&self) -> Vec<String> {
        self.config.projects.keys().cloned().collect()
    }

    /// `emulator` followed by every project key.
    pub fn targets(&self) -> Vec<String> {
        std::iter::once(Environment::Emulator.to_string())
            .chain(self.project_keys())
            .collect()
    }

    /// Map a target name onto a project and environment. `emulator` means
    /// the default project on the emulator; a project key means that project
    /// live.
    pub fn resolve_target(&self, target: &str) -> StoreResult<Option<(String, Environment)>> {
        if target == Environment::Emulator.as_str() {
            return Ok(Some((self.resolve_project(None)?, Environment::Emulator)));
        }
        if self.config.projects.contains_key(target) {
            return Ok(Some((target.to_string(), Environment::Live)));
        }
        Ok(None)
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
