//! Client registry behaviour observed through a counting provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use folio::config::{Config, Endpoint, ProjectConfig};
use folio::core::{DocumentStore, StoreError, StoreResult};
use folio::provider::{
    AppHandle, AuthClient, AuthSession, BackendProvider, MemoryProvider, StoreClient,
};
use folio::registry::{ClientRegistry, Environment};

// ─── Counting provider ──────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    initialize_app: AtomicUsize,
    store_connects: AtomicUsize,
    auth_connects: AtomicUsize,
}

struct CountingProvider {
    inner: MemoryProvider,
    counters: Arc<Counters>,
}

impl CountingProvider {
    fn new() -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                inner: MemoryProvider::new(),
                counters: counters.clone(),
            },
            counters,
        )
    }
}

struct CountingStore {
    inner: Arc<dyn StoreClient>,
    counters: Arc<Counters>,
}

impl StoreClient for CountingStore {
    fn connect_emulator(&self, endpoint: &Endpoint) -> StoreResult<()> {
        self.counters.store_connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect_emulator(endpoint)
    }

    fn emulator_endpoint(&self) -> Option<Endpoint> {
        self.inner.emulator_endpoint()
    }

    fn document_store(&self) -> Arc<dyn DocumentStore> {
        self.inner.document_store()
    }
}

struct CountingAuth {
    inner: Arc<dyn AuthClient>,
    counters: Arc<Counters>,
}

#[async_trait]
impl AuthClient for CountingAuth {
    fn connect_emulator(&self, url: &str) -> StoreResult<()> {
        self.counters.auth_connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect_emulator(url)
    }

    fn emulator_url(&self) -> Option<String> {
        self.inner.emulator_url()
    }

    async fn sign_in_anonymously(&self) -> StoreResult<AuthSession> {
        self.inner.sign_in_anonymously().await
    }
}

impl BackendProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn get_app(&self, name: &str) -> Option<Arc<AppHandle>> {
        self.inner.get_app(name)
    }

    fn initialize_app(&self, name: &str, project: &ProjectConfig) -> StoreResult<Arc<AppHandle>> {
        self.counters.initialize_app.fetch_add(1, Ordering::SeqCst);
        self.inner.initialize_app(name, project)
    }

    fn store(&self, app: &AppHandle) -> StoreResult<Arc<dyn StoreClient>> {
        Ok(Arc::new(CountingStore {
            inner: self.inner.store(app)?,
            counters: self.counters.clone(),
        }))
    }

    fn auth(&self, app: &AppHandle) -> StoreResult<Arc<dyn AuthClient>> {
        Ok(Arc::new(CountingAuth {
            inner: self.inner.auth(app)?,
            counters: self.counters.clone(),
        }))
    }
}

fn counting_registry(config: Config) -> (ClientRegistry, Arc<Counters>) {
    let (provider, counters) = CountingProvider::new();
    (
        ClientRegistry::new(Arc::new(config), Arc::new(provider)),
        counters,
    )
}

// ─── Tests ──────────────────────────────────────────────────────────

#[test]
fn repeated_requests_share_one_handle() {
    let (registry, counters) = counting_registry(Config::in_memory("demo"));

    let first = registry.get_client("demo", Environment::Emulator).unwrap();
    let second = registry.get_client("demo", Environment::Emulator).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(counters.initialize_app.load(Ordering::SeqCst), 1);
    assert_eq!(counters.store_connects.load(Ordering::SeqCst), 1);
    assert_eq!(counters.auth_connects.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn emulator_and_live_are_isolated_live_first() {
    let (registry, counters) = counting_registry(Config::in_memory("demo"));

    let live = registry.get_client("demo", Environment::Live).unwrap();
    assert_eq!(counters.store_connects.load(Ordering::SeqCst), 0);

    let emulator = registry.get_client("demo", Environment::Emulator).unwrap();
    assert!(!Arc::ptr_eq(&live, &emulator));
    assert_eq!(live.app.name, "demo::live");
    assert_eq!(emulator.app.name, "demo::emulator");
    assert!(live.store.emulator_endpoint().is_none());
    assert!(emulator.store.emulator_endpoint().is_some());
    assert_eq!(counters.initialize_app.load(Ordering::SeqCst), 2);
    assert_eq!(counters.store_connects.load(Ordering::SeqCst), 1);
}

#[test]
fn emulator_and_live_are_isolated_emulator_first() {
    let (registry, counters) = counting_registry(Config::in_memory("demo"));

    let emulator = registry.get_client("demo", Environment::Emulator).unwrap();
    let live = registry.get_client("demo", Environment::Live).unwrap();

    assert!(live.store.emulator_endpoint().is_none());
    assert!(live.auth.emulator_url().is_none());
    assert_eq!(
        emulator.store.emulator_endpoint(),
        Some(Endpoint::new("localhost", 8080))
    );
    assert_eq!(counters.store_connects.load(Ordering::SeqCst), 1);
    assert_eq!(counters.auth_connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn live_and_emulator_data_do_not_mix() {
    let registry = ClientRegistry::from_config(Config::in_memory("demo")).unwrap();
    let live = registry.adapter(None, Environment::Live).unwrap();
    let emulator = registry.adapter(None, Environment::Emulator).unwrap();

    emulator
        .set_doc("test/a", &serde_json::json!({"n": 1}), Default::default())
        .await
        .unwrap();

    assert!(live
        .get_doc::<serde_json::Value>("test/a")
        .await
        .unwrap()
        .is_none());
    assert_eq!(live.label(), "demo::live");
    assert_eq!(emulator.label(), "demo::emulator");
}

#[test]
fn unknown_project_fails_without_initialising() {
    let (registry, counters) = counting_registry(Config::in_memory("demo"));

    let err = registry
        .get_client("nonexistent", Environment::Live)
        .unwrap_err();
    assert!(matches!(err, StoreError::Configuration(_)));
    assert!(err.to_string().contains("nonexistent"));
    assert_eq!(counters.initialize_app.load(Ordering::SeqCst), 0);
    assert!(registry.is_empty());
}

#[test]
fn disabled_emulators_leave_handle_unconnected() {
    let mut config = Config::in_memory("demo");
    config.emulators.enabled = false;
    let (registry, counters) = counting_registry(config);

    let handle = registry.get_client("demo", Environment::Emulator).unwrap();
    assert!(handle.store.emulator_endpoint().is_none());
    assert_eq!(counters.store_connects.load(Ordering::SeqCst), 0);
    assert_eq!(counters.auth_connects.load(Ordering::SeqCst), 0);
}

#[test]
fn configured_endpoints_are_used() {
    let mut config = Config::in_memory("demo");
    config.emulators.firestore = Endpoint::new("127.0.0.1", 18080);
    config.emulators.auth = Endpoint::new("127.0.0.1", 19099);
    let registry = ClientRegistry::from_config(config).unwrap();

    let handle = registry.get_client("demo", Environment::Emulator).unwrap();
    assert_eq!(
        handle.store.emulator_endpoint().map(|e| e.url()),
        Some("http://127.0.0.1:18080".to_string())
    );
    assert_eq!(
        handle.auth.emulator_url().as_deref(),
        Some("http://127.0.0.1:19099")
    );
}

#[tokio::test]
async fn concurrent_requests_initialise_once() {
    let (registry, counters) = counting_registry(Config::in_memory("demo"));
    let registry = Arc::new(registry);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry.get_client("demo", Environment::Emulator).unwrap()
        }));
    }
    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(counters.initialize_app.load(Ordering::SeqCst), 1);
}

#[test]
fn existing_app_is_reused_and_not_reconnected() {
    let config = Config::in_memory("demo");
    let (provider, counters) = CountingProvider::new();

    let app = provider
        .initialize_app("demo::emulator", &config.projects["demo"])
        .unwrap();
    provider
        .store(&app)
        .unwrap()
        .connect_emulator(&config.emulators.firestore)
        .unwrap();
    assert_eq!(counters.initialize_app.load(Ordering::SeqCst), 1);
    assert_eq!(counters.store_connects.load(Ordering::SeqCst), 1);

    let registry = ClientRegistry::new(Arc::new(config), Arc::new(provider));
    let handle = registry.get_client("demo", Environment::Emulator).unwrap();

    assert!(Arc::ptr_eq(&handle.app, &app));
    assert!(handle.store.emulator_endpoint().is_some());
    assert_eq!(counters.initialize_app.load(Ordering::SeqCst), 1);
    assert_eq!(counters.store_connects.load(Ordering::SeqCst), 1);
    // Auth had not been connected yet
    assert_eq!(counters.auth_connects.load(Ordering::SeqCst), 1);
}
