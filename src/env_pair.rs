//! Side-by-side access to the live and emulator copies of a collection.
//!
//! Each side fails independently: an unreachable emulator does not hide the
//! live data and vice versa.

use serde::de::DeserializeOwned;
use serde::Serialize;

use folio_core::{sort_docs, QueryConstraint, StoreResult, WithId};

use crate::registry::{ClientRegistry, Environment};
use crate::view::CollectionView;

/// One value per environment. `emulator` is `None` when it was not requested.
#[derive(Debug)]
pub struct EnvironmentPair<T> {
    pub live: T,
    pub emulator: Option<T>,
}

impl<T> EnvironmentPair<T> {
    pub fn get(&self, environment: Environment) -> Option<&T> {
        match environment {
            Environment::Live => Some(&self.live),
            Environment::Emulator => self.emulator.as_ref(),
        }
    }

    /// Present entries, live first.
    pub fn entries(&self) -> Vec<(Environment, &T)> {
        let mut out = vec![(Environment::Live, &self.live)];
        if let Some(emulator) = &self.emulator {
            out.push((Environment::Emulator, emulator));
        }
        out
    }
}

async fn list_sorted<T>(
    registry: &ClientRegistry,
    project: Option<&str>,
    environment: Environment,
    collection: &str,
    sort_keys: &[&str],
) -> StoreResult<Vec<WithId<T>>>
where
    T: DeserializeOwned + Serialize,
{
    let docs = registry
        .adapter(project, environment)?
        .list_collection::<T>(collection)
        .await?;
    if sort_keys.is_empty() {
        Ok(docs)
    } else {
        Ok(sort_docs(docs, sort_keys))
    }
}

/// List `collection` live, and on the emulator when `include_emulator` is
/// set, sorting each side newest-first by `sort_keys` (no sort when empty).
pub async fn list_collection_pair<T>(
    registry: &ClientRegistry,
    project: Option<&str>,
    collection: &str,
    sort_keys: &[&str],
    include_emulator: bool,
) -> EnvironmentPair<StoreResult<Vec<WithId<T>>>>
where
    T: DeserializeOwned + Serialize,
{
    let live = list_sorted(registry, project, Environment::Live, collection, sort_keys);
    if include_emulator {
        let emulator = list_sorted(registry, project, Environment::Emulator, collection, sort_keys);
        let (live, emulator) = futures::join!(live, emulator);
        EnvironmentPair {
            live,
            emulator: Some(emulator),
        }
    } else {
        EnvironmentPair {
            live: live.await,
            emulator: None,
        }
    }
}

/// Open a live view of `collection` on each requested environment.
pub fn watch_collection_pair<T>(
    registry: &ClientRegistry,
    project: Option<&str>,
    collection: &str,
    constraints: &[QueryConstraint],
    include_emulator: bool,
) -> EnvironmentPair<StoreResult<CollectionView<T>>>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let open = |environment| {
        registry
            .adapter(project, environment)
            .and_then(|adapter| CollectionView::new(adapter, collection, constraints, Vec::new()))
    };
    EnvironmentPair {
        live: open(Environment::Live),
        emulator: include_emulator.then(|| open(Environment::Emulator)),
    }
}
