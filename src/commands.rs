//! Implementations behind the `folio` subcommands.
//!
//! Each command prints machine-readable output (JSON or one item per line)
//! to stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use folio_core::{batch_delete, sort_docs, CollectionPath, SetOptions, WithId};

use crate::adapter::DocumentAdapter;
use crate::registry::ClientRegistry;

/// Parse a command-line JSON argument that must be an object.
pub fn parse_json_object(raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON argument: {}", raw))?;
    if !value.is_object() {
        bail!("Expected a JSON object, got: {}", raw);
    }
    Ok(value)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_targets(registry: &ClientRegistry) {
    for target in registry.targets() {
        println!("{}", target);
    }
}

pub async fn run_collections(adapter: &DocumentAdapter) -> Result<()> {
    for id in adapter.list_collection_ids().await? {
        println!("{}", id);
    }
    Ok(())
}

pub async fn run_get(adapter: &DocumentAdapter, path: &str) -> Result<()> {
    let doc = adapter.get_doc::<Value>(path).await?;
    print_json(&doc)
}

pub async fn run_list(adapter: &DocumentAdapter, collection: &str, sort: &[String]) -> Result<()> {
    let docs = adapter.list_collection::<Value>(collection).await?;
    let docs = if sort.is_empty() {
        docs
    } else {
        let keys: Vec<&str> = sort.iter().map(String::as_str).collect();
        sort_docs(docs, &keys)
    };
    print_json(&docs)
}

pub async fn run_set(adapter: &DocumentAdapter, path: &str, json: &str, merge: bool) -> Result<()> {
    let data = parse_json_object(json)?;
    let options = SetOptions { merge };
    adapter.set_doc(path, &data, options).await?;
    eprintln!("Set {} on {}", path, adapter.label());
    Ok(())
}

pub async fn run_add(adapter: &DocumentAdapter, collection: &str, json: &str) -> Result<()> {
    let data = parse_json_object(json)?;
    let id = adapter.add_doc(collection, &data).await?;
    println!("{}", id);
    Ok(())
}

pub async fn run_update(adapter: &DocumentAdapter, path: &str, json: &str) -> Result<()> {
    let patch = parse_json_object(json)?;
    adapter
        .update_doc(path, &patch)
        .await
        .with_context(|| format!("Failed to update {}", path))?;
    eprintln!("Updated {} on {}", path, adapter.label());
    Ok(())
}

pub async fn run_delete(adapter: &DocumentAdapter, path: &str) -> Result<()> {
    adapter.delete_doc(path).await?;
    eprintln!("Deleted {} on {}", path, adapter.label());
    Ok(())
}

/// Print every emission of a document (or, with `collection`, a collection)
/// listener as one JSON line, until `limit` emissions or Ctrl-C.
pub async fn run_watch(
    adapter: &DocumentAdapter,
    path: &str,
    collection: bool,
    limit: Option<usize>,
) -> Result<()> {
    let mut emissions = if collection {
        adapter
            .listen_collection::<Value>(path, &[])
            .map(|docs| Ok(serde_json::to_value(docs)?))
    } else {
        adapter
            .listen_doc::<Value>(path)
            .map(|doc| Ok(serde_json::to_value(doc)?))
    };

    let mut seen = 0;
    loop {
        if limit.is_some_and(|limit| seen >= limit) {
            break;
        }
        tokio::select! {
            item = emissions.recv() => match item {
                Some(Ok(value)) => {
                    println!("{}", serde_json::to_string(&value)?);
                    seen += 1;
                }
                Some(Err(err)) => return Err(err).context("Listener failed"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Delete every document in `collection` using chunked batches.
pub async fn run_purge(
    adapter: &DocumentAdapter,
    collection: &str,
    chunk_size: Option<usize>,
) -> Result<()> {
    let parsed = CollectionPath::parse(collection)?;
    let docs: Vec<WithId<Value>> = adapter.list_collection(collection).await?;
    let total = docs.len();
    let paths = docs
        .iter()
        .map(|doc| parsed.doc(&doc.id))
        .collect::<Result<Vec<_>, _>>()?;

    let chunks = adapter
        .commit_in_chunks(batch_delete(paths), chunk_size)
        .await
        .with_context(|| format!("Purge of {} stopped part way", collection))?;
    eprintln!(
        "Deleted {} documents from {} in {} batch(es)",
        total, collection, chunks
    );
    Ok(())
}
