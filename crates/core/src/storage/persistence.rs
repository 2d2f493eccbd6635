//! Disk persistence for indexes.
//!
//! Each index lives in its own directory under the data directory:
//! `index.snap` holds the schema, documents and vector stores, and every
//! vector field gets a `<field>.hnsw` graph artifact. Both files use the same
//! sealed layout `[bincode payload][magic][u32 CRC32 BE]` and are written
//! atomically (temp file + rename).
//!
//! Loading never fails the process because of one bad index: a corrupt
//! snapshot is skipped with a warning, and a bad graph artifact only costs a
//! rebuild.

use crate::document::Document;
use crate::error::{Result, SearchError};
use crate::schema::IndexSchema;
use crate::storage::index::{Catalog, SearchIndex};
use crate::vector::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const SNAPSHOT_MAGIC: &[u8; 4] = b"SSN1";
const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_FILE: &str = "index.snap";
const ARTIFACT_EXTENSION: &str = "hnsw";

/// Append `[magic][CRC32 BE]` to `payload`.
pub(crate) fn seal(mut payload: Vec<u8>, magic: &[u8; 4]) -> Vec<u8> {
    let crc = crc32fast::hash(&payload);
    payload.reserve(8);
    payload.extend_from_slice(magic);
    payload.extend_from_slice(&crc.to_be_bytes());
    payload
}

/// Verify the footer written by [`seal`] and return the payload.
pub(crate) fn unseal<'a>(raw: &'a [u8], magic: &[u8; 4]) -> Result<&'a [u8]> {
    if raw.len() < 8 {
        return Err(SearchError::CorruptArtifact(format!(
            "file too short ({} bytes)",
            raw.len()
        )));
    }
    let (payload, footer) = raw.split_at(raw.len() - 8);
    if &footer[..4] != magic {
        return Err(SearchError::CorruptArtifact("bad magic".to_string()));
    }
    let stored = u32::from_be_bytes([footer[4], footer[5], footer[6], footer[7]]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(SearchError::CorruptArtifact(format!(
            "CRC32 mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }
    Ok(payload)
}

/// Write `bytes` to `path` through a temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// The schema travels as JSON: its serde shape skips absent options, which
/// bincode cannot read back.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    schema_json: String,
    documents: Vec<Document>,
    stores: Vec<VectorStore>,
}

pub fn index_dir(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(name)
}

fn artifact_path(dir: &Path, field: &str) -> PathBuf {
    dir.join(format!("{field}.{ARTIFACT_EXTENSION}"))
}

/// Persist `index` and its graph artifacts under `data_dir/<name>/`.
pub fn save_index(index: &SearchIndex, data_dir: &Path) -> Result<()> {
    let started = Instant::now();
    let dir = index_dir(data_dir, &index.schema().name);
    fs::create_dir_all(&dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700));
    }

    let parts = index.snapshot_parts()?;
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        schema_json: serde_json::to_string(index.schema())
            .map_err(|e| SearchError::CorruptArtifact(e.to_string()))?,
        documents: parts.documents,
        stores: parts.stores,
    };
    let payload =
        bincode::serialize(&snapshot).map_err(|e| SearchError::CorruptArtifact(e.to_string()))?;
    let bytes = payload.len();
    write_atomic(&dir.join(SNAPSHOT_FILE), &seal(payload, SNAPSHOT_MAGIC))?;

    for field in index.vector_fields() {
        let path = artifact_path(&dir, field.name());
        match parts.graphs.get(field.name()) {
            Some(graph) => write_atomic(&path, graph)?,
            // An older graph would describe other vectors
            None => match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
    }

    tracing::info!(
        index = %index.schema().name,
        documents = snapshot.documents.len(),
        bytes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "saved index snapshot"
    );
    Ok(())
}

/// Restore one index from `dir`. Graph artifacts that cannot be used are
/// replaced by a rebuild from the restored vector stores.
pub fn load_index(dir: &Path) -> Result<SearchIndex> {
    let started = Instant::now();
    let raw = fs::read(dir.join(SNAPSHOT_FILE))?;
    let payload = unseal(&raw, SNAPSHOT_MAGIC)?;
    let snapshot: Snapshot =
        bincode::deserialize(payload).map_err(|e| SearchError::CorruptArtifact(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SearchError::CorruptArtifact(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    let schema: IndexSchema = serde_json::from_str(&snapshot.schema_json)
        .map_err(|e| SearchError::CorruptArtifact(e.to_string()))?;

    let index = SearchIndex::restore(schema, snapshot.documents, snapshot.stores)?;
    let mut restored = 0;
    for field in index.vector_fields() {
        if field.load_artifact(&artifact_path(dir, field.name())) {
            restored += 1;
        }
    }

    tracing::info!(
        index = %index.schema().name,
        documents = index.document_count(),
        graphs_restored = restored,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded index snapshot"
    );
    Ok(index)
}

/// Save every index in `catalog`. Returns the number saved.
pub fn save_all(catalog: &Catalog, data_dir: &Path) -> Result<usize> {
    let mut saved = 0;
    for index in catalog.list() {
        if catalog.save_registered(&index, data_dir)? {
            saved += 1;
        }
    }
    Ok(saved)
}

/// Load every index directory under `data_dir`, skipping unreadable ones.
pub fn load_all(data_dir: &Path) -> Result<Catalog> {
    let catalog = Catalog::new();
    if !data_dir.exists() {
        return Ok(catalog);
    }
    for entry in fs::read_dir(data_dir)? {
        let path = entry?.path();
        if !path.join(SNAPSHOT_FILE).is_file() {
            continue;
        }
        match load_index(&path) {
            Ok(index) => {
                if let Err(e) = catalog.insert(index) {
                    tracing::warn!(path = %path.display(), error = %e, "skipping duplicate index");
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load index snapshot");
            }
        }
    }
    Ok(catalog)
}

/// Remove the on-disk files of a deleted index.
pub fn remove_index(data_dir: &Path, name: &str) -> Result<()> {
    let dir = index_dir(data_dir, name);
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::VectorSearchOptions;
    use serde_json::{json, Map, Value};

    fn schema() -> IndexSchema {
        serde_json::from_value(json!({
            "name": "hotels",
            "fields": [
                {"name": "id", "type": "Edm.String", "key": true},
                {"name": "title", "type": "Edm.String"},
                {"name": "embedding", "type": "Collection(Edm.Single)",
                 "dimensions": 4, "vectorSearchProfile": "default"}
            ],
            "vectorSearch": {
                "algorithms": [{"name": "hnsw-1", "kind": "hnsw",
                                "hnswParameters": {"m": 8, "efConstruction": 64}}],
                "profiles": [{"name": "default", "algorithm": "hnsw-1"}]
            }
        }))
        .unwrap()
    }

    fn docs(n: usize) -> Vec<Map<String, Value>> {
        docs_at(n, 0.0)
    }

    /// Same keys as [`docs`], with embeddings rotated by `phase`.
    fn docs_at(n: usize, phase: f32) -> Vec<Map<String, Value>> {
        (0..n)
            .map(|i| {
                let f = i as f32;
                json!({
                    "id": format!("h{i}"),
                    "title": format!("hotel number {i}"),
                    "embedding": [(f + phase).sin(), (f + phase).cos(), (f * 0.3).sin(), 1.0]
                })
                .as_object()
                .unwrap()
                .clone()
            })
            .collect()
    }

    #[test]
    fn test_seal_unseal() {
        let sealed = seal(b"payload".to_vec(), b"TST1");
        assert_eq!(unseal(&sealed, b"TST1").unwrap(), b"payload");
        assert!(matches!(
            unseal(&sealed, b"XXXX"),
            Err(SearchError::CorruptArtifact(_))
        ));
        let mut flipped = sealed.clone();
        flipped[0] ^= 1;
        assert!(unseal(&flipped, b"TST1").is_err());
        assert!(unseal(b"abc", b"TST1").is_err());
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.bin");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join("nested").join("file.bin.tmp").exists());
    }

    #[test]
    fn test_save_and_load_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = SearchIndex::new(schema()).unwrap();
        index.index_documents(&docs(100));
        save_index(&index, dir.path()).unwrap();
        assert!(dir.path().join("hotels").join("embedding.hnsw").exists());

        let restored = load_index(&dir.path().join("hotels")).unwrap();
        assert_eq!(restored.document_count(), 100);
        let field = restored.vector_field("embedding").unwrap();
        assert!(!field.needs_rebuild());

        let query = [0.0, 1.0, 0.0, 1.0];
        let opts = VectorSearchOptions::default();
        let before = index.vector_field("embedding").unwrap().search(&query, 5, &opts).unwrap();
        let after = field.search(&query, 5, &opts).unwrap();
        assert_eq!(before, after);
        assert_eq!(restored.get_document("h7", None).unwrap().unwrap()["title"], json!("hotel number 7"));
    }

    #[test]
    fn test_corrupt_snapshot_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new();
        let index = catalog.create(schema()).unwrap();
        index.index_documents(&docs(10));
        let mut other = schema();
        other.name = "motels".into();
        catalog.create(other).unwrap();
        assert_eq!(save_all(&catalog, dir.path()).unwrap(), 2);

        let snap = dir.path().join("motels").join(SNAPSHOT_FILE);
        let mut raw = fs::read(&snap).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0xAA;
        fs::write(&snap, raw).unwrap();

        let loaded = load_all(dir.path()).unwrap();
        let names: Vec<String> = loaded.list().iter().map(|i| i.schema().name.clone()).collect();
        assert_eq!(names, vec!["hotels".to_string()]);
        assert_eq!(loaded.get("hotels").unwrap().document_count(), 10);
    }

    #[test]
    fn test_missing_artifact_rebuilds_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let index = SearchIndex::new(schema()).unwrap();
        index.index_documents(&docs(80));
        save_index(&index, dir.path()).unwrap();
        fs::remove_file(dir.path().join("hotels").join("embedding.hnsw")).unwrap();

        let restored = load_index(&dir.path().join("hotels")).unwrap();
        let field = restored.vector_field("embedding").unwrap();
        assert!(!field.needs_rebuild());
        assert_eq!(field.stats().graph_labels, 80);
    }

    #[test]
    fn test_load_all_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = load_all(&dir.path().join("absent")).unwrap();
        assert!(catalog.list().is_empty());
    }

    #[test]
    fn test_remove_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = SearchIndex::new(schema()).unwrap();
        save_index(&index, dir.path()).unwrap();
        remove_index(dir.path(), "hotels").unwrap();
        assert!(!dir.path().join("hotels").exists());
        remove_index(dir.path(), "hotels").unwrap();
    }

    #[test]
    fn test_save_during_writes_keeps_graph_with_its_vectors() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let index = SearchIndex::new(schema()).unwrap();
        index.index_documents(&docs(100));
        let stop = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut phase = 0.0f32;
                while !stop.load(Ordering::SeqCst) {
                    phase += 0.37;
                    index.index_documents(&docs_at(100, phase));
                }
            });

            for _ in 0..5 {
                save_index(&index, dir.path()).unwrap();
                let restored = load_index(&dir.path().join("hotels")).unwrap();
                let field = restored.vector_field("embedding").unwrap();
                // The saved graph matches the saved store, so it is reused
                assert!(field.load_artifact(&dir.path().join("hotels").join("embedding.hnsw")));
                let opts = VectorSearchOptions::default();
                for key in ["h0", "h13", "h58", "h99"] {
                    // Each stored vector must be a node of the restored graph
                    let query = field.get_vector(key).unwrap();
                    let (hits, _) = field.search_with_backend(&query, 1, &opts).unwrap();
                    assert!(hits[0].similarity > 0.9999, "{key}: {}", hits[0].similarity);
                }
            }
            stop.store(true, Ordering::SeqCst);
        });
    }

    #[test]
    fn test_save_removes_outdated_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let index = SearchIndex::new(schema()).unwrap();
        index.index_documents(&docs(80));
        save_index(&index, dir.path()).unwrap();
        let artifact = dir.path().join("hotels").join("embedding.hnsw");
        assert!(artifact.exists());

        // Restored without its graph: stale until rebuilt
        let snapshot = index.snapshot_parts().unwrap();
        let stale = SearchIndex::restore(schema(), snapshot.documents, snapshot.stores).unwrap();
        save_index(&stale, dir.path()).unwrap();
        assert!(!artifact.exists());
        let restored = load_index(&dir.path().join("hotels")).unwrap();
        assert_eq!(restored.vector_field("embedding").unwrap().stats().graph_labels, 80);
    }
}
