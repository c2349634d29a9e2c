//! Array persistence.
//!
//! Each stored array is a sequence of Arrow record batches written to a
//! single IPC file under the data directory. A sled tree holds the catalog:
//! array name to metadata (file name, row and chunk counts, creation time).
//! The sled database also backs metrics persistence.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::common::{now_ts_sec, wyhash64};

const CATALOG_TREE: &str = "arrays";

/// Catalog metadata for one stored array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayMeta {
    pub file: String,
    pub rows: u64,
    pub chunks: u32,
    pub created_ts: u64,
}

/// One catalog listing entry.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub name: String,
    pub meta: ArrayMeta,
}

/// Persistent array store.
pub struct ArrayStore {
    data_dir: PathBuf,
    db: sled::Db,
    catalog: sled::Tree,
    name_counter: AtomicU64,
}

fn arrow_to_io(e: arrow::error::ArrowError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

fn sled_to_io(e: sled::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

impl ArrayStore {
    /// Open the store rooted at `data_dir`, creating it if necessary.
    pub fn open(data_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(data_dir)?;
        let db = sled::open(data_dir.join("catalog")).map_err(sled_to_io)?;
        let catalog = db.open_tree(CATALOG_TREE).map_err(sled_to_io)?;

        let count = catalog.len();
        info!(
            "array store opened at {} ({} arrays)",
            data_dir.display(),
            count
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            db,
            catalog,
            name_counter: AtomicU64::new(count as u64),
        })
    }

    /// The sled database backing the catalog, shared with metrics persistence.
    pub fn sled_db(&self) -> &sled::Db {
        &self.db
    }

    /// Generate a fresh array name for an upload without an explicit name.
    pub fn generate_name(&self) -> String {
        let n = self.name_counter.fetch_add(1, Ordering::Relaxed);
        let tag = wyhash64(n ^ now_ts_sec());
        format!("up_{:04}_{:08x}", n, tag as u32)
    }

    /// Store an array, replacing any previous one with the same name.
    pub fn put(&self, name: &str, batches: &[RecordBatch]) -> io::Result<ArrayMeta> {
        if batches.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "array has no chunks",
            ));
        }

        let file_name = format!("{name}.arrow");
        let path = self.data_dir.join(&file_name);

        let file = File::create(&path)?;
        let mut writer = FileWriter::try_new(file, &batches[0].schema()).map_err(arrow_to_io)?;
        let mut rows: u64 = 0;
        for b in batches {
            writer.write(b).map_err(arrow_to_io)?;
            rows += b.num_rows() as u64;
        }
        writer.finish().map_err(arrow_to_io)?;

        let meta = ArrayMeta {
            file: file_name,
            rows,
            chunks: batches.len() as u32,
            created_ts: now_ts_sec(),
        };

        let encoded = serde_json::to_vec(&meta)?;
        self.catalog
            .insert(name.as_bytes(), encoded)
            .map_err(sled_to_io)?;
        self.catalog.flush().map_err(sled_to_io)?;

        debug!("stored array {name}: {} rows, {} chunks", meta.rows, meta.chunks);
        Ok(meta)
    }

    /// Read a stored array. Returns `None` when the name is not cataloged.
    pub fn get(&self, name: &str) -> io::Result<Option<Vec<RecordBatch>>> {
        let Some(meta) = self.meta(name)? else {
            return Ok(None);
        };

        let file = File::open(self.data_dir.join(&meta.file))?;
        let reader = FileReader::try_new(file, None).map_err(arrow_to_io)?;

        let mut batches = Vec::with_capacity(meta.chunks as usize);
        for batch in reader {
            batches.push(batch.map_err(arrow_to_io)?);
        }
        Ok(Some(batches))
    }

    /// Catalog metadata for one array.
    pub fn meta(&self, name: &str) -> io::Result<Option<ArrayMeta>> {
        match self.catalog.get(name.as_bytes()).map_err(sled_to_io)? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    /// Remove an array and its backing file. Returns whether it existed.
    pub fn remove(&self, name: &str) -> io::Result<bool> {
        let Some(v) = self.catalog.remove(name.as_bytes()).map_err(sled_to_io)? else {
            return Ok(false);
        };
        self.catalog.flush().map_err(sled_to_io)?;

        let meta: ArrayMeta = serde_json::from_slice(&v)?;
        // Missing file is not an error; the catalog entry is authoritative.
        let _ = fs::remove_file(self.data_dir.join(&meta.file));

        debug!("removed array {name}");
        Ok(true)
    }

    /// List all cataloged arrays in name order.
    pub fn list(&self) -> io::Result<Vec<CatalogEntry>> {
        let mut out = Vec::new();
        for item in self.catalog.iter() {
            let (k, v) = item.map_err(sled_to_io)?;
            let name = String::from_utf8_lossy(&k).into_owned();
            let meta: ArrayMeta = serde_json::from_slice(&v)?;
            out.push(CatalogEntry { name, meta });
        }
        Ok(out)
    }

    /// Number of cataloged arrays.
    pub fn count(&self) -> usize {
        self.catalog.len()
    }

    /// Total bytes of backing IPC files for all cataloged arrays.
    pub fn storage_bytes(&self) -> u64 {
        let mut total = 0;
        for item in self.catalog.iter().flatten() {
            if let Ok(meta) = serde_json::from_slice::<ArrayMeta>(&item.1) {
                if let Ok(st) = fs::metadata(self.data_dir.join(&meta.file)) {
                    total += st.len();
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "strumok-store-{tag}-{}-{}",
            std::process::id(),
            now_ts_sec()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_batch(values: &[f64]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)]));
        RecordBatch::try_new(
            schema,
            vec![Arc::new(Float64Array::from(values.to_vec()))],
        )
        .unwrap()
    }

    #[test]
    fn put_get_remove() {
        let dir = temp_dir("pgr");
        let store = ArrayStore::open(&dir).unwrap();

        let batch = sample_batch(&[1.0, 2.0, 3.0]);
        let meta = store.put("a", &[batch.clone()]).unwrap();
        assert_eq!(meta.rows, 3);
        assert_eq!(meta.chunks, 1);

        let got = store.get("a").unwrap().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0], batch);

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.get("a").unwrap().is_none());

        drop(store);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_and_counts() {
        let dir = temp_dir("list");
        let store = ArrayStore::open(&dir).unwrap();

        store.put("b", &[sample_batch(&[1.0])]).unwrap();
        store
            .put("a", &[sample_batch(&[1.0, 2.0]), sample_batch(&[3.0])])
            .unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[0].meta.rows, 3);
        assert_eq!(entries[0].meta.chunks, 2);
        assert_eq!(store.count(), 2);

        drop(store);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn generated_names_are_unique() {
        let dir = temp_dir("names");
        let store = ArrayStore::open(&dir).unwrap();

        let a = store.generate_name();
        let b = store.generate_name();
        assert_ne!(a, b);
        assert!(a.starts_with("up_"));

        drop(store);
        let _ = fs::remove_dir_all(&dir);
    }
}
