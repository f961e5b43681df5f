//! Per-taxon GO caches and the opaque blob stores that persist them.
//!
//! Building a [`GoCache`] means fetching every gene's closed term set and
//! deriving term probabilities and weights over the whole corpus. It is
//! done once per run; with a [`CacheStore`] the artifacts are reused across
//! runs.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{CoexError, Result};
use crate::ontology::{GoTermSet, TermProbabilities, TermWeights};
use crate::sources::GoAnnotationSource;
use crate::types::{GeneId, Taxon};

pub const GENE_GO_MAP: &str = "gene-go-map";
pub const TERM_PROBABILITIES: &str = "term-probabilities";
pub const TERM_WEIGHTS: &str = "term-weights";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub taxon: Taxon,
    pub artifact: String,
}

impl CacheKey {
    pub fn new(taxon: &Taxon, artifact: &str) -> Self {
        Self {
            taxon: taxon.clone(),
            artifact: artifact.to_string(),
        }
    }

    fn file_name(&self) -> String {
        let clean = |s: &str| {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                .collect::<String>()
        };
        format!("{}.{}.json.gz", clean(&self.taxon.0), clean(&self.artifact))
    }
}

pub trait CacheStore: Send + Sync {
    fn put(&self, key: &CacheKey, blob: &[u8]) -> Result<()>;
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    blobs: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| CoexError::Cache("memory cache lock poisoned".to_string()))
    }
}

impl CacheStore for MemoryCacheStore {
    fn put(&self, key: &CacheKey, blob: &[u8]) -> Result<()> {
        self.lock()?.insert(key.clone(), blob.to_vec());
        Ok(())
    }

    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }
}

/// Gzip-compressed blobs, one file per key, in a single directory.
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    dir: PathBuf,
}

impl DiskCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl CacheStore for DiskCacheStore {
    fn put(&self, key: &CacheKey, blob: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let file = File::create(&path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(blob)?;
        encoder.finish()?;
        info!("Saved {} to {}", key.artifact, path.display());
        Ok(())
    }

    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut decoder = GzDecoder::new(File::open(&path)?);
        let mut blob = Vec::new();
        decoder.read_to_end(&mut blob)?;
        Ok(Some(blob))
    }
}

fn fetch<T: DeserializeOwned>(store: &dyn CacheStore, key: &CacheKey) -> Result<Option<T>> {
    match store.get(key)? {
        Some(blob) => serde_json::from_slice(&blob)
            .map(Some)
            .map_err(|e| CoexError::Cache(format!("decode {}: {e}", key.artifact))),
        None => Ok(None),
    }
}

fn save<T: Serialize>(store: &dyn CacheStore, key: &CacheKey, value: &T) -> Result<()> {
    let blob = serde_json::to_vec(value)
        .map_err(|e| CoexError::Cache(format!("encode {}: {e}", key.artifact)))?;
    store.put(key, &blob)
}

/// Everything GO scoring needs for one taxon, built once and passed by reference.
#[derive(Debug, Clone)]
pub struct GoCache {
    taxon: Taxon,
    gene_terms: HashMap<GeneId, GoTermSet>,
    probabilities: TermProbabilities,
    weights: TermWeights,
}

impl GoCache {
    pub fn build<F>(taxon: Taxon, gene_terms: HashMap<GeneId, GoTermSet>, aspect_of: F) -> Self
    where
        F: Fn(&str) -> Option<crate::ontology::GoAspect>,
    {
        let probabilities = TermProbabilities::compute(&gene_terms, aspect_of);
        let weights = TermWeights::compute(&gene_terms);
        Self {
            taxon,
            gene_terms,
            probabilities,
            weights,
        }
    }

    /// Loads each artifact from `store` when present, otherwise computes it
    /// from `source` and writes it back.
    pub fn load<S>(taxon: &Taxon, source: &S, store: Option<&dyn CacheStore>) -> Result<Self>
    where
        S: GoAnnotationSource + ?Sized,
    {
        let gene_key = CacheKey::new(taxon, GENE_GO_MAP);
        let gene_terms: HashMap<GeneId, GoTermSet> = match store.map(|s| fetch(s, &gene_key)) {
            Some(Ok(Some(cached))) => {
                info!("Loading GO mapping for {taxon} from cache");
                cached
            }
            Some(Err(e)) => return Err(e),
            _ => {
                let fresh = source.gene_terms(taxon)?;
                if let Some(s) = store {
                    save(s, &gene_key, &fresh)?;
                }
                fresh
            }
        };
        info!("{} genes with GO annotations for {taxon}", gene_terms.len());

        let prob_key = CacheKey::new(taxon, TERM_PROBABILITIES);
        let probabilities = match store.map(|s| fetch(s, &prob_key)) {
            Some(Ok(Some(cached))) => cached,
            Some(Err(e)) => return Err(e),
            _ => {
                let fresh = TermProbabilities::compute(&gene_terms, |t| source.term_aspect(t));
                if let Some(s) = store {
                    save(s, &prob_key, &fresh)?;
                }
                fresh
            }
        };

        let weight_key = CacheKey::new(taxon, TERM_WEIGHTS);
        let weights = match store.map(|s| fetch(s, &weight_key)) {
            Some(Ok(Some(cached))) => cached,
            Some(Err(e)) => return Err(e),
            _ => {
                let fresh = TermWeights::compute(&gene_terms);
                if let Some(s) = store {
                    save(s, &weight_key, &fresh)?;
                }
                fresh
            }
        };

        Ok(Self {
            taxon: taxon.clone(),
            gene_terms,
            probabilities,
            weights,
        })
    }

    pub fn taxon(&self) -> &Taxon {
        &self.taxon
    }

    pub fn terms(&self, gene: GeneId) -> Option<&GoTermSet> {
        self.gene_terms.get(&gene)
    }

    /// Corpus probability of `term`, if it has a known root.
    pub fn get(&self, term: &str) -> Option<f64> {
        self.probabilities.get(term)
    }

    pub fn weight(&self, term: &str) -> f64 {
        self.weights.get(term)
    }

    pub fn universe_size(&self) -> usize {
        self.weights.universe_size()
    }

    pub fn gene_count(&self) -> usize {
        self.gene_terms.len()
    }

    pub fn genes(&self) -> impl Iterator<Item = GeneId> + '_ {
        self.gene_terms.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_memory_store_reports_errors() {
        let store = MemoryCacheStore::new();
        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = store.blobs.lock().expect("fresh lock");
                panic!("poison the lock");
            })
            .join()
        });
        assert!(matches!(store.len(), Err(CoexError::Cache(_))));
        assert!(store.is_empty().is_err());
    }
}
