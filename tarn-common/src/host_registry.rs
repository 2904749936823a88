//! The authoritative host configuration and filesystem metadata tables,
//! plus the thread-local hot caches layered over them.
//!
//! One [`HostRegistry`] is built after configuration load (and rebuilt on
//! reload) and shared process-wide behind a `parking_lot::RwLock`, the way
//! the grounding codebase guards its own configuration root: cheap shared
//! reads during steady-state serving, an exclusive write only while a
//! reload is in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::hash::hash_bytes;
use crate::hot_cache::HotCache;

/// A virtual host's static configuration. Immutable once built; a reload
/// replaces the whole [`HostRegistry`] rather than mutating one in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
  pub web_root: PathBuf,
  pub index_pages: Vec<String>,
}

impl HostConfig {
  pub fn new(web_root: impl Into<PathBuf>, index_pages: Vec<String>) -> Self {
    Self {
      web_root: web_root.into(),
      index_pages,
    }
  }
}

/// Metadata about one path under a host's web root, gathered by the
/// startup scan. Extensible: a module or future edge case can grow this
/// without touching the scan's core shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileMetadata {
  pub is_directory: bool,
}

/// Builds a host key in the `"<hostname>:<port>"` canonical form used
/// throughout the registry and the hot caches layered over it.
pub fn host_key(hostname: &str, port: u16) -> String {
  format!("{hostname}:{port}")
}

struct RegistryTables {
  hosts: HashMap<String, HostConfig>,
  metadata: HashMap<PathBuf, FileMetadata>,
  /// directory path hash -> resolved index file path
  directory_redirects: HashMap<u64, PathBuf>,
}

/// The process-wide authoritative registry. Cheap to clone (an `Arc`
/// around a lock), so each worker thread keeps its own handle alongside
/// its private [`HotCache`] instances.
#[derive(Clone)]
pub struct HostRegistry {
  tables: Arc<RwLock<RegistryTables>>,
}

impl HostRegistry {
  /// Builds a registry from already-parsed host configs, scanning each
  /// host's web root recursively for file metadata and directory index
  /// redirects.
  pub fn build(hosts: HashMap<String, HostConfig>) -> std::io::Result<Self> {
    let mut metadata = HashMap::new();
    let mut directory_redirects = HashMap::new();

    for config in hosts.values() {
      scan_host(config, &mut metadata, &mut directory_redirects)?;
    }

    Ok(Self {
      tables: Arc::new(RwLock::new(RegistryTables {
        hosts,
        metadata,
        directory_redirects,
      })),
    })
  }

  /// Replaces the registry's contents in place, re-scanning every host.
  /// Held readers in flight keep seeing the old tables until they next
  /// acquire the lock; the exclusive write only blocks new acquisitions.
  pub fn reload(&self, hosts: HashMap<String, HostConfig>) -> std::io::Result<()> {
    let mut metadata = HashMap::new();
    let mut directory_redirects = HashMap::new();
    for config in hosts.values() {
      scan_host(config, &mut metadata, &mut directory_redirects)?;
    }

    let mut tables = self.tables.write();
    tables.hosts = hosts;
    tables.metadata = metadata;
    tables.directory_redirects = directory_redirects;
    Ok(())
  }

  pub fn lookup_host(&self, key: &str) -> Option<HostConfig> {
    self.tables.read().hosts.get(key).cloned()
  }

  pub fn lookup_metadata(&self, path: &Path) -> Option<FileMetadata> {
    self.tables.read().metadata.get(path).copied()
  }

  pub fn lookup_redirect(&self, dir_path: &Path) -> Option<PathBuf> {
    let key = hash_bytes(dir_path.to_string_lossy().as_bytes());
    self.tables.read().directory_redirects.get(&key).cloned()
  }

  /// A fresh set of per-worker hot caches sized for `capacity` entries
  /// each, to be created once per worker thread at startup.
  pub fn new_worker_caches(&self, capacity: usize) -> WorkerHotCaches {
    WorkerHotCaches {
      hosts: HotCache::new(capacity),
      metadata: HotCache::new(capacity),
      redirects: HotCache::new(capacity),
    }
  }
}

fn scan_host(
  config: &HostConfig,
  metadata: &mut HashMap<PathBuf, FileMetadata>,
  directory_redirects: &mut HashMap<u64, PathBuf>,
) -> std::io::Result<()> {
  scan_dir(&config.web_root, config, metadata, directory_redirects)
}

fn scan_dir(
  dir: &Path,
  config: &HostConfig,
  metadata: &mut HashMap<PathBuf, FileMetadata>,
  directory_redirects: &mut HashMap<u64, PathBuf>,
) -> std::io::Result<()> {
  metadata.insert(dir.to_path_buf(), FileMetadata { is_directory: true });

  for index in &config.index_pages {
    let candidate = dir.join(index);
    if candidate.is_file() {
      let key = hash_bytes(dir.to_string_lossy().as_bytes());
      directory_redirects.entry(key).or_insert(candidate);
      break;
    }
  }

  for entry in std::fs::read_dir(dir)? {
    let entry = entry?;
    let path = entry.path();
    let file_type = entry.file_type()?;
    if file_type.is_dir() {
      scan_dir(&path, config, metadata, directory_redirects)?;
    } else if file_type.is_file() {
      metadata.insert(path, FileMetadata { is_directory: false });
    }
  }

  Ok(())
}

/// One worker's private, lock-free view over the [`HostRegistry`]'s
/// tables. Misses fall through to the registry itself and repopulate
/// the relevant hot cache.
pub struct WorkerHotCaches {
  hosts: HotCache<String, HostConfig>,
  metadata: HotCache<PathBuf, FileMetadata>,
  redirects: HotCache<PathBuf, Option<PathBuf>>,
}

impl WorkerHotCaches {
  pub fn lookup_host(&mut self, registry: &HostRegistry, key: &str) -> Option<HostConfig> {
    if let Some(hit) = self.hosts.get(&key.to_string()) {
      return Some(hit.clone());
    }
    let found = registry.lookup_host(key)?;
    self.hosts.put(key.to_string(), found.clone());
    Some(found)
  }

  pub fn lookup_metadata(&mut self, registry: &HostRegistry, path: &Path) -> Option<FileMetadata> {
    if let Some(hit) = self.metadata.get(&path.to_path_buf()) {
      return Some(*hit);
    }
    let found = registry.lookup_metadata(path)?;
    self.metadata.put(path.to_path_buf(), found);
    Some(found)
  }

  /// Looks up a directory's resolved index file, caching the negative
  /// result too (`None`) so repeated misses for directories with no
  /// index page don't keep falling through to the registry's lock.
  pub fn lookup_redirect(&mut self, registry: &HostRegistry, dir_path: &Path) -> Option<PathBuf> {
    if let Some(hit) = self.redirects.get(&dir_path.to_path_buf()) {
      return hit.clone();
    }
    let found = registry.lookup_redirect(dir_path);
    self.redirects.put(dir_path.to_path_buf(), found.clone());
    found
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  fn temp_dir(name: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("tarn-host-registry-test-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn host_key_is_canonical() {
    assert_eq!(host_key("example.com", 80), "example.com:80");
  }

  #[test]
  fn scan_finds_index_page_and_nested_files() {
    let root = temp_dir("scan");
    fs::write(root.join("index.html"), b"hi").unwrap();
    fs::create_dir_all(root.join("assets")).unwrap();
    fs::write(root.join("assets/app.js"), b"x").unwrap();

    let mut hosts = HashMap::new();
    hosts.insert(
      host_key("example.com", 80),
      HostConfig::new(root.clone(), vec!["index.html".into()]),
    );
    let registry = HostRegistry::build(hosts).unwrap();

    let resolved = registry.lookup_redirect(&root);
    assert_eq!(resolved, Some(root.join("index.html")));

    let meta = registry.lookup_metadata(&root.join("assets/app.js"));
    assert_eq!(meta, Some(FileMetadata { is_directory: false }));

    fs::remove_dir_all(&root).unwrap();
  }

  #[test]
  fn directory_with_no_index_page_is_absent() {
    let root = temp_dir("no-index");
    fs::create_dir_all(root.join("empty")).unwrap();

    let mut hosts = HashMap::new();
    hosts.insert(
      host_key("example.com", 80),
      HostConfig::new(root.clone(), vec!["index.html".into()]),
    );
    let registry = HostRegistry::build(hosts).unwrap();

    assert_eq!(registry.lookup_redirect(&root.join("empty")), None);

    fs::remove_dir_all(&root).unwrap();
  }

  #[test]
  fn hot_cache_caches_negative_redirect_lookups() {
    let root = temp_dir("hot-cache-negative");
    fs::create_dir_all(&root).unwrap();

    let mut hosts = HashMap::new();
    hosts.insert(
      host_key("example.com", 80),
      HostConfig::new(root.clone(), vec!["index.html".into()]),
    );
    let registry = HostRegistry::build(hosts).unwrap();
    let mut worker = registry.new_worker_caches(16);

    assert_eq!(worker.lookup_redirect(&registry, &root), None);
    assert_eq!(worker.redirects.get(&root), Some(&None));

    fs::remove_dir_all(&root).unwrap();
  }
}
