//! A minimal on-disk configuration loader: a top-level server document
//! plus a `hosts/` directory of per-host documents, parsed with
//! `yaml-rust2` the way the grounding codebase parses its own server
//! configuration. This loader is scoped to exactly the fields the data
//! model needs — no `include:` resolution, no schema validation DSL, no
//! filesystem watcher.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use yaml_rust2::{Yaml, YamlLoader};

use crate::host_registry::{host_key, HostConfig};

/// Top-level server settings, read from the directory's server document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
  pub threads: usize,
  pub modules: Vec<String>,
  /// IP/CIDR entries for the `blocklist` module's `block` list.
  pub block: Vec<String>,
  /// IP/CIDR entries for the `blocklist` module's `allow` list.
  pub allow: Vec<String>,
}

impl Default for ServerSettings {
  fn default() -> Self {
    Self {
      threads: 4,
      modules: Vec::new(),
      block: Vec::new(),
      allow: Vec::new(),
    }
  }
}

pub struct LoadedConfig {
  pub settings: ServerSettings,
  pub hosts: HashMap<String, HostConfig>,
}

/// Loads `dir/server.yaml` plus every `*.yaml`/`*.yml` document under
/// `dir/hosts/`.
pub fn load_directory(dir: &Path) -> anyhow::Result<LoadedConfig> {
  let settings = load_server_settings(&dir.join("server.yaml"))?;
  let hosts = load_hosts(&dir.join("hosts"))?;
  Ok(LoadedConfig { settings, hosts })
}

fn load_yaml_document(path: &Path) -> anyhow::Result<Yaml> {
  let contents =
    fs::read_to_string(path).with_context(|| format!("reading configuration file {}", path.display()))?;
  let mut documents =
    YamlLoader::load_from_str(&contents).with_context(|| format!("parsing YAML in {}", path.display()))?;
  if documents.is_empty() {
    return Err(anyhow!("no YAML documents in {}", path.display()));
  }
  Ok(documents.remove(0))
}

fn load_server_settings(path: &Path) -> anyhow::Result<ServerSettings> {
  if !path.exists() {
    return Ok(ServerSettings::default());
  }
  let doc = load_yaml_document(path)?;

  let threads = doc["threads"].as_i64().unwrap_or(4).max(1) as usize;
  let modules = yaml_string_list(&doc["modules"]);
  let block = yaml_string_list(&doc["block"]);
  let allow = yaml_string_list(&doc["allow"]);

  Ok(ServerSettings { threads, modules, block, allow })
}

fn yaml_string_list(value: &Yaml) -> Vec<String> {
  value
    .as_vec()
    .map(|entries| entries.iter().filter_map(|entry| entry.as_str().map(String::from)).collect())
    .unwrap_or_default()
}

fn load_hosts(hosts_dir: &Path) -> anyhow::Result<HashMap<String, HostConfig>> {
  let mut hosts = HashMap::new();
  if !hosts_dir.exists() {
    return Ok(hosts);
  }

  for entry in fs::read_dir(hosts_dir).with_context(|| format!("reading {}", hosts_dir.display()))? {
    let entry = entry?;
    let path = entry.path();
    let is_yaml = matches!(
      path.extension().and_then(|ext| ext.to_str()),
      Some("yaml") | Some("yml")
    );
    if !is_yaml {
      continue;
    }

    let doc = load_yaml_document(&path)?;
    let hostname = doc["hostname"]
      .as_str()
      .ok_or_else(|| anyhow!("{}: missing required `hostname`", path.display()))?
      .to_string();
    let port = doc["port"].as_i64().unwrap_or(80) as u16;
    let web_root = doc["web_root"]
      .as_str()
      .ok_or_else(|| anyhow!("{}: missing required `web_root`", path.display()))?
      .to_string();
    let index_pages = doc["index_page"]
      .as_vec()
      .map(|entries| entries.iter().filter_map(|entry| entry.as_str().map(String::from)).collect())
      .unwrap_or_else(|| vec!["index.html".to_string()]);

    hosts.insert(host_key(&hostname, port), HostConfig::new(web_root, index_pages));
  }

  Ok(hosts)
}
