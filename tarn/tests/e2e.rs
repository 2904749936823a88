//! End-to-end scenarios driven against a real loopback socket: one
//! `tokio::net::TcpListener` bound to `127.0.0.1:0`, served by
//! `tarn::server::serve`, hit with `hyper_util`'s legacy client. Mirrors
//! the grounding codebase's own preference for exercising a real socket
//! over mocking the HTTP library.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;

use tarn::builtin_modules::blocklist::BlocklistModule;
use tarn::cpu_executor::CpuExecutor;
use tarn::server::{serve, ServerContext};
use tarn_common::host_registry::{host_key, HostConfig, HostRegistry};
use tarn_common::logging::ErrorLogger;
use tarn_common::modules::{HookOutcome, HookStage, Module, ModuleRegistry, ModuleResult, RequestContext};

fn temp_web_root(name: &str) -> PathBuf {
  let mut dir = std::env::temp_dir();
  dir.push(format!("tarn-e2e-{name}-{}", std::process::id()));
  let _ = std::fs::remove_dir_all(&dir);
  std::fs::create_dir_all(&dir).unwrap();
  dir
}

/// Boots a server on an ephemeral loopback port with the given hosts and
/// modules, returning the address to send requests to. The server task
/// is intentionally leaked for the test process's lifetime; there is no
/// shutdown protocol to drive here.
async fn spawn_server(hosts: HashMap<String, HostConfig>, modules: ModuleRegistry) -> SocketAddr {
  let registry = HostRegistry::build(hosts).unwrap();
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();

  let mut modules = modules;
  modules.initialize().await.unwrap();

  let ctx = ServerContext {
    registry,
    modules: Arc::new(modules),
    cpu_executor: Arc::new(CpuExecutor::new(2).unwrap()),
    error_logger: ErrorLogger::disconnected(),
  };

  tokio::spawn(async move {
    let _ = serve(listener, ctx).await;
  });

  addr
}

fn client() -> Client<hyper_util::client::legacy::connect::HttpConnector, Full<Bytes>> {
  Client::builder(TokioExecutor::new()).build_http()
}

async fn get(addr: SocketAddr, host: &str, path: &str) -> hyper::Response<hyper::body::Incoming> {
  let uri = format!("http://{addr}{path}");
  let req = Request::builder()
    .method("GET")
    .uri(uri)
    .header("Host", host)
    .body(Full::new(Bytes::new()))
    .unwrap();
  client().request(req).await.unwrap()
}

async fn post(addr: SocketAddr, host: &str, path: &str, body: &'static str) -> hyper::Response<hyper::body::Incoming> {
  let uri = format!("http://{addr}{path}");
  let req = Request::builder()
    .method("POST")
    .uri(uri)
    .header("Host", host)
    .body(Full::new(Bytes::from_static(body.as_bytes())))
    .unwrap();
  client().request(req).await.unwrap()
}

#[tokio::test]
async fn static_hit_cold_then_warm() {
  let root = temp_web_root("cold-warm");
  std::fs::write(root.join("index.html"), b"HELLO").unwrap();

  let mut hosts = HashMap::new();
  hosts.insert(host_key("a.test", 80), HostConfig::new(root.clone(), vec!["index.html".into()]));

  let addr = spawn_server(hosts, ModuleRegistry::new()).await;

  for _ in 0..2 {
    let response = get(addr, "a.test", "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/html");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"HELLO");
  }

  let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn directory_without_index_returns_404() {
  let root = temp_web_root("no-index");
  std::fs::create_dir_all(root.join("empty")).unwrap();

  let mut hosts = HashMap::new();
  hosts.insert(host_key("a.test", 80), HostConfig::new(root.clone(), vec!["index.html".into()]));

  let addr = spawn_server(hosts, ModuleRegistry::new()).await;

  let response = get(addr, "a.test", "/empty/").await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
  let body = response.into_body().collect().await.unwrap().to_bytes();
  assert!(String::from_utf8_lossy(&body).contains("404"));

  let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn unknown_host_returns_400() {
  let root = temp_web_root("unknown-host");
  std::fs::write(root.join("index.html"), b"HELLO").unwrap();

  let mut hosts = HashMap::new();
  hosts.insert(host_key("a.test", 80), HostConfig::new(root.clone(), vec!["index.html".into()]));

  let addr = spawn_server(hosts, ModuleRegistry::new()).await;

  let response = get(addr, "unknown.test", "/").await;
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  let body = response.into_body().collect().await.unwrap().to_bytes();
  assert!(String::from_utf8_lossy(&body).contains("400"));

  let _ = std::fs::remove_dir_all(&root);
}

struct ShortCircuitModule;

#[async_trait]
impl Module for ShortCircuitModule {
  fn name(&self) -> &str {
    "short-circuit"
  }
  fn version(&self) -> &str {
    "0.0.0"
  }
  fn priority(&self) -> u32 {
    10
  }
  fn hook_stages(&self) -> &[HookStage] {
    &[HookStage::PreResponse]
  }
  async fn pre_response(&self, ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
    ctx.response.status = StatusCode::CREATED;
    ctx
      .response
      .headers
      .insert("x-plugin", hyper::header::HeaderValue::from_static("yes"));
    ctx.response.body = Some(tarn_common::byte_chain::ByteChain::from_bytes(Bytes::from_static(b"ok")));
    Ok(HookOutcome::Break)
  }
}

#[tokio::test]
async fn module_short_circuit_skips_the_static_pipeline() {
  // No web root is ever populated for this host's `/api/x`: if the
  // static pipeline ran despite the module's BREAK, it would 404 instead
  // of returning the module's body.
  let root = temp_web_root("short-circuit");

  let mut hosts = HashMap::new();
  hosts.insert(host_key("a.test", 80), HostConfig::new(root.clone(), vec!["index.html".into()]));

  let mut modules = ModuleRegistry::new();
  modules.register(Box::new(ShortCircuitModule));

  let addr = spawn_server(hosts, modules).await;

  let response = post(addr, "a.test", "/api/x", "{}").await;
  assert_eq!(response.status(), StatusCode::CREATED);
  assert_eq!(response.headers().get("x-plugin").unwrap(), "yes");
  let body = response.into_body().collect().await.unwrap().to_bytes();
  assert_eq!(body.as_ref(), b"ok");

  let _ = std::fs::remove_dir_all(&root);
}

struct OrderingModule {
  priority: u32,
  marker: &'static str,
}

#[async_trait]
impl Module for OrderingModule {
  fn name(&self) -> &str {
    "ordering"
  }
  fn version(&self) -> &str {
    "0.0.0"
  }
  fn priority(&self) -> u32 {
    self.priority
  }
  fn hook_stages(&self) -> &[HookStage] {
    &[HookStage::PreRequest]
  }
  async fn pre_request(&self, ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
    ctx.response.headers.append("x-order", hyper::header::HeaderValue::from_static(self.marker));
    Ok(HookOutcome::Continue)
  }
}

#[tokio::test]
async fn priority_ordering_runs_lower_priority_first() {
  let root = temp_web_root("priority-ordering");
  std::fs::write(root.join("index.html"), b"HELLO").unwrap();

  let mut hosts = HashMap::new();
  hosts.insert(host_key("a.test", 80), HostConfig::new(root.clone(), vec!["index.html".into()]));

  let mut modules = ModuleRegistry::new();
  modules.register(Box::new(OrderingModule { priority: 20, marker: "B" }));
  modules.register(Box::new(OrderingModule { priority: 10, marker: "A" }));
  // PreRequest hooks only affect the final response if one of them also
  // breaks, so wire in a module that always does and echoes the
  // accumulated order header back to the client.
  struct Echo;
  #[async_trait]
  impl Module for Echo {
    fn name(&self) -> &str {
      "echo"
    }
    fn version(&self) -> &str {
      "0.0.0"
    }
    fn priority(&self) -> u32 {
      30
    }
    fn hook_stages(&self) -> &[HookStage] {
      &[HookStage::PreRequest]
    }
    async fn pre_request(&self, ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
      let values: Vec<String> = ctx
        .response
        .headers
        .get_all("x-order")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
      ctx.response.status = StatusCode::OK;
      ctx.response.body = Some(tarn_common::byte_chain::ByteChain::from_bytes(Bytes::from(values.join(","))));
      Ok(HookOutcome::Break)
    }
  }
  modules.register(Box::new(Echo));

  let addr = spawn_server(hosts, modules).await;

  let response = get(addr, "a.test", "/").await;
  assert_eq!(response.status(), StatusCode::OK);
  let body = response.into_body().collect().await.unwrap().to_bytes();
  assert_eq!(body.as_ref(), b"A,B");

  let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn large_file_streams_intact_and_is_then_cached() {
  let root = temp_web_root("large-file");
  let mut payload = Vec::with_capacity(5 * 1024 * 1024);
  for i in 0..(5 * 1024 * 1024) {
    payload.push((i % 251) as u8);
  }
  std::fs::write(root.join("big.bin"), &payload).unwrap();

  let mut hosts = HashMap::new();
  hosts.insert(host_key("a.test", 80), HostConfig::new(root.clone(), vec!["index.html".into()]));

  let addr = spawn_server(hosts, ModuleRegistry::new()).await;

  for _ in 0..2 {
    let response = get(addr, "a.test", "/big.bin").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), payload.len());
    assert_eq!(body.as_ref(), payload.as_slice());
  }

  let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn blocklist_module_rejects_blocked_ips() {
  let root = temp_web_root("blocklist");
  std::fs::write(root.join("index.html"), b"HELLO").unwrap();

  let mut hosts = HashMap::new();
  hosts.insert(host_key("a.test", 80), HostConfig::new(root.clone(), vec!["index.html".into()]));

  let mut modules = ModuleRegistry::new();
  modules.register(Box::new(BlocklistModule::new(10, &["127.0.0.1/32".to_string()], &[])));

  let addr = spawn_server(hosts, modules).await;

  // Every client in this harness connects from 127.0.0.1, which is
  // inside the blocked /32.
  let response = get(addr, "a.test", "/").await;
  assert_eq!(response.status(), StatusCode::FORBIDDEN);

  let _ = std::fs::remove_dir_all(&root);
}
