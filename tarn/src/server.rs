//! The accept loop: binds one TCP listener, hands each connection to
//! `hyper_util`'s auto-negotiating connection builder over its own task,
//! and gives every connection a fresh set of per-connection caches.
//! Grounded on the accept loop in the grounding codebase's
//! `listeners/tcp.rs` and the `hyper::server::conn::http1::Builder` /
//! `http2::Builder` pair it branches between in `server.rs`, collapsed
//! here into `hyper_util::server::conn::auto::Builder`, which detects
//! HTTP/1.1 vs. HTTP/2-with-prior-knowledge (h2c) from a connection's
//! leading bytes instead of needing a manual branch — this core has no
//! TLS layer to read an ALPN result from, so auto-detection on the
//! plaintext stream is the simpler equivalent. No TLS, no QUIC: those
//! sit outside this core's scope.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use tarn_common::host_registry::HostRegistry;
use tarn_common::logging::ErrorLogger;
use tarn_common::modules::ModuleRegistry;
use tarn_common::response_cache::ResponseCache;

use crate::cpu_executor::CpuExecutor;
use crate::handler::{handle_request, HandlerEnv};

const RESPONSE_CACHE_CAPACITY: usize = 256;
const HOT_CACHE_CAPACITY: usize = 512;

pub struct ServerContext {
  pub registry: HostRegistry,
  pub modules: Arc<ModuleRegistry>,
  pub cpu_executor: Arc<CpuExecutor>,
  pub error_logger: ErrorLogger,
}

/// Binds `addr` and serves connections until the listener errors out.
pub async fn run(addr: SocketAddr, ctx: ServerContext) -> std::io::Result<()> {
  let listener = TcpListener::bind(addr).await?;
  println!("tarn is listening on {}...", listener.local_addr()?);
  serve(listener, ctx).await
}

/// Serves connections off an already-bound listener until it errors out.
/// Split out from [`run`] so tests can bind to `127.0.0.1:0`, read back
/// the OS-assigned port, and drive the accept loop in the background.
pub async fn serve(listener: TcpListener, ctx: ServerContext) -> std::io::Result<()> {
  loop {
    let (stream, remote_address) = match listener.accept().await {
      Ok(accepted) => accepted,
      Err(err) => {
        log_error(&ctx.error_logger, format!("cannot accept a connection: {err}")).await;
        continue;
      }
    };
    let local_address = match stream.local_addr() {
      Ok(addr) => addr,
      Err(err) => {
        log_error(&ctx.error_logger, format!("cannot read local address: {err}")).await;
        continue;
      }
    };
    stream.set_nodelay(true).unwrap_or_default();

    let registry = ctx.registry.clone();
    let modules = ctx.modules.clone();
    let cpu_executor = ctx.cpu_executor.clone();
    let error_logger = ctx.error_logger.clone();

    tokio::spawn(async move {
      serve_connection(stream, remote_address, local_address, registry, modules, cpu_executor, error_logger).await;
    });
  }
}

async fn serve_connection(
  stream: tokio::net::TcpStream,
  remote_address: SocketAddr,
  local_address: SocketAddr,
  registry: HostRegistry,
  modules: Arc<ModuleRegistry>,
  cpu_executor: Arc<CpuExecutor>,
  error_logger: ErrorLogger,
) {
  let io = TokioIo::new(stream);
  let worker_caches = Arc::new(Mutex::new(registry.new_worker_caches(HOT_CACHE_CAPACITY)));
  let response_cache = Arc::new(Mutex::new(ResponseCache::new(RESPONSE_CACHE_CAPACITY)));

  let env = HandlerEnv {
    registry,
    worker_caches,
    modules,
    response_cache,
    cpu_executor,
    error_logger: error_logger.clone(),
    remote_ip: remote_address.ip(),
    local_port: local_address.port(),
  };

  let service = service_fn(move |req| {
    let env = env.clone();
    async move { Ok::<_, std::convert::Infallible>(handle_request(req, &env).await) }
  });

  let builder = auto::Builder::new(TokioExecutor::new());
  if let Err(err) = builder.serve_connection_with_upgrades(io, service).await {
    log_error(&error_logger, format!("error serving connection: {err}")).await;
  }
}

async fn log_error(logger: &ErrorLogger, message: String) {
  logger.log(message).await;
}
