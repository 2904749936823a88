//! The core request handler: host/path resolution, the three-stage
//! module dispatch, the response-cache probe, and the static-file
//! pipeline, tied together the way `onHeaders`/`onBody`/`onEOM` drive the
//! request state machine in the system this was adapted from.
//!
//! hyper's `Service`/`Body` traits don't expose the original library's
//! `onEgressPaused`/`onEgressResumed` callbacks — a body stream is polled
//! to completion by the connection driver, with no hook for the service
//! function to regain control mid-stream. So this handler reads a file
//! to completion through [`crate::static_file`] before building the
//! response, rather than interleaving the read loop with the client
//! write. [`crate::static_file::StreamState`] still has a real,
//! independently tested pause/resume gate (see that module's doc
//! comment) for whatever does get a mid-stream backpressure signal; this
//! handler just isn't that caller, since draining to completion before
//! responding leaves it nothing to pause on. The response body is still
//! emitted frame-by-frame from the assembled chain's original chunk
//! boundaries, not as one flattened buffer.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use tokio::sync::Mutex;

use tarn_common::byte_chain::ByteChain;
use tarn_common::content_type::get_content_type;
use tarn_common::error_pages::get_error_page;
use tarn_common::hash::hash_two;
use tarn_common::host_registry::{host_key, HostRegistry, WorkerHotCaches};
use tarn_common::logging::{AccessLogEntry, ErrorLogger};
use tarn_common::modules::{HookOutcome, HookStage, ModuleRegistry, RequestContext, ResponseBuilder};
use tarn_common::response_cache::{ResponseCache, ResponseCacheEntry};
use tarn_common::url_sanitizer::sanitize_path;

use crate::cpu_executor::CpuExecutor;
use crate::static_file::{start_stream, StreamMessage};

pub type TarnResponse = Response<BoxBody<Bytes, std::io::Error>>;

/// Everything one request needs, owned so a `hyper` service closure can
/// cheaply clone it per call instead of borrowing locals whose lifetime
/// wouldn't otherwise outlive the returned future. `worker_caches` and
/// `response_cache` are shared per-connection (not per-request) behind a
/// `tokio::sync::Mutex`: on a plain HTTP/1.1 connection without
/// pipelining the lock is never contended, since only one request is
/// ever in flight; an HTTP/2 connection may multiplex several streams
/// and briefly serialize on it instead, which is still correct, just
/// not contention-free.
#[derive(Clone)]
pub struct HandlerEnv {
  pub registry: HostRegistry,
  pub worker_caches: Arc<Mutex<WorkerHotCaches>>,
  pub modules: Arc<ModuleRegistry>,
  pub response_cache: Arc<Mutex<ResponseCache>>,
  pub cpu_executor: Arc<CpuExecutor>,
  pub error_logger: ErrorLogger,
  pub remote_ip: IpAddr,
  pub local_port: u16,
}

fn body_of(bytes: Bytes) -> BoxBody<Bytes, std::io::Error> {
  Full::new(bytes).map_err(|never| match never {}).boxed()
}

fn chain_body(chain: ByteChain) -> BoxBody<Bytes, std::io::Error> {
  let frames = chain.segments().map(|chunk| Ok(Frame::data(chunk)));
  StreamBody::new(stream::iter(frames)).boxed()
}

fn error_response(status: StatusCode) -> TarnResponse {
  let body = get_error_page(status);
  Response::builder()
    .status(status)
    .header(header::CONTENT_TYPE, "text/html")
    .body(body_of(Bytes::from(body)))
    .unwrap_or_default()
}

fn response_from_builder(response: ResponseBuilder) -> TarnResponse {
  let mut builder = Response::builder().status(response.status);
  for (name, value) in response.headers.iter() {
    builder = builder.header(name, value);
  }
  let body = response.body.unwrap_or_else(ByteChain::empty);
  builder.body(chain_body(body)).unwrap_or_default()
}

fn header_str(req: &Request<Incoming>, name: header::HeaderName) -> Option<String> {
  req.headers().get(name).and_then(|v| v.to_str().ok()).map(String::from)
}

/// Handles one request end to end, including access logging.
pub async fn handle_request(req: Request<Incoming>, env: &HandlerEnv) -> TarnResponse {
  let method = req.method().clone();
  let path = req.uri().path().to_string();
  let protocol = format!("{:?}", req.version());
  let referrer = header_str(&req, header::REFERER);
  let user_agent = header_str(&req, header::USER_AGENT);

  let response = handle_inner(req, env).await;

  let content_length = response
    .headers()
    .get(header::CONTENT_LENGTH)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.parse::<u64>().ok());

  env
    .error_logger
    .log_access(AccessLogEntry {
      client_ip: env.remote_ip,
      method: method.as_str(),
      path: &path,
      protocol: &protocol,
      status_code: response.status().as_u16(),
      content_length,
      referrer: referrer.as_deref(),
      user_agent: user_agent.as_deref(),
    })
    .await;

  response
}

/// Runs one hook stage. A hook returning an error never aborts the
/// request: it is logged and treated as `Continue`, so the remaining
/// hooks in the stage still run.
async fn run_hooks(env: &HandlerEnv, stage: HookStage, ctx: &mut RequestContext) -> HookOutcome {
  match env.modules.execute_hooks(stage, ctx).await {
    Ok(outcome) => outcome,
    Err(err) => {
      env.error_logger.log(format!("module hook failed during {stage:?}: {err}")).await;
      HookOutcome::Continue
    }
  }
}

async fn handle_inner(req: Request<Incoming>, env: &HandlerEnv) -> TarnResponse {
  let method = req.method().clone();
  let path = req.uri().path().to_string();
  let query = req.uri().query().map(String::from);

  let hostname = header_str(&req, header::HOST)
    .map(|h| h.split(':').next().unwrap_or(&h).to_string())
    .unwrap_or_default();
  let key = host_key(&hostname, env.local_port);

  let Some(host) = env.worker_caches.lock().await.lookup_host(&env.registry, &key) else {
    return error_response(StatusCode::BAD_REQUEST);
  };

  let Ok(sanitized_path) = sanitize_path(&path) else {
    return error_response(StatusCode::BAD_REQUEST);
  };

  let relative = sanitized_path.trim_start_matches('/');
  let mut file_path: PathBuf = host.web_root.join(relative);

  if sanitized_path.ends_with('/') {
    let resolved = env.worker_caches.lock().await.lookup_redirect(&env.registry, &file_path);
    match resolved {
      Some(resolved) => file_path = resolved,
      None => return error_response(StatusCode::NOT_FOUND),
    }
  }

  // Hashed from the web root and the path relative to it, rather than
  // the joined `file_path` string, so a directory-index rewrite keys
  // the cache on the resolved file and not the pre-redirect request.
  let relative_to_root = file_path.strip_prefix(&host.web_root).unwrap_or(&file_path);
  let file_path_hash = hash_two(
    &host.web_root.to_string_lossy(),
    &relative_to_root.to_string_lossy(),
  );

  let mut ctx = RequestContext {
    document_root: host.web_root.to_string_lossy().into_owned(),
    file_path: file_path.clone(),
    file_path_hash,
    method: method.clone(),
    path: path.clone(),
    query,
    headers: req.headers().clone(),
    remote_ip: env.remote_ip,
    request_body: ByteChain::empty(),
    response: ResponseBuilder::new(),
  };

  if run_hooks(env, HookStage::PreRequest, &mut ctx).await == HookOutcome::Break {
    let response = response_from_builder(ctx.response);
    run_hooks(env, HookStage::PostResponse, &mut ctx).await;
    return response;
  }

  if method == Method::GET {
    let cached = env.response_cache.lock().await.get(file_path_hash).cloned();
    if let Some(entry) = cached {
      let mut builder = Response::builder().status(StatusCode::OK);
      builder = builder.header(header::CONTENT_TYPE, entry.content_type);
      let response = builder.body(chain_body(entry.body.clone())).unwrap_or_default();
      run_hooks(env, HookStage::PostResponse, &mut ctx).await;
      return response;
    }
  }

  let content_type = get_content_type(&file_path);

  let body_bytes = match req.into_body().collect().await {
    Ok(collected) => collected.to_bytes(),
    Err(_) => Bytes::new(),
  };
  ctx.request_body = ByteChain::from_bytes(body_bytes);

  if run_hooks(env, HookStage::PreResponse, &mut ctx).await == HookOutcome::Break {
    let response = response_from_builder(ctx.response);
    run_hooks(env, HookStage::PostResponse, &mut ctx).await;
    return response;
  }

  let response = stream_static_response(&file_path, content_type, file_path_hash, env).await;
  run_hooks(env, HookStage::PostResponse, &mut ctx).await;
  response
}

async fn stream_static_response(
  file_path: &PathBuf,
  content_type: &'static str,
  file_path_hash: u64,
  env: &HandlerEnv,
) -> TarnResponse {
  let Some((state, rx)) = start_stream(file_path.clone(), &env.cpu_executor).await else {
    return error_response(StatusCode::NOT_FOUND);
  };

  let mut failed = false;
  let mut chain = None;
  while let Ok(message) = rx.recv().await {
    match message {
      StreamMessage::Data(_) => {}
      StreamMessage::Eof(assembled) => {
        chain = Some(assembled);
        break;
      }
      StreamMessage::Error => {
        failed = true;
        break;
      }
    }
  }
  state.set_finished();

  if failed {
    return error_response(StatusCode::INTERNAL_SERVER_ERROR);
  }

  let chain = chain.unwrap_or_else(ByteChain::empty);
  if !chain.is_empty() {
    env.response_cache.lock().await.put(
      file_path_hash,
      ResponseCacheEntry {
        content_type,
        body: chain.clone(),
      },
    );
  }

  let content_length = chain.len();
  Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, HeaderValue::from_static(content_type))
    .header(header::CONTENT_LENGTH, content_length)
    .body(chain_body(chain))
    .unwrap_or_default()
}
