//! The module hook system: a fixed registry of modules invoked at three
//! points in a request's lifecycle, grounded on the `ServerModule` /
//! `ServerModuleHandlers` split in the grounding codebase's common crate
//! (one trait describing what a module does, a thin second type for how
//! it's obtained) but reshaped around typed hook stages instead of a
//! fixed `request_handler`/`response_modifying_handler` pair, per the
//! three-stage dispatch described for this system.

use std::error::Error;
use std::net::IpAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use hyper::{HeaderMap, Method, StatusCode};

use crate::byte_chain::ByteChain;

/// A point in a request's lifecycle at which modules may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookStage {
  /// After host/path resolution, before any response work.
  PreRequest,
  /// After the request body has been fully received.
  PreResponse,
  /// After the response has been sent; cannot alter wire output.
  PostResponse,
}

/// What a hook tells the registry to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookOutcome {
  /// Run the next hook in this stage (or fall through to the static
  /// pipeline, if this was the last `PreResponse` hook).
  Continue,
  /// Stop running hooks for this stage. In `PreResponse`, this also
  /// tells the caller the module has fully produced the response, so
  /// the static-file pipeline must not run.
  Break,
}

pub type ModuleResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// The response a hook may inspect or populate. A hook signals that it
/// has fully produced the response by returning [`HookOutcome::Break`];
/// there is no separate completion flag to keep in sync with that.
pub struct ResponseBuilder {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: Option<ByteChain>,
}

impl ResponseBuilder {
  pub fn new() -> Self {
    Self {
      status: StatusCode::OK,
      headers: HeaderMap::new(),
      body: None,
    }
  }
}

impl Default for ResponseBuilder {
  fn default() -> Self {
    Self::new()
  }
}

/// Per-request state passed to every hook. Owned by the request's
/// handler; no hook may retain a reference past its own return.
pub struct RequestContext {
  pub document_root: String,
  pub file_path: PathBuf,
  pub file_path_hash: u64,
  pub method: Method,
  pub path: String,
  pub query: Option<String>,
  pub headers: HeaderMap,
  pub remote_ip: IpAddr,
  pub request_body: ByteChain,
  pub response: ResponseBuilder,
}

/// A single module: identity, priority, and the hooks it implements.
///
/// `hook_stages` tells the registry which of the three dispatch arrays to
/// place this module in; the default hook methods all `Continue`, so a
/// module only needs to override the ones named in `hook_stages`.
#[async_trait]
pub trait Module {
  fn name(&self) -> &str;
  fn version(&self) -> &str;
  /// Lower runs earlier within a stage.
  fn priority(&self) -> u32;
  fn enabled(&self) -> bool {
    true
  }
  /// The stages this module has a hook for. Stages not listed here are
  /// never dispatched to this module, regardless of its hook methods.
  fn hook_stages(&self) -> &[HookStage] {
    &[]
  }

  async fn init(&mut self) -> ModuleResult<()> {
    Ok(())
  }
  async fn cleanup(&mut self) {}

  async fn pre_request(&self, _ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
    Ok(HookOutcome::Continue)
  }
  async fn pre_response(&self, _ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
    Ok(HookOutcome::Continue)
  }
  async fn post_response(&self, _ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
    Ok(HookOutcome::Continue)
  }
}

/// Fixed-capacity registry of modules, built once at startup and never
/// mutated while requests are being served.
pub struct ModuleRegistry {
  modules: Vec<Box<dyn Module + Send + Sync>>,
  pre_request: Vec<usize>,
  pre_response: Vec<usize>,
  post_response: Vec<usize>,
}

impl ModuleRegistry {
  pub fn new() -> Self {
    Self {
      modules: Vec::new(),
      pre_request: Vec::new(),
      pre_response: Vec::new(),
      post_response: Vec::new(),
    }
  }

  /// Registers a module. Must be called before [`ModuleRegistry::initialize`].
  pub fn register(&mut self, module: Box<dyn Module + Send + Sync>) {
    self.modules.push(module);
  }

  /// Calls `init` on every enabled module, then builds and sorts the
  /// per-stage dispatch arrays by priority. Aborts on the first module
  /// whose `init` fails.
  pub async fn initialize(&mut self) -> ModuleResult<()> {
    for module in &mut self.modules {
      if module.enabled() {
        module.init().await?;
      }
    }

    for (index, module) in self.modules.iter().enumerate() {
      if !module.enabled() {
        continue;
      }
      for stage in module.hook_stages() {
        match stage {
          HookStage::PreRequest => self.pre_request.push(index),
          HookStage::PreResponse => self.pre_response.push(index),
          HookStage::PostResponse => self.post_response.push(index),
        }
      }
    }

    let priority_of = |index: &usize| self.modules[*index].priority();
    self.pre_request.sort_by_key(priority_of);
    self.pre_response.sort_by_key(priority_of);
    self.post_response.sort_by_key(priority_of);

    Ok(())
  }

  /// Runs every hook registered for `stage` in priority order, stopping
  /// as soon as one returns [`HookOutcome::Break`].
  pub async fn execute_hooks(
    &self,
    stage: HookStage,
    ctx: &mut RequestContext,
  ) -> ModuleResult<HookOutcome> {
    let indices = match stage {
      HookStage::PreRequest => &self.pre_request,
      HookStage::PreResponse => &self.pre_response,
      HookStage::PostResponse => &self.post_response,
    };

    for &index in indices {
      let module = &self.modules[index];
      let outcome = match stage {
        HookStage::PreRequest => module.pre_request(ctx).await?,
        HookStage::PreResponse => module.pre_response(ctx).await?,
        HookStage::PostResponse => module.post_response(ctx).await?,
      };
      if outcome == HookOutcome::Break {
        return Ok(HookOutcome::Break);
      }
    }
    Ok(HookOutcome::Continue)
  }

  pub async fn cleanup(&mut self) {
    for module in &mut self.modules {
      module.cleanup().await;
    }
  }
}

impl Default for ModuleRegistry {
  fn default() -> Self {
    Self::new()
  }
}
