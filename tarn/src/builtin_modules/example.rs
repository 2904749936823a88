//! A minimal `PRE_RESPONSE` module demonstrating the hook ABI end to
//! end: it serves a fixed body for one configured path and lets every
//! other request fall through to the static-file pipeline. Grounded on
//! the shape of the grounding codebase's own example module crate
//! (`ferron-mod-example`), trimmed to the one hook this system's module
//! ABI actually dispatches through.

use async_trait::async_trait;
use bytes::Bytes;
use hyper::StatusCode;

use tarn_common::byte_chain::ByteChain;
use tarn_common::modules::{HookOutcome, HookStage, Module, ModuleResult, RequestContext};

pub struct ExampleModule {
  priority: u32,
  path: String,
  body: &'static str,
}

impl ExampleModule {
  pub fn new(priority: u32, path: impl Into<String>, body: &'static str) -> Self {
    Self {
      priority,
      path: path.into(),
      body,
    }
  }
}

#[async_trait]
impl Module for ExampleModule {
  fn name(&self) -> &str {
    "example"
  }

  fn version(&self) -> &str {
    "0.1.0"
  }

  fn priority(&self) -> u32 {
    self.priority
  }

  fn hook_stages(&self) -> &[HookStage] {
    &[HookStage::PreResponse]
  }

  async fn pre_response(&self, ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
    if ctx.path != self.path {
      return Ok(HookOutcome::Continue);
    }
    ctx.response.status = StatusCode::OK;
    ctx.response.body = Some(ByteChain::from_bytes(Bytes::from_static(self.body.as_bytes())));
    Ok(HookOutcome::Break)
  }
}
