//! An IP/CIDR blocklist module, dispatched in `PRE_REQUEST`. Grounded on
//! the grounding codebase's `modules/blocklist.rs`, but matched against
//! CIDR ranges as well as single addresses (that module's own config
//! validation already accepted `IpCidr` entries, just never stored them
//! as ranges) using the `cidr` crate.

use std::net::IpAddr;

use async_trait::async_trait;
use cidr::IpCidr;
use hyper::StatusCode;

use tarn_common::modules::{HookOutcome, HookStage, Module, ModuleResult, RequestContext};

enum Entry {
  Address(IpAddr),
  Range(IpCidr),
}

impl Entry {
  fn matches(&self, ip: IpAddr) -> bool {
    match self {
      Entry::Address(addr) => *addr == ip,
      Entry::Range(cidr) => cidr.contains(&ip),
    }
  }

  fn parse(raw: &str) -> Option<Self> {
    if let Ok(cidr) = raw.parse::<IpCidr>() {
      return Some(Entry::Range(cidr));
    }
    raw.parse::<IpAddr>().ok().map(Entry::Address)
  }
}

/// Blocks (or, with an allowlist present, only allows) requests by
/// remote address. `blocklist` takes precedence: an address on both
/// lists is blocked.
pub struct BlocklistModule {
  priority: u32,
  blocklist: Vec<Entry>,
  allowlist: Vec<Entry>,
}

impl BlocklistModule {
  pub fn new(priority: u32, blocked: &[String], allowed: &[String]) -> Self {
    Self {
      priority,
      blocklist: blocked.iter().filter_map(|raw| Entry::parse(raw)).collect(),
      allowlist: allowed.iter().filter_map(|raw| Entry::parse(raw)).collect(),
    }
  }

  fn is_blocked(&self, ip: IpAddr) -> bool {
    let explicitly_blocked = self.blocklist.iter().any(|entry| entry.matches(ip));
    let allowed = self.allowlist.is_empty() || self.allowlist.iter().any(|entry| entry.matches(ip));
    explicitly_blocked || !allowed
  }
}

#[async_trait]
impl Module for BlocklistModule {
  fn name(&self) -> &str {
    "blocklist"
  }

  fn version(&self) -> &str {
    "0.1.0"
  }

  fn priority(&self) -> u32 {
    self.priority
  }

  fn hook_stages(&self) -> &[HookStage] {
    &[HookStage::PreRequest]
  }

  async fn pre_request(&self, ctx: &mut RequestContext) -> ModuleResult<HookOutcome> {
    if self.is_blocked(ctx.remote_ip) {
      ctx.response.status = StatusCode::FORBIDDEN;
      return Ok(HookOutcome::Break);
    }
    Ok(HookOutcome::Continue)
  }
}
