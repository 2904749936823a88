//! Non-blocking logging: an `ErrorLogger` handle that request-path code
//! calls into, backed by a channel a single background task drains and
//! writes out. Grounded on the grounding codebase's own
//! `LogMessage`/`ErrorLogger` pair and its `log_combined` access-log
//! formatter, rather than pulling in a general logging crate.

use std::net::IpAddr;

use async_channel::{Receiver, Sender};
use chrono::Local;

/// One queued log line, plus whether it belongs on the error stream.
pub struct LogMessage {
  message: String,
  is_error: bool,
}

impl LogMessage {
  pub fn new(message: String, is_error: bool) -> Self {
    Self { message, is_error }
  }

  pub fn into_parts(self) -> (String, bool) {
    (self.message, self.is_error)
  }
}

/// Handle used by request-path code to emit log lines. Cloneable; a
/// logger with no attached channel (the default in unit tests) silently
/// drops everything sent to it.
#[derive(Clone)]
pub struct ErrorLogger {
  sender: Option<Sender<LogMessage>>,
}

impl ErrorLogger {
  pub fn new(sender: Sender<LogMessage>) -> Self {
    Self { sender: Some(sender) }
  }

  /// A logger with nowhere to send messages; used when no channel is
  /// configured (tests, or a handler constructed before logging starts).
  pub fn disconnected() -> Self {
    Self { sender: None }
  }

  pub async fn log(&self, message: impl Into<String>) {
    if let Some(sender) = &self.sender {
      let _ = sender.send(LogMessage::new(message.into(), true)).await;
    }
  }

  pub async fn log_access(&self, entry: AccessLogEntry<'_>) {
    if let Some(sender) = &self.sender {
      let _ = sender.send(LogMessage::new(entry.format(), false)).await;
    }
  }
}

/// The fields of one request, formatted in Combined Log Format.
pub struct AccessLogEntry<'a> {
  pub client_ip: IpAddr,
  pub method: &'a str,
  pub path: &'a str,
  pub protocol: &'a str,
  pub status_code: u16,
  pub content_length: Option<u64>,
  pub referrer: Option<&'a str>,
  pub user_agent: Option<&'a str>,
}

fn quote(value: &str) -> String {
  format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl AccessLogEntry<'_> {
  fn format(&self) -> String {
    let now = Local::now();
    let formatted_time = now.format("%d/%b/%Y:%H:%M:%S %z");
    format!(
      "{} - - [{}] \"{} {} {}\" {} {} {} {}",
      self.client_ip,
      formatted_time,
      self.method,
      self.path,
      self.protocol,
      self.status_code,
      self.content_length.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
      self.referrer.map(quote).unwrap_or_else(|| "-".into()),
      self.user_agent.map(quote).unwrap_or_else(|| "-".into()),
    )
  }
}

/// Spawns the background task that drains `receiver` and writes each
/// message to stdout (access lines) or stderr (error lines, prefixed
/// with a bracketed timestamp). Returns the join handle so the caller
/// can await a clean shutdown after closing the paired sender.
pub fn spawn_logger(receiver: Receiver<LogMessage>) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    while let Ok(message) = receiver.recv().await {
      let (mut line, is_error) = message.into_parts();
      if is_error {
        let now = Local::now();
        line = format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S"), line);
        eprintln!("{line}");
      } else {
        println!("{line}");
      }
    }
  })
}
