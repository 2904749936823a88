//! The streaming file reader: chunks a file's body to the client without
//! blocking an I/O worker thread and without materialising the whole
//! file twice.
//!
//! Cross-thread continuations are modelled as message passing: the read
//! loop (running on the [`CpuExecutor`]) produces [`StreamMessage`]s over
//! a bounded `async_channel`, and the I/O task that owns the connection
//! consumes them in order — mirroring the grounding codebase's
//! `SendReadStream` (bounded channel as the backpressure mechanism). The
//! `finished`/`error` flags are additionally checked every loop
//! iteration, matching the explicit stop gate in the source design this
//! was adapted from, since channel backpressure alone only gates the
//! send, not a signal the loop can react to promptly between reads.
//!
//! `paused`/`set_paused` is a real, tested pause-and-resume gate on this
//! same loop: while paused, the loop stops issuing reads (without
//! dropping the open file or the in-progress accumulator) and polls at
//! [`PAUSE_POLL_INTERVAL`] until unpaused, finished, or errored. Nothing
//! in this crate currently calls `set_paused` outside its own tests —
//! see the handler module's doc comment for why.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tarn_common::byte_chain::{ByteChain, ByteChainBuilder};

use crate::cpu_executor::CpuExecutor;

const CHUNK_TARGET: usize = 4096;
const CHANNEL_CAPACITY: usize = 4;
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Cross-thread flags for one in-flight stream. `Arc`-shared rather than
/// reached through `&mut`, so both the I/O task and the CPU executor's
/// read loop can set and observe them without a lock.
pub struct StreamState {
  paused: AtomicBool,
  finished: AtomicBool,
  error: AtomicBool,
}

impl StreamState {
  fn new() -> Arc<Self> {
    Arc::new(Self {
      paused: AtomicBool::new(false),
      finished: AtomicBool::new(false),
      error: AtomicBool::new(false),
    })
  }

  pub fn set_paused(&self, value: bool) {
    self.paused.store(value, Ordering::SeqCst);
  }

  pub fn is_paused(&self) -> bool {
    self.paused.load(Ordering::SeqCst)
  }

  pub fn set_finished(&self) {
    self.finished.store(true, Ordering::SeqCst);
  }

  pub fn is_finished(&self) -> bool {
    self.finished.load(Ordering::SeqCst)
  }

  pub fn is_error(&self) -> bool {
    self.error.load(Ordering::SeqCst)
  }

  fn set_error(&self) {
    self.error.store(true, Ordering::SeqCst);
  }

  fn should_stop(&self) -> bool {
    self.is_error() || self.is_finished()
  }
}

/// One message posted from the read loop to the owning I/O task.
pub enum StreamMessage {
  Data(Bytes),
  /// Carries the assembled body; empty iff the file had zero bytes, in
  /// which case the caller must not insert it into the response cache.
  Eof(ByteChain),
  Error,
}

/// Opens `file_path` on the CPU executor and, on success, starts the
/// read loop there too. Returns `None` if the file cannot be opened —
/// the caller is responsible for emitting `404` itself; no further work
/// is scheduled.
pub async fn start_stream(
  file_path: PathBuf,
  cpu_executor: &CpuExecutor,
) -> Option<(Arc<StreamState>, async_channel::Receiver<StreamMessage>)> {
  let (open_tx, open_rx) = async_channel::bounded(1);
  let probe_path = file_path.clone();
  cpu_executor.spawn_blocking_job(move || {
    let _ = open_tx.send_blocking(probe_path.is_file());
  });

  let opened = open_rx.recv().await.unwrap_or(false);
  if !opened {
    return None;
  }

  let state = StreamState::new();
  let (tx, rx) = async_channel::bounded(CHANNEL_CAPACITY);
  let loop_state = state.clone();
  cpu_executor.spawn_blocking_job(move || run_read_loop(file_path, loop_state, tx));

  Some((state, rx))
}

fn run_read_loop(file_path: PathBuf, state: Arc<StreamState>, tx: async_channel::Sender<StreamMessage>) {
  let mut file = match File::open(&file_path) {
    Ok(file) => file,
    Err(_) => {
      state.set_error();
      let _ = tx.send_blocking(StreamMessage::Error);
      return;
    }
  };

  let mut accumulator = ByteChainBuilder::new();
  loop {
    if state.should_stop() {
      break;
    }
    if state.is_paused() {
      std::thread::sleep(PAUSE_POLL_INTERVAL);
      continue;
    }

    let mut buf = vec![0u8; CHUNK_TARGET];
    match file.read(&mut buf) {
      Ok(0) => {
        let _ = tx.send_blocking(StreamMessage::Eof(accumulator.finish()));
        break;
      }
      Ok(n) => {
        buf.truncate(n);
        let chunk = Bytes::from(buf);
        accumulator.push(chunk.clone());
        if tx.send_blocking(StreamMessage::Data(chunk)).is_err() {
          break;
        }
      }
      Err(_) => {
        state.set_error();
        let _ = tx.send_blocking(StreamMessage::Error);
        break;
      }
    }
  }
}
