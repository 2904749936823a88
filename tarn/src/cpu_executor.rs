//! The CPU-bound executor: a dedicated secondary `tokio::runtime::Runtime`
//! used only for blocking-shaped work (disk reads), mirroring the
//! secondary runtime handed to module loaders in the grounding codebase
//! (`_secondary_runtime: &tokio::runtime::Runtime`). I/O worker threads
//! never block on disk; they post read jobs here instead.

use std::io;

pub struct CpuExecutor {
  runtime: tokio::runtime::Runtime,
}

impl CpuExecutor {
  pub fn new(worker_threads: usize) -> io::Result<Self> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .worker_threads(worker_threads.max(1))
      .thread_name("tarn-cpu")
      .enable_all()
      .build()?;
    Ok(Self { runtime })
  }

  /// Posts a blocking job to the executor. The job runs on one of this
  /// runtime's dedicated worker threads, never on an I/O worker thread.
  pub fn spawn_blocking_job<F>(&self, job: F)
  where
    F: FnOnce() + Send + 'static,
  {
    self.runtime.spawn_blocking(job);
  }
}
