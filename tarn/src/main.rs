use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use mimalloc::MiMalloc;

use tarn_common::config::{load_directory, ServerSettings};
use tarn_common::host_registry::HostRegistry;
use tarn_common::logging::{spawn_logger, ErrorLogger};
use tarn_common::modules::ModuleRegistry;

use tarn::builtin_modules::blocklist::BlocklistModule;
use tarn::builtin_modules::example::ExampleModule;
use tarn::cpu_executor::CpuExecutor;
use tarn::server::{run, ServerContext};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// The directory holding server.yaml and hosts/*.yaml
  #[arg(short, long, default_value_t = String::from("./config"))]
  config: String,

  /// The address to listen on
  #[arg(short, long, default_value_t = String::from("0.0.0.0:8080"))]
  listen: String,

  /// Overrides the worker-thread count from server.yaml
  #[arg(short, long)]
  threads: Option<usize>,
}

fn build_modules(settings: &ServerSettings) -> ModuleRegistry {
  let mut registry = ModuleRegistry::new();
  for name in &settings.modules {
    match name.as_str() {
      "blocklist" => registry.register(Box::new(BlocklistModule::new(10, &settings.block, &settings.allow))),
      "example" => registry.register(Box::new(ExampleModule::new(10, "/__example", "hello from tarn"))),
      other => eprintln!("unknown module \"{other}\", ignoring"),
    }
  }
  registry
}

fn main() {
  let args = Args::parse();
  if let Err(err) = run_server(args) {
    eprintln!("FATAL ERROR: {err}");
    std::process::exit(1);
  }
}

fn run_server(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  let config_dir = PathBuf::from(&args.config);
  let loaded = load_directory(&config_dir)?;

  let addr: SocketAddr = args
    .listen
    .parse()
    .map_err(|err| anyhow::anyhow!("invalid --listen address \"{}\": {}", args.listen, err))?;

  let registry = HostRegistry::build(loaded.hosts)?;

  let available_parallelism = thread::available_parallelism()?.get();
  let worker_threads = args.threads.unwrap_or(loaded.settings.threads).max(available_parallelism);

  let server_runtime = tokio::runtime::Builder::new_multi_thread()
    .worker_threads(worker_threads)
    .thread_name("tarn-io")
    .enable_all()
    .build()?;

  let (log_tx, log_rx) = async_channel::bounded(10_000);
  let error_logger = ErrorLogger::new(log_tx);

  server_runtime.block_on(async move {
    let logger_handle = spawn_logger(log_rx);

    let mut modules = build_modules(&loaded.settings);
    modules.initialize().await.expect("module initialization failed");

    let ctx = ServerContext {
      registry,
      modules: Arc::new(modules),
      cpu_executor: Arc::new(CpuExecutor::new(available_parallelism).expect("failed to start the CPU executor")),
      error_logger: error_logger.clone(),
    };

    if let Err(err) = run(addr, ctx).await {
      error_logger.log(format!("server stopped: {err}")).await;
    }

    drop(error_logger);
    let _ = logger_handle.await;
  });

  Ok(())
}
