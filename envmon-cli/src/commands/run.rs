//! Run command - schedule every catalog process and run it until Ctrl+C.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use envmon::adapters::{MemoryDataManager, MemoryProcessLogger};
use envmon::config::Catalog;
use envmon::scheduler::{
    EventSink, MultiplexEventSink, ScheduleOutcome, Service, ServiceConfig, ServiceEvent,
    TracingEventSink,
};
use tracing::info;

use crate::command_runner::CommandRunner;
use crate::error::CliError;
use crate::runner::CliRunner;

/// How often the foreground loop checks for Ctrl+C.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Arguments for the run command.
#[derive(Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub threads: Option<usize>,
}

/// Prints the completion answer of every execution as one JSON line.
struct AnswerPrinter;

impl EventSink for AnswerPrinter {
    fn emit(&self, event: ServiceEvent) {
        if let ServiceEvent::ProcessFinished(result) = event {
            println!("{}", result.to_json());
        }
    }
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config.as_deref())?;
    runner.log_startup("run");
    let config = runner.config();

    let (catalog_path, catalog) = runner.load_catalog(args.catalog)?;
    let threads = args.threads.unwrap_or(config.service.threads);
    let service_config = ServiceConfig::from(config);

    let command_runner = Arc::new(CommandRunner::from_catalog(&catalog));
    let data_manager = Arc::new(MemoryDataManager::with_catalog(
        catalog.projects.iter().cloned(),
        catalog.processes().cloned(),
    ));
    let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(TracingEventSink), Arc::new(AnswerPrinter)];
    let events = Arc::new(MultiplexEventSink::new(sinks));

    println!("envmon v{}", envmon::VERSION);
    println!("==============");
    println!();
    println!("Instance:  {}", service_config.instance_id);
    println!("Catalog:   {}", catalog_path.display());
    println!(
        "Processes: {} ({} with commands)",
        catalog.entries.len(),
        command_runner.command_count()
    );
    println!("Log file:  {}", runner.log_path().display());
    println!();

    let service = Service::with_event_sink(service_config, data_manager, command_runner, events);
    service.set_logger(Arc::new(MemoryProcessLogger::new()));

    let workers = service.start(threads)?;
    println!("Started {} worker(s)", workers);
    println!();

    schedule_catalog(&service, &catalog);

    // Set up signal handler for graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(SHUTDOWN_POLL);
    }

    println!();
    println!("Shutting down, waiting for running executions...");
    let status = service.status();
    info!(
        pending = status.pending,
        waiting = status.waiting,
        queued_tasks = status.queued_tasks,
        "Stopping with queued work"
    );
    service.stop_service();
    println!("Stopped.");
    Ok(())
}

/// Adds every catalog process to the schedule and prints the outcome.
fn schedule_catalog(service: &Service, catalog: &Catalog) {
    println!("Schedule:");
    for process in catalog.processes() {
        let outcome = service.add_process_to_schedule(process);
        let detail = match &outcome {
            ScheduleOutcome::Scheduled { next_fire } => {
                format!("next {}", next_fire.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            ScheduleOutcome::Backfilled { executions } => {
                format!("reprocessing {} execution(s)", executions)
            }
            ScheduleOutcome::Skipped(reason) => format!("skipped: {}", reason),
        };
        println!("  {:>6}  {:<28} {}", process.id, process.name, detail);
    }
}
