mod export;
mod progress;
mod summary;

use ratelimit_tester::{
    args::{OutputFormat, TesterArgs},
    config::build_test_config,
    error::{AppError, AppResult, ValidationError},
    http::{RunHooks, run_test_with},
    metrics::{RunSnapshot, TestRunResult},
    shutdown::shutdown_channel,
};
use tokio::sync::watch;
use tracing::warn;

use crate::shutdown_handlers::setup_signal_shutdown_handler;

pub(crate) async fn run_local(args: TesterArgs) -> AppResult<()> {
    if args.output.is_some() && !args.output_format.is_machine_readable() {
        return Err(AppError::validation(
            ValidationError::OutputRequiresMachineFormat,
        ));
    }
    let config = build_test_config(&args)?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);
    let (progress_tx, progress_rx) = watch::channel(RunSnapshot::default());
    let progress_handle = progress::setup_progress_logger(progress_rx);

    let hooks = RunHooks {
        progress: Some(progress_tx),
        shutdown: Some(shutdown_rx),
    };
    let outcome = run_test_with(&config, hooks).await;

    drop(shutdown_tx.send(()));
    if let Err(err) = signal_handle.await {
        warn!("Signal handler task failed: {}", err);
    }
    if let Err(err) = progress_handle.await {
        warn!("Progress task failed: {}", err);
    }

    let result = outcome?;
    emit_result(&args, &result).await?;
    run_exports(&args, &result).await
}

async fn emit_result(args: &TesterArgs, result: &TestRunResult) -> AppResult<()> {
    let rendered = match args.output_format {
        OutputFormat::Text => {
            summary::print_summary(result);
            return Ok(());
        }
        OutputFormat::Quiet => return Ok(()),
        OutputFormat::Json => export::render_json(result)?,
        OutputFormat::Jsonl => export::render_jsonl(result)?,
        OutputFormat::Csv => export::render_csv(result)?,
    };
    match args.output.as_deref() {
        Some(path) => export::write_file(path, &rendered).await,
        None => export::write_stdout(&rendered).await,
    }
}

async fn run_exports(args: &TesterArgs, result: &TestRunResult) -> AppResult<()> {
    if let Some(path) = args.export_csv.as_deref() {
        export::write_file(path, &export::render_csv(result)?).await?;
    }
    if let Some(path) = args.export_json.as_deref() {
        export::write_file(path, &export::render_json(result)?).await?;
    }
    if let Some(path) = args.export_jsonl.as_deref() {
        export::write_file(path, &export::render_jsonl(result)?).await?;
    }
    Ok(())
}
