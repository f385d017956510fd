//! cnfast: runs git and docker through ranked mirror endpoints, asking before
//! moving on to the next endpoint when one fails.

mod action;
mod cli;
mod compose;
mod config;
mod directory;
mod endpoint;
mod error;
mod prompt;
mod retry;
mod rewrite;
mod runner;

use anyhow::Context;
use tracing::Instrument;

use action::git::GitAction;
use action::image::ImageAction;
use action::ActionBuilder;
use cli::Command;
use config::AppConfig;
use directory::DirectoryClient;
use endpoint::{Endpoint, ServiceKind};
use prompt::LinePrompt;
use retry::{ActionOutcome, RetryController};
use runner::ProcessRunner;

fn main() {
    let code = match real_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            eprintln!("{}", cli::USAGE_HINT);
            1
        }
    };
    std::process::exit(code);
}

fn real_main() -> anyhow::Result<i32> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse(&args)?;

    match command {
        Command::Help => {
            println!("{}", cli::help_text());
            return Ok(0);
        }
        Command::Version => {
            println!("{}", cli::version_text());
            return Ok(0);
        }
        _ => {}
    }

    let config_path = AppConfig::config_path();
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    // Build the tokio runtime first; the gRPC exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = cnfast_tracing::init_tracing(&config.tracing);

        let invocation_id = uuid::Uuid::new_v4().to_string();
        let (family, subcommand) = command.labels();
        let span = cnfast_tracing::invocation_span!(&invocation_id, family, subcommand);

        tracing::debug!(
            config_path = %config_path,
            api_host = %config.api_host,
            otlp_export = tracing_guard.is_exporting(),
            "Starting cnfast"
        );

        async {
            let code = dispatch(command, &config, invocation_id).await?;
            let outcome = if code == 0 { "success" } else { "aborted" };
            tracing::Span::current().record("outcome", outcome);
            Ok::<_, anyhow::Error>(code)
        }
        .instrument(span)
        .await
    })
}

async fn dispatch(
    command: Command,
    config: &AppConfig,
    invocation_id: String,
) -> anyhow::Result<i32> {
    let directory = DirectoryClient::new(&config.api_host, config.timeout, invocation_id)?;

    match command {
        Command::Git { subcommand, args } => {
            // Reject bad input before touching the network.
            let action = GitAction::new(&subcommand, &args)?;
            let endpoints = directory.list(ServiceKind::Git).await?;
            Ok(execute(&endpoints, &action).await?.exit_code())
        }
        Command::Docker { subcommand, args } => {
            let action = ImageAction::new(&subcommand, &args)?;
            let endpoints = directory.list(ServiceKind::Docker).await?;
            Ok(execute(&endpoints, &action).await?.exit_code())
        }
        Command::Compose { args } => compose_pull(&directory, &args).await,
        Command::Help | Command::Version => Ok(0),
    }
}

/// Drive one action over `endpoints` with the terminal prompt and report it.
async fn execute<B: ActionBuilder>(
    endpoints: &[Endpoint],
    builder: &B,
) -> anyhow::Result<ActionOutcome> {
    let executor = ProcessRunner;
    let mut decider = LinePrompt::stdio();
    let mut controller = RetryController::new(endpoints, &executor, &mut decider)?;
    tracing::debug!(
        action = %builder.label(),
        order = ?controller.endpoints().iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
        "Ranked endpoints"
    );

    let outcome = controller.run(builder).await;
    report(&outcome, builder);
    Ok(outcome)
}

fn report<B: ActionBuilder>(outcome: &ActionOutcome, builder: &B) {
    match outcome {
        ActionOutcome::Succeeded { endpoint, retag } => {
            if let Some(retag) = retag {
                if !retag.tagged {
                    eprintln!("Warning: image pulled but its original name could not be restored");
                } else if !retag.cleaned_up {
                    eprintln!("Warning: the routed image tag could not be removed");
                }
            }
            tracing::info!(endpoint_id = %endpoint.id, action = %builder.label(), "Action succeeded");
        }
        ActionOutcome::Aborted(reason) => {
            eprintln!("{} did not complete: {reason}", builder.label());
        }
    }
}

/// Pull every image of the compose file, stopping at the first abort.
async fn compose_pull(directory: &DirectoryClient, args: &[String]) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("cannot determine the working directory")?;
    let path = compose::locate(&cwd, args)?;
    let images = compose::load_images(&path)?;
    println!("Found {} image(s) in {}", images.len(), path.display());

    let endpoints = directory.list(ServiceKind::Docker).await?;
    for (i, image) in images.iter().enumerate() {
        println!("\n[{}/{}] {image}", i + 1, images.len());
        let outcome = execute(&endpoints, &ImageAction::pull(image)).await?;
        if !outcome.is_success() {
            return Ok(outcome.exit_code());
        }
    }
    println!("\nAll {} image(s) pulled", images.len());
    Ok(0)
}
