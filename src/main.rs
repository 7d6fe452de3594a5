//! cnext - run chat commands from the terminal against an in-memory platform.

mod cli;
mod demo;

use std::sync::Arc;

use cli::Cli;
use commands_next::config::Config;
use commands_next::entities::User;
use commands_next::error::{AppError, Result};
use commands_next::events::GatewayEvent;
use commands_next::logging;
use commands_next::platform::{Client, MockPlatform};
use commands_next::{CommandEvent, CommandsNext, DispatchOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => logging::init_file_logging(Some(path)),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_overrides(&mut config);
    config.commands.validate()?;

    let platform = Arc::new(demo::seed_platform(&config));
    let mut bot = User::new(config.bot.id, &config.bot.username);
    bot.bot = true;
    let client = Client::new(bot, platform.clone());

    let commands = demo::register(CommandsNext::builder(config.commands.clone()))
        .services(demo::services())
        .build(client)?;
    let summary = spawn_summary(&commands);
    let factory = demo::MessageFactory::new(&config, cli.dm);

    for line in &cli.exec {
        process_line(&commands, &platform, &factory, line).await;
    }

    let input: Box<dyn AsyncBufRead + Unpin> = match cli.script_path() {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| AppError::config(format!("Cannot open script {}: {e}", path.display())))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        process_line(&commands, &platform, &factory, &line).await;
    }

    // Dropping the framework closes the event channel and ends the summary task.
    drop(commands);
    match summary.await {
        Ok((executed, failed)) => eprintln!("{executed} command(s) executed, {failed} failed"),
        Err(e) => warn!(error = %e, "Summary task failed"),
    }
    Ok(())
}

/// Dispatches one typed line and prints what the bot sent back.
async fn process_line(
    commands: &CommandsNext,
    platform: &MockPlatform,
    factory: &demo::MessageFactory,
    line: &str,
) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let event = GatewayEvent::from(factory.message(line));
    let outcome = match commands.handle_event(event) {
        Some(handle) => handle.await,
        None => return,
    };

    for sent in platform.take_sent() {
        if let Some(content) = &sent.message.content {
            println!("bot> {content}");
        }
        if let Some(embed) = &sent.message.embed {
            println!("bot> [{}]", embed.title.as_deref().unwrap_or("embed"));
            if let Some(description) = &embed.description {
                println!("bot>   {description}");
            }
            for field in &embed.fields {
                println!("bot>   {}: {}", field.name, field.value);
            }
        }
    }

    match outcome {
        Ok(DispatchOutcome::Failed(failure)) => {
            println!("error> {}: {}", failure.error.category(), failure.error.diagnostic());
        }
        Ok(_) => {}
        Err(e) => error!(error = %e, "Dispatch task failed"),
    }
}

/// Counts executed and failed invocations until the framework is dropped.
fn spawn_summary(commands: &CommandsNext) -> JoinHandle<(usize, usize)> {
    let mut events = commands.subscribe();
    tokio::spawn(async move {
        let (mut executed, mut failed) = (0, 0);
        loop {
            match events.recv().await {
                Ok(CommandEvent::Executed { .. }) => executed += 1,
                Ok(CommandEvent::Errored { .. }) => failed += 1,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Event summary lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        (executed, failed)
    })
}
