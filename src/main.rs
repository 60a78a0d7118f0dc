use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use chikoro_agent::{
    init_tracing, Agent, AgentConfig, ChromiumRenderer, ConsoleHook, OllamaClient, PageReader,
    Result, SearchClient, TelemetryCollector, Toolbox,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AgentConfig::load()?;
    info!(model = %config.model.model, host = %config.model.host, "starting agent");

    let model = Arc::new(OllamaClient::from_config(&config.model)?);
    let search = SearchClient::from_config(&config.search)?;
    let reader = PageReader::from_config(
        Arc::new(ChromiumRenderer::from_config(&config.browser)),
        &config.browser,
    );
    let toolbox = Toolbox::new(search, reader).with_max_results(config.search.max_results);

    let telemetry = TelemetryCollector::default();
    let mut agent = Agent::new(model, toolbox)
        .with_max_tool_rounds(config.agent.max_tool_rounds)
        .with_hook(Arc::new(ConsoleHook))
        .with_telemetry(telemetry.clone());
    if let Some(prompt) = &config.agent.system_prompt {
        agent = agent.with_system_prompt(prompt.clone());
    }

    println!("Research agent initialized.");
    println!("NOTE: reading pages needs a local Chromium or Chrome installation.");
    print!("User: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let question = line.trim();
    if question.is_empty() {
        println!("No question given.");
        return Ok(());
    }

    // ConsoleHook has already printed the final reply.
    let answer = agent.respond(question).await?;
    for event in telemetry.drain() {
        debug!(kind = %event.kind, detail = %event.detail, "run event");
    }
    info!(chars = answer.chars().count(), "turn finished");
    Ok(())
}
