use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info};

use crate::app::{DisplayChange, RevealController, RevealOutcome, RevealUpdate, ThreadPacer};
use crate::config::{AppConfig, AskArgs, LoggingConfig, ServeArgs, init_tracing};
use crate::domain::ModelSelector;
use crate::infra::api_client::HttpTransport;
use crate::server::{AppState, HttpServer};

const RENDER_INTERVAL: Duration = Duration::from_millis(30);

pub fn run_serve(args: ServeArgs) -> Result<()> {
    let config = AppConfig::load(&args.config, &args.overrides())?;
    init_tracing(&config.logging)?;
    info!(
        addr = %config.server.addr,
        gemini_model = %config.providers.gemini.model,
        sarvam_model = %config.providers.sarvam.model,
        "starting aibot server"
    );

    // Blocking HTTP clients must be created outside the async runtime.
    let service = config
        .providers
        .build_service()
        .context("failed to initialise providers")?;
    let state = AppState::new(service);
    let server = HttpServer::new(config.server.addr, state.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let result = runtime.block_on(server.start_with_shutdown(shutdown_signal()));

    // Release the provider clients only once the runtime is gone.
    drop(runtime);
    drop(state);
    result
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for Ctrl-C");
        return;
    }
    info!("shutdown requested");
}

pub fn run_ask(args: AskArgs) -> Result<()> {
    init_tracing(&LoggingConfig {
        level: args.log_level.clone(),
        format: "compact".to_string(),
    })?;

    let transport = HttpTransport::new(&args.endpoint, Duration::from_secs(args.timeout_secs))
        .context("failed to create API client")?;
    let controller = Arc::new(RevealController::new(
        Arc::new(transport),
        Arc::new(ThreadPacer),
    ));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let mut renderer = TerminalRenderer::new(std::io::stdout());
    let outcome = runtime.block_on(drive_reveal(
        Arc::clone(&controller),
        args.prompt,
        args.model,
        &mut renderer,
    ))?;

    match outcome {
        RevealOutcome::Completed | RevealOutcome::Stopped => Ok(()),
        RevealOutcome::Ignored => Err(anyhow!("prompt must not be empty")),
        RevealOutcome::Failed(error) => Err(anyhow!(error).context("generation failed")),
    }
}

/// Runs the submission on the blocking pool and renders progress until it
/// ends. The first Ctrl-C stops the reveal; the partial answer stays on screen.
async fn drive_reveal<W: Write>(
    controller: Arc<RevealController>,
    prompt: String,
    model: Option<ModelSelector>,
    renderer: &mut TerminalRenderer<W>,
) -> Result<RevealOutcome> {
    let mut worker = {
        let controller = Arc::clone(&controller);
        tokio::task::spawn_blocking(move || controller.submit(&prompt, model))
    };
    let mut ticker = tokio::time::interval(RENDER_INTERVAL);
    let mut stop_requested = false;

    let outcome = loop {
        tokio::select! {
            joined = &mut worker => break joined.context("reveal task panicked")?,
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal.context("failed to listen for Ctrl-C")?;
                debug!("Ctrl-C received, stopping reveal");
                stop_requested = true;
                controller.handle_stop();
            }
            _ = ticker.tick() => renderer.render(&controller.drain_updates())?,
        }
    };

    renderer.render(&controller.drain_updates())?;
    renderer.finish()?;
    Ok(outcome)
}

/// Writes each change as it arrives. A replacement (the error message) starts
/// on a fresh line when the current line already holds text.
pub struct TerminalRenderer<W: Write> {
    out: W,
    line_has_text: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            line_has_text: false,
        }
    }

    pub fn render(&mut self, updates: &[RevealUpdate]) -> std::io::Result<()> {
        for update in updates {
            match &update.change {
                DisplayChange::Unchanged => {}
                DisplayChange::Appended(character) => {
                    write!(self.out, "{character}")?;
                    self.line_has_text = true;
                }
                DisplayChange::Replaced(text) => {
                    if self.line_has_text {
                        writeln!(self.out)?;
                    }
                    write!(self.out, "{text}")?;
                    self.line_has_text = !text.is_empty();
                }
            }
        }
        self.out.flush()
    }

    pub fn finish(&mut self) -> std::io::Result<()> {
        if self.line_has_text {
            writeln!(self.out)?;
            self.line_has_text = false;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
