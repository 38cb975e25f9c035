mod backend;
mod script;
mod surface;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use foundation::time::{DateRange, YearWindow};
use layers::payload::{AgentImagery, ImpactAssessment};
use runtime::event_bus::NoticeLevel;
use session::{Outbound, Session, SessionConfig};
use streaming::coordinator::FetchTicket;
use streaming::protocol::{AnalysisRequest, ClassicResult, ImageryRequest, ImpactRequest};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::backend::{BackendError, HttpBackend};
use crate::script::{parse_script, ScriptCommand};
use crate::surface::LoggingSurface;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay a flood map session script against the analysis and agent backends"
)]
struct Args {
    /// JSON-lines file of session commands
    #[arg(long)]
    script: PathBuf,

    /// Base URL of the geospatial analysis backend
    #[arg(long, env = "FLOOD_GEE_URL", default_value = "http://127.0.0.1:5000")]
    gee_url: String,

    /// Base URL of the agent service
    #[arg(long, env = "FLOOD_AGENT_URL", default_value = "http://127.0.0.1:8000")]
    agent_url: String,

    /// JSON file overriding session defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds a `wait` step waits for outstanding results
    #[arg(long, default_value_t = 120)]
    wait_timeout_secs: u64,
}

/// A finished backend call, reported back to the session loop.
enum Completion {
    Analysis(FetchTicket<AnalysisRequest>, Result<ClassicResult, BackendError>),
    Imagery(FetchTicket<ImageryRequest>, Result<AgentImagery, BackendError>),
    Impact(FetchTicket<ImpactRequest>, Result<ImpactAssessment, BackendError>),
}

struct Console {
    session: Session<LoggingSurface>,
    backend: HttpBackend,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    outstanding: usize,
    resumes: Vec<JoinHandle<()>>,
    wait_timeout: Duration,
}

impl Console {
    fn new(session: Session<LoggingSurface>, backend: HttpBackend, wait_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            session,
            backend,
            tx,
            rx,
            outstanding: 0,
            resumes: Vec::new(),
            wait_timeout,
        }
    }

    /// Performs each request on its own task; results come back over the channel.
    fn dispatch(&mut self, outbound: Vec<Outbound>) {
        for request in outbound {
            self.outstanding += 1;
            let backend = self.backend.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let done = match request {
                    Outbound::Analysis(ticket) => {
                        let result = backend.analysis(&ticket.request).await;
                        Completion::Analysis(ticket, result)
                    }
                    Outbound::Imagery(ticket) => {
                        let result = backend.imagery(&ticket.request).await;
                        Completion::Imagery(ticket, result)
                    }
                    Outbound::Impact(ticket) => {
                        let result = backend.impact(&ticket.request).await;
                        Completion::Impact(ticket, result)
                    }
                };
                if tx.send(done).await.is_err() {
                    warn!("console stopped before a backend result arrived");
                }
            });
        }
    }

    fn settle(&mut self, done: Completion) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match done {
            Completion::Analysis(ticket, result) => {
                self.session.on_analysis_result(&ticket, result)
            }
            Completion::Imagery(ticket, result) => self.session.on_imagery_result(&ticket, result),
            Completion::Impact(ticket, result) => self.session.on_impact_result(&ticket, result),
        }
        self.report();
    }

    /// Settles whatever has already arrived without blocking.
    fn poll(&mut self) {
        while let Ok(done) = self.rx.try_recv() {
            self.settle(done);
        }
    }

    async fn wait(&mut self) {
        while self.outstanding > 0 {
            match tokio::time::timeout(self.wait_timeout, self.rx.recv()).await {
                Ok(Some(done)) => self.settle(done),
                Ok(None) => break,
                Err(_) => {
                    warn!(outstanding = self.outstanding, "timed out waiting for backend results");
                    break;
                }
            }
        }
    }

    fn report(&mut self) {
        for notice in self.session.drain_notices() {
            match notice.level {
                NoticeLevel::Info => {
                    info!(turn = notice.turn_index, kind = notice.kind, "{}", notice.message)
                }
                NoticeLevel::Warning => {
                    warn!(turn = notice.turn_index, kind = notice.kind, "{}", notice.message)
                }
            }
        }
    }

    async fn run(&mut self, command: ScriptCommand) -> Result<(), Box<dyn Error>> {
        let outbound = match command {
            ScriptCommand::SurfaceReady => {
                self.session.on_surface_ready();
                Vec::new()
            }
            ScriptCommand::Select { polygon } => self.session.select(polygon),
            ScriptCommand::Click { at, features } => {
                if !features.is_empty() {
                    let layer = self.session.config().interactive_layer.clone();
                    self.session.surface_mut().inner_mut().set_features(layer, features);
                }
                self.session.click(at)
            }
            ScriptCommand::Mode { mode } => self.session.set_mode(mode),
            ScriptCommand::Dates { start, end } => {
                self.session.set_dates(DateRange::parse(&start, &end)?)
            }
            ScriptCommand::YearWindow {
                start_year,
                end_year,
            } => {
                let window = start_year.zip(end_year).map(|(s, e)| YearWindow::new(s, e));
                self.session.set_year_window(window)
            }
            ScriptCommand::Submit => self.session.submit(),
            ScriptCommand::Toggle { layer } => self.session.toggle(layer),
            ScriptCommand::Opacity { layer, value } => {
                self.session.set_opacity(layer, value);
                Vec::new()
            }
            ScriptCommand::Period { period } => {
                self.session.set_period(period);
                Vec::new()
            }
            ScriptCommand::AgentState { state } => self.session.on_agent_state(state),
            ScriptCommand::Interrupt { event } => {
                let resolved = self.session.on_agent_interrupt(event)?;
                let backend = self.backend.clone();
                self.resumes.push(tokio::spawn(async move {
                    match resolved.await {
                        Ok(value) => match backend.resume(&value).await {
                            Ok(()) => info!(token = %value.token, "agent resumed"),
                            Err(err) => error!("resume failed: {err}"),
                        },
                        Err(_) => warn!("confirmation closed without a resolution"),
                    }
                }));
                Vec::new()
            }
            ScriptCommand::Edit { field, value } => {
                self.session.edit_confirmation(&field, value)?;
                Vec::new()
            }
            ScriptCommand::Confirm => {
                self.session.confirm()?;
                Vec::new()
            }
            ScriptCommand::Cancel => {
                self.session.cancel()?;
                Vec::new()
            }
            ScriptCommand::Wait => {
                self.wait().await;
                Vec::new()
            }
        };
        self.dispatch(outbound);
        self.report();
        Ok(())
    }
}

async fn load_config(path: Option<&PathBuf>) -> Result<SessionConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

async fn probe(backend: &HttpBackend) {
    match backend.status().await {
        Ok(status) if status.initialized => info!("analysis engine initialized"),
        Ok(status) => warn!(
            "analysis engine not initialized: {}",
            status.message.as_deref().unwrap_or("no details")
        ),
        Err(err) => warn!("status probe failed: {err}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref()).await?;
    let commands = parse_script(&tokio::fs::read_to_string(&args.script).await?)?;
    info!(steps = commands.len(), script = ?args.script, "loaded session script");

    let backend = HttpBackend::new(&args.gee_url, &args.agent_url);
    probe(&backend).await;

    let session = Session::new(LoggingSurface::new(), config);
    let mut console = Console::new(
        session,
        backend,
        Duration::from_secs(args.wait_timeout_secs),
    );

    for (step, command) in commands.into_iter().enumerate() {
        console.poll();
        if let Err(err) = console.run(command).await {
            warn!(step, "command rejected: {err}");
        }
    }
    console.wait().await;

    let Console {
        session, resumes, ..
    } = console;
    println!("layers: {}", session.surface().inner().layer_ids().join(", "));
    for (name, value) in session.metrics().snapshot() {
        println!("{name}: {value}");
    }
    if let Some(stats) = session.impact_statistics() {
        println!("impact: {}", serde_json::to_string(stats)?);
    }
    // An unresolved confirmation is dropped here, releasing its waiter.
    drop(session);
    for handle in resumes {
        if let Err(err) = handle.await {
            error!("resume task failed: {err}");
        }
    }
    Ok(())
}
