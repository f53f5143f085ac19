use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use visit_domain::{
    events::VisitRegistered,
    filter::VisitFilter,
    metrics::status_breakdown,
    repository::{HttpVisitRepository, VisitRepository, DEFAULT_TIMEOUT_SECS},
    VisitService,
};

use crate::render;

pub const DEFAULT_API_URL: &str = "https://tatico.spocws.icu/teste/followups_f38d";

const FLASH_TTL: Duration = Duration::from_secs(3);

const HELP: &str = "\
Commands:
  list                      show the visit list
  stats                     show counters and charts
  filter <name>             all, pending, on-time, active or inactive
  search [text]             match name or tax id; no text clears the search
  visit <id>                register a visit for a record
  reload                    fetch the list again
  help                      show this help
  quit                      exit
";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) api_url: String,
    pub(crate) timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("VISITS_API_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.api_url = url.to_string();
            }
        }
        if let Some(timeout) = lookup("VISITS_TIMEOUT_SECS") {
            match timeout.trim().parse::<u64>() {
                Ok(value) if value > 0 => config.timeout_secs = value,
                _ => warn!(%timeout, "ignoring invalid VISITS_TIMEOUT_SECS"),
            }
        }
        config
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Stats,
    Filter(VisitFilter),
    Search(String),
    Visit(String),
    Reload,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((line, ""));
        match name.to_ascii_lowercase().as_str() {
            "" | "list" | "ls" => Ok(Command::List),
            "stats" => Ok(Command::Stats),
            "filter" => rest.parse().map(Command::Filter),
            "search" => Ok(Command::Search(rest.to_string())),
            "visit" if rest.is_empty() => Err("usage: visit <id>".to_string()),
            "visit" => Ok(Command::Visit(rest.to_string())),
            "reload" => Ok(Command::Reload),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("unknown command `{other}`, type `help`")),
        }
    }
}

struct Flash {
    message: String,
    shown_at: Instant,
}

/// Holds the view state around a [`VisitService`]: filter, search text, the
/// last load error and the flash message fed by visit events.
pub struct DashboardController {
    service: VisitService,
    filter: VisitFilter,
    query: String,
    load_error: Option<String>,
    flash: Arc<Mutex<Option<Flash>>>,
}

impl DashboardController {
    pub fn new(repository: Box<dyn VisitRepository>) -> Self {
        let flash: Arc<Mutex<Option<Flash>>> = Arc::default();
        let sink_flash = Arc::clone(&flash);
        let service = VisitService::builder(repository)
            .with_event_sink(Box::new(move |event: &VisitRegistered| {
                *sink_flash.lock() = Some(Flash {
                    message: format!("Visit registered for {}", event.name),
                    shown_at: Instant::now(),
                });
            }))
            .build();
        Self {
            service,
            filter: VisitFilter::default(),
            query: String::new(),
            load_error: None,
            flash,
        }
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Fetches the list; a failure becomes the visible error state.
    pub fn reload(&mut self) {
        match self.service.reload() {
            Ok(count) => {
                info!(count, "dashboard reloaded");
                self.load_error = None;
            }
            Err(err) => {
                self.load_error = Some(err.user_message());
            }
        }
    }

    pub fn mark_visited(&mut self, id: &str, now: NaiveDateTime) -> String {
        let Some(record) = self.service.get(id) else {
            return format!("No visit record with id {id}.\n");
        };
        if !record.active {
            return format!("{} is inactive; visits cannot be registered.\n", record.name);
        }
        match self.service.mark_visited(id, now) {
            Ok(event) => {
                debug!(id = %event.id, "visit registered from dashboard");
                self.render_list(now)
            }
            Err(err) => format!("Unable to register visit: {}\n", err.user_message()),
        }
    }

    pub fn handle(&mut self, command: Command, now: NaiveDateTime) -> Option<String> {
        let output = match command {
            Command::Quit => return None,
            Command::Help => HELP.to_string(),
            Command::List => self.render_list(now),
            Command::Stats => self.render_stats(now),
            Command::Filter(filter) => {
                self.filter = filter;
                self.render_list(now)
            }
            Command::Search(query) => {
                self.query = query;
                self.render_list(now)
            }
            Command::Visit(id) => self.mark_visited(&id, now),
            Command::Reload => {
                self.reload();
                self.render_dashboard(now)
            }
        };
        Some(output)
    }

    pub fn render_dashboard(&self, now: NaiveDateTime) -> String {
        if self.load_error.is_some() {
            return self.render_list(now);
        }
        let mut out = self.render_stats(now);
        out.push('\n');
        out.push_str(&self.render_list(now));
        out
    }

    fn render_stats(&self, now: NaiveDateTime) -> String {
        if let Some(message) = &self.load_error {
            return render::render_error(message);
        }
        let summary = self.service.summary(now);
        let mut out = render::render_summary(&summary);
        out.push('\n');
        out.push_str(&render::render_status_chart(&status_breakdown(&summary)));
        out.push('\n');
        out.push_str(&render::render_frequency_chart(&self.service.frequencies()));
        out
    }

    fn render_list(&self, now: NaiveDateTime) -> String {
        if let Some(message) = &self.load_error {
            return render::render_error(message);
        }
        let snapshot = self.service.snapshot(self.filter, &self.query, now);
        let mut out = String::new();
        if let Some(message) = self.take_flash() {
            out.push_str(&format!("* {message}\n"));
        }
        out.push_str(&render::render_rejected(&snapshot.rejected));
        out.push_str(&render::render_list(&snapshot.visits, self.filter, &self.query, now));
        out
    }

    fn take_flash(&self) -> Option<String> {
        let mut flash = self.flash.lock();
        let expired = flash
            .as_ref()
            .is_some_and(|current| current.shown_at.elapsed() > FLASH_TTL);
        if expired {
            *flash = None;
        }
        flash.as_ref().map(|current| current.message.clone())
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    info!(api_url = %config.api_url, timeout_secs = config.timeout_secs, "starting visit dashboard");
    let repository = HttpVisitRepository::new(&config.api_url, config.timeout_secs)
        .context("failed to initialize visit repository")?;
    let mut controller = DashboardController::new(Box::new(repository));
    controller.reload();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write!(out, "{}", controller.render_dashboard(now()))?;

    let stdin = io::stdin();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("failed to read command")? == 0 {
            break;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                writeln!(out, "{message}")?;
                continue;
            }
        };
        match controller.handle(command, now()) {
            Some(output) => write!(out, "{output}")?,
            None => break,
        }
    }
    info!("visit dashboard closed");
    Ok(())
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
