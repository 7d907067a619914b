/// Main TUI application

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::{DashboardPoller, DashboardState, MetricsSource, PollOutcome};
use crate::screens::Dashboard;
use crate::utils::constants::POLL_INTERVAL;

pub struct App {
    dashboard: Dashboard,
    poller: DashboardPoller,
    state_rx: watch::Receiver<DashboardState>,
    should_quit: bool,
    status_message: Option<String>,
    /// Manual refresh running off the draw loop
    refresh_task: Option<JoinHandle<PollOutcome>>,
}

impl App {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        let poller = DashboardPoller::new(source, POLL_INTERVAL);
        let dashboard = Dashboard::new(poller.source_description());
        let state_rx = poller.subscribe();

        Self {
            dashboard,
            poller,
            state_rx,
            should_quit: false,
            status_message: None,
            refresh_task: None,
        }
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.poller.start();
        info!("dashboard mounted");

        let result = self.run_loop(&mut terminal).await;

        // No fetch may start once the screen is gone
        self.poller.stop();
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        info!("dashboard unmounted");

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            self.collect_refresh().await;
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key_event) = event::read()? {
                    self.handle_key(key_event.code).await;
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        let state = self.state_rx.borrow();
        self.dashboard
            .render(frame, &state, self.status_message.as_deref());
    }

    async fn handle_key(&mut self, key: KeyCode) {
        self.clear_status();

        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('r') => {
                if self.refresh_task.is_some() {
                    self.set_status("A poll is already in progress".to_string());
                } else {
                    self.refresh_task = Some(self.poller.spawn_refresh());
                    self.set_status("Refreshing...".to_string());
                }
            }
            _ => {}
        }
    }

    /// Report a finished manual refresh; returns at once while it is running
    async fn collect_refresh(&mut self) {
        let finished = self
            .refresh_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        let Some(task) = self.refresh_task.take() else {
            return;
        };
        match task.await {
            Ok(PollOutcome::Applied) => self.set_status("Refreshed".to_string()),
            Ok(PollOutcome::Failed(e)) => self.set_status(format!("Refresh failed: {}", e)),
            Ok(PollOutcome::Skipped) => {
                self.set_status("A poll is already in progress".to_string())
            }
            Err(e) => {
                warn!(error = %e, "refresh task ended abnormally");
                self.set_status("Refresh failed".to_string());
            }
        }
    }
}
