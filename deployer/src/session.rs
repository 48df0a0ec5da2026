//! Drives the conversation state machine with real operations.
//!
//! [`Session::handle`] takes one line of user input, runs the operation that
//! belongs to the current state, and walks through the transient `Testing` and
//! `Deploying` states until the machine is waiting for input again (or done).

use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::confirmation::parse_confirmation;
use crate::core::platform::select_platform;
use crate::core::session::{Event, SessionState, transition};
use crate::core::types::{Confirmation, DeployReport, PlatformSelection, TestReport};
use crate::deploy::deploy_checkout;
use crate::io::config::DeployerConfig;
use crate::io::process::CommandRunner;
use crate::tester::clone_and_test;

/// Result of one operation run on behalf of the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Outcome {
    Platform(PlatformSelection),
    Test(TestReport),
    Confirm(Confirmation),
    Deploy(DeployReport),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Platform(r) => &r.message,
            Outcome::Test(r) => &r.message,
            Outcome::Confirm(r) => &r.message,
            Outcome::Deploy(r) => &r.message,
        }
    }
}

/// A single deployment conversation.
pub struct Session<'a, R: CommandRunner> {
    runner: &'a R,
    cfg: &'a DeployerConfig,
    state: SessionState,
}

impl<'a, R: CommandRunner> Session<'a, R> {
    pub fn new(runner: &'a R, cfg: &'a DeployerConfig) -> Self {
        Self {
            runner,
            cfg,
            state: SessionState::AwaitingPlatform,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn prompt(&self) -> Option<&'static str> {
        self.state.prompt()
    }

    /// Feed one line of user input; returns the operations it triggered.
    ///
    /// Fails only when the session is not waiting for input.
    #[instrument(skip_all, fields(state = self.state.name()))]
    pub fn handle(&mut self, input: &str) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        match &self.state {
            SessionState::AwaitingPlatform => {
                let selection = select_platform(input);
                outcomes.push(Outcome::Platform(selection.clone()));
                self.apply(Event::PlatformSelected(selection))?;
            }
            SessionState::AwaitingRepoUrl { .. } => {
                self.apply(Event::RepoUrlSubmitted(input.to_string()))?;
            }
            SessionState::AwaitingConfirmation { .. } => {
                let confirmation = parse_confirmation(input);
                outcomes.push(Outcome::Confirm(confirmation.clone()));
                self.apply(Event::ConfirmationReceived(confirmation))?;
            }
            state => bail!("session is {} and accepts no input", state.name()),
        }

        if let SessionState::Testing { url, .. } = &self.state {
            let report = clone_and_test(self.runner, self.cfg, url);
            outcomes.push(Outcome::Test(report.clone()));
            self.apply(Event::Tested(report))?;
        }
        if let SessionState::Deploying { checkout } = &self.state {
            let report = deploy_checkout(self.runner, self.cfg, &self.cfg.gcp, checkout);
            outcomes.push(Outcome::Deploy(report.clone()));
            self.apply(Event::Deployed(report))?;
        }
        Ok(outcomes)
    }

    fn apply(&mut self, event: Event) -> Result<()> {
        let event_name = event.name();
        let next = transition(&self.state, event)?;
        debug!(from = self.state.name(), to = next.name(), event = event_name, "transition");
        self.state = next;
        Ok(())
    }
}

/// Run a line-oriented dialogue until the session ends or input runs out.
///
/// Prompts and operation messages go to `output`. Returns the last state,
/// which is non-terminal when `input` hit end of file first.
pub fn run_dialogue<R: CommandRunner, I: BufRead, W: Write>(
    session: &mut Session<'_, R>,
    input: I,
    mut output: W,
) -> Result<SessionState> {
    let mut lines = input.lines();
    while let Some(prompt) = session.prompt() {
        writeln!(output, "{prompt}").context("write prompt")?;
        output.flush().context("flush prompt")?;
        let Some(line) = lines.next() else {
            info!(state = session.state().name(), "input closed before session ended");
            break;
        };
        let line = line.context("read input line")?;
        for outcome in session.handle(&line)? {
            writeln!(output, "{}", outcome.message()).context("write reply")?;
        }
    }
    Ok(session.state().clone())
}
