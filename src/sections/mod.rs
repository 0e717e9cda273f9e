//! The three independently generated parts of the output.
pub mod flows;
pub mod resources;
pub mod runnables;
pub mod scripts;

use std::fmt;

use tokio::sync::mpsc::UnboundedSender;

use crate::context::GenerationContext;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Resources,
    Scripts,
    Flows,
}

impl SectionKind {
    /// Order in which section buffers are concatenated.
    pub const ORDER: [SectionKind; 3] = [SectionKind::Resources, SectionKind::Scripts, SectionKind::Flows];

    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Resources => "resources",
            SectionKind::Scripts => "scripts",
            SectionKind::Flows => "flows",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionState {
    Fetching,
    Transforming,
    Emitting,
    Done,
    Errored(String),
}

impl SectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SectionState::Done | SectionState::Errored(_))
    }
}

/// One state change of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub section: SectionKind,
    pub state: SectionState,
}

/// Publishes a section's state changes to the log and, when someone is
/// listening, to the progress channel.
#[derive(Debug, Clone)]
pub struct Reporter {
    section: SectionKind,
    tx: Option<UnboundedSender<Progress>>,
}

impl Reporter {
    pub fn new(section: SectionKind, tx: Option<UnboundedSender<Progress>>) -> Self {
        Self { section, tx }
    }

    pub fn report(&self, state: SectionState) {
        match &state {
            SectionState::Errored(message) => tracing::warn!(section = %self.section, %message, "section failed"),
            state => tracing::debug!(section = %self.section, ?state, "section state"),
        }
        if let Some(tx) = &self.tx {
            // Nobody listening any more is fine.
            let _ = tx.send(Progress { section: self.section, state });
        }
    }
}

/// Generate one section into `ctx`, reporting the terminal state either way.
pub async fn run(kind: SectionKind, ctx: &mut GenerationContext<'_>, reporter: &Reporter) -> Result<()> {
    let result = match kind {
        SectionKind::Resources => resources::generate(ctx, reporter).await,
        SectionKind::Scripts => scripts::generate(ctx, reporter).await,
        SectionKind::Flows => flows::generate(ctx, reporter).await,
    };
    match &result {
        Ok(()) => reporter.report(SectionState::Done),
        Err(e) => reporter.report(SectionState::Errored(e.to_string())),
    }
    result
}
