//! Scripted transport replaying canned device output

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use netprov_core::{DeviceProfile, Dialect};

use crate::transport::{Transport, TransportConnector, TransportError};

/// Something that happened against a scripted device, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Connect(Dialect),
    Command(String),
    Config(Vec<String>),
    Disconnect,
    /// Free-form marker written by other test doubles sharing the journal
    Note(String),
}

/// Shared, ordered record of scripted device activity.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, entry: JournalEntry) {
        self.lock().push(entry);
    }

    pub fn note(&self, text: impl Into<String>) {
        self.record(JournalEntry::Note(text.into()));
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    pub fn connects(&self) -> Vec<Dialect> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Connect(dialect) => Some(*dialect),
                _ => None,
            })
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Command(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn config_sets(&self) -> Vec<Vec<String>> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Config(lines) => Some(lines.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// How a scripted connect attempt fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Timeout,
    Authentication,
    Refused,
}

#[derive(Debug, Default)]
struct Script {
    outputs: HashMap<String, VecDeque<String>>,
    failures: HashMap<Dialect, ScriptedFailure>,
    hang: Vec<String>,
}

/// Connector for tests: answers commands from a script and journals
/// everything it is asked to do.
///
/// Each command maps to a queue of outputs; the front is consumed on every
/// call except the last, which keeps answering. Unknown commands return an
/// empty string.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    journal: Journal,
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            script: Arc::default(),
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `output` as the next answer to `command`
    pub fn respond(&self, command: &str, output: impl Into<String>) -> &Self {
        self.script()
            .outputs
            .entry(command.to_string())
            .or_default()
            .push_back(output.into());
        self
    }

    /// Make connect attempts with `dialect` fail
    pub fn fail_dialect(&self, dialect: Dialect, failure: ScriptedFailure) -> &Self {
        self.script().failures.insert(dialect, failure);
        self
    }

    /// `command` never answers
    pub fn hang_on(&self, command: &str) -> &Self {
        self.script().hang.push(command.to_string());
        self
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    async fn connect(&self, profile: &DeviceProfile) -> Result<Box<dyn Transport>, TransportError> {
        self.journal.record(JournalEntry::Connect(profile.dialect));
        let failure = self.script().failures.get(&profile.dialect).copied();
        match failure {
            Some(ScriptedFailure::Timeout) => {
                Err(TransportError::Timeout(format!("{} did not answer", profile.address())))
            }
            Some(ScriptedFailure::Authentication) => {
                Err(TransportError::Authentication(profile.username.clone()))
            }
            Some(ScriptedFailure::Refused) => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            None => Ok(Box::new(ScriptedTransport {
                journal: self.journal.clone(),
                script: self.script.clone(),
            })),
        }
    }
}

struct ScriptedTransport {
    journal: Journal,
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    fn answer(&self, command: &str) -> Option<String> {
        let mut script = self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if script.hang.iter().any(|hang| hang == command) {
            return None;
        }
        let output = match script.outputs.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => String::new(),
        };
        Some(output)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_command(
        &mut self,
        command: &str,
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        self.journal.record(JournalEntry::Command(command.to_string()));
        match self.answer(command) {
            Some(output) => Ok(output),
            None => std::future::pending().await,
        }
    }

    async fn send_config_set(
        &mut self,
        commands: &[String],
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        self.journal.record(JournalEntry::Config(commands.to_vec()));
        Ok(String::new())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.journal.record(JournalEntry::Disconnect);
        Ok(())
    }
}
