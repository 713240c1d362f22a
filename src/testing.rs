//! Shared fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::discovery::RemoteRecord;
use crate::remote::{RemoteError, RemoteStore};
use crate::settings::{DEFAULT_NAMESPACE_PREFIX, DEFAULT_RECORD_FILENAME};

pub(crate) fn record_path(team: &str) -> String {
    format!("{DEFAULT_NAMESPACE_PREFIX}{team}/{DEFAULT_RECORD_FILENAME}")
}

pub(crate) fn record(team: &str, bot: &str) -> RemoteRecord {
    RemoteRecord {
        team_name: team.to_string(),
        channel_name: String::new(),
        bot_name: bot.to_string(),
    }
}

/// In-memory remote store laid out like the default team namespace.
///
/// Tracks how many `exists`/`read` calls are running at once so tests can
/// check the scanner's concurrency cap.
#[derive(Debug, Default)]
pub(crate) struct FakeStore {
    teams: Vec<String>,
    files: HashMap<String, Vec<u8>>,
    fail_list: bool,
    fail_exists: HashSet<String>,
    fail_read: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    lists: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A team that is listed but has no record.
    pub(crate) fn with_team(mut self, team: &str) -> Self {
        self.teams.push(team.to_string());
        self
    }

    pub(crate) fn publish(self, team: &str, bot: &str) -> Self {
        let bytes = serde_json::to_vec(&record(team, bot)).unwrap();
        self.publish_raw(team, bytes)
    }

    pub(crate) fn publish_raw(mut self, team: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.teams.push(team.to_string());
        self.files.insert(record_path(team), bytes.into());
        self
    }

    pub(crate) fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub(crate) fn failing_exists(mut self, team: &str) -> Self {
        self.fail_exists.insert(record_path(team));
        self
    }

    pub(crate) fn failing_read(mut self, team: &str) -> Self {
        self.fail_read.insert(record_path(team));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RemoteStore for FakeStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(RemoteError::Unavailable(format!("cannot list {prefix}")));
        }
        if prefix != DEFAULT_NAMESPACE_PREFIX {
            return Ok(Vec::new());
        }
        Ok(self.teams.clone())
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        self.enter();
        let result = if self.fail_exists.contains(path) {
            Err(RemoteError::Unavailable(format!("stat {path}")))
        } else {
            Ok(self.files.contains_key(path))
        };
        self.leave();
        result
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.enter();
        let result = if self.fail_read.contains(path) {
            Err(RemoteError::Unavailable(format!("read {path}")))
        } else {
            self.files.get(path).cloned().ok_or_else(|| RemoteError::Io {
                path: path.to_string(),
                source: std::io::ErrorKind::NotFound.into(),
            })
        };
        self.leave();
        result
    }
}
