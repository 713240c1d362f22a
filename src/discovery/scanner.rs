use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::thread;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::record::{load_record, RecordError, RemoteRecord};
use crate::remote::{RemoteError, RemoteStore};
use crate::settings::Settings;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    #[error("failed to list candidate teams under '{prefix}': {source}")]
    ListingFailure {
        prefix: String,
        source: RemoteError,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Every record found by one scan, keyed by bot name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    records: HashMap<String, RemoteRecord>,
}

impl DiscoveryResult {
    pub fn get(&self, bot_name: &str) -> Option<&RemoteRecord> {
        self.records.get(bot_name)
    }

    /// Distinct bot names, in no particular order.
    pub fn bot_names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &RemoteRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> HashMap<String, RemoteRecord> {
        self.records
    }
}

impl FromIterator<RemoteRecord> for DiscoveryResult {
    fn from_iter<I: IntoIterator<Item = RemoteRecord>>(iter: I) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|record| (record.bot_name.clone(), record))
                .collect(),
        }
    }
}

/// Scans every team under a namespace prefix for published client records.
///
/// At most `parallelism_limit` teams are probed at once. The scan is
/// all-or-nothing: if any published record fails to load, one of those
/// failures is returned and everything merged so far is dropped. Which
/// failure is reported when several occur is unspecified.
#[derive(Debug, Clone)]
pub struct DiscoveryScanner {
    trusted_root: String,
    namespace_prefix: String,
    record_filename: String,
    parallelism_limit: usize,
}

impl DiscoveryScanner {
    pub fn new(settings: &Settings) -> Self {
        Self {
            trusted_root: settings.trusted_root.clone(),
            namespace_prefix: settings.namespace_prefix.clone(),
            record_filename: settings.record_filename.clone(),
            parallelism_limit: settings.parallelism_limit.max(1),
        }
    }

    pub fn parallelism_limit(&self) -> usize {
        self.parallelism_limit
    }

    /// Remote location of the record a team would publish.
    pub fn record_location(&self, team: &str) -> String {
        format!(
            "{}/{}/{}",
            self.namespace_prefix.trim_end_matches('/'),
            team,
            self.record_filename
        )
    }

    pub fn scan<S>(&self, store: &S) -> Result<DiscoveryResult, DiscoveryError>
    where
        S: RemoteStore + ?Sized,
    {
        let teams = store
            .list(&self.namespace_prefix)
            .map_err(|source| DiscoveryError::ListingFailure {
                prefix: self.namespace_prefix.clone(),
                source,
            })?;

        let merged: Mutex<HashMap<String, RemoteRecord>> = Mutex::new(HashMap::new());
        let failure: OnceLock<RecordError> = OnceLock::new();
        let cursor = AtomicUsize::new(0);
        let workers = self.parallelism_limit.min(teams.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(team) = teams.get(index) else {
                        break;
                    };
                    match self.probe(store, team) {
                        Ok(Some(record)) => merge(&merged, team, record),
                        Ok(None) => {}
                        Err(err) => {
                            debug!(team = %team, error = %err, "client record failed to load");
                            // Only the first error to arrive is kept.
                            let _ = failure.set(err);
                        }
                    }
                });
            }
        });

        if let Some(err) = failure.into_inner() {
            return Err(err.into());
        }

        let records = merged.into_inner();
        info!(
            teams = teams.len(),
            bots = records.len(),
            "discovered published client records"
        );
        Ok(DiscoveryResult { records })
    }

    /// Loads the team's record if it has published one.
    fn probe<S>(&self, store: &S, team: &str) -> Result<Option<RemoteRecord>, RecordError>
    where
        S: RemoteStore + ?Sized,
    {
        let location = self.record_location(team);
        let exists = match store.exists(&location) {
            Ok(exists) => exists,
            Err(err) => {
                // Teams not running the bot are the common case; treat
                // errors the same way.
                debug!(location = %location, error = %err, "existence check failed, skipping team");
                false
            }
        };
        if !exists {
            return Ok(None);
        }

        debug!(location = %location, "loading client record");
        load_record(store, &location, &self.trusted_root).map(Some)
    }
}

fn merge(merged: &Mutex<HashMap<String, RemoteRecord>>, team: &str, record: RemoteRecord) {
    let mut merged = merged.lock();
    if let Some(previous) = merged.get(&record.bot_name) {
        warn!(
            bot = %record.bot_name,
            kept = %team,
            replaced = %previous.team_name,
            "bot publishes a client record in more than one team"
        );
    }
    merged.insert(record.bot_name.clone(), record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, FakeStore};
    use std::collections::HashSet;
    use std::time::Duration;

    fn scanner(limit: usize) -> DiscoveryScanner {
        DiscoveryScanner::new(&Settings {
            parallelism_limit: limit,
            ..Settings::default()
        })
    }

    #[test]
    fn test_distinct_bots_are_all_returned() {
        let mut store = FakeStore::new();
        for i in 0..25 {
            store = store.publish(&format!("team-{i}"), &format!("bot-{i}"));
        }

        let result = scanner(4).scan(&store).unwrap();

        assert_eq!(result.len(), 25);
        let names: HashSet<String> = result.bot_names().into_iter().collect();
        assert_eq!(names.len(), 25);
        assert_eq!(result.get("bot-7"), Some(&record("team-7", "bot-7")));
    }

    #[test]
    fn test_teams_without_records_are_skipped() {
        let store = FakeStore::new()
            .with_team("quiet")
            .publish("team-a", "bot-a")
            .with_team("also-quiet");

        let result = scanner(2).scan(&store).unwrap();

        assert_eq!(result.bot_names(), vec!["bot-a".to_string()]);
    }

    #[test]
    fn test_duplicate_bot_yields_one_record() {
        let store = FakeStore::new()
            .publish("team-a", "shared-bot")
            .publish("team-b", "shared-bot")
            .publish("team-c", "other-bot");

        let result = scanner(3).scan(&store).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.bot_names().len(), 2);
        assert!(result.get("shared-bot").is_some());
    }

    #[test]
    fn test_one_malformed_record_fails_whole_scan() {
        let mut store = FakeStore::new();
        for i in 0..10 {
            store = store.publish(&format!("team-{i}"), &format!("bot-{i}"));
        }
        let store = store.publish_raw("team-bad", "{\"teamname\":");

        let err = scanner(3).scan(&store).unwrap_err();

        assert!(matches!(
            err,
            DiscoveryError::Record(RecordError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_one_of_several_errors_is_reported() {
        let store = FakeStore::new()
            .publish_raw("team-a", "{}")
            .publish_raw("team-b", "[")
            .publish("team-c", "bot-c");

        let err = scanner(2).scan(&store).unwrap_err();

        match err {
            DiscoveryError::Record(err) => {
                assert!(err.location().contains("team-a") || err.location().contains("team-b"));
            }
            other => panic!("expected a record error, got {other}"),
        }
    }

    #[test]
    fn test_existence_errors_count_as_absent() {
        let store = FakeStore::new()
            .publish("team-a", "bot-a")
            .publish("team-b", "bot-b")
            .failing_exists("team-b");

        let result = scanner(2).scan(&store).unwrap();

        assert_eq!(result.bot_names(), vec!["bot-a".to_string()]);
    }

    #[test]
    fn test_read_errors_fail_the_scan() {
        let store = FakeStore::new()
            .publish("team-a", "bot-a")
            .failing_read("team-a");

        let err = scanner(2).scan(&store).unwrap_err();

        assert!(matches!(
            err,
            DiscoveryError::Record(RecordError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_listing_failure_is_fatal() {
        let store = FakeStore::new().publish("team-a", "bot-a").failing_list();

        let err = scanner(2).scan(&store).unwrap_err();

        assert!(matches!(err, DiscoveryError::ListingFailure { .. }));
    }

    #[test]
    fn test_empty_listing_is_empty_result() {
        let result = scanner(4).scan(&FakeStore::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_in_flight_probes_never_exceed_limit() {
        let mut store = FakeStore::new().with_delay(Duration::from_millis(5));
        for i in 0..30 {
            store = store.publish(&format!("team-{i}"), &format!("bot-{i}"));
        }

        let result = scanner(3).scan(&store).unwrap();

        assert_eq!(result.len(), 30);
        assert!(store.max_in_flight() <= 3, "saw {}", store.max_in_flight());
        assert!(store.max_in_flight() >= 1);
    }

    #[test]
    fn test_limit_larger_than_team_count() {
        let store = FakeStore::new()
            .publish("team-a", "bot-a")
            .publish("team-b", "bot-b");

        let result = scanner(64).scan(&store).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(store.list_calls(), 1);
    }

    #[test]
    fn test_record_location_tolerates_missing_trailing_slash() {
        let scanner = DiscoveryScanner::new(&Settings {
            namespace_prefix: "/keybase/team".into(),
            ..Settings::default()
        });
        assert_eq!(
            scanner.record_location("acme"),
            "/keybase/team/acme/kssh-client.config"
        );
    }
}
