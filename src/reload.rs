//! Background reloading of the key file
//!
//! The loader never retries on its own. These tasks call it again when the
//! process receives SIGHUP or when the key file's modification time moves.
//! A rejected reload keeps the previous keys and is only logged.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::config::SystemConfig;
use crate::keys::{KeyLoader, KeyStore, LoadOutcome, LoaderLimits};
use crate::types::Result;

/// What to reload and how
#[derive(Debug, Clone)]
pub struct ReloadConfig {
    pub key_file: PathBuf,
    pub limits: LoaderLimits,
    /// Modification-time polling period; `None` disables polling
    pub poll_interval: Option<Duration>,
}

impl From<&SystemConfig> for ReloadConfig {
    fn from(config: &SystemConfig) -> Self {
        Self {
            key_file: config.keys.file.clone(),
            limits: LoaderLimits::from(&config.limits),
            poll_interval: config.keys.reload_period(),
        }
    }
}

/// Run one load on the blocking pool and log how it went
pub async fn reload(
    store: &'static KeyStore,
    config: &ReloadConfig,
    trigger: &str,
) -> Option<LoadOutcome> {
    let key_file = config.key_file.clone();
    let limits = config.limits;
    let span = crate::logging::reload_span(trigger);
    let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());

    let result = tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            let _entered = span.enter();
            KeyLoader::with_limits(store, limits).load(&key_file)
        })
    })
    .await;

    match result {
        Ok(outcome) => {
            if outcome.committed {
                info!(
                    trigger = %trigger,
                    keys = outcome.accepted_count,
                    generation = outcome.generation,
                    "Keys reloaded"
                );
            } else if let Some(reason) = &outcome.abort_reason {
                // The loader has already logged the failure itself
                debug!(
                    trigger = %trigger,
                    reason = %reason,
                    generation = outcome.generation,
                    "Reload rejected, previous keys remain active"
                );
            }
            Some(outcome)
        }
        Err(e) => {
            error!(trigger = %trigger, error = %e, "Reload task failed");
            None
        }
    }
}

/// Reload whenever the process receives SIGHUP
pub fn spawn_signal_task(store: &'static KeyStore, config: ReloadConfig) -> Result<JoinHandle<()>> {
    let mut hangup = signal(SignalKind::hangup())?;

    info!(key_file = %config.key_file.display(), "Reloading keys on SIGHUP");

    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP");
            reload(store, &config, "sighup").await;
        }
    }))
}

/// Reload whenever the key file's modification time changes
///
/// Returns `None` when polling is disabled.
pub fn spawn_poll_task(store: &'static KeyStore, config: ReloadConfig) -> Option<JoinHandle<()>> {
    let period = config.poll_interval?;

    info!(
        key_file = %config.key_file.display(),
        interval_ms = period.as_millis() as u64,
        "Starting key file poll task"
    );

    Some(tokio::spawn(async move {
        let mut last_seen = modified_time(&config).await;
        let mut tick = interval(period);
        // The first tick completes immediately
        tick.tick().await;

        loop {
            tick.tick().await;

            let current = modified_time(&config).await;
            if current.is_none() || current == last_seen {
                continue;
            }

            debug!(key_file = %config.key_file.display(), "Key file modified");
            last_seen = current;
            reload(store, &config, "poll").await;
        }
    }))
}

async fn modified_time(config: &ReloadConfig) -> Option<SystemTime> {
    match tokio::fs::metadata(&config.key_file).await {
        Ok(metadata) => metadata.modified().ok(),
        Err(e) => {
            debug!(key_file = %config.key_file.display(), error = %e, "Cannot stat key file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::EventCollector;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::time::sleep;
    use tracing::Level;

    fn leaked_store() -> &'static KeyStore {
        Box::leak(Box::new(KeyStore::new()))
    }

    fn key_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn reload_config(file: &NamedTempFile, poll_interval: Option<Duration>) -> ReloadConfig {
        ReloadConfig {
            key_file: file.path().to_path_buf(),
            limits: LoaderLimits::default(),
            poll_interval,
        }
    }

    #[tokio::test]
    async fn test_reload_commits() {
        let store = leaked_store();
        let file = key_file("1 MD5 one\n");

        let outcome = reload(store, &reload_config(&file, None), "test").await.unwrap();
        assert!(outcome.committed);
        assert!(store.snapshot().contains(1));
    }

    #[tokio::test]
    async fn test_rejected_reload_keeps_keys() {
        let store = leaked_store();
        let good = key_file("1 MD5 one\n");
        reload(store, &reload_config(&good, None), "test").await.unwrap();

        let bad = key_file("0 MD5 zero\n");
        let outcome = reload(store, &reload_config(&bad, None), "test").await.unwrap();
        assert!(!outcome.committed);
        assert!(store.snapshot().contains(1));
        assert_eq!(store.snapshot().generation(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_reported_once() {
        let events = EventCollector::default();
        let _guard = events.install();

        let config = ReloadConfig {
            key_file: PathBuf::from("/nonexistent/authkeys/reload.keys"),
            limits: LoaderLimits::default(),
            poll_interval: None,
        };
        let outcome = reload(leaked_store(), &config, "test").await.unwrap();
        assert!(!outcome.committed);

        let reported = events.at_least(Level::WARN);
        assert_eq!(reported.len(), 1, "{:?}", reported);
        assert_eq!(reported[0].0, Level::ERROR);
        assert!(reported[0].1.contains("reload.keys"));
    }

    #[tokio::test]
    async fn test_rejected_reload_not_reported_twice() {
        let events = EventCollector::default();
        let _guard = events.install();

        let bad = key_file("0 MD5 zero\n");
        reload(leaked_store(), &reload_config(&bad, None), "test").await.unwrap();

        let reported = events.at_least(Level::WARN);
        // One entry error and one rejection line, both from the loader
        assert_eq!(reported.len(), 2, "{:?}", reported);
        assert!(reported.iter().all(|(level, _)| *level == Level::ERROR));
    }

    #[tokio::test]
    async fn test_poll_disabled() {
        let file = key_file("");
        assert!(spawn_poll_task(leaked_store(), reload_config(&file, None)).is_none());
    }

    #[tokio::test]
    async fn test_poll_task_picks_up_changes() {
        let store = leaked_store();
        let file = key_file("1 MD5 one\n");
        let config = reload_config(&file, Some(Duration::from_millis(50)));
        reload(store, &config, "startup").await.unwrap();

        let handle = spawn_poll_task(store, config).unwrap();
        sleep(Duration::from_millis(100)).await;

        std::fs::write(file.path(), b"2 MD5 two\n").unwrap();
        std::fs::File::options()
            .write(true)
            .open(file.path())
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();

        let mut reloaded = false;
        for _ in 0..100 {
            if store.snapshot().contains(2) {
                reloaded = true;
                break;
            }
            sleep(Duration::from_millis(50)).await;
        }
        handle.abort();

        assert!(reloaded);
        assert!(!store.snapshot().contains(1));
    }
}
