//! Runs the two install tasks with overlapping fetch phases.
//!
//! The Yarn fetch runs in the background on a buffered reporter while
//! the Node fetch runs in the foreground; the background output is
//! replayed as one block after the join. Install phases are strictly
//! sequential and only start once both fetches have succeeded, since
//! they perform irreversible linking and purging.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::Result;
use crate::http::HttpClient;
use crate::report::Reporter;
use crate::task::{NodeTask, YarnTask};

pub struct Orchestrator {
    node: NodeTask,
    yarn: Arc<YarnTask>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Result<Self> {
        let http = Arc::new(HttpClient::new()?);
        Ok(Self {
            node: NodeTask::new(config.clone(), Arc::clone(&http)),
            yarn: Arc::new(YarnTask::new(config, http)),
        })
    }

    pub async fn run(&self) -> Result<()> {
        let reporter = Reporter::direct();
        let yarn_reporter = Arc::new(Reporter::buffered());

        let background = {
            let yarn = Arc::clone(&self.yarn);
            let yarn_reporter = Arc::clone(&yarn_reporter);
            tokio::spawn(async move { yarn.fetch(&yarn_reporter).await })
        };

        join_phases(self.node.fetch(&reporter), background, &yarn_reporter).await?;

        self.node.install(&reporter).await?;
        self.yarn.install(&reporter).await?;

        reporter.success("All tools installed");
        Ok(())
    }
}

/// Join the foreground and background fetch phases.
///
/// A foreground failure wins immediately; the background task is
/// cancelled without waiting. Otherwise the background task is awaited,
/// its buffered output is replayed as one block, and only then does its
/// outcome decide, so its diagnostics always reach the operator.
pub(crate) async fn join_phases<F>(
    foreground: F,
    background: JoinHandle<Result<()>>,
    background_reporter: &Reporter,
) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    if let Err(e) = foreground.await {
        background.abort();
        return Err(e);
    }

    let background_result = background.await;
    background_reporter.flush();

    background_result?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn download_err(url: &str) -> ProvisionError {
        ProvisionError::Download {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        }
    }

    #[tokio::test]
    async fn test_both_phases_succeed() {
        let reporter = Arc::new(Reporter::buffered());
        let background = {
            let reporter = Arc::clone(&reporter);
            tokio::spawn(async move {
                reporter.progress("background line");
                Ok(())
            })
        };

        join_phases(async { Ok(()) }, background, &reporter)
            .await
            .unwrap();

        // Buffered output was replayed during the join
        assert_eq!(reporter.pending(), 0);
    }

    #[tokio::test]
    async fn test_foreground_failure_wins_and_cancels_background() {
        let background_finished = Arc::new(AtomicBool::new(false));
        let reporter = Arc::new(Reporter::buffered());

        let background = {
            let finished = Arc::clone(&background_finished);
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        };

        let err = join_phases(
            async { Err(download_err("https://nodejs.org/dist/x.tar.gz")) },
            background,
            &reporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProvisionError::Download { .. }));
        assert!(!background_finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_background_failure_reported_after_flush() {
        let reporter = Arc::new(Reporter::buffered());
        let background = {
            let reporter = Arc::clone(&reporter);
            tokio::spawn(async move {
                reporter.error("yarn download failed");
                Err(download_err("https://yarnpkg.example/yarn.tar.gz"))
            })
        };

        let err = join_phases(async { Ok(()) }, background, &reporter)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Download { .. }));
        // Diagnostics were replayed before the failure propagated
        assert_eq!(reporter.pending(), 0);
    }

    /// The two fetch phases must genuinely overlap. Each side signals
    /// the other and then waits for the reverse signal, so the join can
    /// only finish when both phases are in flight at the same time; a
    /// sequential implementation would deadlock and trip the timeout.
    #[tokio::test]
    async fn test_fetch_phases_run_concurrently() {
        let (fg_tx, fg_rx) = tokio::sync::oneshot::channel::<()>();
        let (bg_tx, bg_rx) = tokio::sync::oneshot::channel::<()>();
        let reporter = Arc::new(Reporter::buffered());

        let background = tokio::spawn(async move {
            bg_tx.send(()).unwrap();
            fg_rx.await.unwrap();
            Ok(())
        });

        let foreground = async move {
            fg_tx.send(()).unwrap();
            bg_rx.await.unwrap();
            Ok(())
        };

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            join_phases(foreground, background, &reporter),
        )
        .await
        .expect("fetch phases did not overlap")
        .unwrap();
    }

    #[tokio::test]
    async fn test_background_waits_for_foreground_success() {
        let reporter = Arc::new(Reporter::buffered());
        let background = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(())
        });

        // Foreground finishes first; join still waits for the background
        join_phases(async { Ok(()) }, background, &reporter)
            .await
            .unwrap();
    }
}
