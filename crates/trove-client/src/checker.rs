//! Batched update checking.
//!
//! One batch enumerates every finished installation, groups rows by
//! game, and walks a round-robin queue: each game gets one fetch
//! attempt per turn, and a transient failure sends it to the back of
//! the queue instead of retrying in place. One slow or failing game
//! therefore never blocks verdicts for the others.
//!
//! Verdicts are persisted (overwriting the previous one) as they
//! arrive; cancellation aborts the remainder of the queue without
//! recording anything for the unvisited games.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use trove_core::{
    CheckEvent, CheckEventEmitter, CheckResultRepository, DownloadPageInfo, FetchError,
    GameRepository, HttpClientPort, InstallStatus, Installation, InstallationRepository,
    PageParser, Repos, SelfUpdateStrategy, UpdateCheckResult, compare_uploads,
};

use crate::config::CheckConfig;
use crate::resolver::{DownloadUrlResolver, ResolvedAccess};

/// Marks one game as the app's own update channel and carries the
/// version ordering used for it.
#[derive(Clone)]
pub struct SelfUpdateChannel {
    /// The game ID of the app's own store listing.
    pub game_id: i64,
    /// Version-tag ordering against the running build.
    pub strategy: Arc<dyn SelfUpdateStrategy>,
}

/// Summary of one finished batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckBatchOutcome {
    /// Verdicts persisted, including silent up-to-date ones.
    pub completed: u32,
    /// Installations that ended in an error verdict.
    pub failed: u32,
    /// Whether the batch was cut short by cancellation.
    pub cancelled: bool,
}

/// One game's pending work in the retry queue.
struct GameTask {
    game_id: i64,
    installs: Vec<Installation>,
    attempts: u8,
}

/// Drives update checks for every finished installation.
pub struct UpdateChecker {
    http: Arc<dyn HttpClientPort>,
    parser: Arc<dyn PageParser>,
    resolver: DownloadUrlResolver,
    repos: Repos,
    emitter: Arc<dyn CheckEventEmitter>,
    config: CheckConfig,
    self_update: Option<SelfUpdateChannel>,
}

impl UpdateChecker {
    /// Create a checker over the given collaborators.
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        parser: Arc<dyn PageParser>,
        repos: Repos,
        emitter: Arc<dyn CheckEventEmitter>,
        config: CheckConfig,
    ) -> Self {
        let resolver = DownloadUrlResolver::new(Arc::clone(&http), Arc::clone(&parser));
        Self {
            http,
            parser,
            resolver,
            repos,
            emitter,
            config,
            self_update: None,
        }
    }

    /// Mark one game as the app's own update channel.
    #[must_use]
    pub fn with_self_update(mut self, channel: SelfUpdateChannel) -> Self {
        self.self_update = Some(channel);
        self
    }

    /// Run one batch over every finished installation.
    ///
    /// Never panics and never returns early with an error: per-game
    /// failures become persisted error verdicts, and only cancellation
    /// stops the queue.
    pub async fn run_batch(&self, cancel: &CancellationToken) -> CheckBatchOutcome {
        let mut outcome = CheckBatchOutcome::default();

        let finished = match self.load_finished_installs().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "could not enumerate installations for update check");
                return outcome;
            }
        };

        let total = u32::try_from(finished.len()).unwrap_or(u32::MAX);
        let mut queue = group_by_game(finished);
        self.emitter.emit(CheckEvent::BatchStarted { total });

        while let Some(mut task) = queue.pop_front() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            match self.check_game(&task).await {
                Ok(results) => {
                    for result in results {
                        if self.persist_and_emit(result).await {
                            outcome.completed += 1;
                        } else {
                            outcome.failed += 1;
                        }
                    }
                }
                Err(e) if e.is_cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                Err(e) if e.is_recoverable() && task.attempts + 1 < self.config.max_attempts => {
                    task.attempts += 1;
                    debug!(
                        game = task.game_id,
                        attempt = task.attempts,
                        error = %e,
                        "update check attempt failed, requeueing"
                    );
                    queue.push_back(task);

                    // Fixed short backoff; the queue order already keeps
                    // this game from hogging the next turn
                    tokio::select! {
                        () = cancel.cancelled() => {
                            outcome.cancelled = true;
                            break;
                        }
                        () = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
                Err(e) => {
                    warn!(game = task.game_id, error = %e, "update check failed terminally");
                    let report = e.report();
                    for install in &task.installs {
                        let result =
                            UpdateCheckResult::error(install.internal_id, report.clone());
                        self.persist_and_emit(result).await;
                        outcome.failed += 1;
                    }
                }
            }
        }

        self.emitter.emit(CheckEvent::BatchFinished {
            completed: outcome.completed,
            failed: outcome.failed,
            cancelled: outcome.cancelled,
        });
        outcome
    }

    /// One fetch attempt for one game, producing a verdict per
    /// installation of that game.
    async fn check_game(&self, task: &GameTask) -> Result<Vec<UpdateCheckResult>, FetchError> {
        let game = self
            .repos
            .games
            .get(task.game_id)
            .await
            .map_err(|e| FetchError::other(e.to_string()))?
            .ok_or_else(|| {
                FetchError::other(format!("game {} has no store record", task.game_id))
            })?;

        // A cached permanent page skips URL resolution entirely
        let access = match &game.download_page {
            Some(page) => ResolvedAccess::Granted(page.clone()),
            None => self.resolver.resolve(&game).await?,
        };

        let page = match access {
            ResolvedAccess::Granted(page) => page,
            ResolvedAccess::Denied => {
                // Payment walls are a verdict, not an error; point the
                // user at the store page
                let store_page =
                    DownloadPageInfo::new(&game.store_url).with_store_page(true);
                return Ok(task
                    .installs
                    .iter()
                    .map(|install| {
                        UpdateCheckResult::access_denied(install.internal_id)
                            .with_download_page(store_page.clone())
                    })
                    .collect());
            }
        };

        let response = self.http.get(&page.url).await?;
        if !response.is_success() {
            return Err(FetchError::network_with_status(
                format!("download page fetch failed for {}", page.url),
                response.status,
            ));
        }

        let candidates = self.parser.parse_candidates(&response.body, game.game_id);

        let strategy: Option<&dyn SelfUpdateStrategy> = self
            .self_update
            .as_ref()
            .filter(|channel| channel.game_id == game.game_id)
            .map(|channel| channel.strategy.as_ref());

        Ok(task
            .installs
            .iter()
            .map(|install| {
                compare_uploads(install, &candidates, strategy)
                    .with_download_page(page.clone())
            })
            .collect())
    }

    /// Persist a verdict and emit it when notifiable. Returns whether
    /// persistence succeeded.
    async fn persist_and_emit(&self, result: UpdateCheckResult) -> bool {
        match self.repos.checks.upsert(&result).await {
            Ok(()) => {
                if result.code.is_notifiable() {
                    self.emitter.emit(CheckEvent::ResultReady { result });
                }
                true
            }
            Err(e) => {
                warn!(
                    installation = result.installation_id,
                    error = %e,
                    "failed to persist check result"
                );
                false
            }
        }
    }

    async fn load_finished_installs(&self) -> Result<Vec<Installation>, FetchError> {
        let mut rows = self
            .repos
            .installations
            .list_by_status(InstallStatus::Installed)
            .await
            .map_err(|e| FetchError::other(e.to_string()))?;
        let web_cached = self
            .repos
            .installations
            .list_by_status(InstallStatus::WebCached)
            .await
            .map_err(|e| FetchError::other(e.to_string()))?;
        rows.extend(web_cached);
        Ok(rows)
    }
}

/// Group installations into per-game tasks, ordered by game ID so a
/// batch visits games deterministically.
fn group_by_game(installs: Vec<Installation>) -> VecDeque<GameTask> {
    let mut by_game: HashMap<i64, Vec<Installation>> = HashMap::new();
    for install in installs {
        by_game.entry(install.game_id).or_default().push(install);
    }

    let mut game_ids: Vec<i64> = by_game.keys().copied().collect();
    game_ids.sort_unstable();

    game_ids
        .into_iter()
        .map(|game_id| GameTask {
            game_id,
            installs: by_game.remove(&game_id).unwrap_or_default(),
            attempts: 0,
        })
        .collect()
}
