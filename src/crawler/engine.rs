//! Crawl engine - main crawl orchestration logic
//!
//! A single coordinating task owns the [`Frontier`] and the
//! [`KnowledgeStore`]. It dispatches up to `workers` URLs at a time onto a
//! [`JoinSet`]; every worker runs the full per-URL pipeline
//! (fetch → classify → extract or escalate → fingerprint → write) and hands
//! its result back. Only the coordinator mutates crawl state, so the frontier
//! needs no lock and checkpoints never race.

use crate::config::{Config, ExhaustedPolicy};
use crate::crawler::fetcher::{fetch_with_retry, FetchedResource, Fetcher, RetryPolicy};
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::{document_text, extract_links, parse_document};
use crate::legal::{is_gated, EscalationResult, Escalator, LegalStatus};
use crate::output::OutputLayout;
use crate::resource::{classify, fingerprint, Payload, ResourceKind};
use crate::state::{Stage, StageTracker};
use crate::storage::{
    load_checkpoint, open_checkpoint, Checkpoint, CheckpointState, CrawlEntry, KnowledgeStore,
    SkipRecord, StorageError,
};
use crate::{ConfigError, CrawlError};
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinError, JoinSet};
use url::Url;

/// Attempts made to write a checkpoint before giving up
const CHECKPOINT_ATTEMPTS: u32 = 3;

/// Base pause between checkpoint attempts, multiplied by the attempt number
const CHECKPOINT_BACKOFF: Duration = Duration::from_millis(200);

/// Reason recorded for URLs outside the crawl scope
const OUT_OF_SCOPE: &str = "out of scope";

/// Reason recorded for URLs whose worker panicked
const WORKER_PANICKED: &str = "worker panicked";

type Workers = JoinSet<(String, Result<Processed, CrawlError>)>;

/// Summary of a crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// URLs recorded in the knowledge store during this run
    pub completed: usize,

    /// URLs given up on (exhausted retries, out of scope, pipeline errors)
    pub skipped: usize,

    /// Gated pages that were escalated successfully
    pub escalated: usize,

    /// Resolved legal documents stored
    pub legal_documents: usize,

    /// New URLs added to the frontier
    pub links_enqueued: usize,

    pub checkpoints: usize,
    pub elapsed: Duration,

    /// True if the run stopped on a shutdown signal
    pub interrupted: bool,
}

/// Result of the pipeline for one URL
#[derive(Debug)]
struct Processed {
    entry: CrawlEntry,

    /// Links to feed back into the frontier
    discovered: Vec<String>,
}

/// Collaborators and settings shared by all workers
struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    escalator: Escalator,
    retry: RetryPolicy,
    layout: OutputLayout,
    write: bool,
    sniff_content_type: bool,
    gate_marker: String,
    filter: Option<Regex>,
    legal_counter: AtomicU64,
}

/// Outcome of inspecting a markup body
enum Markup {
    Gated,
    Open { links: Vec<String>, text: String },
}

/// Crawl engine
pub struct CrawlEngine {
    pipeline: Arc<Pipeline>,
    frontier: Frontier,
    store: KnowledgeStore,
    start_urls: Vec<String>,
    scope: Vec<String>,
    workers: usize,
    checkpoint_interval: usize,
    on_exhausted: ExhaustedPolicy,
    since_checkpoint: usize,
    report: CrawlReport,
}

impl CrawlEngine {
    /// Creates an engine with an empty frontier
    ///
    /// The output layout is created here: every bucket when writing is
    /// enabled, otherwise only the overview directory that holds checkpoints.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated crawler configuration
    /// * `fetcher` - HTTP collaborator
    /// * `escalator` - Resolves gated pages
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        escalator: Escalator,
    ) -> Result<Self, CrawlError> {
        let filter = if config.filter.enabled {
            Some(
                Regex::new(&config.filter.pattern)
                    .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?,
            )
        } else {
            None
        };

        let layout = OutputLayout::new(&config.output.write_dir);
        if config.output.write {
            layout.ensure()?;
        } else {
            layout.ensure_overview()?;
        }

        let pipeline = Pipeline {
            fetcher,
            escalator,
            retry: RetryPolicy::from_config(&config.crawler),
            layout,
            write: config.output.write,
            sniff_content_type: config.crawler.sniff_content_type,
            gate_marker: config.legal.gate_marker.clone(),
            filter,
            legal_counter: AtomicU64::new(0),
        };

        Ok(Self {
            pipeline: Arc::new(pipeline),
            frontier: Frontier::new(),
            store: KnowledgeStore::new(),
            start_urls: config.crawler.start_urls.clone(),
            scope: config.crawler.scope.clone(),
            workers: config.crawler.workers.max(1),
            checkpoint_interval: config.crawler.checkpoint_interval.max(1),
            on_exhausted: config.crawler.on_exhausted,
            since_checkpoint: 0,
            report: CrawlReport::default(),
        })
    }

    /// Restores the last checkpoint unless `fresh`, then seeds the start URLs
    ///
    /// Seeding is idempotent, so start URLs already processed in a previous
    /// run are not queued again.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A checkpoint was restored
    /// * `Ok(false)` - The crawl starts from the start URLs only
    pub fn restore_or_seed(&mut self, fresh: bool) -> Result<bool, CrawlError> {
        let restored = if fresh {
            tracing::info!("Starting fresh crawl, ignoring any existing checkpoint");
            false
        } else {
            match load_checkpoint(&self.pipeline.layout.checkpoint_path())? {
                Some(state) => {
                    tracing::info!(
                        "Resuming from checkpoint of {}: {} entries, {} pending, {} done",
                        state.checkpointed_at.to_rfc3339(),
                        state.store.len(),
                        state.frontier.pending.len(),
                        state.frontier.done.len()
                    );
                    self.restore(state);
                    true
                }
                None => {
                    tracing::info!("No checkpoint found, starting new crawl");
                    false
                }
            }
        };

        let seeded = self.frontier.seed(self.start_urls.iter().cloned());
        tracing::info!("Seeded frontier with {} start URL(s)", seeded);

        Ok(restored)
    }

    /// Replaces the crawl state with a checkpoint
    pub fn restore(&mut self, state: CheckpointState) {
        self.frontier = Frontier::restore(state.frontier);
        self.store = state.store;
        self.pipeline
            .legal_counter
            .store(state.legal_counter, Ordering::SeqCst);
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Mutable access for seeding additional URLs before a run
    pub fn frontier_mut(&mut self) -> &mut Frontier {
        &mut self.frontier
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.pipeline.layout
    }

    /// Next number used for a gated page
    pub fn legal_counter(&self) -> u64 {
        self.pipeline.legal_counter.load(Ordering::SeqCst)
    }

    /// Runs until the frontier is drained
    pub async fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs until the frontier is drained or `shutdown` resolves
    ///
    /// On shutdown, in-flight workers are aborted; their URLs stay pending in
    /// the final checkpoint. With [`ExhaustedPolicy::Abort`], a URL that fails
    /// every fetch attempt stops the crawl after a checkpoint has been written.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlReport, CrawlError>
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();
        self.report = CrawlReport::default();
        tokio::pin!(shutdown);

        tracing::info!(
            "Starting crawl with {} worker(s), {} URL(s) pending",
            self.workers,
            self.frontier.pending_len()
        );

        let mut tasks = Workers::new();
        let mut in_flight: HashMap<Id, String> = HashMap::new();

        loop {
            if let Err(e) = self.dispatch(&mut tasks, &mut in_flight).await {
                return self.abort(tasks, e).await;
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::warn!(
                        "Shutdown requested, stopping {} in-flight URL(s)",
                        tasks.len()
                    );
                    self.report.interrupted = true;
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((id, (url, result)))) => {
                        in_flight.remove(&id);
                        if let Err(e) = self.handle(url, result).await {
                            return self.abort(tasks, e).await;
                        }
                    }
                    Some(Err(e)) => {
                        let url = in_flight.remove(&e.id());
                        if let Err(e) = self.handle_failed_worker(url, e).await {
                            return self.abort(tasks, e).await;
                        }
                    }
                    None => {}
                },
            }
        }

        self.checkpoint().await?;
        self.report.elapsed = start.elapsed();

        tracing::info!(
            "Crawl {}: {} completed, {} skipped, {} escalated, {} checkpoint(s) in {:.1}s",
            if self.report.interrupted { "interrupted" } else { "finished" },
            self.report.completed,
            self.report.skipped,
            self.report.escalated,
            self.report.checkpoints,
            self.report.elapsed.as_secs_f64()
        );

        Ok(self.report.clone())
    }

    /// Stops every worker, writes a checkpoint and returns `error`
    async fn abort(
        &mut self,
        mut tasks: Workers,
        error: CrawlError,
    ) -> Result<CrawlReport, CrawlError> {
        tracing::error!("Aborting crawl: {}", error);
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        if let Err(e) = self.checkpoint().await {
            tracing::error!("Final checkpoint before abort failed: {}", e);
        }
        Err(error)
    }

    /// Fills the worker pool from the frontier
    async fn dispatch(
        &mut self,
        tasks: &mut Workers,
        in_flight: &mut HashMap<Id, String>,
    ) -> Result<(), CrawlError> {
        while tasks.len() < self.workers && !self.frontier.is_empty() {
            let url = self.frontier.next()?;

            if !self.in_scope(&url) {
                tracing::debug!("Skipping {}: {}", url, OUT_OF_SCOPE);
                self.store.record_skip(url.as_str(), SkipRecord::new(OUT_OF_SCOPE, 0));
                self.frontier.complete(&url);
                self.report.skipped += 1;
                self.after_completion().await?;
                continue;
            }

            let pipeline = Arc::clone(&self.pipeline);
            let worker_url = url.clone();
            let handle = tasks.spawn(async move {
                let result = process_url(&pipeline, &worker_url).await;
                (worker_url, result)
            });
            in_flight.insert(handle.id(), url);
        }
        Ok(())
    }

    fn in_scope(&self, url: &str) -> bool {
        self.scope.is_empty() || self.scope.iter().any(|fragment| url.contains(fragment.as_str()))
    }

    /// Applies the result of one worker to the crawl state
    async fn handle(
        &mut self,
        url: String,
        result: Result<Processed, CrawlError>,
    ) -> Result<(), CrawlError> {
        match result {
            Ok(processed) => {
                let added = self.frontier.enqueue(processed.discovered);
                self.report.links_enqueued += added;

                let entry = processed.entry;
                if entry.escalation.is_some() {
                    self.report.escalated += 1;
                }
                if entry.kind == ResourceKind::Legal {
                    self.report.legal_documents += 1;
                }

                tracing::info!(
                    "[{}] {} -> {} (+{} new, {} pending)",
                    entry.kind,
                    url,
                    entry.storage_location.display(),
                    added,
                    self.frontier.pending_len()
                );

                self.store.record(url.as_str(), entry);
                self.frontier.complete(&url);
                self.report.completed += 1;
            }
            Err(CrawlError::Transport {
                url: failed,
                attempts,
                source,
            }) => match self.on_exhausted {
                ExhaustedPolicy::Skip => {
                    tracing::warn!(
                        "Skipping {} after {} failed attempt(s): {}",
                        url,
                        attempts,
                        source
                    );
                    self.store
                        .record_skip(url.as_str(), SkipRecord::new(source.to_string(), attempts));
                    self.frontier.complete(&url);
                    self.report.skipped += 1;
                }
                ExhaustedPolicy::Abort => {
                    return Err(CrawlError::Transport {
                        url: failed,
                        attempts,
                        source,
                    });
                }
            },
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                self.store.record_skip(url.as_str(), SkipRecord::new(e.to_string(), 0));
                self.frontier.complete(&url);
                self.report.skipped += 1;
            }
        }

        self.after_completion().await
    }

    /// Records the URL of a panicked worker as skipped
    ///
    /// A cancelled worker leaves its URL in flight, so the next checkpoint
    /// writes it back as pending.
    async fn handle_failed_worker(
        &mut self,
        url: Option<String>,
        error: JoinError,
    ) -> Result<(), CrawlError> {
        let url = match url {
            Some(url) if error.is_panic() => url,
            Some(url) => {
                tracing::warn!("Worker for {} was cancelled: {}", url, error);
                return Ok(());
            }
            None => {
                tracing::error!("Crawl worker ended abnormally: {}", error);
                return Ok(());
            }
        };

        tracing::error!("Worker for {} panicked, skipping it", url);
        self.store
            .record_skip(url.as_str(), SkipRecord::new(WORKER_PANICKED, 0));
        self.frontier.complete(&url);
        self.report.skipped += 1;
        self.after_completion().await
    }

    async fn after_completion(&mut self) -> Result<(), CrawlError> {
        self.since_checkpoint += 1;
        if self.since_checkpoint >= self.checkpoint_interval {
            self.checkpoint().await?;
        }
        Ok(())
    }

    /// Writes the store, the frontier and the legal counter to the checkpoint file
    ///
    /// Failed writes are retried with a growing pause before the error is returned.
    pub async fn checkpoint(&mut self) -> Result<(), CrawlError> {
        let path = self.pipeline.layout.checkpoint_path();
        let state = CheckpointState {
            store: std::mem::take(&mut self.store),
            frontier: self.frontier.snapshot(),
            legal_counter: self.legal_counter(),
            checkpointed_at: Utc::now(),
        };

        let mut attempt = 1;
        let result = loop {
            match open_checkpoint(&path).and_then(|mut checkpoint| checkpoint.save(&state)) {
                Ok(()) => break Ok(()),
                Err(e) if attempt < CHECKPOINT_ATTEMPTS => {
                    tracing::warn!(
                        "Checkpoint attempt {}/{} failed: {}",
                        attempt,
                        CHECKPOINT_ATTEMPTS,
                        e
                    );
                    tokio::time::sleep(CHECKPOINT_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => break Err::<(), StorageError>(e),
            }
        };
        self.store = state.store;
        result?;

        self.since_checkpoint = 0;
        self.report.checkpoints += 1;
        tracing::info!(
            "Checkpoint written: {} entries, {} skipped, {} pending, {} done",
            self.store.len(),
            self.store.skipped_len(),
            state.frontier.pending.len(),
            state.frontier.done.len()
        );
        Ok(())
    }
}

/// Runs fetch → classify → extract or escalate → fingerprint → write for one URL
async fn process_url(pipeline: &Pipeline, url: &str) -> Result<Processed, CrawlError> {
    let mut tracker = StageTracker::new(url);

    tracker.advance(Stage::Fetching)?;
    let resource = match fetch_with_retry(pipeline.fetcher.as_ref(), url, pipeline.retry).await {
        Ok(resource) => resource,
        Err(e) => {
            tracker.advance(Stage::Failed)?;
            return Err(e);
        }
    };

    tracker.advance(Stage::Classifying)?;
    let classification = classify(url);
    let mut kind = classification.kind;
    if kind == ResourceKind::Other && pipeline.sniff_content_type && resource.is_html() {
        kind = ResourceKind::Html;
    }

    if !kind.is_markup() {
        tracker.advance(Stage::Fingerprinting)?;
        let digest = fingerprint(Payload::Bytes(&resource.body));
        let entry = record(
            pipeline,
            &mut tracker,
            kind,
            &classification.file_name,
            &resource.body,
            digest,
            Vec::new(),
            None,
        )
        .await?;
        return Ok(Processed {
            entry,
            discovered: Vec::new(),
        });
    }

    let base = Url::parse(&resource.final_url).or_else(|_| Url::parse(url))?;
    let markup = inspect_markup(
        &resource.text(),
        &base,
        &pipeline.gate_marker,
        pipeline.filter.as_ref(),
    );

    match markup {
        Markup::Open { links, text } => {
            tracker.advance(Stage::Extracting)?;
            tracing::debug!("Extracted {} link(s) from {}", links.len(), url);

            tracker.advance(Stage::Fingerprinting)?;
            let digest = fingerprint(Payload::Text(&text));
            let entry = record(
                pipeline,
                &mut tracker,
                kind,
                &classification.file_name,
                &resource.body,
                digest,
                links.clone(),
                None,
            )
            .await?;
            Ok(Processed {
                entry,
                discovered: links,
            })
        }
        Markup::Gated => {
            tracker.advance(Stage::Escalating)?;
            let entry = escalate(pipeline, &mut tracker, url, &resource).await?;
            Ok(Processed {
                entry,
                discovered: Vec::new(),
            })
        }
    }
}

/// Parses a markup body; the parsed document never crosses an await point
fn inspect_markup(body: &str, base: &Url, gate_marker: &str, filter: Option<&Regex>) -> Markup {
    let document = parse_document(body);

    if is_gated(&document, gate_marker) {
        return Markup::Gated;
    }

    let predicate = filter.map(|re| move |href: &str| re.is_match(href));
    let links = extract_links(
        &document,
        base,
        predicate.as_ref().map(|p| p as &dyn Fn(&str) -> bool),
    );

    Markup::Open {
        links,
        text: document_text(&document),
    }
}

/// Fingerprint of the extracted text of a parsed body
pub(crate) fn text_fingerprint(body: &str) -> String {
    let document = parse_document(body);
    fingerprint(Payload::Text(&document_text(&document)))
}

/// Resolves a gated page, degrading to kind `Other` on any failure
async fn escalate(
    pipeline: &Pipeline,
    tracker: &mut StageTracker,
    url: &str,
    gated: &FetchedResource,
) -> Result<CrawlEntry, CrawlError> {
    let number = pipeline.legal_counter.fetch_add(1, Ordering::SeqCst);
    let name = format!("crawled_legaldoc_{}", number);

    let escalation = match pipeline.escalator.escalate(url).await {
        Ok(escalation) => escalation,
        Err(e) => {
            tracing::warn!("Escalation of {} failed, storing as {}: {}", url, ResourceKind::Other, e);
            return degrade(pipeline, tracker, &name, gated, None).await;
        }
    };

    if escalation.status != LegalStatus::InForce {
        tracing::debug!("{} is {}, not resolving a document", url, escalation.status);
        return degrade(pipeline, tracker, &name, gated, Some(escalation)).await;
    }

    let document =
        match fetch_with_retry(pipeline.fetcher.as_ref(), &escalation.resolved_url, pipeline.retry)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    "Fetching resolved document {} failed: {}",
                    escalation.resolved_url,
                    e
                );
                return degrade(pipeline, tracker, &name, gated, Some(escalation)).await;
            }
        };

    tracker.advance(Stage::Fingerprinting)?;
    let digest = text_fingerprint(&document.text());
    let outbound = vec![escalation.final_uri.clone()];
    record(
        pipeline,
        tracker,
        ResourceKind::Legal,
        &format!("{}.xml", name),
        &document.body,
        digest,
        outbound,
        Some(escalation),
    )
    .await
}

/// Stores a gated page that could not be resolved as kind `Other` without links
async fn degrade(
    pipeline: &Pipeline,
    tracker: &mut StageTracker,
    name: &str,
    gated: &FetchedResource,
    escalation: Option<EscalationResult>,
) -> Result<CrawlEntry, CrawlError> {
    tracker.advance(Stage::Fingerprinting)?;
    let digest = text_fingerprint(&gated.text());
    record(
        pipeline,
        tracker,
        ResourceKind::Other,
        name,
        &gated.body,
        digest,
        Vec::new(),
        escalation,
    )
    .await
}

/// Writes the body if enabled and builds the entry
///
/// A failed write is logged; the entry still names the intended location.
#[allow(clippy::too_many_arguments)]
async fn record(
    pipeline: &Pipeline,
    tracker: &mut StageTracker,
    kind: ResourceKind,
    file_name: &str,
    body: &[u8],
    fingerprint: String,
    outbound_links: Vec<String>,
    escalation: Option<EscalationResult>,
) -> Result<CrawlEntry, CrawlError> {
    tracker.advance(Stage::Recording)?;

    let storage_location = pipeline.layout.location(kind, file_name);
    if pipeline.write {
        if let Err(e) = pipeline.layout.write(&storage_location, body).await {
            tracing::warn!("Failed to write {}: {}", storage_location.display(), e);
        }
    }

    tracker.advance(Stage::Done)?;
    Ok(CrawlEntry {
        kind,
        storage_location,
        fingerprint,
        outbound_links,
        escalation,
    })
}
