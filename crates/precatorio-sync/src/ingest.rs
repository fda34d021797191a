//! Batch orchestrator: chunked concurrent fetch, then sequential persist.
//!
//! Chunks run strictly one after another. Inside a chunk every fetch finishes
//! before the first record is persisted, and the chunk's pool and session are
//! dropped before the next chunk starts. Per-record failures are logged and
//! collected into the summary; nothing here returns an error for them.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use precatorio_core::normalize_numbers;
use precatorio_store::{CaseStore, PersistOutcome, StoreError, persist_case};
use tracing::{debug, error, info, warn};

use crate::http::{ApiClient, FetchFailure, Fetched, SyncError};

pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Source of case records.
#[async_trait]
pub trait CaseFetcher: Send + Sync {
    /// Per-chunk connection pool.
    type Pool: Send + Sync;

    fn open_pool(&self) -> Result<Self::Pool, SyncError>;

    async fn fetch(&self, pool: &Self::Pool, numero: &str) -> Result<Fetched, FetchFailure>;
}

#[async_trait]
impl CaseFetcher for ApiClient {
    type Pool = reqwest::Client;

    fn open_pool(&self) -> Result<reqwest::Client, SyncError> {
        self.http_pool()
    }

    async fn fetch(&self, pool: &reqwest::Client, numero: &str) -> Result<Fetched, FetchFailure> {
        self.fetch_case(pool, numero).await
    }
}

/// Consecutive, order-preserving chunks of at most `batch_size` items.
pub fn partition<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    pub batch_size: usize,
    /// Fetches in flight per chunk; defaults to `batch_size`.
    pub max_concurrency: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: None,
        }
    }
}

impl IngestConfig {
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or(self.batch_size).max(1)
    }
}

/// Numbers split into those still to fetch and those already stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestPlan {
    pub pending: Vec<String>,
    pub already_stored: Vec<String>,
}

/// Normalize `raw`, drop duplicates, and set aside numbers already in `store`.
pub fn plan<S: CaseStore>(store: &S, raw: &[String]) -> Result<IngestPlan, StoreError> {
    let numbers = normalize_numbers(raw.iter().map(String::as_str));
    let existing = store.existing_case_numbers(&numbers)?;
    let (already_stored, pending): (Vec<String>, Vec<String>) =
        numbers.into_iter().partition(|n| existing.contains(n));
    info!(
        pending = pending.len(),
        already_stored = already_stored.len(),
        "planned ingestion"
    );
    Ok(IngestPlan {
        pending,
        already_stored,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub requested: usize,
    pub chunks: usize,
    pub fetched: usize,
    pub persisted: usize,
    pub already_stored: usize,
    pub fetch_failed: Vec<String>,
    pub persist_failed: Vec<String>,
}

pub struct Ingestor<'a, F, S> {
    fetcher: &'a F,
    store: &'a S,
    config: IngestConfig,
}

impl<'a, F: CaseFetcher, S: CaseStore> Ingestor<'a, F, S> {
    pub fn new(fetcher: &'a F, store: &'a S, config: IngestConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Drive fetch-then-persist over `numbers` to completion.
    pub async fn run(&self, numbers: &[String]) -> IngestSummary {
        let chunks = partition(numbers, self.config.batch_size);
        let mut summary = IngestSummary {
            requested: numbers.len(),
            chunks: chunks.len(),
            ..Default::default()
        };

        for (index, chunk) in chunks.into_iter().enumerate() {
            info!(chunk = index + 1, of = summary.chunks, size = chunk.len(), "processing chunk");
            let results = self.fetch_chunk(chunk).await;
            let Some(results) = results else {
                summary.fetch_failed.extend(chunk.iter().cloned());
                continue;
            };
            self.persist_chunk(results, &mut summary);
        }

        info!(
            requested = summary.requested,
            persisted = summary.persisted,
            already_stored = summary.already_stored,
            fetch_failed = summary.fetch_failed.len(),
            persist_failed = summary.persist_failed.len(),
            "ingestion finished"
        );
        summary
    }

    /// `None` when the chunk's pool could not be opened.
    async fn fetch_chunk(&self, chunk: &[String]) -> Option<Vec<Result<Fetched, FetchFailure>>> {
        let pool = match self.fetcher.open_pool() {
            Ok(pool) => pool,
            Err(e) => {
                error!(error = %e, size = chunk.len(), "could not open connection pool, skipping chunk");
                return None;
            }
        };
        let results: Vec<_> = stream::iter(chunk)
            .map(|numero| self.fetcher.fetch(&pool, numero))
            .buffer_unordered(self.config.concurrency())
            .collect()
            .await;
        drop(pool);
        Some(results)
    }

    fn persist_chunk(&self, results: Vec<Result<Fetched, FetchFailure>>, summary: &mut IngestSummary) {
        let mut fetched = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(f) => fetched.push(f),
                Err(failure) => {
                    error!(
                        numero = %failure.numero,
                        attempts = failure.attempts,
                        status = ?failure.status,
                        error = %failure.source,
                        "fetch failed, skipping"
                    );
                    summary.fetch_failed.push(failure.numero);
                }
            }
        }
        summary.fetched += fetched.len();
        if fetched.is_empty() {
            return;
        }

        let mut session = match self.store.session() {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, size = fetched.len(), "could not open store session, skipping chunk");
                summary
                    .persist_failed
                    .extend(fetched.into_iter().map(|f| f.numero));
                return;
            }
        };

        for f in fetched {
            match persist_case(&mut session, &f.record) {
                Ok(PersistOutcome::Inserted { case_id, rows }) => {
                    debug!(numero = %f.numero, case_id, rows, "persisted case");
                    summary.persisted += 1;
                }
                Ok(PersistOutcome::AlreadyStored { case_id }) => {
                    warn!(numero = %f.numero, case_id, "case stored concurrently, skipped");
                    summary.already_stored += 1;
                }
                Err(e) => {
                    error!(numero = %f.numero, error = %e, "persist failed, record rolled back");
                    summary.persist_failed.push(f.numero);
                }
            }
        }
    }
}

/// Every failed number once, fetch failures first.
pub fn unresolved(summary: &IngestSummary) -> Vec<String> {
    let mut seen = HashSet::new();
    summary
        .fetch_failed
        .iter()
        .chain(&summary.persist_failed)
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use precatorio_core::{CaseRecord, PartyRecord, SourceRecord};
    use precatorio_store::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::{ApiConfig, RetryPolicy};

    /// Records, per fetch, how many cases the store held at that moment.
    struct FakeFetcher {
        store: MemoryStore,
        failing: HashSet<String>,
        calls: Mutex<Vec<(String, usize)>>,
        pools: Mutex<usize>,
    }

    impl FakeFetcher {
        fn new(store: &MemoryStore) -> Self {
            Self {
                store: store.clone(),
                failing: HashSet::new(),
                calls: Mutex::new(Vec::new()),
                pools: Mutex::new(0),
            }
        }

        fn failing(mut self, numero: &str) -> Self {
            self.failing.insert(numero.to_string());
            self
        }

        fn called(&self) -> Vec<String> {
            let mut calls: Vec<String> =
                self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
            calls.sort();
            calls
        }
    }

    #[async_trait]
    impl CaseFetcher for FakeFetcher {
        type Pool = ();

        fn open_pool(&self) -> Result<(), SyncError> {
            *self.pools.lock().unwrap() += 1;
            Ok(())
        }

        async fn fetch(&self, _pool: &(), numero: &str) -> Result<Fetched, FetchFailure> {
            let stored = self.store.count("processos");
            self.calls.lock().unwrap().push((numero.to_string(), stored));
            if self.failing.contains(numero) {
                return Err(FetchFailure {
                    numero: numero.to_string(),
                    attempts: 3,
                    status: Some(500),
                    source: SyncError::Server { status: 500 },
                });
            }
            let record = CaseRecord {
                numero_cnj: Some(numero.to_string()),
                fontes: vec![SourceRecord {
                    envolvidos: vec![PartyRecord::default()],
                    ..Default::default()
                }],
                ..Default::default()
            };
            Ok(Fetched {
                numero: numero.to_string(),
                record,
                attempts: 1,
                waits: Vec::new(),
            })
        }
    }

    fn numbers(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|n| n.to_string()).collect()
    }

    fn config(batch_size: usize) -> IngestConfig {
        IngestConfig {
            batch_size,
            max_concurrency: None,
        }
    }

    #[test]
    fn partition_sizes_and_order() {
        let items: Vec<u32> = (0..7).collect();
        let chunks = partition(&items, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], &[6]);
        assert_eq!(chunks.concat(), items);

        let exact = partition(&items[..6], 3);
        assert_eq!(exact.len(), 2);
        assert!(exact.iter().all(|c| c.len() == 3));
        assert!(partition::<u32>(&[], 3).is_empty());
    }

    #[test]
    fn concurrency_defaults_to_batch_size() {
        assert_eq!(config(50).concurrency(), 50);
        let capped = IngestConfig {
            batch_size: 50,
            max_concurrency: Some(4),
        };
        assert_eq!(capped.concurrency(), 4);
    }

    #[tokio::test]
    async fn preseeded_numbers_are_not_fetched_or_written() {
        let store = MemoryStore::default();
        store.seed_case("002");
        let fetcher = FakeFetcher::new(&store);

        let plan = plan(&store, &numbers(&["001", "002", " 003 ", "001"])).unwrap();
        assert_eq!(plan.pending, numbers(&["001", "003"]));
        assert_eq!(plan.already_stored, numbers(&["002"]));

        let summary = Ingestor::new(&fetcher, &store, config(10))
            .run(&plan.pending)
            .await;
        assert_eq!(summary.persisted, 2);
        assert_eq!(fetcher.called(), numbers(&["001", "003"]));
        assert_eq!(store.count("processos"), 3);
    }

    #[tokio::test]
    async fn persist_failure_is_isolated() {
        let store = MemoryStore::default();
        store.fail_case("003");
        let fetcher = FakeFetcher::new(&store);
        let input = numbers(&["001", "002", "003", "004", "005"]);

        let summary = Ingestor::new(&fetcher, &store, config(5)).run(&input).await;

        assert_eq!(summary.fetched, 5);
        assert_eq!(summary.persisted, 4);
        assert_eq!(summary.persist_failed, numbers(&["003"]));
        let mut stored = store.case_numbers();
        stored.sort();
        assert_eq!(stored, numbers(&["001", "002", "004", "005"]));
        // Only the failed record's children are missing.
        assert_eq!(store.count("fontes"), 4);
    }

    #[tokio::test]
    async fn fetch_failure_is_skipped() {
        let store = MemoryStore::default();
        let fetcher = FakeFetcher::new(&store).failing("002");
        let input = numbers(&["001", "002", "003"]);

        let summary = Ingestor::new(&fetcher, &store, config(2)).run(&input).await;

        assert_eq!(summary.fetch_failed, numbers(&["002"]));
        assert_eq!(summary.persisted, 2);
        assert_eq!(unresolved(&summary), numbers(&["002"]));
    }

    #[tokio::test]
    async fn chunk_is_persisted_before_next_chunk_fetches() {
        let store = MemoryStore::default();
        let fetcher = FakeFetcher::new(&store);
        let input = numbers(&["001", "002", "003"]);

        let summary = Ingestor::new(&fetcher, &store, config(2)).run(&input).await;

        assert_eq!(summary.chunks, 2);
        assert_eq!(*fetcher.pools.lock().unwrap(), 2);
        assert_eq!(store.sessions_opened(), 2);

        let calls = fetcher.calls.lock().unwrap().clone();
        let seen = |n: &str| calls.iter().find(|(c, _)| c == n).map(|(_, s)| *s);
        assert_eq!(seen("001"), Some(0));
        assert_eq!(seen("002"), Some(0));
        assert_eq!(seen("003"), Some(2));
    }

    #[tokio::test]
    async fn end_to_end_against_mock_api_and_duckdb() {
        let server = MockServer::start().await;
        for n in ["001", "002", "003"] {
            Mock::given(method("GET"))
                .and(path(format!("/numero_cnj/{n}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "numero_cnj": n,
                    "unidade_origem": {"tribunal_sigla": "TJSP"},
                    "fontes": [{"sigla": "TJSP", "envolvidos": [{"nome": "Maria", "polo": "ATIVO"}]}]
                })))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/numero_cnj/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = ApiClient::new(ApiConfig::new(Some("k".into()), server.uri()).unwrap()).with_retry(
            RetryPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        );
        let store = precatorio_store::DuckStore::open().unwrap();
        let input = numbers(&["001", "002", "003", "404"]);

        let summary = Ingestor::new(&api, &store, config(2)).run(&input).await;

        assert_eq!(summary.persisted, 3);
        assert_eq!(summary.fetch_failed, numbers(&["404"]));
        assert_eq!(store.count_table("processos").unwrap(), 3);
        assert_eq!(store.count_table("fontes_envolvidos").unwrap(), 3);

        // A second run over the same input finds everything stored.
        let again = plan(&store, &input).unwrap();
        assert_eq!(again.pending, numbers(&["404"]));
    }
}
