#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;

use enrolldash_core::{
    ApiError, CacheStore, ChartsEndpoint, ChartsResponse, FetchCoordinator, ManualClock,
    MemoryStorage, StatsEndpoint, StatsResponse,
};

/// Closed until `open()` is called; then every waiter passes.
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn new() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self) {
        self.0.add_permits(1);
    }

    async fn pass(&self) {
        // The permit goes back on drop so later waiters get through too
        let _permit = self.0.acquire().await;
    }
}

pub enum Reply<T> {
    Ok(T),
    Err(fn() -> ApiError),
}

struct Scripted<T> {
    gate: Option<Gate>,
    reply: Reply<T>,
}

/// Scripted backend. Each call pops the next scripted reply for that
/// endpoint; with nothing scripted it answers `default_stats` / `default_charts`.
pub struct FakeBackend {
    stats: Mutex<VecDeque<Scripted<StatsResponse>>>,
    charts: Mutex<VecDeque<Scripted<ChartsResponse>>>,
    stats_calls: AtomicUsize,
    charts_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stats: Mutex::new(VecDeque::new()),
            charts: Mutex::new(VecDeque::new()),
            stats_calls: AtomicUsize::new(0),
            charts_calls: AtomicUsize::new(0),
        })
    }

    pub fn script_stats(&self, gate: Option<Gate>, reply: Reply<StatsResponse>) {
        self.stats.lock().unwrap().push_back(Scripted { gate, reply });
    }

    pub fn script_charts(&self, gate: Option<Gate>, reply: Reply<ChartsResponse>) {
        self.charts.lock().unwrap().push_back(Scripted { gate, reply });
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn charts_calls(&self) -> usize {
        self.charts_calls.load(Ordering::SeqCst)
    }
}

async fn play<T>(scripted: Option<Scripted<T>>, default: impl FnOnce() -> T) -> Result<T, ApiError> {
    let Some(scripted) = scripted else {
        return Ok(default());
    };
    if let Some(gate) = scripted.gate {
        gate.pass().await;
    }
    match scripted.reply {
        Reply::Ok(value) => Ok(value),
        Reply::Err(make) => Err(make()),
    }
}

#[async_trait]
impl StatsEndpoint for FakeBackend {
    async fn fetch_stats(&self) -> Result<StatsResponse, ApiError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.stats.lock().unwrap().pop_front();
        play(next, default_stats).await
    }
}

#[async_trait]
impl ChartsEndpoint for FakeBackend {
    async fn fetch_charts(&self) -> Result<ChartsResponse, ApiError> {
        self.charts_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.charts.lock().unwrap().pop_front();
        play(next, default_charts).await
    }
}

pub fn stats(students: i64, programs: i64, colleges: i64) -> StatsResponse {
    StatsResponse {
        total_students: Some(students),
        total_programs: Some(programs),
        total_colleges: Some(colleges),
    }
}

pub fn default_stats() -> StatsResponse {
    stats(120, 8, 3)
}

pub fn default_charts() -> ChartsResponse {
    charts_with_program("BSCS", 70)
}

pub fn charts_with_program(code: &str, count: u64) -> ChartsResponse {
    serde_json::from_value(json!({
        "students_by_program": [
            {"program_code": code, "program_name": "Program", "student_count": count},
            {"program_code": "EMPTY", "program_name": "Empty", "student_count": 0},
        ],
        "students_by_college": [
            {"college_code": "CCS", "college_name": "Computer Studies", "student_count": count},
        ],
    }))
    .expect("valid charts fixture")
}

pub fn network_error() -> ApiError {
    ApiError::NetworkError("connection refused".to_string())
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            backend: FakeBackend::new(),
            storage: Arc::new(MemoryStorage::new()),
            clock: Arc::new(ManualClock::new(1_700_000_000_000)),
        }
    }

    pub fn cache(&self) -> CacheStore {
        CacheStore::new(self.storage.clone(), self.clock.clone())
    }

    pub fn coordinator(&self) -> FetchCoordinator {
        FetchCoordinator::new(
            self.backend.clone(),
            self.backend.clone(),
            self.cache(),
            self.clock.clone(),
        )
    }
}
