use std::sync::Arc;
use std::time::{Instant, SystemTime};

use drill_algo::{DrillFamily, LessonState, SamplerConfig, Taxonomy, Word, WordIndex};
use parking_lot::Mutex;

use crate::store::MemoryStore;

/// Shared, process-wide state: the problem-type registry, the sampler
/// tunables loaded once at startup, the word catalogs per family, the
/// in-memory posterior store, and the in-process lesson session table
/// (spec §5 keeps lessons in-process, not persisted).
#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    taxonomy: Arc<Mutex<Taxonomy>>,
    sampler_config: Arc<SamplerConfig>,
    word_index: Arc<WordIndex>,
    posteriors: Arc<MemoryStore>,
    lessons: Arc<Mutex<std::collections::HashMap<String, LessonState>>>,
    next_lesson_id: Arc<Mutex<u64>>,
}

impl AppState {
    pub fn new(sampler_config: SamplerConfig, catalog: Vec<Word>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            taxonomy: Arc::new(Mutex::new(Taxonomy::with_defaults())),
            sampler_config: Arc::new(sampler_config),
            word_index: Arc::new(WordIndex::build(DrillFamily::Tone, catalog)),
            posteriors: Arc::new(MemoryStore::new()),
            lessons: Arc::new(Mutex::new(std::collections::HashMap::new())),
            next_lesson_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn taxonomy(&self) -> Arc<Mutex<Taxonomy>> {
        Arc::clone(&self.taxonomy)
    }

    pub fn sampler_config(&self) -> Arc<SamplerConfig> {
        Arc::clone(&self.sampler_config)
    }

    pub fn word_index(&self) -> Arc<WordIndex> {
        Arc::clone(&self.word_index)
    }

    pub fn posteriors(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.posteriors)
    }

    pub fn lessons(&self) -> Arc<Mutex<std::collections::HashMap<String, LessonState>>> {
        Arc::clone(&self.lessons)
    }

    pub fn allocate_lesson_id(&self) -> u64 {
        let mut next = self.next_lesson_id.lock();
        let id = *next;
        *next += 1;
        id
    }
}
