//! Source reader trait and registry
//!
//! Each keyed source (history, index, transcript, facet) and the stats
//! source is read by one probe. Probes are independent: the registry runs
//! them as parallel blocking tasks, fans transcript scans out over a bounded
//! number of workers, and returns only once every source has finished.
//!
//! A missing or unreadable source is never fatal. It degrades to the empty
//! mapping and the run continues.

mod facet;
mod history;
mod index;
pub mod lines;
mod stats;
mod transcript;

pub use facet::FacetProbe;
pub use history::{HistoryLog, HistoryProbe};
pub use index::IndexProbe;
pub use stats::StatsProbe;
pub use transcript::{is_git_commit, TranscriptProbe};

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::InsightError;
use crate::model::{FacetRecord, IndexRecord, StatsRecord, TranscriptRecord};
use crate::Config;

pub const HISTORY: &str = "history";
pub const INDEX: &str = "index";
pub const TRANSCRIPT: &str = "transcript";
pub const FACET: &str = "facet";
pub const STATS: &str = "stats";

/// Reference to a per-session file discovered under the projects tree
#[derive(Debug, Clone)]
pub struct SessionRef {
    pub id: String,
    pub source_path: PathBuf,
}

/// Descriptive half of a probe, object safe so the registry can list them
pub trait SourceProbe: Send + Sync {
    /// Stable identifier used in configuration and logs
    fn id(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// File or directory this probe reads
    fn path(&self) -> &Path;

    /// Check if this probe's data source exists
    fn is_available(&self) -> bool {
        self.path().exists()
    }
}

/// Reading half of a probe
pub trait SourceReader: SourceProbe + Clone + 'static {
    type Output: Default + Send + 'static;

    /// Read the whole source in one forward pass
    fn read(&self) -> Result<Self::Output>;
}

/// Everything the sources produced, gathered behind the join barrier
#[derive(Debug, Default)]
pub struct SourceSet {
    pub history: HistoryLog,
    pub index: HashMap<String, IndexRecord>,
    pub transcripts: HashMap<String, TranscriptRecord>,
    pub facets: Vec<FacetRecord>,
    pub stats: Option<StatsRecord>,
}

/// Registry of configured probes
pub struct ProbeRegistry {
    history: Option<HistoryProbe>,
    index: Option<IndexProbe>,
    transcript: Option<TranscriptProbe>,
    facet: Option<FacetProbe>,
    stats: Option<StatsProbe>,
    workers: usize,
}

impl ProbeRegistry {
    pub fn new(config: &Config) -> Self {
        let enabled = |id: &str| config.is_source_enabled(id).then(|| config.source_path(id));

        Self {
            history: enabled(HISTORY).map(HistoryProbe::new),
            index: enabled(INDEX).map(IndexProbe::new),
            transcript: enabled(TRANSCRIPT).map(TranscriptProbe::new),
            facet: enabled(FACET).map(FacetProbe::new),
            stats: enabled(STATS).map(StatsProbe::new),
            workers: config.workers(),
        }
    }

    pub fn all_probes(&self) -> Vec<&dyn SourceProbe> {
        let mut probes: Vec<&dyn SourceProbe> = vec![];
        if let Some(p) = &self.history {
            probes.push(p);
        }
        if let Some(p) = &self.index {
            probes.push(p);
        }
        if let Some(p) = &self.transcript {
            probes.push(p);
        }
        if let Some(p) = &self.facet {
            probes.push(p);
        }
        if let Some(p) = &self.stats {
            probes.push(p);
        }
        probes
    }

    pub fn available_probes(&self) -> Vec<&dyn SourceProbe> {
        self.all_probes()
            .into_iter()
            .filter(|p| p.is_available())
            .collect()
    }

    /// Run every source reader concurrently and wait for all of them.
    pub async fn collect(&self) -> Result<SourceSet, InsightError> {
        let (history, index, transcripts, facets, stats) = tokio::join!(
            read_blocking(self.history.clone()),
            read_blocking(self.index.clone()),
            self.collect_transcripts(),
            read_blocking(self.facet.clone()),
            read_blocking(self.stats.clone()),
        );

        Ok(SourceSet {
            history: history?,
            index: index?,
            transcripts: transcripts?,
            facets: facets?,
            stats: stats?,
        })
    }

    /// Scan transcripts with at most `workers` files in flight. Finished
    /// scans are merged into the mapping here, at a single point.
    async fn collect_transcripts(
        &self,
    ) -> Result<HashMap<String, TranscriptRecord>, InsightError> {
        let Some(probe) = self.transcript.clone() else {
            return Ok(HashMap::new());
        };

        let discoverer = probe.clone();
        let refs = match tokio::task::spawn_blocking(move || discoverer.discover())
            .await
            .map_err(|source| InsightError::ReaderTask {
                source_id: TRANSCRIPT.to_string(),
                source,
            })? {
            Ok(refs) => refs,
            Err(err) => {
                warn!(source = TRANSCRIPT, error = %err, "transcript discovery failed; treating as empty");
                return Ok(HashMap::new());
            }
        };
        info!(source = TRANSCRIPT, files = refs.len(), "transcript files found");

        let scans: Vec<_> = stream::iter(refs)
            .map(|session| {
                let probe = probe.clone();
                tokio::task::spawn_blocking(move || probe.scan_or_empty(&session))
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut transcripts = HashMap::with_capacity(scans.len());
        for scan in scans {
            let record = scan.map_err(|source| InsightError::ReaderTask {
                source_id: TRANSCRIPT.to_string(),
                source,
            })?;
            transcripts.insert(record.session_id.clone(), record);
        }
        info!(source = TRANSCRIPT, scanned = transcripts.len(), "transcripts scanned");
        Ok(transcripts)
    }
}

/// Run one reader on the blocking pool; a reader error becomes an empty output.
async fn read_blocking<P: SourceReader>(probe: Option<P>) -> Result<P::Output, InsightError> {
    let Some(probe) = probe else {
        return Ok(P::Output::default());
    };
    let source_id = probe.id().to_string();

    if !probe.is_available() {
        warn!(source = %source_id, path = %probe.path().display(), "source not found; treating as empty");
        return Ok(P::Output::default());
    }

    let result = tokio::task::spawn_blocking(move || probe.read())
        .await
        .map_err(|source| InsightError::ReaderTask {
            source_id: source_id.clone(),
            source,
        })?;

    match result {
        Ok(output) => Ok(output),
        Err(err) => {
            warn!(source = %source_id, error = %err, "source unreadable; treating as empty");
            Ok(P::Output::default())
        }
    }
}
