//! The deduplication driver.
//!
//! Reading, mate pairing and windowed grouping run on the calling thread because they depend
//! on total input order. Sealed families are the only unit of work handed elsewhere:
//!
//! - with one thread they are processed inline and written straight to the output;
//! - with more, a fixed pool of workers pulls them from a bounded channel and sends each
//!   family's rendered output, as one chunk, to a dedicated writer thread.
//!
//! Each worker owns its [`Stats`]; they are merged once, after the workers are joined.
//! Family order in the output is only preserved in the single-threaded case.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Sender, bounded};
use log::{debug, info};
use noodles::sam::Header;

use crate::consensus::FamilyProcessor;
use crate::errors::DedupError;
use crate::grouper::{Family, WindowedFamilyGrouper};
use crate::logging::{OperationTimer, log_dedup_summary};
use crate::metrics::Stats;
use crate::pairing::MatePairer;
use crate::progress::ProgressTracker;
use crate::sam_io::SamReader;
use crate::targets::TargetSet;
use crate::umi::{DEFAULT_UMI_TAG, UmiMode};
use crate::validation::validate_at_least;

/// Families queued per worker before the reader blocks.
const QUEUE_DEPTH_PER_WORKER: usize = 8;

/// Options controlling a deduplication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    /// How families are sub-partitioned by UMI.
    pub umi_mode: UmiMode,
    /// Tag holding the UMI.
    pub umi_tag: [u8; 2],
    /// Smallest post-filter family size that is emitted.
    pub min_family_size: usize,
    /// Largest fragment size considered confident; 0 means unbounded.
    pub max_fragment_size: u32,
    /// Drop families with no on-target segment.
    pub discard_off_target: bool,
    /// Worker threads for family processing; 1 processes inline.
    pub threads: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            umi_mode: UmiMode::None,
            umi_tag: DEFAULT_UMI_TAG,
            min_family_size: 1,
            max_fragment_size: 0,
            discard_off_target: false,
            threads: 1,
        }
    }
}

impl DedupConfig {
    /// Checks option ranges.
    ///
    /// # Errors
    /// Returns an error if `min_family_size` or `threads` is zero
    pub fn validate(&self) -> crate::errors::Result<()> {
        validate_at_least(self.min_family_size, 1, "min-family-size")?;
        validate_at_least(self.threads, 1, "threads")?;
        Ok(())
    }
}

/// Processes families on the calling thread.
struct SerialExecutor<W> {
    output: W,
    processor: FamilyProcessor,
    stats: Stats,
    chunk: Vec<u8>,
}

impl<W: Write> SerialExecutor<W> {
    fn new(mut output: W, header_text: &str, processor: FamilyProcessor) -> Result<Self> {
        output.write_all(header_text.as_bytes()).context("Failed to write SAM header")?;
        Ok(Self { output, processor, stats: Stats::new(), chunk: Vec::new() })
    }

    fn submit(&mut self, family: Family) -> Result<()> {
        self.chunk.clear();
        self.processor.process(family, &mut self.stats, &mut self.chunk)?;
        self.output.write_all(&self.chunk).context("Failed to write output")?;
        Ok(())
    }

    fn finish(mut self) -> Result<Stats> {
        self.output.flush().context("Failed to flush output")?;
        Ok(self.stats)
    }
}

/// Processes families on a worker pool with a dedicated writer thread.
struct ParallelExecutor {
    families: Option<Sender<Family>>,
    workers: Vec<JoinHandle<Result<Stats>>>,
    writer: Option<JoinHandle<Result<()>>>,
}

impl ParallelExecutor {
    fn new<W: Write + Send + 'static>(
        mut output: W,
        header_text: String,
        header: &Arc<Header>,
        config: &DedupConfig,
        targets: Option<&Arc<TargetSet>>,
    ) -> Result<Self> {
        let capacity = config.threads * QUEUE_DEPTH_PER_WORKER;
        let (family_tx, family_rx) = bounded::<Family>(capacity);
        let (chunk_tx, chunk_rx) = bounded::<Vec<u8>>(capacity);

        let writer = thread::Builder::new()
            .name("cfdedup-writer".to_string())
            .spawn(move || -> Result<()> {
                output.write_all(header_text.as_bytes()).context("Failed to write SAM header")?;
                for chunk in chunk_rx {
                    output.write_all(&chunk).context("Failed to write output")?;
                }
                output.flush().context("Failed to flush output")?;
                Ok(())
            })
            .context("Failed to start writer thread")?;

        let mut workers = Vec::with_capacity(config.threads);
        for index in 0..config.threads {
            let families = family_rx.clone();
            let chunks = chunk_tx.clone();
            let processor = FamilyProcessor::new(config, targets.cloned(), Arc::clone(header));
            let handle = thread::Builder::new()
                .name(format!("cfdedup-worker-{index}"))
                .spawn(move || -> Result<Stats> {
                    let mut stats = Stats::new();
                    for family in families {
                        let mut chunk = Vec::new();
                        processor.process(family, &mut stats, &mut chunk)?;
                        if !chunk.is_empty() && chunks.send(chunk).is_err() {
                            return Err(DedupError::WorkerFailed {
                                reason: "output writer stopped".to_string(),
                            }
                            .into());
                        }
                    }
                    Ok(stats)
                })
                .context("Failed to start worker thread")?;
            workers.push(handle);
        }
        // Only the workers hold the chunk sender, so the writer stops once they all exit.
        drop(chunk_tx);

        Ok(Self { families: Some(family_tx), workers, writer: Some(writer) })
    }

    fn submit(&mut self, family: Family) -> Result<()> {
        let any_exited = self.workers.iter().any(JoinHandle::is_finished)
            || self.writer.as_ref().is_some_and(JoinHandle::is_finished);
        if any_exited {
            return Err(self.abort());
        }
        match self.families.as_ref().map(|tx| tx.send(family)) {
            Some(Ok(())) => Ok(()),
            _ => Err(self.abort()),
        }
    }

    /// Closes the intake queue and joins every thread.
    fn join_all(&mut self) -> (Vec<Result<Stats>>, Result<()>) {
        self.families.take();
        let panicked = |what: &str| -> anyhow::Error {
            DedupError::WorkerFailed { reason: format!("{what} thread panicked") }.into()
        };
        let workers = self
            .workers
            .drain(..)
            .map(|handle| handle.join().unwrap_or_else(|_| Err(panicked("worker"))))
            .collect();
        let writer = match self.writer.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| Err(panicked("writer"))),
            None => Ok(()),
        };
        (workers, writer)
    }

    /// Shuts down after a thread exited early and returns the error that caused it.
    fn abort(&mut self) -> anyhow::Error {
        let (workers, writer) = self.join_all();
        if let Err(e) = writer {
            return e;
        }
        workers.into_iter().find_map(Result::err).unwrap_or_else(|| {
            DedupError::WorkerFailed { reason: "a worker exited before the end of input".to_string() }
                .into()
        })
    }

    fn finish(mut self) -> Result<Stats> {
        let (workers, writer) = self.join_all();
        writer?;
        let mut stats = Stats::new();
        for worker in workers {
            stats.merge(&worker?);
        }
        Ok(stats)
    }
}

enum Executor<W> {
    Serial(SerialExecutor<W>),
    Parallel(ParallelExecutor),
}

/// Hands sealed families to an executor, starting it (and writing the header) on first use.
struct Dispatcher<'a, W> {
    config: &'a DedupConfig,
    targets: Option<Arc<TargetSet>>,
    header: Arc<Header>,
    pending: Option<(W, String)>,
    executor: Option<Executor<W>>,
    families_sealed: u64,
}

impl<'a, W: Write + Send + 'static> Dispatcher<'a, W> {
    fn new(
        config: &'a DedupConfig,
        targets: Option<Arc<TargetSet>>,
        output: W,
        header_text: String,
        header: Arc<Header>,
    ) -> Self {
        Self {
            config,
            targets,
            header,
            pending: Some((output, header_text)),
            executor: None,
            families_sealed: 0,
        }
    }

    fn start(&mut self) -> Result<Executor<W>> {
        let Some((output, header_text)) = self.pending.take() else {
            bail!("Output has already been started");
        };
        if self.config.threads > 1 {
            info!("Processing families on {} worker threads", self.config.threads);
            let executor = ParallelExecutor::new(
                output,
                header_text,
                &self.header,
                self.config,
                self.targets.as_ref(),
            )?;
            Ok(Executor::Parallel(executor))
        } else {
            let processor =
                FamilyProcessor::new(self.config, self.targets.clone(), Arc::clone(&self.header));
            Ok(Executor::Serial(SerialExecutor::new(output, &header_text, processor)?))
        }
    }

    fn executor(&mut self) -> Result<&mut Executor<W>> {
        let executor = match self.executor.take() {
            Some(executor) => executor,
            None => self.start()?,
        };
        Ok(self.executor.insert(executor))
    }

    fn submit_all(&mut self, families: Vec<Family>) -> Result<()> {
        for family in families {
            self.families_sealed += 1;
            match self.executor()? {
                Executor::Serial(executor) => executor.submit(family)?,
                Executor::Parallel(executor) => executor.submit(family)?,
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Stats> {
        let executor = match self.executor.take() {
            Some(executor) => executor,
            None => self.start()?,
        };
        match executor {
            Executor::Serial(executor) => executor.finish(),
            Executor::Parallel(executor) => executor.finish(),
        }
    }
}

/// Deduplicates a coordinate-sorted SAM stream.
///
/// Header lines are copied to `output` when the first family is sealed (or at end of input).
/// An error raised by a record before that point therefore leaves `output` empty; once a
/// family has been sealed, output already written stays in place.
///
/// # Errors
///
/// Returns an error on malformed or unsorted input, a missing or malformed UMI, a worker
/// failure, or an I/O failure.
pub fn run_dedup<R, W>(
    input: R,
    output: W,
    config: &DedupConfig,
    targets: Option<Arc<TargetSet>>,
) -> Result<Stats>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    config.validate()?;
    info!(
        "UMI mode: {}; min family size: {}; max fragment size: {}",
        config.umi_mode,
        config.min_family_size,
        if config.max_fragment_size == 0 {
            "unbounded".to_string()
        } else {
            config.max_fragment_size.to_string()
        }
    );

    let timer = OperationTimer::new("Deduplicating reads");
    let mut reader = SamReader::new(input);
    let header_text = reader.read_header()?;
    let header = Arc::clone(reader.header().context("SAM header was not parsed")?);
    let mut dispatcher = Dispatcher::new(config, targets, output, header_text, Arc::clone(&header));
    let mut pairer = MatePairer::new(&header);
    let mut grouper = WindowedFamilyGrouper::new();
    let mut progress = ProgressTracker::new("Read records");

    while let Some(record) = reader.next_record()? {
        progress.add(1);
        let (position, fragment) = pairer.push(record)?;
        dispatcher.submit_all(grouper.advance(position, pairer.clip_allowance()))?;
        if let Some(fragment) = fragment {
            grouper.add(fragment);
        }
    }
    progress.finish();
    dispatcher.submit_all(grouper.finish())?;
    debug!(
        "Sealed {} families across {} windows",
        dispatcher.families_sealed,
        grouper.windows_sealed()
    );

    let mut stats = dispatcher.finish()?;
    stats.record_pairing(pairer.counts(), pairer.unpaired_len() as u64);
    timer.log_completion(stats.records_read);
    log_dedup_summary(&stats);
    Ok(stats)
}
