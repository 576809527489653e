//! Writing one source to several sinks at once.

use std::io::{Read, Write};
use std::thread::{self, JoinHandle};

use arkiv_stream::{
    BufferPool, ExactSizeReader, FanOutPump, FanOutReader, StreamError, copy_with_buffer, drain_and_close,
};
use arkiv_verify::{DigestReader, ExpectedDigest};
use tracing::{debug, warn};

use crate::{ArkivConfig, ArkivError, Result};

/// What every replica of a transfer must match.
#[derive(Clone, Debug)]
pub struct Transfer {
    size:   u64,
    digest: Option<ExpectedDigest>,
}

impl Transfer {
    /// A transfer of exactly `size` bytes.
    pub fn new(size: u64) -> Self { Self { size, digest: None } }

    /// Also validates each replica against `digest` at end of stream.
    pub fn digest(mut self, digest: ExpectedDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn get_size(&self) -> u64 { self.size }

    pub fn get_digest(&self) -> Option<&ExpectedDigest> { self.digest.as_ref() }
}

/// Result of one sink: the sink itself, handed back, and the bytes it
/// received or why it failed.
#[derive(Debug)]
pub struct SinkOutcome<W> {
    rank:   usize,
    sink:   Option<W>,
    result: Result<u64>,
}

impl<W> SinkOutcome<W> {
    pub fn rank(&self) -> usize { self.rank }

    pub fn is_success(&self) -> bool { self.result.is_ok() }

    pub fn bytes_written(&self) -> Option<u64> { self.result.as_ref().ok().copied() }

    pub fn error(&self) -> Option<&ArkivError> { self.result.as_ref().err() }

    /// The sink, unless its worker panicked while holding it.
    pub fn into_sink(self) -> Option<W> { self.sink }

    pub fn into_result(self) -> Result<u64> { self.result }
}

#[derive(Debug)]
pub struct ReplicationReport<W> {
    source: Result<u64>,
    sinks:  Vec<SinkOutcome<W>>,
}

impl<W> ReplicationReport<W> {
    /// Bytes the producer read from the source, or why it stopped.
    pub fn source(&self) -> &Result<u64> { &self.source }

    /// One outcome per sink, in the order the sinks were given.
    pub fn sinks(&self) -> &[SinkOutcome<W>] { &self.sinks }

    pub fn succeeded(&self) -> usize { self.sinks.iter().filter(|s| s.is_success()).count() }

    pub fn all_succeeded(&self) -> bool { self.source.is_ok() && self.succeeded() == self.sinks.len() }

    pub fn into_parts(self) -> (Result<u64>, Vec<SinkOutcome<W>>) { (self.source, self.sinks) }
}

/// Replicates transfers, reusing fan-out buffers from one pool. The fan-out
/// capacity is the pool's `buffer_size`.
#[derive(Clone, Debug)]
pub struct Replicator {
    config: ArkivConfig,
    pool:   BufferPool,
}

impl Replicator {
    pub fn new(config: ArkivConfig) -> Result<Self> {
        config.stream.validate()?;
        let pool = BufferPool::new(config.stream.pool)?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &ArkivConfig { &self.config }

    pub fn pool(&self) -> &BufferPool { &self.pool }

    /// Reads `source` once and writes it to every sink concurrently.
    ///
    /// Each sink gets its own worker thread. A replica that fails, through its
    /// sink, a size mismatch or a digest mismatch, is drained and dropped so the
    /// remaining replicas carry on; its outcome records the error. Fails as a
    /// whole only when the transfer cannot start.
    pub fn replicate<R, W>(&self, source: R, transfer: &Transfer, sinks: Vec<W>) -> Result<ReplicationReport<W>>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        if sinks.is_empty() {
            return Err(StreamError::InvalidArgument("replication needs at least one sink".into()).into());
        }
        let pump =
            FanOutPump::spawn_with_pool(source, sinks.len(), &self.pool, self.config.stream.pump.clone())?;
        run(pump, transfer, sinks, self.config.stream.copy_buffer_size)
    }
}

/// Reads `source` once and writes it to every sink concurrently, with a
/// fan-out buffer sized by `config`. See [`Replicator::replicate`].
pub fn replicate<R, W>(
    source: R,
    transfer: &Transfer,
    sinks: Vec<W>,
    config: &ArkivConfig,
) -> Result<ReplicationReport<W>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    config.stream.validate()?;
    if sinks.is_empty() {
        return Err(StreamError::InvalidArgument("replication needs at least one sink".into()).into());
    }
    let pump = FanOutPump::spawn(
        source,
        sinks.len(),
        config.stream.fanout,
        config.stream.pump.clone(),
    )?;
    run(pump, transfer, sinks, config.stream.copy_buffer_size)
}

type Worker<W> = JoinHandle<(W, Result<u64>)>;

fn run<W>(mut pump: FanOutPump, transfer: &Transfer, sinks: Vec<W>, buffer_size: usize) -> Result<ReplicationReport<W>>
where
    W: Write + Send + 'static,
{
    debug!(sinks = sinks.len(), size = transfer.size, "replication started");
    let mut workers: Vec<(usize, Worker<W>)> = Vec::with_capacity(sinks.len());
    for (reader, mut sink) in pump.readers().into_iter().zip(sinks) {
        let rank = reader.rank();
        let transfer = transfer.clone();
        let handle = thread::Builder::new()
            .name(format!("arkiv-sink-{rank}"))
            .spawn(move || {
                let result = write_replica(reader, &transfer, &mut sink, buffer_size);
                (sink, result)
            })?;
        workers.push((rank, handle));
    }

    let sinks: Vec<_> = workers
        .into_iter()
        .map(|(rank, handle)| {
            let (sink, result) = match handle.join() {
                Ok((sink, result)) => (Some(sink), result),
                Err(_) => (None, Err(ArkivError::WorkerPanicked(rank))),
            };
            match &result {
                Ok(written) => debug!(rank, written, "replica complete"),
                Err(e) => warn!(rank, error = %e, "replica failed"),
            }
            SinkOutcome { rank, sink, result }
        })
        .collect();

    let source = pump.join().map_err(ArkivError::from_stream);
    if let Err(e) = &source {
        warn!(error = %e, "replication source failed");
    }
    debug!(succeeded = sinks.iter().filter(|s| s.is_success()).count(), "replication finished");
    Ok(ReplicationReport { source, sinks })
}

fn write_replica<W: Write>(
    reader: FanOutReader,
    transfer: &Transfer,
    sink: &mut W,
    buffer_size: usize,
) -> Result<u64> {
    let mut sized = ExactSizeReader::new(reader, transfer.size)?;
    let result = copy_guarded(&mut sized, transfer.digest.as_ref(), sink, buffer_size);
    if result.is_err() {
        let discarded = drain_and_close(sized.into_inner());
        debug!(discarded, "abandoned replica drained");
    }
    result
}

fn copy_guarded<R: Read, W: Write>(
    source: &mut R,
    digest: Option<&ExpectedDigest>,
    sink: &mut W,
    buffer_size: usize,
) -> Result<u64> {
    let copied = match digest {
        Some(expected) => {
            let mut verified = DigestReader::new(source, expected.clone());
            copy_with_buffer(&mut verified, sink, buffer_size)
        }
        None => copy_with_buffer(source, sink, buffer_size),
    }
    .map_err(ArkivError::from_stream)?;
    sink.flush()?;
    Ok(copied)
}
