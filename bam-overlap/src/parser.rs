use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use noodles::{bam, bgzf, sam};

use crate::convert::{
    is_primary_mapped, record_cost, write_cigar, write_quality, MATE_BEGIN, MATE_NAME,
    MISSING_MAPPING_QUALITY, MISSING_NAME, TEMPLATE_LENGTH,
};
use crate::error::{Error, Result};
use crate::overlap::{FromSamFields, SamFields};

const DEFAULT_SCRATCH_CAPACITY: usize = 1 << 12;

/// Options for [`BamParser`].
#[derive(Debug, Clone)]
pub struct ParserOptions {
    scratch_capacity: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
        }
    }
}

impl ParserOptions {
    /// Bytes reserved up front for each of the CIGAR and quality buffers.
    pub fn with_scratch_capacity(mut self, capacity: usize) -> Self {
        self.scratch_capacity = capacity;
        self
    }

    pub fn scratch_capacity(&self) -> usize {
        self.scratch_capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// More records may be available.
    Ready,
    /// The end of the stream was reached. Sticky until [`BamParser::reset`].
    Exhausted,
}

/// Shared view of the number of records a parser has emitted. Can be read
/// from other threads while the parser is in use.
#[derive(Debug, Clone, Default)]
pub struct ReadProgress(Arc<AtomicU64>);

impl ReadProgress {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// An open BAM reader together with the header read from it.
struct AlignmentStream {
    reader: bam::io::Reader<bgzf::io::Reader<File>>,
    header: sam::Header,
}

impl AlignmentStream {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = bam::io::Reader::new(file);
        let header = reader
            .read_header()
            .map_err(|source| Error::HeaderParseFailed {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            "Opened {} with {} reference sequences",
            path.display(),
            header.reference_sequences().len()
        );
        Ok(Self { reader, header })
    }
}

/// Buffers reused across reads. The record is decoded in place, so anything
/// kept from it must be copied out before the next read.
struct Scratch {
    record: bam::Record,
    cigar: String,
    quality: Vec<u8>,
}

impl Scratch {
    fn with_capacity(capacity: usize) -> Result<Self> {
        let mut cigar = String::new();
        let mut quality = Vec::new();
        cigar
            .try_reserve(capacity)
            .and_then(|_| quality.try_reserve(capacity))
            .map_err(|source| Error::AllocationFailed { capacity, source })?;
        Ok(Self {
            record: bam::Record::default(),
            cigar,
            quality,
        })
    }

    /// Build `T` from the current record if it is a primary, mapped
    /// alignment. Returns the value and its estimated size in bytes.
    fn convert<T: FromSamFields>(
        &mut self,
        header: &sam::Header,
    ) -> io::Result<Option<(T, u64)>> {
        let Scratch {
            record,
            cigar,
            quality,
        } = self;

        let flags = record.flags();
        if !is_primary_mapped(flags) {
            trace!("Skipping alignment with flags {:#06x}", flags.bits());
            return Ok(None);
        }

        let query_name: &[u8] = match record.name() {
            Some(name) => name,
            None => MISSING_NAME,
        };

        let reference_sequence_id = record.reference_sequence_id().transpose()?;
        let target_name = reference_sequence_id
            .and_then(|id| header.reference_sequences().get_index(id))
            .map(|(name, _)| name.as_slice())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "alignment '{}' refers to unknown reference sequence {:?}",
                        String::from_utf8_lossy(query_name),
                        reference_sequence_id
                    ),
                )
            })?;

        let target_begin = match record.alignment_start().transpose()? {
            Some(pos) => u32::try_from(usize::from(pos))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            None => 0,
        };

        let mapping_quality = record
            .mapping_quality()
            .map(|q| q.get())
            .unwrap_or(MISSING_MAPPING_QUALITY);

        write_cigar(record.cigar().iter(), cigar)?;

        let sequence_length = record.sequence().len();
        let has_quality =
            write_quality(record.quality_scores().as_ref(), sequence_length, quality);

        let fields = SamFields {
            query_name,
            flags,
            target_name,
            target_begin,
            mapping_quality,
            cigar: cigar.as_str(),
            mate_name: MATE_NAME,
            mate_begin: MATE_BEGIN,
            template_length: TEMPLATE_LENGTH,
            sequence: None,
            sequence_length,
            quality: has_quality.then_some(quality.as_slice()),
        };
        let cost = record_cost(
            query_name.len(),
            target_name.len(),
            cigar.len(),
            sequence_length,
            quality.len(),
        );
        Ok(Some((T::from_sam_fields(&fields), cost)))
    }
}

/// Reads primary, mapped alignments from a BAM file and converts them into
/// overlaps, in batches bounded by an approximate byte budget.
///
/// ```no_run
/// use bam_overlap::{BamParser, Overlap};
///
/// let mut parser = BamParser::new("reads.bam")?;
/// let mut overlaps: Vec<Overlap> = Vec::new();
/// while parser.parse(&mut overlaps, 1 << 30)? {
///     // consume `overlaps`
///     overlaps.clear();
/// }
/// # Ok::<(), bam_overlap::Error>(())
/// ```
pub struct BamParser {
    path: PathBuf,
    stream: AlignmentStream,
    scratch: Scratch,
    num_records_read: ReadProgress,
    state: ParserState,
}

impl BamParser {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, ParserOptions::default())
    }

    pub fn with_options<P: AsRef<Path>>(path: P, options: ParserOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = AlignmentStream::open(&path)?;
        let scratch = Scratch::with_capacity(options.scratch_capacity)?;
        Ok(Self {
            path,
            stream,
            scratch,
            num_records_read: ReadProgress::default(),
            state: ParserState::Ready,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &sam::Header {
        &self.stream.header
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ParserState::Exhausted
    }

    /// Number of records emitted since construction or the last reset.
    pub fn num_records_read(&self) -> u64 {
        self.num_records_read.get()
    }

    pub fn progress(&self) -> ReadProgress {
        self.num_records_read.clone()
    }

    /// Reopen the file and start over from the first record.
    ///
    /// If reopening fails the parser keeps its current stream and state.
    pub fn reset(&mut self) -> Result<()> {
        self.stream = AlignmentStream::open(&self.path)?;
        self.num_records_read.clear();
        self.state = ParserState::Ready;
        Ok(())
    }

    /// Append overlaps to `dst` until roughly `max_bytes` worth of records
    /// have been produced or the file ends.
    ///
    /// Returns `true` if the budget was reached (more records likely remain)
    /// or if at least one record was appended before the end of the file.
    /// Once the end is reached every further call returns `false` until
    /// [`reset`](Self::reset).
    pub fn parse<T: FromSamFields>(&mut self, dst: &mut Vec<T>, max_bytes: u64) -> Result<bool> {
        if self.state == ParserState::Exhausted {
            return Ok(false);
        }

        let mut current_bytes = 0u64;
        let mut num_records = 0u64;

        loop {
            let n = self
                .stream
                .reader
                .read_record(&mut self.scratch.record)
                .map_err(|source| self.read_error(source))?;
            if n == 0 {
                break;
            }

            let converted = self
                .scratch
                .convert::<T>(&self.stream.header)
                .map_err(|source| self.read_error(source))?;
            let Some((item, cost)) = converted else {
                continue;
            };

            dst.push(item);
            num_records += 1;
            self.num_records_read.incr();

            current_bytes += cost;
            if current_bytes >= max_bytes {
                debug!(
                    "Read {} alignments ({} bytes) from {}, budget reached",
                    num_records,
                    current_bytes,
                    self.path.display()
                );
                return Ok(true);
            }
        }

        debug!(
            "Read {} alignments ({} bytes) from {}, end of file",
            num_records,
            current_bytes,
            self.path.display()
        );
        self.state = ParserState::Exhausted;
        Ok(num_records > 0)
    }

    /// Iterate over batches of overlaps, one [`parse`](Self::parse) call per
    /// item.
    pub fn batches<T: FromSamFields>(&mut self, max_bytes: u64) -> Batches<'_, T> {
        Batches {
            parser: self,
            max_bytes,
            done: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Read the remainder of the file into a single vector.
    pub fn read_all<T: FromSamFields>(&mut self) -> Result<Vec<T>> {
        let mut overlaps = Vec::new();
        self.parse(&mut overlaps, u64::MAX)?;
        Ok(overlaps)
    }

    fn read_error(&self, source: io::Error) -> Error {
        Error::ReadFailed {
            path: self.path.clone(),
            source,
        }
    }
}

pub struct Batches<'a, T> {
    parser: &'a mut BamParser,
    max_bytes: u64,
    done: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: FromSamFields> Iterator for Batches<'_, T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::new();
        match self.parser.parse(&mut batch, self.max_bytes) {
            Ok(true) => Some(Ok(batch)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<T: FromSamFields> std::iter::FusedIterator for Batches<'_, T> {}
