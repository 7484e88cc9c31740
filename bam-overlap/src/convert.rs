//! Record interpretation: which alignments are kept and how their packed
//! fields are rendered back to text.

use std::fmt::Write;
use std::io;

use noodles::sam::alignment::record::{
    cigar::{op::Kind, Op},
    Flags,
};

/// Raw quality byte marking a record without quality scores.
pub const MISSING_QUALITY: u8 = 0xff;

/// Offset between a Phred score and its printable ASCII character.
pub const PHRED_OFFSET: u8 = 33;

/// Flat per-record overhead added to the byte estimate of a batch.
pub const RECORD_OVERHEAD_BYTES: u64 = 100;

/// Mapping quality reported when the record does not carry one.
pub const MISSING_MAPPING_QUALITY: u8 = 255;

// Mate fields are never read from the input.
pub const MATE_NAME: &[u8] = b"*";
pub const MATE_BEGIN: u32 = 0;
pub const TEMPLATE_LENGTH: i32 = 0;

/// Query name used when a record has none.
pub const MISSING_NAME: &[u8] = b"*";

/// Only primary, mapped alignments are converted.
pub fn is_primary_mapped(flags: Flags) -> bool {
    !(flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary())
}

pub fn op_symbol(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

/// Render CIGAR operations as text (e.g. `4M2I10M`) into `dst`, replacing its
/// previous contents. No operations leaves `dst` empty.
pub fn write_cigar<I>(ops: I, dst: &mut String) -> io::Result<()>
where
    I: IntoIterator<Item = io::Result<Op>>,
{
    dst.clear();
    for op in ops {
        let op = op?;
        write!(dst, "{}{}", op.len(), op_symbol(op.kind())).map_err(io::Error::other)?;
    }
    Ok(())
}

/// Render raw Phred scores as ASCII into `dst`, replacing its previous
/// contents. Returns `false` when the record has no quality scores, in which
/// case `dst` is left empty.
pub fn write_quality(raw: &[u8], sequence_length: usize, dst: &mut Vec<u8>) -> bool {
    dst.clear();
    match raw.first() {
        None | Some(&MISSING_QUALITY) => false,
        Some(_) => {
            dst.extend(
                raw.iter()
                    .take(sequence_length)
                    .map(|q| q.wrapping_add(PHRED_OFFSET)),
            );
            true
        }
    }
}

/// Approximate memory taken by one converted record. This is a batching
/// heuristic, not an exact accounting.
pub fn record_cost(
    query_name_len: usize,
    target_name_len: usize,
    cigar_len: usize,
    sequence_len: usize,
    quality_len: usize,
) -> u64 {
    (query_name_len + target_name_len + cigar_len + sequence_len + quality_len) as u64
        + RECORD_OVERHEAD_BYTES
}
