//! Convert BAM alignments into lightweight overlap records for consensus
//! polishing, streamed in batches bounded by an approximate byte budget.

pub mod convert;
mod error;
mod overlap;
mod parser;

pub use error::{Error, Result};
pub use overlap::{FromSamFields, Overlap, SamFields};
pub use parser::{BamParser, Batches, ParserOptions, ParserState, ReadProgress};
