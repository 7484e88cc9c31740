use std::fmt;

use bstr::{BStr, BString, ByteSlice};
use itertools::Itertools;
use noodles::sam::alignment::record::Flags;

/// Fields of one accepted alignment, borrowed from the parser's scratch
/// buffers. Valid only until the next record is read.
#[derive(Debug, Clone, Copy)]
pub struct SamFields<'a> {
    pub query_name: &'a [u8],
    pub flags: Flags,
    pub target_name: &'a [u8],
    /// 1-based.
    pub target_begin: u32,
    pub mapping_quality: u8,
    pub cigar: &'a str,
    pub mate_name: &'a [u8],
    pub mate_begin: u32,
    pub template_length: i32,
    /// Bases are never retained by the parser, so this is always `None`.
    pub sequence: Option<&'a [u8]>,
    pub sequence_length: usize,
    /// ASCII (Phred+33) quality string, `None` when the record has no scores.
    pub quality: Option<&'a [u8]>,
}

/// Types that can be built from the fields of an accepted alignment.
pub trait FromSamFields {
    fn from_sam_fields(fields: &SamFields<'_>) -> Self;
}

/// A single-alignment overlap between a query read and a target sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    query_name: BString,
    flags: Flags,
    target_name: BString,
    target_begin: u32,
    mapping_quality: u8,
    cigar: String,
    mate_name: BString,
    mate_begin: u32,
    template_length: i32,
    sequence_length: usize,
    quality: Option<BString>,
}

impl FromSamFields for Overlap {
    fn from_sam_fields(fields: &SamFields<'_>) -> Self {
        Self {
            query_name: fields.query_name.into(),
            flags: fields.flags,
            target_name: fields.target_name.into(),
            target_begin: fields.target_begin,
            mapping_quality: fields.mapping_quality,
            cigar: fields.cigar.to_string(),
            mate_name: fields.mate_name.into(),
            mate_begin: fields.mate_begin,
            template_length: fields.template_length,
            sequence_length: fields.sequence_length,
            quality: fields.quality.map(BString::from),
        }
    }
}

impl Overlap {
    pub fn query_name(&self) -> &BStr {
        self.query_name.as_bstr()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_reverse_complemented(&self) -> bool {
        self.flags.is_reverse_complemented()
    }

    pub fn is_secondary(&self) -> bool {
        self.flags.is_secondary()
    }

    pub fn is_supplementary(&self) -> bool {
        self.flags.is_supplementary()
    }

    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    pub fn target_name(&self) -> &BStr {
        self.target_name.as_bstr()
    }

    /// 1-based start of the alignment on the target.
    pub fn target_begin(&self) -> u32 {
        self.target_begin
    }

    pub fn mapping_quality(&self) -> u8 {
        self.mapping_quality
    }

    pub fn cigar(&self) -> &str {
        &self.cigar
    }

    pub fn mate_name(&self) -> &BStr {
        self.mate_name.as_bstr()
    }

    pub fn mate_begin(&self) -> u32 {
        self.mate_begin
    }

    pub fn template_length(&self) -> i32 {
        self.template_length
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn quality(&self) -> Option<&BStr> {
        self.quality.as_ref().map(|q| q.as_bstr())
    }
}

/// SAM-formatted line without optional fields. The sequence column is always
/// `*` since bases are not kept.
impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cigar = if self.cigar.is_empty() { "*" } else { &self.cigar };
        let quality = self.quality().unwrap_or(BStr::new("*"));
        let line = [
            self.query_name.to_string(),
            self.flags.bits().to_string(),
            self.target_name.to_string(),
            self.target_begin.to_string(),
            self.mapping_quality.to_string(),
            cigar.to_string(),
            self.mate_name.to_string(),
            self.mate_begin.to_string(),
            self.template_length.to_string(),
            "*".to_string(),
            quality.to_string(),
        ]
        .iter()
        .join("\t");
        f.write_str(&line)
    }
}
