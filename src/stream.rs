//! The cooperative state machine that walks a FIT stream header -> records
//! -> footer CRC -> optional chained file.

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::byteio::ByteSource;
use crate::crc::fit_crc;
use crate::data::{decode_data_message, DataMessage};
use crate::definition::{decode_definition_message, Accumulators, DefinitionMessage};
use crate::developer::DeveloperFieldRegistry;
use crate::error::{FitError, FitResult};
use crate::header::{parse_file_header, FileHeader};
use crate::processor::{NoopProcessor, Processor};
use crate::profile::lookup_message_name;
use crate::recordheader::RecordHeader;

/// Knobs governing parse strictness.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Verify header and footer CRCs; `false` skips both checks entirely.
    pub check_crc: bool,
    /// Treat a `0` header CRC as "not computed" rather than a mismatch.
    pub allow_zero_crc: bool,
    /// Expand component fields into synthetic `FieldData` entries.
    pub expand_components: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions { check_crc: true, allow_zero_crc: true, expand_components: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AtHeader,
    InRecords,
    AtFooterCrc,
    MaybeChained,
    Complete,
}

/// One decoded record: either a schema installation or a rendered message.
#[derive(Debug, Clone)]
pub enum Record {
    Definition(DefinitionMessage),
    Data(DataMessage),
}

/// Select which data messages a filtered iteration yields.
#[derive(Debug, Clone, Copy)]
pub enum MesgSelector {
    Name(&'static str),
    Num(u16),
}

impl MesgSelector {
    /// A name selector whose text is all decimal digits is coerced to a
    /// numeric selector; otherwise it stays name-based.
    pub fn from_str(s: &'static str) -> MesgSelector {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse::<u16>() {
                return MesgSelector::Num(n);
            }
        }
        MesgSelector::Name(s)
    }

    fn matches(&self, msg: &DataMessage) -> bool {
        match self {
            MesgSelector::Num(n) => msg.global_mesg_num == *n,
            MesgSelector::Name(name) => lookup_message_name(msg.global_mesg_num) == Some(*name),
        }
    }
}

/// Drives one (possibly chained) FIT stream to completion.
///
/// Owns all per-stream mutable state: installed schemas keyed by
/// local-message-type, component accumulators, the compressed-timestamp
/// accumulator, and the developer-field registry.
pub struct FitFile<R> {
    src: ByteSource<R>,
    opts: ParserOptions,
    state: State,
    header: Option<FileHeader>,
    local_defs: HashMap<u8, DefinitionMessage>,
    accumulators: Accumulators,
    dev_fields: DeveloperFieldRegistry,
    compressed_ts: u32,
}

impl<R: Read> FitFile<R> {
    pub fn new(inner: R) -> Self {
        Self::with_options(inner, ParserOptions::default())
    }

    pub fn with_options(inner: R, opts: ParserOptions) -> Self {
        FitFile {
            src: ByteSource::new(inner),
            opts,
            state: State::AtHeader,
            header: None,
            local_defs: HashMap::new(),
            accumulators: Accumulators::new(),
            dev_fields: DeveloperFieldRegistry::new(),
            compressed_ts: 0,
        }
    }

    pub fn into_inner(self) -> R {
        self.src.into_inner()
    }

    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    /// Advances the state machine and returns the next record, or `None` at
    /// `Complete`.
    pub fn next_record(&mut self) -> FitResult<Option<Record>> {
        self.next_record_with(&mut NoopProcessor)
    }

    /// Like [`Self::next_record`] but routes decoded field/message data
    /// through `processor`.
    ///
    /// Without `Seek` there is no way to peek past a footer CRC to detect a
    /// chained file, so this treats every stream as single-file: reaching
    /// `MaybeChained` always resolves to `Complete`. A `Seek`-backed caller
    /// that wants real chaining should use [`Self::next_record_chained`].
    pub fn next_record_with(&mut self, processor: &mut dyn Processor) -> FitResult<Option<Record>> {
        loop {
            match self.state {
                State::MaybeChained => self.state = State::Complete,
                State::Complete => return Ok(None),
                _ => {
                    if let Some(record) = self.step(processor)? {
                        return Ok(Some(record));
                    }
                }
            }
        }
    }

    /// Runs one `AtHeader`/`InRecords`/`AtFooterCrc` leg of the state
    /// machine. Returns `Ok(None)` exactly once per file, the moment the
    /// footer CRC has been verified and `self.state` has become
    /// `MaybeChained` — the caller decides whether to resume at `AtHeader`
    /// or settle on `Complete`.
    fn step(&mut self, processor: &mut dyn Processor) -> FitResult<Option<Record>> {
        loop {
            match self.state {
                State::AtHeader => {
                    self.src.reset_crc();
                    let header = parse_file_header(&mut self.src, &self.opts)?;
                    self.header = Some(header);
                    self.local_defs.clear();
                    self.accumulators.clear();
                    self.dev_fields = DeveloperFieldRegistry::new();
                    self.compressed_ts = 0;
                    self.state = State::InRecords;
                }
                State::InRecords => {
                    let remaining = self.src.remaining().unwrap_or(0);
                    if remaining <= 0 {
                        self.state = State::AtFooterCrc;
                        continue;
                    }
                    let b = self.src.read(1)?;
                    self.src.write(&b)?;
                    let header = RecordHeader::parse(b[0]);

                    if header.is_definition() {
                        let def = decode_definition_message(&mut self.src, header, &mut self.accumulators)?;
                        self.local_defs.insert(header.local_mesg_num(), def.clone());
                        return Ok(Some(Record::Definition(def)));
                    }

                    let def = self
                        .local_defs
                        .get(&header.local_mesg_num())
                        .ok_or_else(|| {
                            FitError::Parse(format!("data record references unknown local message type {}", header.local_mesg_num()))
                        })?
                        .clone();

                    let msg = decode_data_message(
                        &mut self.src,
                        header,
                        &def,
                        &mut self.accumulators,
                        &mut self.dev_fields,
                        &mut self.compressed_ts,
                        processor,
                        self.opts.expand_components,
                    )?;
                    return Ok(Some(Record::Data(msg)));
                }
                State::AtFooterCrc => {
                    let computed = self.src.crc();
                    let crc_bytes = self.src.read(2)?;
                    let stored = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
                    if self.opts.check_crc && stored != computed {
                        return Err(FitError::Crc { expected: computed, actual: stored });
                    }
                    self.src.write(&crc_bytes)?;
                    tracing::debug!(computed, stored, "verified footer CRC");
                    self.state = State::MaybeChained;
                    return Ok(None);
                }
                State::MaybeChained | State::Complete => return Ok(None),
            }
        }
    }

    /// Eagerly decodes every remaining record.
    pub fn parse_all(&mut self) -> FitResult<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(record) = self.next_record()? {
            out.push(record);
        }
        Ok(out)
    }

    /// Eagerly decodes every remaining record and returns only the data
    /// messages, discarding definition records.
    pub fn messages(&mut self) -> FitResult<Vec<DataMessage>> {
        Ok(self
            .parse_all()?
            .into_iter()
            .filter_map(|r| match r {
                Record::Data(m) => Some(m),
                Record::Definition(_) => None,
            })
            .collect())
    }

    /// Lazily filters data messages against a set of names and/or global
    /// numbers, skipping any that match none of them. Definition records are
    /// never yielded here; use [`Self::parse_all`] to see them.
    pub fn filtered(&mut self, selectors: &[MesgSelector]) -> FitResult<Vec<DataMessage>> {
        let mut out = Vec::new();
        while let Some(record) = self.next_record()? {
            if let Record::Data(msg) = record {
                if selectors.iter().any(|s| s.matches(&msg)) {
                    out.push(msg);
                }
            }
        }
        Ok(out)
    }
}

impl<R: Read + Seek> FitFile<R> {
    /// Rewrites `self` onto `sink`, re-computing both CRCs as it goes.
    pub fn with_sink(inner: R, sink: Box<dyn std::io::Write>, opts: ParserOptions) -> Self {
        FitFile {
            src: ByteSource::with_sink(inner, sink),
            opts,
            state: State::AtHeader,
            header: None,
            local_defs: HashMap::new(),
            accumulators: Accumulators::new(),
            dev_fields: DeveloperFieldRegistry::new(),
            compressed_ts: 0,
        }
    }

    fn has_more_bytes_seek(&mut self) -> FitResult<bool> {
        Ok(!self.src.at_eof()?)
    }

    /// Like [`Self::next_record`] but detects chained files by actually
    /// probing for trailing bytes after the footer CRC (requires `Seek`).
    pub fn next_record_chained(&mut self, processor: &mut dyn Processor) -> FitResult<Option<Record>> {
        loop {
            match self.state {
                State::MaybeChained => {
                    self.state = if self.has_more_bytes_seek()? { State::AtHeader } else { State::Complete };
                }
                State::Complete => return Ok(None),
                _ => {
                    if let Some(record) = self.step(processor)? {
                        return Ok(Some(record));
                    }
                }
            }
        }
    }
}

/// Verifies a whole-file CRC the way a non-streaming caller might, without
/// going through the record state machine (used by integration tests that
/// assert end-to-end CRC behavior against a fixture's raw bytes).
pub fn verify_whole_file_crc(data: &[u8]) -> FitResult<bool> {
    if data.len() < 2 {
        return Err(FitError::Eof { wanted: 2, got: data.len() });
    }
    let (body, crc_bytes) = data.split_at(data.len() - 2);
    let stored = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    Ok(fit_crc(body, 0) == stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_file_bytes() -> Vec<u8> {
        // 12-byte header, zero-length data, no records, footer CRC of header bytes.
        let mut header = vec![12u8, 0x10, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00];
        header.extend_from_slice(b".FIT");
        let crc = fit_crc(&header, 0);
        let mut out = header;
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    #[test]
    fn parses_minimal_file_with_no_records() {
        let bytes = minimal_file_bytes();
        let mut fit = FitFile::new(Cursor::new(bytes));
        let records = fit.parse_all().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn rejects_mismatched_footer_crc() {
        let mut bytes = minimal_file_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut fit = FitFile::new(Cursor::new(bytes));
        assert!(matches!(fit.parse_all(), Err(FitError::Crc { .. })));
    }

    #[test]
    fn decimal_digit_string_coerces_to_numeric_selector() {
        assert!(matches!(MesgSelector::from_str("20"), MesgSelector::Num(20)));
        assert!(matches!(MesgSelector::from_str("record"), MesgSelector::Name("record")));
    }

    #[test]
    fn data_record_for_unknown_local_type_is_parse_error() {
        let mut header = vec![12u8, 0x10, 0x64, 0x00];
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(b".FIT");
        let header_crc = fit_crc(&header, 0);
        let mut bytes = header;
        bytes.push(0x00); // plain data-record header, local type 0, never defined
        let mut body_and_header = bytes.clone();
        let crc = fit_crc(&body_and_header[12..], header_crc);
        body_and_header.extend_from_slice(&crc.to_le_bytes());
        let mut fit = FitFile::new(Cursor::new(body_and_header));
        assert!(matches!(fit.parse_all(), Err(FitError::Parse(_))));
    }
}
