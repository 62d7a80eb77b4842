//! Decodes a data record per an installed schema, resolving sub-fields,
//! expanding components with bit-accumulation and scale/offset, applying
//! compressed-timestamp accumulation.

use std::io::Read;

use crate::accumulate::accumulate_bits;
use crate::basetype::RawValue;
use crate::byteio::ByteSource;
use crate::definition::{Accumulators, DefinitionMessage};
use crate::developer::{DeveloperField, DeveloperFieldRegistry};
use crate::error::{FitError, FitResult};
use crate::processor::Processor;
use crate::profile::{Component, FieldDescriptor, SubField, GLOBAL_DEVELOPER_DATA_ID, GLOBAL_FIELD_DESCRIPTION, TIMESTAMP_DEF_NUM};
use crate::recordheader::RecordHeader;
use crate::structcodec::{read_struct, RawNum};

/// A field's raw value, prior to scale/offset.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFieldValue {
    Scalar(RawValue),
    /// A non-byte array field: elements individually invalid-mapped, each
    /// parsed through the base type's own invalid-sentinel check.
    Tuple(Vec<Option<RawValue>>),
    /// A `byte`-base-type field: always a tuple at the wire level, kept as
    /// raw bytes since FIT byte arrays are opaque payloads.
    Bytes(Vec<u8>),
}

impl RawFieldValue {
    /// Concatenates a (possibly multi-element) raw value into one unsigned
    /// integer for component bit-slicing, little-endian element order.
    fn to_bits(&self, elem_bits: u32) -> u64 {
        match self {
            RawFieldValue::Scalar(v) => scalar_bits(v),
            RawFieldValue::Bytes(bytes) => {
                bytes.iter().enumerate().fold(0u64, |acc, (i, b)| acc | ((*b as u64) << (i as u32 * 8)))
            }
            RawFieldValue::Tuple(vals) => vals.iter().enumerate().fold(0u64, |acc, (i, v)| {
                let bits = v.as_ref().map(scalar_bits).unwrap_or(0);
                acc | (bits << (i as u32 * elem_bits))
            }),
        }
    }
}

fn scalar_bits(v: &RawValue) -> u64 {
    match v {
        RawValue::UInt(x) => *x,
        RawValue::SInt(x) => *x as u64,
        RawValue::Float(x) => x.to_bits(),
        RawValue::Bytes(_) => 0,
    }
}

/// A rendered field value, post scale/offset.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    SInt(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Array(Vec<Option<FieldValue>>),
}

/// Either a profile-table field descriptor or a runtime developer field.
#[derive(Debug, Clone)]
pub enum ResolvedField {
    Profile(&'static FieldDescriptor),
    Developer(DeveloperField),
}

impl ResolvedField {
    pub fn name(&self) -> &str {
        match self {
            ResolvedField::Profile(f) => f.name,
            ResolvedField::Developer(d) => &d.name,
        }
    }

    pub fn def_num(&self) -> u8 {
        match self {
            ResolvedField::Profile(f) => f.def_num,
            ResolvedField::Developer(d) => d.field_def_num,
        }
    }

    fn scale(&self) -> Option<f64> {
        match self {
            ResolvedField::Profile(f) => f.scale,
            ResolvedField::Developer(_) => None,
        }
    }

    fn offset(&self) -> Option<f64> {
        match self {
            ResolvedField::Profile(f) => f.offset,
            ResolvedField::Developer(_) => None,
        }
    }

    fn subfields(&self) -> &'static [SubField] {
        match self {
            ResolvedField::Profile(f) => f.subfields,
            ResolvedField::Developer(_) => &[],
        }
    }

    fn components(&self) -> &'static [Component] {
        match self {
            ResolvedField::Profile(f) => f.components,
            ResolvedField::Developer(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldData {
    /// Present for entries that correspond 1:1 to a raw field/dev-field
    /// definition; `None` for component-expanded and synthetic timestamp
    /// entries.
    pub field_def_num: Option<u8>,
    pub field: Option<ResolvedField>,
    pub parent_field: Option<ResolvedField>,
    pub raw_value: Option<RawFieldValue>,
    pub value: Option<FieldValue>,
}

#[derive(Debug, Clone)]
pub struct DataMessage {
    pub header: RecordHeader,
    pub global_mesg_num: u16,
    pub fields: Vec<FieldData>,
}

fn apply_scale_offset_scalar(v: &RawValue, scale: Option<f64>, offset: Option<f64>) -> FieldValue {
    let numeric = match v {
        RawValue::UInt(x) => Some(*x as f64),
        RawValue::SInt(x) => Some(*x as f64),
        RawValue::Float(x) => Some(*x),
        RawValue::Bytes(_) => None,
    };
    match numeric {
        Some(mut x) if scale.is_some() || offset.is_some() => {
            if let Some(s) = scale {
                if s != 0.0 {
                    x /= s;
                }
            }
            if let Some(o) = offset {
                x -= o;
            }
            FieldValue::Float(x)
        }
        _ => match v {
            RawValue::UInt(x) => FieldValue::UInt(*x),
            RawValue::SInt(x) => FieldValue::SInt(*x),
            RawValue::Float(x) => FieldValue::Float(*x),
            RawValue::Bytes(b) => FieldValue::Bytes(b.clone()),
        },
    }
}

fn render(raw: &RawFieldValue, scale: Option<f64>, offset: Option<f64>) -> FieldValue {
    match raw {
        RawFieldValue::Scalar(v) => apply_scale_offset_scalar(v, scale, offset),
        RawFieldValue::Bytes(b) => FieldValue::Bytes(b.clone()),
        RawFieldValue::Tuple(vals) => FieldValue::Array(
            vals.iter().map(|v| v.as_ref().map(|v| apply_scale_offset_scalar(v, scale, offset))).collect(),
        ),
    }
}

fn extract_raw<R: Read>(
    src: &mut ByteSource<R>,
    base_type: crate::basetype::BaseType,
    size: u8,
    endian: crate::structcodec::Endian,
) -> FitResult<Option<RawFieldValue>> {
    let count = size as usize / base_type.size as usize;
    let data = src.read(size as usize)?;
    src.write(&data)?;
    let nums = read_struct(&data, &base_type, count, endian)?;

    if base_type.name == "byte" {
        let bytes: Vec<u8> = nums
            .iter()
            .map(|n| match n {
                RawNum::U(v) => *v as u8,
                _ => 0,
            })
            .collect();
        if bytes.iter().all(|b| *b == 0xFF) {
            return Ok(None);
        }
        return Ok(Some(RawFieldValue::Bytes(bytes)));
    }

    if count == 1 {
        return Ok(base_type.parse(nums[0]).map(RawFieldValue::Scalar));
    }

    let parsed: Vec<Option<RawValue>> = nums.into_iter().map(|n| base_type.parse(n)).collect();
    if parsed.iter().all(Option::is_none) {
        Ok(None)
    } else {
        Ok(Some(RawFieldValue::Tuple(parsed)))
    }
}

/// Resolves `field`'s effective (field, parent) pair by scanning its
/// sub-fields in declaration order and selecting the first one all of whose
/// `ref_fields` match the record's already-decoded raw values (all
/// ref_fields must match, not just one).
fn resolve_subfield(
    field: &'static FieldDescriptor,
    raw_by_def_num: &std::collections::HashMap<u8, Option<RawValue>>,
) -> (ResolvedField, Option<ResolvedField>) {
    for sub in field.subfields {
        let all_match = sub.ref_fields.iter().all(|rf| {
            raw_by_def_num
                .get(&rf.def_num)
                .and_then(|v| v.as_ref())
                .and_then(|v| v.as_i64())
                .map(|v| v == rf.raw_value)
                .unwrap_or(false)
        });
        if all_match && !sub.ref_fields.is_empty() {
            return (ResolvedField::Profile(subfield_as_descriptor(sub)), Some(ResolvedField::Profile(field)));
        }
    }
    (ResolvedField::Profile(field), None)
}

/// Leaks a small per-subfield `FieldDescriptor` view so subfields can be
/// handled through the same `ResolvedField::Profile` path as top-level
/// fields. Subfields are a fixed, small, 'static table, so the one-time leak
/// is bounded by the size of the embedded profile, not by input size.
fn subfield_as_descriptor(sub: &'static SubField) -> &'static FieldDescriptor {
    use std::collections::HashMap;
    use std::sync::OnceLock;
    static CACHE: OnceLock<std::sync::Mutex<HashMap<usize, &'static FieldDescriptor>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(HashMap::new()));
    let key = sub as *const SubField as usize;
    let mut guard = cache.lock().unwrap();
    *guard.entry(key).or_insert_with(|| {
        let descriptor = FieldDescriptor {
            def_num: sub.def_num,
            name: sub.name,
            scale: sub.scale,
            offset: sub.offset,
            subfields: &[],
            components: sub.components,
            units: None,
        };
        Box::leak(Box::new(descriptor))
    })
}

#[allow(clippy::too_many_arguments)]
pub fn decode_data_message<R: Read>(
    src: &mut ByteSource<R>,
    header: RecordHeader,
    def_mesg: &DefinitionMessage,
    accumulators: &mut Accumulators,
    dev_fields: &mut DeveloperFieldRegistry,
    compressed_ts: &mut u32,
    processor: &mut dyn Processor,
    expand_components: bool,
) -> FitResult<DataMessage> {
    let endian = def_mesg.endian;

    // Raw extraction in definition order, across native and developer fields.
    let mut field_datas: Vec<FieldData> = Vec::new();
    let mut raw_by_def_num: std::collections::HashMap<u8, Option<RawValue>> = std::collections::HashMap::new();

    struct Slot {
        def_num: u8,
        base_type: crate::basetype::BaseType,
        size: u8,
        field: Option<ResolvedField>,
        dev_data_index: Option<u8>,
    }

    let mut slots = Vec::with_capacity(def_mesg.field_defs.len() + def_mesg.dev_field_defs.len());
    for fd in &def_mesg.field_defs {
        slots.push(Slot {
            def_num: fd.def_num,
            base_type: fd.base_type,
            size: fd.size,
            field: fd.field.map(ResolvedField::Profile),
            dev_data_index: None,
        });
    }
    for dfd in &def_mesg.dev_field_defs {
        let resolved = dev_fields.lookup(dfd.dev_data_index, dfd.def_num).cloned();
        let base_type = resolved.as_ref().map(|f| f.base_type).unwrap_or_else(|| crate::basetype::lookup_base_type(0x0D));
        slots.push(Slot {
            def_num: dfd.def_num,
            base_type,
            size: dfd.size,
            field: resolved.map(ResolvedField::Developer),
            dev_data_index: Some(dfd.dev_data_index),
        });
    }

    let mut raw_values = Vec::with_capacity(slots.len());
    for slot in &slots {
        let raw = extract_raw(src, slot.base_type, slot.size, endian)?;
        if slot.dev_data_index.is_none() {
            let scalar = match &raw {
                Some(RawFieldValue::Scalar(v)) => Some(v.clone()),
                _ => None,
            };
            raw_by_def_num.insert(slot.def_num, scalar);
        }
        raw_values.push(raw);
    }

    for (slot, raw) in slots.iter().zip(raw_values.into_iter()) {
        let (field, parent_field) = match &slot.field {
            Some(ResolvedField::Profile(f)) => resolve_subfield(f, &raw_by_def_num),
            Some(ResolvedField::Developer(d)) => (ResolvedField::Developer(d.clone()), None),
            None => (ResolvedField::Developer(DeveloperField {
                field_def_num: slot.def_num,
                name: format!("unknown_{}", slot.def_num),
                base_type: slot.base_type,
                units: None,
            }), None),
        };
        let has_static_field = matches!(slot.field, Some(ResolvedField::Profile(_)));

        if expand_components && has_static_field {
            for component in field.components() {
                let Some(parent_raw) = raw.as_ref() else { continue };
                let elem_bits = slot.base_type.size as u32 * 8;
                let bits_value = parent_raw.to_bits(elem_bits);
                let mask = if component.bits >= 64 { u64::MAX } else { (1u64 << component.bits) - 1 };
                let mut cmp_raw = (bits_value >> component.bit_offset) & mask;

                if component.accumulate {
                    let stored = *accumulators
                        .entry(def_mesg.global_mesg_num)
                        .or_default()
                        .entry(component.dest_def_num)
                        .or_insert(0);
                    cmp_raw = accumulate_bits(cmp_raw, stored, component.bits as u32);
                    accumulators.get_mut(&def_mesg.global_mesg_num).unwrap().insert(component.dest_def_num, cmp_raw);
                }

                let scaled = apply_scale_offset_scalar(&RawValue::UInt(cmp_raw), component.scale, component.offset);
                let cmp_raw_value = RawValue::UInt(cmp_raw);

                let cmp_field = def_mesg
                    .mesg_type
                    .and_then(|m| m.field(component.dest_def_num))
                    .map(|f| resolve_subfield(f, &raw_by_def_num))
                    .unwrap_or((
                        ResolvedField::Developer(DeveloperField {
                            field_def_num: component.dest_def_num,
                            name: format!("unknown_{}", component.dest_def_num),
                            base_type: slot.base_type,
                            units: None,
                        }),
                        None,
                    ));

                let mut component_field_data = FieldData {
                    field_def_num: None,
                    field: Some(cmp_field.0),
                    parent_field: cmp_field.1,
                    raw_value: Some(RawFieldValue::Scalar(cmp_raw_value)),
                    value: Some(scaled),
                };
                run_field_hooks(processor, &mut component_field_data);
                field_datas.push(component_field_data);
            }
        }

        let value = raw.as_ref().map(|r| render(r, field.scale(), field.offset()));

        if slot.def_num == TIMESTAMP_DEF_NUM {
            if let Some(RawFieldValue::Scalar(RawValue::UInt(v))) = &raw {
                *compressed_ts = *v as u32;
            }
        }

        let mut this_field_data =
            FieldData { field_def_num: Some(slot.def_num), field: Some(field), parent_field, raw_value: raw, value };
        run_field_hooks(processor, &mut this_field_data);
        field_datas.push(this_field_data);
    }

    if let RecordHeader::CompressedTimestamp { time_offset, .. } = header {
        let ts = accumulate_bits(time_offset as u64, *compressed_ts as u64, 5);
        *compressed_ts = ts as u32;
        let mut synthetic = FieldData {
            field_def_num: None,
            field: Some(ResolvedField::Developer(DeveloperField {
                field_def_num: TIMESTAMP_DEF_NUM,
                name: "timestamp".into(),
                base_type: crate::basetype::lookup_base_type(0x86),
                units: Some("s".into()),
            })),
            parent_field: None,
            raw_value: Some(RawFieldValue::Scalar(RawValue::UInt(ts))),
            value: Some(FieldValue::UInt(ts)),
        };
        run_field_hooks(processor, &mut synthetic);
        field_datas.push(synthetic);
    }

    if def_mesg.global_mesg_num == GLOBAL_DEVELOPER_DATA_ID {
        if let Some(idx) = find_uint(&field_datas, 3) {
            dev_fields.register_developer_data_id(idx as u8);
        }
    } else if def_mesg.global_mesg_num == GLOBAL_FIELD_DESCRIPTION {
        let dev_data_index = find_uint(&field_datas, 0);
        let field_def_num = find_uint(&field_datas, 1);
        let base_type_id = find_uint(&field_datas, 2);
        let name = find_string(&field_datas, 3, src)?;
        let units = find_string(&field_datas, 8, src).ok();
        if let (Some(idx), Some(num), Some(bt)) = (dev_data_index, field_def_num, base_type_id) {
            dev_fields.register_field_description(idx as u8, num as u8, bt as u8, name, units);
        }
    }

    let mut message = DataMessage { header, global_mesg_num: def_mesg.global_mesg_num, fields: field_datas };
    processor.run_message_processor(&mut message);
    Ok(message)
}

fn run_field_hooks(processor: &mut dyn Processor, fd: &mut FieldData) {
    processor.run_type_processor(fd);
    processor.run_field_processor(fd);
    processor.run_unit_processor(fd);
}

fn find_uint(fields: &[FieldData], def_num: u8) -> Option<u64> {
    fields.iter().find(|f| f.field_def_num == Some(def_num)).and_then(|f| match &f.raw_value {
        Some(RawFieldValue::Scalar(RawValue::UInt(v))) => Some(*v),
        Some(RawFieldValue::Scalar(RawValue::SInt(v))) => u64::try_from(*v).ok(),
        _ => None,
    })
}

/// `developer_data_id`/`field_description` string fields (name, units) are
/// captured as a byte tuple at extraction time, same as any other
/// non-scalar field; this turns that tuple back into a nul-terminated
/// UTF-8 string rather than the numeric render path other fields use.
fn find_string<R: Read>(fields: &[FieldData], def_num: u8, _src: &mut ByteSource<R>) -> FitResult<String> {
    fields
        .iter()
        .find(|f| f.field_def_num == Some(def_num))
        .and_then(|f| match &f.raw_value {
            Some(RawFieldValue::Bytes(bytes)) => Some(bytes_to_cstring(bytes)),
            Some(RawFieldValue::Tuple(vals)) => {
                let bytes: Vec<u8> = vals.iter().filter_map(|v| v.as_ref().and_then(|v| v.as_u64())).map(|v| v as u8).collect();
                Some(bytes_to_cstring(&bytes))
            }
            Some(RawFieldValue::Scalar(RawValue::UInt(v))) => Some(bytes_to_cstring(&[*v as u8])),
            _ => None,
        })
        .ok_or_else(|| FitError::Parse(format!("missing string field {}", def_num)))
}

fn bytes_to_cstring(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetype::lookup_base_type;
    use crate::definition::{Accumulators, FieldDefinition};
    use crate::profile::{lookup_message_type, GLOBAL_RECORD};
    use crate::structcodec::Endian;
    use std::io::Cursor;

    fn record_def(field_defs: Vec<FieldDefinition>) -> DefinitionMessage {
        DefinitionMessage {
            header: RecordHeader::Normal { is_definition: true, is_developer_data: false, local_mesg_num: 0 },
            endian: Endian::Little,
            global_mesg_num: GLOBAL_RECORD,
            mesg_type: lookup_message_type(GLOBAL_RECORD),
            field_defs,
            dev_field_defs: vec![],
        }
    }

    #[test]
    fn component_expansion_matches_scenario() {
        let field = lookup_message_type(GLOBAL_RECORD).unwrap().field(8).unwrap();
        let def = record_def(vec![FieldDefinition {
            def_num: 8,
            size: 4,
            base_type: lookup_base_type(0x86),
            field: Some(field),
        }]);
        let mut accumulators = Accumulators::new();
        accumulators.entry(GLOBAL_RECORD).or_default().insert(5, 0);
        let mut dev_fields = DeveloperFieldRegistry::new();
        let mut compressed_ts = 0u32;
        let mut processor = crate::processor::NoopProcessor;

        // low 16 bits = speed raw (20), high 16 bits = distance raw (1)
        let bytes1 = ((1u32 << 16) | 20u32).to_le_bytes();
        let mut src1 = ByteSource::new(Cursor::new(bytes1.to_vec()));
        let header = RecordHeader::Normal { is_definition: false, is_developer_data: false, local_mesg_num: 0 };
        let msg1 = decode_data_message(
            &mut src1, header, &def, &mut accumulators, &mut dev_fields, &mut compressed_ts, &mut processor, true,
        )
        .unwrap();

        let speed = msg1.fields.iter().find(|f| f.field.as_ref().map(|x| x.name()) == Some("speed")).unwrap();
        assert_eq!(speed.value, Some(FieldValue::Float(0.2)));
        let distance = msg1.fields.iter().find(|f| f.field.as_ref().map(|x| x.name()) == Some("distance")).unwrap();
        assert_eq!(distance.raw_value, Some(RawFieldValue::Scalar(RawValue::UInt(1))));

        // distance rolls over: raw 0 with stored 1 accumulates to 0x10000, speed raw 10.
        let bytes2 = ((0u32 << 16) | 10u32).to_le_bytes();
        let mut src2 = ByteSource::new(Cursor::new(bytes2.to_vec()));
        let msg2 = decode_data_message(
            &mut src2, header, &def, &mut accumulators, &mut dev_fields, &mut compressed_ts, &mut processor, true,
        )
        .unwrap();
        let speed2 = msg2.fields.iter().find(|f| f.field.as_ref().map(|x| x.name()) == Some("speed")).unwrap();
        assert_eq!(speed2.value, Some(FieldValue::Float(0.1)));
    }

    #[test]
    fn compressed_timestamp_header_appends_synthetic_field() {
        let def = record_def(vec![]);
        let mut accumulators = Accumulators::new();
        let mut dev_fields = DeveloperFieldRegistry::new();
        let mut compressed_ts = 0x3FFF_FFF8u32;
        let mut processor = crate::processor::NoopProcessor;
        let mut src = ByteSource::new(Cursor::new(Vec::<u8>::new()));
        let header = RecordHeader::CompressedTimestamp { local_mesg_num: 1, time_offset: 5 };

        let msg = decode_data_message(
            &mut src, header, &def, &mut accumulators, &mut dev_fields, &mut compressed_ts, &mut processor, true,
        )
        .unwrap();

        let ts = msg.fields.last().unwrap();
        assert_eq!(ts.field_def_num, None);
        assert_eq!(ts.raw_value, Some(RawFieldValue::Scalar(RawValue::UInt(0x4000_0005))));
        assert_eq!(compressed_ts, 0x4000_0005);
    }
}
