//! Consumes the body of a definition record, installs the resulting schema
//! under its local-message-type slot, and initializes component
//! accumulators.

use std::collections::HashMap;
use std::io::Read;

use crate::basetype::{lookup_base_type, BaseType};
use crate::byteio::ByteSource;
use crate::error::{FitError, FitResult};
use crate::profile::{lookup_message_type, FieldDescriptor, MessageType};
use crate::recordheader::RecordHeader;
use crate::structcodec::{read_u16, Endian};

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub def_num: u8,
    pub size: u8,
    pub base_type: BaseType,
    pub field: Option<&'static FieldDescriptor>,
}

#[derive(Debug, Clone)]
pub struct DevFieldDefinition {
    pub def_num: u8,
    pub size: u8,
    pub dev_data_index: u8,
}

#[derive(Debug, Clone)]
pub struct DefinitionMessage {
    pub header: RecordHeader,
    pub endian: Endian,
    pub global_mesg_num: u16,
    pub mesg_type: Option<&'static MessageType>,
    pub field_defs: Vec<FieldDefinition>,
    pub dev_field_defs: Vec<DevFieldDefinition>,
}

/// Per global-message-number component accumulator state.
pub type Accumulators = HashMap<u16, HashMap<u8, u64>>;

pub fn decode_definition_message<R: Read>(
    src: &mut ByteSource<R>,
    header: RecordHeader,
    accumulators: &mut Accumulators,
) -> FitResult<DefinitionMessage> {
    let reserved = src.read(1)?;
    src.write(&reserved)?;

    let arch = src.read(1)?;
    src.write(&arch)?;
    let endian = if arch[0] == 0 { Endian::Little } else { Endian::Big };

    let head = src.read(3)?;
    src.write(&head)?;
    let global_mesg_num = read_u16(&head[0..2], endian);
    let num_fields = head[2];

    let mesg_type = lookup_message_type(global_mesg_num);

    let mut field_defs = Vec::with_capacity(num_fields as usize);
    for _ in 0..num_fields {
        let raw = src.read(3)?;
        src.write(&raw)?;
        let def_num = raw[0];
        let size = raw[1];
        let base_type = lookup_base_type(raw[2]);

        if size % base_type.size != 0 {
            return Err(FitError::Parse(format!(
                "field size {} not a multiple of base type '{}' size {}",
                size, base_type.name, base_type.size
            )));
        }

        let field = mesg_type.and_then(|m| m.field(def_num));
        if let Some(field) = field {
            for component in field.components {
                if component.accumulate {
                    accumulators.entry(global_mesg_num).or_default().insert(component.dest_def_num, 0);
                }
            }
        }

        field_defs.push(FieldDefinition { def_num, size, base_type, field });
    }

    let mut dev_field_defs = Vec::new();
    if let RecordHeader::Normal { is_developer_data: true, .. } = header {
        let count = src.read(1)?;
        src.write(&count)?;
        for _ in 0..count[0] {
            let raw = src.read(3)?;
            src.write(&raw)?;
            dev_field_defs.push(DevFieldDefinition { def_num: raw[0], size: raw[1], dev_data_index: raw[2] });
        }
    }

    tracing::trace!(global_mesg_num, fields = field_defs.len(), "installed definition message");

    Ok(DefinitionMessage { header, endian, global_mesg_num, mesg_type, field_defs, dev_field_defs })
}
