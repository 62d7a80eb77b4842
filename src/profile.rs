//! The full FIT global-message catalog is an external collaborator the
//! decoder core only consumes (`MESSAGE_TYPES[global_num] -> { name, fields
//! }` and a `TIMESTAMP_FIELD` singleton). This module ships the small, real
//! slice of that catalog the decoder itself needs to exercise developer-field
//! registration, compressed timestamps and component expansion — not a full
//! code-generated profile (see DESIGN.md).

use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub struct Component {
    pub dest_def_num: u8,
    pub bit_offset: u8,
    pub bits: u8,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub accumulate: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RefField {
    pub def_num: u8,
    pub raw_value: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct SubField {
    pub name: &'static str,
    /// Same definition number as the parent field it replaces.
    pub def_num: u8,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub components: &'static [Component],
    pub ref_fields: &'static [RefField],
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub def_num: u8,
    pub name: &'static str,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub subfields: &'static [SubField],
    pub components: &'static [Component],
    pub units: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct MessageType {
    pub global_mesg_num: u16,
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl MessageType {
    pub fn field(&self, def_num: u8) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.def_num == def_num)
    }
}

/// The field definition number FIT reserves for `timestamp` in every
/// message that carries one; compressed-timestamp accumulation keys off
/// this def_num regardless of which global message it appears in.
pub const TIMESTAMP_DEF_NUM: u8 = 253;

pub const GLOBAL_FILE_ID: u16 = 0;
pub const GLOBAL_RECORD: u16 = 20;
pub const GLOBAL_EVENT: u16 = 21;
pub const GLOBAL_FIELD_DESCRIPTION: u16 = 206;
pub const GLOBAL_DEVELOPER_DATA_ID: u16 = 207;

const FILE_ID_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor { def_num: 0, name: "type", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 1, name: "manufacturer", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 2, name: "product", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 3, name: "serial_number", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 4, name: "time_created", scale: None, offset: None, subfields: &[], components: &[], units: None },
];

const RECORD_COMPRESSED_SPEED_DISTANCE_COMPONENTS: &[Component] = &[
    Component { dest_def_num: 6, bit_offset: 0, bits: 16, scale: Some(100.0), offset: None, accumulate: false },
    Component { dest_def_num: 5, bit_offset: 16, bits: 16, scale: None, offset: None, accumulate: true },
];

const RECORD_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor { def_num: TIMESTAMP_DEF_NUM, name: "timestamp", scale: None, offset: None, subfields: &[], components: &[], units: Some("s") },
    FieldDescriptor { def_num: 0, name: "position_lat", scale: None, offset: None, subfields: &[], components: &[], units: Some("semicircles") },
    FieldDescriptor { def_num: 1, name: "position_long", scale: None, offset: None, subfields: &[], components: &[], units: Some("semicircles") },
    FieldDescriptor { def_num: 2, name: "altitude", scale: Some(5.0), offset: Some(500.0), subfields: &[], components: &[], units: Some("m") },
    FieldDescriptor { def_num: 3, name: "heart_rate", scale: None, offset: None, subfields: &[], components: &[], units: Some("bpm") },
    FieldDescriptor { def_num: 4, name: "cadence", scale: None, offset: None, subfields: &[], components: &[], units: Some("rpm") },
    FieldDescriptor { def_num: 5, name: "distance", scale: Some(100.0), offset: None, subfields: &[], components: &[], units: Some("m") },
    FieldDescriptor { def_num: 6, name: "speed", scale: Some(1000.0), offset: None, subfields: &[], components: &[], units: Some("m/s") },
    FieldDescriptor {
        def_num: 8,
        name: "compressed_speed_distance",
        scale: None,
        offset: None,
        subfields: &[],
        components: RECORD_COMPRESSED_SPEED_DISTANCE_COMPONENTS,
        units: None,
    },
];

const EVENT_TYPE_DATA16_SUBFIELDS: &[SubField] = &[SubField {
    name: "data16",
    def_num: 1,
    scale: None,
    offset: None,
    components: &[],
    ref_fields: &[RefField { def_num: 0, raw_value: 4 }],
}];

const EVENT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor { def_num: TIMESTAMP_DEF_NUM, name: "timestamp", scale: None, offset: None, subfields: &[], components: &[], units: Some("s") },
    FieldDescriptor { def_num: 0, name: "event", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor {
        def_num: 1,
        name: "event_type",
        scale: None,
        offset: None,
        subfields: EVENT_TYPE_DATA16_SUBFIELDS,
        components: &[],
        units: None,
    },
];

const DEVELOPER_DATA_ID_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor { def_num: 0, name: "application_id", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 3, name: "developer_data_index", scale: None, offset: None, subfields: &[], components: &[], units: None },
];

const FIELD_DESCRIPTION_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor { def_num: 0, name: "developer_data_index", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 1, name: "field_definition_number", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 2, name: "fit_base_type_id", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 3, name: "field_name", scale: None, offset: None, subfields: &[], components: &[], units: None },
    FieldDescriptor { def_num: 8, name: "units", scale: None, offset: None, subfields: &[], components: &[], units: None },
];

const MESSAGE_TABLE: &[MessageType] = &[
    MessageType { global_mesg_num: GLOBAL_FILE_ID, name: "file_id", fields: FILE_ID_FIELDS },
    MessageType { global_mesg_num: GLOBAL_RECORD, name: "record", fields: RECORD_FIELDS },
    MessageType { global_mesg_num: GLOBAL_EVENT, name: "event", fields: EVENT_FIELDS },
    MessageType { global_mesg_num: GLOBAL_DEVELOPER_DATA_ID, name: "developer_data_id", fields: DEVELOPER_DATA_ID_FIELDS },
    MessageType { global_mesg_num: GLOBAL_FIELD_DESCRIPTION, name: "field_description", fields: FIELD_DESCRIPTION_FIELDS },
];

fn table() -> &'static HashMap<u16, &'static MessageType> {
    static TABLE: OnceLock<HashMap<u16, &'static MessageType>> = OnceLock::new();
    TABLE.get_or_init(|| MESSAGE_TABLE.iter().map(|m| (m.global_mesg_num, m)).collect())
}

/// `MESSAGE_TYPES[global_num] -> MessageType`. Absent is allowed (raw decode
/// only).
pub fn lookup_message_type(global_mesg_num: u16) -> Option<&'static MessageType> {
    table().get(&global_mesg_num).copied()
}

pub fn lookup_message_name(global_mesg_num: u16) -> Option<&'static str> {
    lookup_message_type(global_mesg_num).map(|m| m.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_message_has_compressed_speed_distance_components() {
        let record = lookup_message_type(GLOBAL_RECORD).unwrap();
        let field = record.field(8).unwrap();
        assert_eq!(field.components.len(), 2);
        assert_eq!(field.components[0].dest_def_num, 6);
        assert_eq!(field.components[1].accumulate, true);
    }

    #[test]
    fn unknown_global_message_is_none() {
        assert!(lookup_message_type(0xFFFF).is_none());
    }
}
