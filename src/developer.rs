//! Keyed by `(developer_data_index, field_definition_number)`, populated by
//! data messages of global type `developer_data_id` and `field_description`.
//! Owned by the parser instance rather than process-global state, so
//! chained or concurrently-alive parsers never leak schemas across streams
//! (see DESIGN.md).

use std::collections::HashMap;

use crate::basetype::{lookup_base_type, BaseType};

/// A developer field's schema, as declared at runtime by the producing
/// device via a `field_description` message.
#[derive(Debug, Clone)]
pub struct DeveloperField {
    pub field_def_num: u8,
    pub name: String,
    pub base_type: BaseType,
    pub units: Option<String>,
}

#[derive(Debug, Default)]
pub struct DeveloperFieldRegistry {
    fields: HashMap<(u8, u8), DeveloperField>,
    /// developer_data_index values seen via `developer_data_id` messages;
    /// tracked so a `field_description` referencing an unknown index can
    /// still be distinguished from a malformed stream if needed later.
    known_indices: std::collections::HashSet<u8>,
}

impl DeveloperFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_developer_data_id(&mut self, dev_data_index: u8) {
        self.known_indices.insert(dev_data_index);
    }

    pub fn register_field_description(
        &mut self,
        dev_data_index: u8,
        field_def_num: u8,
        fit_base_type_id: u8,
        name: String,
        units: Option<String>,
    ) {
        self.fields.insert(
            (dev_data_index, field_def_num),
            DeveloperField { field_def_num, name, base_type: lookup_base_type(fit_base_type_id), units },
        );
    }

    pub fn lookup(&self, dev_data_index: u8, field_def_num: u8) -> Option<&DeveloperField> {
        self.fields.get(&(dev_data_index, field_def_num))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_developer_field_resolves_to_none() {
        let registry = DeveloperFieldRegistry::new();
        assert!(registry.lookup(0, 0).is_none());
    }

    #[test]
    fn registered_developer_field_resolves() {
        let mut registry = DeveloperFieldRegistry::new();
        registry.register_developer_data_id(1);
        registry.register_field_description(1, 5, 0x84, "my_field".into(), Some("W".into()));
        let field = registry.lookup(1, 5).unwrap();
        assert_eq!(field.name, "my_field");
        assert_eq!(field.base_type.name, "uint16");
    }
}
