//! Four ordered callbacks a consumer can plug in to transform decoded
//! values in place. Modeled as a trait with no-op defaults, so a caller only
//! overrides the hooks it actually needs.

use crate::data::{DataMessage, FieldData};

pub trait Processor {
    fn run_type_processor(&mut self, _field_data: &mut FieldData) {}
    fn run_field_processor(&mut self, _field_data: &mut FieldData) {}
    fn run_unit_processor(&mut self, _field_data: &mut FieldData) {}
    fn run_message_processor(&mut self, _message: &mut DataMessage) {}
}

/// The default processor: every hook is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProcessor;

impl Processor for NoopProcessor {}
