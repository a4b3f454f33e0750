//! Option and input validation
//!
//! Runs before authorization, against the declared schema only: no
//! persistence reads, no permission state. The single side effect is
//! normalization of enumerated option values (comma-separated strings
//! become lists) in place on the frame.

use serde_json::Value;

use crate::core::action::ActionDefinition;
use crate::core::error::ValidationError;
use crate::core::frame::{Frame, OptionValue};

/// Validate a frame against an action's declared schema.
///
/// Rejects unknown options, out-of-enumeration option values, and missing
/// required options or input fields. On success the frame's enumerated
/// options have been normalized to [`OptionValue::List`].
pub fn validate(definition: &ActionDefinition, frame: &mut Frame) -> Result<(), ValidationError> {
    for option in frame.options.keys() {
        if !definition.allows_option(option) {
            return Err(ValidationError::UnknownOption {
                option: option.clone(),
            });
        }
    }

    for constraint in &definition.options {
        let elements = match frame.options.get(constraint.name) {
            None if constraint.required => {
                return Err(ValidationError::MissingOption {
                    option: constraint.name.to_owned(),
                });
            }
            None => continue,
            Some(value) => {
                let Some(allowed) = constraint.values else {
                    continue;
                };
                let elements = value.elements();
                for element in &elements {
                    if !allowed.contains(&element.as_str()) {
                        return Err(ValidationError::InvalidOptionValue {
                            option: constraint.name.to_owned(),
                            value: element.clone(),
                        });
                    }
                }
                elements
            }
        };
        frame
            .options
            .insert(constraint.name.to_owned(), OptionValue::List(elements));
    }

    validate_input(definition, frame)
}

fn validate_input(definition: &ActionDefinition, frame: &Frame) -> Result<(), ValidationError> {
    if definition.input.required.is_empty() {
        return Ok(());
    }
    let Some(entity) = definition.input.source else {
        return Ok(());
    };

    let record = frame
        .first_record(entity)
        .ok_or_else(|| ValidationError::MissingInput {
            entity: entity.to_owned(),
        })?;
    let fields = record
        .as_object()
        .ok_or_else(|| ValidationError::MalformedInput {
            entity: entity.to_owned(),
            message: "record must be an object".to_owned(),
        })?;

    for field in definition.input.required {
        match fields.get(*field) {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingField {
                    entity: entity.to_owned(),
                    field: (*field).to_owned(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}
