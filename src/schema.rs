//! External schema validation for JSON and XML bodies.
//!
//! Validation is behind the [`SchemaValidator`] trait so callers can plug in
//! their own validator. JSON schemas are compiled with `jsonschema`. XML
//! payloads get a lenient check: `quick-xml` reads the XSD's top-level
//! element declarations and the payload's root element, and only the root
//! has to be declared.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaError;

/// One reason a payload does not satisfy a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// JSON pointer (or element path) of the offending value.
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

pub trait SchemaValidator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checks `payload` against `schema`. An `Err` means the schema itself is
    /// unusable; an empty list means the payload is valid.
    fn validate(&self, schema: &str, payload: &str) -> Result<Vec<SchemaViolation>, SchemaError>;
}

// ============================================================================
// JSON SCHEMA
// ============================================================================

/// JSON Schema validation; the draft is taken from `$schema`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn name(&self) -> &'static str {
        "json-schema"
    }

    fn validate(&self, schema: &str, payload: &str) -> Result<Vec<SchemaViolation>, SchemaError> {
        let schema: Value = serde_json::from_str(schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        let payload: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                return Ok(vec![SchemaViolation::new(
                    "",
                    format!("payload is not valid JSON: {}", e),
                )])
            }
        };
        let violations = validator
            .iter_errors(&payload)
            .map(|error| SchemaViolation::new(&error.instance_path.to_string(), error.to_string()))
            .collect();
        Ok(violations)
    }
}

// ============================================================================
// XML SCHEMA
// ============================================================================

/// Accepts any well-formed XML payload whose root element is declared at
/// the top level of the XSD. Content models are not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientXmlValidator;

impl SchemaValidator for LenientXmlValidator {
    fn name(&self) -> &'static str {
        "xml-schema"
    }

    fn validate(&self, schema: &str, payload: &str) -> Result<Vec<SchemaViolation>, SchemaError> {
        let declared = declared_elements(schema)?;
        if declared.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "the schema declares no elements".to_string(),
            ));
        }
        let root = match payload_root(payload) {
            Ok(Some(root)) => root,
            Ok(None) => return Ok(vec![SchemaViolation::new("", "payload is not an XML document")]),
            Err(message) => return Ok(vec![SchemaViolation::new("", message)]),
        };
        if declared.contains(&root) {
            Ok(Vec::new())
        } else {
            Ok(vec![SchemaViolation::new(
                &format!("/{}", root),
                format!("root element '{}' is not declared by the schema", root),
            )])
        }
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Names of the `element` declarations directly below `schema`.
fn declared_elements(schema: &str) -> Result<Vec<String>, SchemaError> {
    let mut reader = Reader::from_str(schema);
    let mut depth = 0usize;
    let mut names = Vec::new();
    loop {
        let event = reader
            .read_event()
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        let (element, opens) = match &event {
            Event::Start(element) => (element, true),
            Event::Empty(element) => (element, false),
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        let name = local_name(element);
        if depth == 0 && name != "schema" {
            return Err(SchemaError::Unsupported(format!(
                "root element '{}' is not an XML Schema",
                name
            )));
        }
        if depth == 1 && name == "element" {
            let declared = element
                .try_get_attribute("name")
                .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
            if let Some(attribute) = declared {
                let value = attribute
                    .unescape_value()
                    .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
                names.push(value.into_owned());
            }
        }
        if opens {
            depth += 1;
        }
    }
    Ok(names)
}

/// Local name of the payload's root element, after reading the whole
/// document so malformed payloads are reported.
fn payload_root(payload: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(payload);
    let mut root = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                if root.is_none() {
                    root = Some(local_name(&element));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("payload is not well-formed XML: {}", e)),
        }
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = r##"{
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "name": {"type": "string", "minLength": 2},
            "age": {"$ref": "#/definitions/age"}
        },
        "required": ["name"],
        "additionalProperties": false,
        "definitions": {"age": {"type": "integer", "minimum": 0}}
    }"##;

    fn violations(payload: &str) -> Vec<SchemaViolation> {
        JsonSchemaValidator.validate(USER, payload).unwrap()
    }

    #[test]
    fn json_payloads_are_checked() {
        assert!(violations(r#"{"name": "Ann", "age": 3}"#).is_empty());

        let missing = violations(r#"{"age": 3}"#);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("name"), "{}", missing[0]);

        let negative = violations(r#"{"name": "Ann", "age": -1}"#);
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].path, "/age");

        let extra = violations(r#"{"name": "Ann", "x": 1}"#);
        assert_eq!(extra.len(), 1);
        assert!(extra[0].message.contains('x'), "{}", extra[0]);

        assert_eq!(violations("[1]").len(), 1);
        assert_eq!(violations("{").len(), 1);
    }

    #[test]
    fn unusable_json_schemas_are_errors() {
        assert!(matches!(
            JsonSchemaValidator.validate("{", "{}"),
            Err(SchemaError::InvalidSchema(_))
        ));
        assert!(matches!(
            JsonSchemaValidator.validate(r#"{"type": 12}"#, "{}"),
            Err(SchemaError::InvalidSchema(_))
        ));
    }

    const XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <!-- <xs:element name="ghost"/> -->
    <xs:element name="user">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="nickname" type="xs:string"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

    #[test]
    fn xml_root_element_must_be_declared() {
        let validator = LenientXmlValidator;
        assert!(validator
            .validate(XSD, "<?xml version=\"1.0\"?>\n<user><nickname>Ann</nickname></user>")
            .unwrap()
            .is_empty());
        assert!(validator.validate(XSD, "<u:user xmlns:u=\"urn:u\"/>").unwrap().is_empty());
        assert_eq!(validator.validate(XSD, "<order/>").unwrap().len(), 1);
        assert_eq!(validator.validate(XSD, "plain text").unwrap().len(), 1);
        assert_eq!(validator.validate(XSD, "<user></order>").unwrap().len(), 1);
    }

    #[test]
    fn only_top_level_declarations_count() {
        let validator = LenientXmlValidator;
        assert_eq!(validator.validate(XSD, "<nickname/>").unwrap().len(), 1);
        assert_eq!(validator.validate(XSD, "<ghost/>").unwrap().len(), 1);
    }

    #[test]
    fn unusable_xml_schemas_are_errors() {
        let validator = LenientXmlValidator;
        assert!(matches!(
            validator.validate("<xs:schema/>", "<user/>"),
            Err(SchemaError::InvalidSchema(_))
        ));
        assert!(matches!(
            validator.validate("<html><element name=\"user\"/></html>", "<user/>"),
            Err(SchemaError::Unsupported(_))
        ));
    }
}
