//! CUE definition generation from CRD schemas

use std::collections::BTreeMap;

use serde_yaml::Value;
use tracing::debug;

use crate::crd::decode_objects;
use crate::ImportError;

/// Schema-to-type generator contract.
///
/// Given CRD YAML and a provenance header, produce generated sources keyed
/// by `<group>/<singular>/<version>`. The trait is the injection seam for
/// the pipeline: tests substitute stubs returning fixed maps or synthetic
/// errors.
pub trait Importer {
    fn generate(
        &self,
        crd_yaml: &[u8],
        header: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ImportError>;
}

/// Generates CUE definition files from CRD `openAPIV3Schema` blocks.
pub struct CueImporter;

impl Default for CueImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CueImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for CueImporter {
    fn generate(
        &self,
        crd_yaml: &[u8],
        header: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ImportError> {
        let mut sources = BTreeMap::new();

        if crd_yaml.is_empty() {
            return Ok(sources);
        }

        let objects = decode_objects(crd_yaml)?;
        for object in &objects {
            self.import_crd(object.value(), header, &mut sources)?;
        }

        Ok(sources)
    }
}

impl CueImporter {
    /// Emit one definition file per served CRD version.
    fn import_crd(
        &self,
        doc: &Value,
        header: &str,
        out: &mut BTreeMap<String, Vec<u8>>,
    ) -> Result<(), ImportError> {
        let name = str_at(doc, &["metadata", "name"])
            .ok_or_else(|| ImportError::Generation("CRD missing metadata.name".to_string()))?;
        let group = str_at(doc, &["spec", "group"])
            .ok_or_else(|| ImportError::Generation(format!("CRD {name} missing spec.group")))?;
        let kind = str_at(doc, &["spec", "names", "kind"])
            .ok_or_else(|| ImportError::Generation(format!("CRD {name} missing spec.names.kind")))?;
        let singular = str_at(doc, &["spec", "names", "singular"])
            .map(str::to_string)
            .unwrap_or_else(|| kind.to_lowercase());

        let versions = doc
            .get("spec")
            .and_then(|s| s.get("versions"))
            .and_then(Value::as_sequence)
            .ok_or_else(|| ImportError::Generation(format!("CRD {name} missing spec.versions")))?;

        for version in versions {
            let version_name = version.get("name").and_then(Value::as_str).ok_or_else(|| {
                ImportError::Generation(format!("CRD {name} has a version without a name"))
            })?;

            let schema = version
                .get("schema")
                .and_then(|s| s.get("openAPIV3Schema"));
            let Some(schema) = schema else {
                debug!("CRD {} version {} has no schema, skipping", name, version_name);
                continue;
            };

            let key = format!("{group}/{singular}/{version_name}");
            debug!("importing {}", key);

            let content = self.render_definition(header, group, kind, version_name, schema)?;
            out.insert(key, content.into_bytes());
        }

        Ok(())
    }

    /// Render a complete `types_gen.cue` file for one CRD version.
    fn render_definition(
        &self,
        header: &str,
        group: &str,
        kind: &str,
        version: &str,
        schema: &Value,
    ) -> Result<String, ImportError> {
        let mut content = String::new();

        content.push_str(header);
        content.push_str("\n\n");
        content.push_str(&format!("package {}\n\n", cue_ident(version)));

        content.push_str(&format!("#{kind}: {{\n"));
        content.push_str(&format!("\tapiVersion: \"{group}/{version}\"\n"));
        content.push_str(&format!("\tkind: \"{kind}\"\n"));
        content.push_str("\tmetadata!: {\n");
        content.push_str("\t\tname!: string\n");
        content.push_str("\t\tnamespace?: string\n");
        content.push_str("\t\tlabels?: {[string]: string}\n");
        content.push_str("\t\tannotations?: {[string]: string}\n");
        content.push_str("\t}\n");

        // apiVersion, kind and metadata are pinned above; translate the
        // remaining top-level properties (spec, status, ...).
        let required = required_fields(schema);
        if let Some(properties) = schema.get("properties").and_then(Value::as_mapping) {
            for (field, field_schema) in properties {
                let Some(field) = field.as_str() else { continue };
                if matches!(field, "apiVersion" | "kind" | "metadata") {
                    continue;
                }
                let marker = if required.contains(&field) { "!" } else { "?" };
                let rendered = self.cue_type(field_schema, 1)?;
                content.push_str(&format!("\t{}{marker}: {rendered}\n", cue_label(field)));
            }
        }

        content.push_str("}\n");
        Ok(content)
    }

    /// Translate an OpenAPI v3 schema node into a CUE type expression.
    fn cue_type(&self, schema: &Value, indent: usize) -> Result<String, ImportError> {
        if let Some(values) = schema.get("enum").and_then(Value::as_sequence) {
            let literals = values
                .iter()
                .map(json_literal)
                .collect::<Result<Vec<_>, _>>()?;
            return apply_default(schema, literals.join(" | "));
        }

        let base = match schema.get("type").and_then(Value::as_str) {
            Some("string") => "string".to_string(),
            Some("boolean") => "bool".to_string(),
            Some("integer") => match schema.get("format").and_then(Value::as_str) {
                Some("int32") => "int32".to_string(),
                Some("int64") => "int64".to_string(),
                _ => "int".to_string(),
            },
            Some("number") => "number".to_string(),
            Some("array") => match schema.get("items") {
                Some(items) => format!("[...{}]", self.cue_type(items, indent)?),
                None => "[...]".to_string(),
            },
            Some("object") => self.cue_struct(schema, indent)?,
            None => {
                if schema.get("properties").is_some()
                    || schema.get("additionalProperties").is_some()
                    || preserve_unknown_fields(schema)
                {
                    self.cue_struct(schema, indent)?
                } else {
                    "_".to_string()
                }
            }
            Some(other) => {
                return Err(ImportError::Generation(format!(
                    "unsupported schema type: {other}"
                )))
            }
        };

        apply_default(schema, base)
    }

    /// Translate an object schema into a CUE struct literal.
    fn cue_struct(&self, schema: &Value, indent: usize) -> Result<String, ImportError> {
        let open = preserve_unknown_fields(schema);

        if let Some(properties) = schema.get("properties").and_then(Value::as_mapping) {
            if properties.is_empty() {
                return Ok("{...}".to_string());
            }

            let required = required_fields(schema);
            let tabs = "\t".repeat(indent + 1);
            let mut body = String::from("{\n");

            for (field, field_schema) in properties {
                let Some(field) = field.as_str() else { continue };
                let marker = if required.contains(&field) { "!" } else { "?" };
                let rendered = self.cue_type(field_schema, indent + 1)?;
                body.push_str(&format!("{tabs}{}{marker}: {rendered}\n", cue_label(field)));
            }

            if open {
                body.push_str(&format!("{tabs}...\n"));
            }
            body.push_str(&format!("{}}}", "\t".repeat(indent)));
            return Ok(body);
        }

        if let Some(additional) = schema.get("additionalProperties") {
            return match additional {
                Value::Bool(true) => Ok("{[string]: _}".to_string()),
                Value::Bool(false) => Ok("{}".to_string()),
                other => Ok(format!("{{[string]: {}}}", self.cue_type(other, indent)?)),
            };
        }

        Ok("{...}".to_string())
    }
}

/// Required field names declared on an object schema.
fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn preserve_unknown_fields(schema: &Value) -> bool {
    schema
        .get("x-kubernetes-preserve-unknown-fields")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Encode a YAML scalar as a CUE literal. CUE is a JSON superset, so JSON
/// encoding is always valid CUE.
fn json_literal(value: &Value) -> Result<String, ImportError> {
    serde_json::to_string(value)
        .map_err(|e| ImportError::Generation(format!("cannot encode literal: {e}")))
}

/// Wrap a type expression with its default, if the schema declares one.
fn apply_default(schema: &Value, base: String) -> Result<String, ImportError> {
    match schema.get("default") {
        Some(default) => Ok(format!("*{} | {base}", json_literal(default)?)),
        None => Ok(base),
    }
}

/// Render a field name as a CUE label, quoting when it is not a plain
/// identifier.
fn cue_label(name: &str) -> String {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if valid_first && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("\"{name}\"")
    }
}

/// Sanitize a version name into a valid CUE package identifier.
fn cue_ident(version: &str) -> String {
    version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for segment in path {
        current = current.get(*segment)?;
    }
    current.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGET_CRD: &str = r#"---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
    plural: widgets
    singular: widget
  versions:
    - name: v1
      served: true
      storage: true
      schema:
        openAPIV3Schema:
          type: object
          required: ["spec"]
          properties:
            spec:
              type: object
              required: ["replicas"]
              properties:
                replicas:
                  type: integer
                  format: int32
                mode:
                  type: string
                  enum: ["On", "Off"]
                  default: "On"
                labels:
                  type: object
                  additionalProperties:
                    type: string
                ports:
                  type: array
                  items:
                    type: integer
            status:
              type: object
              x-kubernetes-preserve-unknown-fields: true
"#;

    fn generate(yaml: &str) -> BTreeMap<String, Vec<u8>> {
        CueImporter::new().generate(yaml.as_bytes(), "// test header").unwrap()
    }

    #[test]
    fn test_key_per_crd_version() {
        let sources = generate(WIDGET_CRD);

        assert_eq!(sources.len(), 1);
        assert!(sources.contains_key("example.com/widget/v1"));
    }

    #[test]
    fn test_definition_shape() {
        let sources = generate(WIDGET_CRD);
        let content = String::from_utf8(sources["example.com/widget/v1"].clone()).unwrap();

        assert!(content.starts_with("// test header\n\n"));
        assert!(content.contains("package v1\n"));
        assert!(content.contains("#Widget: {"));
        assert!(content.contains("\tapiVersion: \"example.com/v1\"\n"));
        assert!(content.contains("\tkind: \"Widget\"\n"));
        assert!(content.contains("\tspec!: {"));
        assert!(content.contains("\t\treplicas!: int32\n"));
        assert!(content.contains("\t\tmode?: *\"On\" | \"On\" | \"Off\"\n"));
        assert!(content.contains("\t\tlabels?: {[string]: string}\n"));
        assert!(content.contains("\t\tports?: [...int]\n"));
        assert!(content.contains("\tstatus?: {...}\n"));
    }

    #[test]
    fn test_deterministic_output() {
        assert_eq!(generate(WIDGET_CRD), generate(WIDGET_CRD));
    }

    #[test]
    fn test_empty_buffer_yields_empty_map() {
        let sources = CueImporter::new().generate(b"", "// test header").unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_missing_group_is_a_generation_error() {
        let yaml = r#"---
kind: CustomResourceDefinition
metadata:
  name: broken.example.com
spec:
  names:
    kind: Broken
  versions: []
"#;
        let err = CueImporter::new().generate(yaml.as_bytes(), "").unwrap_err();
        assert!(matches!(err, ImportError::Generation(_)));
        assert!(err.to_string().contains("broken.example.com"));
    }

    #[test]
    fn test_schema_less_version_is_skipped() {
        let yaml = r#"---
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
  versions:
    - name: v1alpha1
      served: true
"#;
        let sources = CueImporter::new().generate(yaml.as_bytes(), "").unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_singular_falls_back_to_lowercased_kind() {
        let yaml = r#"---
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
  versions:
    - name: v1
      schema:
        openAPIV3Schema:
          type: object
"#;
        let sources = CueImporter::new().generate(yaml.as_bytes(), "").unwrap();
        assert!(sources.contains_key("example.com/widget/v1"));
    }

    #[test]
    fn test_quoted_labels_for_non_identifier_fields() {
        assert_eq!(cue_label("replicas"), "replicas");
        assert_eq!(cue_label("my-field"), "\"my-field\"");
        assert_eq!(cue_label("2fast"), "\"2fast\"");
    }
}
