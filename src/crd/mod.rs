//! CRD extraction from multi-document Kubernetes YAML

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::ImportError;

/// The Kubernetes kind selected by the CRD filter.
pub const CRD_KIND: &str = "CustomResourceDefinition";

/// A decoded Kubernetes object from a multi-document YAML stream.
///
/// Objects are read-only after decoding; the pipeline only inspects the
/// `kind` field and re-encodes the selected objects back to YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KubernetesObject(Value);

impl KubernetesObject {
    /// Get the object's `kind`, if present.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    /// Get the object's `apiVersion`, if present.
    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(Value::as_str)
    }

    /// Get the object's `metadata.name`, if present.
    pub fn name(&self) -> Option<&str> {
        self.0.get("metadata").and_then(|m| m.get("name")).and_then(Value::as_str)
    }

    /// Check whether this object is a CustomResourceDefinition.
    pub fn is_crd(&self) -> bool {
        self.kind() == Some(CRD_KIND)
    }

    /// Access the underlying YAML value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

/// Decode raw bytes as a stream of `---`-separated YAML documents.
///
/// Empty documents between separators are skipped. A malformed document
/// anywhere in the stream fails the whole decode.
pub fn decode_objects(data: &[u8]) -> Result<Vec<KubernetesObject>, ImportError> {
    let mut objects = Vec::new();

    for document in serde_yaml::Deserializer::from_slice(data) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        objects.push(KubernetesObject(value));
    }

    debug!("decoded {} objects", objects.len());
    Ok(objects)
}

/// Re-serialize the CRD subset of a decoded object sequence.
///
/// Objects of any other kind are silently dropped; the input file may
/// legitimately contain RBAC, webhooks and other manifests alongside CRDs.
/// Each selected object is re-encoded to canonical YAML and appended behind
/// a `---` document separator, preserving encounter order. Zero matches
/// yield an empty buffer, which is still legitimate generator input.
pub fn filter_crds(objects: &[KubernetesObject]) -> Result<Vec<u8>, ImportError> {
    let mut buffer = String::new();

    for object in objects.iter().filter(|o| o.is_crd()) {
        buffer.push_str("---\n");
        buffer.push_str(&serde_yaml::to_string(object)?);
    }

    Ok(buffer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_DOC: &str = r#"---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: gadgets.example.com
"#;

    #[test]
    fn test_decode_multi_document_stream() {
        let objects = decode_objects(MULTI_DOC.as_bytes()).unwrap();

        assert_eq!(objects.len(), 3);
        assert_eq!(objects[0].kind(), Some("ConfigMap"));
        assert_eq!(objects[1].name(), Some("widgets.example.com"));
        assert_eq!(objects[2].api_version(), Some("apiextensions.k8s.io/v1"));
    }

    #[test]
    fn test_decode_empty_input() {
        let objects = decode_objects(b"").unwrap();
        assert!(objects.is_empty());
    }

    #[test]
    fn test_decode_malformed_yaml_fails() {
        let err = decode_objects(b"kind: [unclosed").unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn test_filter_drops_non_crd_objects() {
        let objects = decode_objects(MULTI_DOC.as_bytes()).unwrap();
        let buffer = filter_crds(&objects).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(text.matches("---\n").count(), 2);
        assert!(!text.contains("ConfigMap"));
        // Encounter order is preserved.
        let widgets = text.find("widgets.example.com").unwrap();
        let gadgets = text.find("gadgets.example.com").unwrap();
        assert!(widgets < gadgets);
    }

    #[test]
    fn test_filter_with_no_crds_is_empty() {
        let objects = decode_objects(b"kind: ConfigMap\n").unwrap();
        let buffer = filter_crds(&objects).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_filtered_buffer_is_valid_yaml() {
        let objects = decode_objects(MULTI_DOC.as_bytes()).unwrap();
        let buffer = filter_crds(&objects).unwrap();

        let reparsed = decode_objects(&buffer).unwrap();
        assert_eq!(reparsed.len(), 2);
        assert!(reparsed.iter().all(KubernetesObject::is_crd));
    }
}
