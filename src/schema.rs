use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A resource kind's form schema, fetched on demand from the static site.
///
/// The shape is JSON-Schema-like but only the subset the portal renders:
/// scalar fields plus one level of object grouping. The `provisioner` key is
/// portal-specific and decides how a submission is packaged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceSchema {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provisioner: Provisioner,
    #[serde(default)]
    pub properties: Properties,
}

/// How a submission for this kind reaches the platform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provisioner {
    /// Manifest file on a branch plus a pull request.
    PullRequest,
    /// GitHub Actions workflow dispatch with flat string inputs.
    WorkflowDispatch { workflow: String },
}

impl Default for Provisioner {
    fn default() -> Self {
        Provisioner::PullRequest
    }
}

/// Schema properties in declaration order.
///
/// Field order drives form layout, so the map is kept as an ordered list of
/// entries instead of a sorted map.
#[derive(Debug, Clone, Default)]
pub struct Properties(pub Vec<(String, FieldSpec)>);

impl Properties {
    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldSpec)> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of field names to field specs")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    entries.push((name, spec));
                }
                Ok(Properties(entries))
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Nested object fields; flattened into the parent form under a section.
    #[serde(default)]
    pub properties: Option<Properties>,
}

impl FieldSpec {
    pub fn is_object(&self) -> bool {
        self.kind.as_deref() == Some("object") || self.properties.is_some()
    }

    pub fn is_boolean(&self) -> bool {
        self.kind.as_deref() == Some("boolean")
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind.as_deref(), Some("number") | Some("integer"))
    }
}

/// A schema field flattened to the form surface: nested object leaves carry
/// the section heading of the object that grouped them.
#[derive(Debug, Clone)]
pub struct FlatField<'a> {
    pub name: &'a str,
    pub section: Option<String>,
    pub spec: &'a FieldSpec,
}

impl ResourceSchema {
    /// Top-level scalar fields in declaration order, then nested object
    /// fields flattened under their section heading. The emitted payload
    /// stays flat; nesting only produces headings.
    pub fn flattened_fields(&self) -> Vec<FlatField<'_>> {
        let mut fields = Vec::new();
        for (name, spec) in self.properties.iter() {
            if !spec.is_object() {
                fields.push(FlatField { name, section: None, spec });
            }
        }
        for (name, spec) in self.properties.iter() {
            if spec.is_object() {
                let section = spec.title.clone().unwrap_or_else(|| display_name(name));
                collect_leaves(spec, &section, &mut fields);
            }
        }
        fields
    }
}

fn collect_leaves<'a>(object: &'a FieldSpec, section: &str, out: &mut Vec<FlatField<'a>>) {
    let Some(properties) = &object.properties else {
        return;
    };
    for (name, spec) in properties.iter() {
        if spec.is_object() {
            // Deeper nesting keeps the outermost section heading.
            collect_leaves(spec, section, out);
        } else {
            out.push(FlatField {
                name,
                section: Some(section.to_string()),
                spec,
            });
        }
    }
}

/// `StorageAccount` -> `Storage Account`, `maxSizeInMegabytes` ->
/// `Max Size In Megabytes`.
pub fn display_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_uppercase());
        } else {
            if ch.is_ascii_uppercase() {
                out.push(' ');
            }
            out.push(ch);
        }
    }
    out
}

/// `StorageAccount` -> `storage-account`, used for schema paths, branch
/// names and manifest directories.
pub fn kind_slug(kind: &str) -> String {
    let mut out = String::with_capacity(kind.len() + 4);
    for (i, ch) in kind.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
