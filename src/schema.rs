//! Schema model and parser.
//!
//! A document is parsed in two stages: serde deserializes the JSON into a
//! [`RawSchema`] tree (polymorphic keywords decoded once, into explicit
//! variants), and a post-parse lowering pass flattens that tree into an
//! arena-backed [`Document`] whose nodes carry parent back-references,
//! JSON keys and `#/...` pointers. Parent links are plain arena indices,
//! never a second owning edge, so reference cycles cost nothing.

use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use crate::error::SchemaError;
use crate::json_pointer;

/// Index of a node within its document's arena.
pub type NodeId = usize;

/// Handle to one schema node across a set of loaded documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaRef {
    pub doc: usize,
    pub node: NodeId,
}

impl SchemaRef {
    /// Looks the node up in the document set.
    #[must_use]
    pub fn get<'a>(self, docs: &'a [Document]) -> &'a SchemaNode {
        &docs[self.doc].nodes[self.node]
    }
}

/// The JSON Schema `type` keyword: absent, a single kind, or a list of
/// kinds. A list of two or more distinct kinds makes the node a union.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TypeKeyword {
    #[default]
    Absent,
    Single(String),
    Multiple(Vec<String>),
}

impl TypeKeyword {
    /// The single unambiguous kind, when there is one. A one-element (or
    /// all-duplicates) list collapses to its first entry.
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::Single(kind) => Some(kind),
            Self::Multiple(kinds) => {
                if self.is_union() {
                    None
                } else {
                    kinds.first().map(String::as_str)
                }
            }
        }
    }

    /// True when the keyword lists two or more distinct kinds.
    #[must_use]
    pub fn is_union(&self) -> bool {
        match self {
            Self::Multiple(kinds) => {
                let mut distinct: Vec<&str> = kinds.iter().map(String::as_str).collect();
                distinct.sort_unstable();
                distinct.dedup();
                distinct.len() >= 2
            }
            _ => false,
        }
    }

    /// Every listed kind, in declaration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(kind) => vec![kind.as_str()],
            Self::Multiple(kinds) => kinds.iter().map(String::as_str).collect(),
        }
    }
}

/// Wraps the JSON Schema `default` keyword to preserve `null`.
/// Deserializing `Option<Value>` would fold `"default": null` into the
/// absent case; the two must stay distinct.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultKeyword {
    /// The key was absent from the schema.
    #[default]
    Absent,
    /// The key was present; the value may be `Value::Null`.
    Present(serde_json::Value),
}

impl<'de> Deserialize<'de> for DefaultKeyword {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
        Ok(DefaultKeyword::Present(v))
    }
}

/// The lowered `additionalProperties` policy of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AdditionalProperties {
    /// Keyword absent.
    #[default]
    Unset,
    /// `"additionalProperties": true` / `false`.
    Bool(bool),
    /// A sub-schema describing the value type of extra keys.
    Schema(NodeId),
    /// `anyOf`/`allOf`/`oneOf` composition; members in declaration order.
    Composed(Vec<NodeId>),
}

/// One JSON Schema node in a document arena.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// `$schema` version marker; only meaningful on the root.
    pub schema_version: Option<String>,
    /// `$id` (draft-06+) or `id` (draft-04), `$id` preferred. Always set on
    /// a parsed document's root; synthetic when the source lacked one.
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub type_value: TypeKeyword,
    pub properties: BTreeMap<String, NodeId>,
    pub required: Vec<String>,
    pub definitions: BTreeMap<String, NodeId>,
    pub items: Option<NodeId>,
    pub additional: AdditionalProperties,
    /// `$ref` target, unresolved.
    pub reference: Option<String>,
    pub default: DefaultKeyword,
    /// Non-owning back-reference to the parent node; `None` only at root.
    pub parent: Option<NodeId>,
    /// The property/definition key this node was reached under; empty for
    /// the root and for `items`/`additionalProperties` children.
    pub json_key: String,
    /// Root-relative path step, e.g. `properties/address` or `items`.
    pub path_element: String,
    /// Full JSON-pointer path from the document root, e.g.
    /// `#/definitions/address`.
    pub pointer: String,
}

impl SchemaNode {
    fn new(parent: Option<NodeId>, json_key: String, path_element: String) -> Self {
        Self {
            schema_version: None,
            id: None,
            title: None,
            description: None,
            type_value: TypeKeyword::Absent,
            properties: BTreeMap::new(),
            required: Vec::new(),
            definitions: BTreeMap::new(),
            items: None,
            additional: AdditionalProperties::Unset,
            reference: None,
            default: DefaultKeyword::Absent,
            parent,
            json_key,
            path_element,
            pointer: String::new(),
        }
    }

    /// The effective single kind: the explicit `type` when unambiguous,
    /// otherwise inferred from shape (`properties` present and no `$ref`
    /// implies object, `items` implies array). `None` for unions and for
    /// nodes that contribute nothing.
    #[must_use]
    pub fn effective_kind(&self) -> Option<&str> {
        if let Some(kind) = self.type_value.single() {
            return Some(kind);
        }
        if self.type_value.is_union() {
            return None;
        }
        if self.reference.is_none() && !self.properties.is_empty() {
            return Some("object");
        }
        if self.items.is_some() {
            return Some("array");
        }
        None
    }

    /// True when the node exists only to hold reusable definitions: no
    /// type, shape or reference of its own.
    #[must_use]
    pub fn is_definitions_container(&self) -> bool {
        matches!(self.type_value, TypeKeyword::Absent)
            && self.reference.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
            && matches!(self.additional, AdditionalProperties::Unset)
            && !self.definitions.is_empty()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// One parsed schema document: a node arena with the root at index 0 and
/// its validated absolute base URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub(crate) nodes: Vec<SchemaNode>,
    root_uri: Url,
}

impl Document {
    pub const ROOT: NodeId = 0;

    #[must_use]
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id]
    }

    #[must_use]
    pub fn root(&self) -> &SchemaNode {
        &self.nodes[Self::ROOT]
    }

    /// The document's absolute base URI, parsed and validated.
    #[must_use]
    pub fn root_uri(&self) -> &Url {
        &self.root_uri
    }

    /// The root's id string as written (or synthesized) at parse time.
    #[must_use]
    pub fn root_id(&self) -> &str {
        self.root().id.as_deref().unwrap_or_default()
    }
}

/// Raw serde model of one schema node. Unknown keywords are ignored.
/// `BTreeMap` keeps property and definition order deterministic.
#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(rename = "$schema", default)]
    schema_version: Option<String>,

    /// Draft-04 identifier keyword.
    #[serde(default)]
    id: Option<String>,

    /// Draft-06+ identifier keyword; wins over `id` when both appear.
    #[serde(rename = "$id", default)]
    id06: Option<String>,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(rename = "type", default)]
    type_value: TypeKeyword,

    #[serde(default)]
    properties: BTreeMap<String, RawSchema>,

    #[serde(default)]
    required: Vec<String>,

    #[serde(default)]
    definitions: BTreeMap<String, RawSchema>,

    #[serde(default)]
    items: Option<Box<RawSchema>>,

    #[serde(rename = "additionalProperties", default)]
    additional: Option<RawAdditional>,

    #[serde(rename = "$ref", default)]
    reference: Option<String>,

    #[serde(default)]
    default: DefaultKeyword,
}

/// `additionalProperties` as written: bool, a bare composition object, or
/// a sub-schema. The variants are tried in that order; `deny_unknown_fields`
/// on the composition keeps ordinary schemas falling through to `Schema`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAdditional {
    Bool(bool),
    Composed(RawComposition),
    Schema(Box<RawSchema>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawComposition {
    #[serde(rename = "anyOf", default)]
    any_of: Vec<RawSchema>,
    #[serde(rename = "allOf", default)]
    all_of: Vec<RawSchema>,
    #[serde(rename = "oneOf", default)]
    one_of: Vec<RawSchema>,
}

/// Parses a JSON Schema document.
///
/// When `schema_key_required` is set, a root without a `$schema` marker is
/// rejected. A root without an explicit identifier is assigned `source_uri`
/// as a synthetic id; either way the resulting id must parse as an absolute
/// URI or the document is rejected.
///
/// # Errors
///
/// Returns [`SchemaError::Syntax`] for malformed JSON,
/// [`SchemaError::MissingSchemaVersion`] or
/// [`SchemaError::InvalidRootIdentifier`] for the structural checks above.
pub fn parse(
    text: &str,
    source_uri: &Url,
    schema_key_required: bool,
) -> Result<Document, SchemaError> {
    let raw: RawSchema = serde_json::from_str(text).map_err(|e| SchemaError::Syntax {
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })?;

    if schema_key_required && raw.schema_version.is_none() {
        return Err(SchemaError::MissingSchemaVersion);
    }

    let mut nodes: Vec<SchemaNode> = Vec::new();
    lower(&mut nodes, raw, None, String::new(), "#".to_string());

    if nodes[Document::ROOT].id.is_none() {
        nodes[Document::ROOT].id = Some(source_uri.to_string());
    }
    let id: String = nodes[Document::ROOT]
        .id
        .clone()
        .unwrap_or_default();
    let root_uri: Url = Url::parse(&id).map_err(|_| SchemaError::InvalidRootIdentifier {
        document: source_uri.to_string(),
        id: id.clone(),
    })?;

    assign_pointers(&mut nodes, Document::ROOT, None);

    Ok(Document { nodes, root_uri })
}

/// Flattens a raw subtree into the arena, wiring parent links, JSON keys
/// and path elements as it goes. Children are lowered in `BTreeMap` order,
/// so arena layout is deterministic for identical input.
fn lower(
    nodes: &mut Vec<SchemaNode>,
    raw: RawSchema,
    parent: Option<NodeId>,
    json_key: String,
    path_element: String,
) -> NodeId {
    let RawSchema {
        schema_version,
        id,
        id06,
        title,
        description,
        type_value,
        properties,
        required,
        definitions,
        items,
        additional,
        reference,
        default,
    } = raw;

    let idx: NodeId = nodes.len();
    nodes.push(SchemaNode::new(parent, json_key, path_element));

    let mut lowered_definitions: BTreeMap<String, NodeId> = BTreeMap::new();
    for (key, child) in definitions {
        let path: String = json_pointer::append("definitions", &key);
        let child_id: NodeId = lower(nodes, child, Some(idx), key.clone(), path);
        lowered_definitions.insert(key, child_id);
    }

    let mut lowered_properties: BTreeMap<String, NodeId> = BTreeMap::new();
    for (key, child) in properties {
        let path: String = json_pointer::append("properties", &key);
        let child_id: NodeId = lower(nodes, child, Some(idx), key.clone(), path);
        lowered_properties.insert(key, child_id);
    }

    let lowered_items: Option<NodeId> =
        items.map(|boxed| lower(nodes, *boxed, Some(idx), String::new(), "items".to_string()));

    let lowered_additional: AdditionalProperties = match additional {
        None => AdditionalProperties::Unset,
        Some(RawAdditional::Bool(b)) => AdditionalProperties::Bool(b),
        Some(RawAdditional::Schema(sub)) => AdditionalProperties::Schema(lower(
            nodes,
            *sub,
            Some(idx),
            String::new(),
            "additionalProperties".to_string(),
        )),
        Some(RawAdditional::Composed(composition)) => {
            let mut members: Vec<NodeId> = Vec::new();
            let RawComposition {
                any_of,
                all_of,
                one_of,
            } = composition;
            for sub in any_of.into_iter().chain(all_of).chain(one_of) {
                members.push(lower(
                    nodes,
                    sub,
                    Some(idx),
                    String::new(),
                    "additionalProperties".to_string(),
                ));
            }
            AdditionalProperties::Composed(members)
        }
    };

    let node: &mut SchemaNode = &mut nodes[idx];
    node.schema_version = schema_version;
    node.id = id06.or(id);
    node.title = title;
    node.description = description;
    node.type_value = type_value;
    node.required = required;
    node.reference = reference;
    node.default = default;
    node.definitions = lowered_definitions;
    node.properties = lowered_properties;
    node.items = lowered_items;
    node.additional = lowered_additional;

    idx
}

/// Second pass: assigns every node its full `#/...` pointer by chaining
/// path elements from the root downward.
fn assign_pointers(nodes: &mut [SchemaNode], id: NodeId, parent_pointer: Option<&str>) {
    let pointer: String = match parent_pointer {
        None => "#".to_string(),
        Some(prefix) => format!("{prefix}/{}", nodes[id].path_element),
    };
    nodes[id].pointer.clone_from(&pointer);

    let mut children: Vec<NodeId> = Vec::new();
    children.extend(nodes[id].definitions.values().copied());
    children.extend(nodes[id].properties.values().copied());
    if let Some(items) = nodes[id].items {
        children.push(items);
    }
    match &nodes[id].additional {
        AdditionalProperties::Schema(sub) => children.push(*sub),
        AdditionalProperties::Composed(members) => children.extend(members.iter().copied()),
        _ => {}
    }

    for child in children {
        assign_pointers(nodes, child, Some(&pointer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_uri() -> Url {
        Url::parse("file:///schemas/example.json").expect("valid test uri")
    }

    fn parse_ok(text: &str) -> Document {
        parse(text, &source_uri(), false).expect("schema should parse")
    }

    #[test]
    fn root_with_schema_key_parses() {
        let doc: Document = parse(
            r#"{ "$schema": "http://json-schema.org/schema#", "title": "root" }"#,
            &source_uri(),
            true,
        )
        .expect("schema should parse");
        assert_eq!(doc.root().title.as_deref(), Some("root"));
        assert!(doc.root().is_root());
    }

    #[test]
    fn missing_schema_key_errors_when_required() {
        let result = parse(r#"{ "title": "root" }"#, &source_uri(), true);
        assert!(matches!(result, Err(SchemaError::MissingSchemaVersion)));
    }

    #[test]
    fn missing_schema_key_allowed_when_not_required() {
        let doc: Document = parse_ok(r#"{ "title": "root" }"#);
        assert_eq!(doc.root_id(), "file:///schemas/example.json");
    }

    #[test]
    fn synthetic_id_comes_from_source_uri() {
        let doc: Document = parse_ok("{}");
        assert_eq!(doc.root_uri().as_str(), "file:///schemas/example.json");
    }

    #[test]
    fn explicit_id_wins_over_source_uri() {
        let doc: Document = parse_ok(r#"{ "$id": "http://example.com/root" }"#);
        assert_eq!(doc.root_id(), "http://example.com/root");
    }

    #[test]
    fn draft06_id_preferred_over_draft04() {
        let doc: Document =
            parse_ok(r#"{ "id": "http://example.com/old", "$id": "http://example.com/new" }"#);
        assert_eq!(doc.root_id(), "http://example.com/new");
    }

    #[test]
    fn relative_root_id_is_rejected() {
        let result = parse(r#"{ "$id": "/Test" }"#, &source_uri(), false);
        assert!(matches!(
            result,
            Err(SchemaError::InvalidRootIdentifier { id, .. }) if id == "/Test"
        ));
    }

    #[test]
    fn malformed_json_reports_position() {
        let result = parse("{\n  \"title\": nope\n}", &source_uri(), false);
        match result {
            Err(SchemaError::Syntax { line, column, .. }) => {
                assert_eq!(line, 2);
                assert!(column > 0);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn nested_properties_get_parent_links_and_pointers() {
        let doc: Document = parse_ok(
            r#"{
                "type": "object",
                "properties": {
                    "address": {
                        "type": "object",
                        "properties": { "county": { "type": "string" } }
                    }
                }
            }"#,
        );
        let address_id: NodeId = doc.root().properties["address"];
        let address: &SchemaNode = doc.node(address_id);
        assert_eq!(address.json_key, "address");
        assert_eq!(address.parent, Some(Document::ROOT));
        assert_eq!(address.pointer, "#/properties/address");

        let county: &SchemaNode = doc.node(address.properties["county"]);
        assert_eq!(county.pointer, "#/properties/address/properties/county");
        assert_eq!(county.json_key, "county");
    }

    #[test]
    fn items_node_has_empty_key_and_items_pointer() {
        let doc: Document = parse_ok(
            r#"{
                "type": "object",
                "properties": { "tags": { "type": "array", "items": { "type": "string" } } }
            }"#,
        );
        let tags: &SchemaNode = doc.node(doc.root().properties["tags"]);
        let items: &SchemaNode = doc.node(tags.items.expect("items present"));
        assert_eq!(items.json_key, "");
        assert_eq!(items.pointer, "#/properties/tags/items");
    }

    #[test]
    fn definition_pointer_uses_definitions_segment() {
        let doc: Document =
            parse_ok(r#"{ "definitions": { "address": { "type": "object" } } }"#);
        let address: &SchemaNode = doc.node(doc.root().definitions["address"]);
        assert_eq!(address.pointer, "#/definitions/address");
    }

    #[test]
    fn multi_valued_type_is_a_union() {
        let doc: Document =
            parse_ok(r#"{ "properties": { "x": { "type": ["string", "integer"] } } }"#);
        let x: &SchemaNode = doc.node(doc.root().properties["x"]);
        assert!(x.type_value.is_union());
        assert_eq!(x.type_value.single(), None);
        assert_eq!(x.type_value.kinds(), vec!["string", "integer"]);
    }

    #[test]
    fn single_element_type_list_is_not_a_union() {
        let doc: Document = parse_ok(r#"{ "properties": { "x": { "type": ["string"] } } }"#);
        let x: &SchemaNode = doc.node(doc.root().properties["x"]);
        assert!(!x.type_value.is_union());
        assert_eq!(x.type_value.single(), Some("string"));
    }

    #[test]
    fn duplicate_kinds_collapse_to_single() {
        let doc: Document =
            parse_ok(r#"{ "properties": { "x": { "type": ["string", "string"] } } }"#);
        let x: &SchemaNode = doc.node(doc.root().properties["x"]);
        assert!(!x.type_value.is_union());
        assert_eq!(x.type_value.single(), Some("string"));
    }

    #[test]
    fn additional_properties_bool_variants() {
        let doc: Document = parse_ok(r#"{ "additionalProperties": false }"#);
        assert_eq!(doc.root().additional, AdditionalProperties::Bool(false));

        let doc: Document = parse_ok(r#"{ "additionalProperties": true }"#);
        assert_eq!(doc.root().additional, AdditionalProperties::Bool(true));
    }

    #[test]
    fn additional_properties_schema_variant() {
        let doc: Document = parse_ok(r#"{ "additionalProperties": { "type": "integer" } }"#);
        let AdditionalProperties::Schema(sub) = &doc.root().additional else {
            panic!("expected schema variant, got {:?}", doc.root().additional);
        };
        let sub: NodeId = *sub;
        assert_eq!(doc.node(sub).type_value.single(), Some("integer"));
        assert_eq!(doc.node(sub).pointer, "#/additionalProperties");
    }

    #[test]
    fn additional_properties_any_of_composition() {
        let doc: Document = parse_ok(
            r#"{ "additionalProperties": { "anyOf": [ { "type": "integer" }, { "type": "string" } ] } }"#,
        );
        let AdditionalProperties::Composed(members) = &doc.root().additional else {
            panic!("expected composed variant, got {:?}", doc.root().additional);
        };
        assert_eq!(members.len(), 2);
        assert_eq!(doc.node(members[0]).type_value.single(), Some("integer"));
    }

    #[test]
    fn default_null_is_distinct_from_absent() {
        let doc: Document = parse_ok(
            r#"{ "properties": { "a": { "default": null }, "b": { "type": "string" } } }"#,
        );
        let a: &SchemaNode = doc.node(doc.root().properties["a"]);
        let b: &SchemaNode = doc.node(doc.root().properties["b"]);
        assert_eq!(a.default, DefaultKeyword::Present(serde_json::Value::Null));
        assert_eq!(b.default, DefaultKeyword::Absent);
    }

    #[test]
    fn effective_kind_inferred_from_shape() {
        let doc: Document = parse_ok(
            r#"{
                "properties": {
                    "obj": { "properties": { "x": { "type": "string" } } },
                    "arr": { "items": { "type": "string" } },
                    "nothing": {}
                }
            }"#,
        );
        let root: &SchemaNode = doc.root();
        assert_eq!(root.effective_kind(), Some("object"));
        assert_eq!(
            doc.node(root.properties["obj"]).effective_kind(),
            Some("object")
        );
        assert_eq!(
            doc.node(root.properties["arr"]).effective_kind(),
            Some("array")
        );
        assert_eq!(doc.node(root.properties["nothing"]).effective_kind(), None);
    }

    #[test]
    fn definitions_only_root_is_a_container() {
        let doc: Document =
            parse_ok(r#"{ "definitions": { "a": { "type": "string" } } }"#);
        assert!(doc.root().is_definitions_container());

        let doc: Document = parse_ok(r#"{ "type": "object" }"#);
        assert!(!doc.root().is_definitions_container());
    }

    #[test]
    fn required_list_is_preserved() {
        let doc: Document = parse_ok(
            r#"{ "required": ["a", "b"], "properties": { "a": {}, "b": {}, "c": {} } }"#,
        );
        assert_eq!(doc.root().required, vec!["a", "b"]);
    }
}
