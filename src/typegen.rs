//! Type resolution: turns parsed schema documents into a flat, named
//! model of Go struct and alias declarations.
//!
//! Naming is deterministic. A declaration's name comes from the first of:
//! its `title`, the root's `description` (or `Root`), the JSON key it was
//! reached under, the caller's hint, and finally a fresh `AnonymousN`.
//! Clashes are disambiguated with a numeric suffix starting at 2. A node
//! reserves its name in the cache before its fields are resolved, so
//! reference cycles terminate with plain pointer fields.
//!
//! Resolution never fails fast: unresolvable references and unknown
//! primitive kinds are recorded, the affected slot degrades to
//! `interface{}` or `undefined`, and the walk continues. The partial
//! model travels with the aggregated error.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GenerateError, TypegenError, TypegenFailure};
use crate::resolver::RefResolver;
use crate::schema::{AdditionalProperties, Document, SchemaRef};

/// Everything the emitter needs: struct and alias declarations, keyed by
/// name for deterministic output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeModel {
    pub structs: BTreeMap<String, StructDef>,
    pub aliases: BTreeMap<String, AliasDef>,
}

/// One generated struct declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    /// Pointer of the schema node this struct came from.
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Fields keyed by their Go name.
    pub fields: BTreeMap<String, Field>,
    /// When set, unknown object keys are legal and decode into a
    /// `map[string]T` bag; the emitter adds custom JSON marshalling.
    pub additional_value_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// Original JSON key; `-` marks the additional-properties bag, which
    /// is handled by generated marshalling code rather than struct tags.
    pub json_name: String,
    pub type_name: String,
    pub required: bool,
    pub comment: Option<String>,
}

/// Name of the overflow field on structs that admit additional properties.
pub const ADDITIONAL_PROPERTIES_FIELD: &str = "AdditionalProperties";

/// Resolves every document in `docs` into a [`TypeModel`].
///
/// # Errors
///
/// Returns [`GenerateError::Resolve`] when the reference index cannot be
/// built, and [`GenerateError::Typegen`] carrying the partial model when
/// the walk accumulated problems.
pub fn create_types(docs: &[Document]) -> Result<TypeModel, GenerateError> {
    let resolver: RefResolver = RefResolver::build(docs)?;
    create_types_with(docs, &resolver)
}

/// As [`create_types`], with a caller-built reference index.
///
/// # Errors
///
/// Returns [`GenerateError::Typegen`] when the walk accumulated problems.
pub fn create_types_with(
    docs: &[Document],
    resolver: &RefResolver,
) -> Result<TypeModel, GenerateError> {
    let mut generator: Generator<'_> = Generator::new(docs, resolver);
    generator.run();
    generator.finish().map_err(GenerateError::from)
}

/// One generated type alias, e.g. `type Root []*Product`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDef {
    pub name: String,
    pub type_name: String,
    pub comment: Option<String>,
}

struct Generator<'a> {
    docs: &'a [Document],
    resolver: &'a RefResolver,
    structs: BTreeMap<String, StructDef>,
    aliases: BTreeMap<String, AliasDef>,
    /// Canonical reference URI to declared type name.
    ref_names: BTreeMap<String, String>,
    /// Write-once name reservation per node; consulted before any
    /// recursion so cycles close on the reserved name.
    node_names: BTreeMap<SchemaRef, String>,
    used_names: BTreeSet<String>,
    anon_count: u32,
    errors: Vec<TypegenError>,
}

impl<'a> Generator<'a> {
    fn new(docs: &'a [Document], resolver: &'a RefResolver) -> Self {
        Self {
            docs,
            resolver,
            structs: BTreeMap::new(),
            aliases: BTreeMap::new(),
            ref_names: BTreeMap::new(),
            node_names: BTreeMap::new(),
            used_names: BTreeSet::new(),
            anon_count: 0,
            errors: Vec::new(),
        }
    }

    fn run(&mut self) {
        for doc_idx in 0..self.docs.len() {
            let root: SchemaRef = SchemaRef {
                doc: doc_idx,
                node: Document::ROOT,
            };
            if !root.get(self.docs).is_definitions_container() {
                self.declare(root, "");
            }
            let defs: Vec<(String, SchemaRef)> = root
                .get(self.docs)
                .definitions
                .iter()
                .map(|(key, &node)| (key.clone(), SchemaRef { doc: doc_idx, node }))
                .collect();
            for (key, def) in defs {
                self.declare(def, &key);
            }
        }
    }

    fn finish(self) -> Result<TypeModel, TypegenFailure> {
        let model: TypeModel = TypeModel {
            structs: self.structs,
            aliases: self.aliases,
        };
        if self.errors.is_empty() {
            Ok(model)
        } else {
            Err(TypegenFailure {
                model,
                errors: self.errors,
            })
        }
    }

    /// Declares a node as a named top-level type and returns the name.
    /// Object shapes with properties become structs; everything else
    /// becomes an alias to its resolved type.
    fn declare(&mut self, r: SchemaRef, hint: &str) -> String {
        if let Some(name) = self.node_names.get(&r) {
            return name.clone();
        }
        if self.is_struct_node(r) {
            return self.struct_for(r, hint);
        }

        let name: String = self.name_for(r, hint);
        self.node_names.insert(r, name.clone());
        // The declared name feeds back in as the hint so nested anonymous
        // shapes (root array items, say) are named after their parent.
        let type_name: String = self.type_of(r, &name);
        let comment: Option<String> = r.get(self.docs).description.clone();
        self.aliases.insert(
            name.clone(),
            AliasDef {
                name: name.clone(),
                type_name,
                comment,
            },
        );
        name
    }

    fn is_struct_node(&self, r: SchemaRef) -> bool {
        let node = r.get(self.docs);
        node.reference.is_none()
            && !node.type_value.is_union()
            && node.effective_kind() == Some("object")
            && !node.properties.is_empty()
    }

    /// Builds (or returns the reserved name of) the struct for an object
    /// node. The name is reserved before any field type is resolved.
    fn struct_for(&mut self, r: SchemaRef, hint: &str) -> String {
        if let Some(name) = self.node_names.get(&r) {
            return name.clone();
        }
        let name: String = self.name_for(r, hint);
        self.node_names.insert(r, name.clone());
        self.build_struct(r, name.clone());
        name
    }

    fn build_struct(&mut self, r: SchemaRef, name: String) {
        let docs: &'a [Document] = self.docs;
        let node = r.get(docs);
        let description: Option<String> = node.description.clone();
        let pointer: String = node.pointer.clone();
        let required: Vec<String> = node.required.clone();
        let additional: AdditionalProperties = node.additional.clone();
        let property_children: Vec<(String, SchemaRef)> = node
            .properties
            .iter()
            .map(|(key, &child)| (key.clone(), SchemaRef { doc: r.doc, node: child }))
            .collect();

        let mut fields: BTreeMap<String, Field> = BTreeMap::new();
        for (key, child) in property_children {
            let type_name: String = self.type_of(child, &key);
            let field_name: String = go_name(&key);
            fields.insert(
                field_name.clone(),
                Field {
                    name: field_name,
                    json_name: key.clone(),
                    type_name,
                    required: required.iter().any(|k| k == &key),
                    comment: child.get(docs).description.clone(),
                },
            );
        }

        let additional_value_type: Option<String> = match additional {
            AdditionalProperties::Unset | AdditionalProperties::Bool(false) => None,
            AdditionalProperties::Bool(true) => Some("interface{}".to_string()),
            AdditionalProperties::Schema(sub) => {
                Some(self.type_of(SchemaRef { doc: r.doc, node: sub }, ""))
            }
            AdditionalProperties::Composed(members) => {
                if let [only] = members.as_slice() {
                    Some(self.type_of(SchemaRef { doc: r.doc, node: *only }, ""))
                } else {
                    // Mixed anyOf/allOf/oneOf value shapes collapse to any.
                    Some("interface{}".to_string())
                }
            }
        };
        if let Some(avt) = &additional_value_type {
            // A declared property may sanitize to the bag's name; the bag
            // yields and takes a numeric suffix.
            let mut bag_name: String = ADDITIONAL_PROPERTIES_FIELD.to_string();
            let mut n: u32 = 2;
            while fields.contains_key(&bag_name) {
                bag_name = format!("{ADDITIONAL_PROPERTIES_FIELD}{n}");
                n += 1;
            }
            fields.insert(
                bag_name.clone(),
                Field {
                    name: bag_name,
                    json_name: "-".to_string(),
                    type_name: format!("map[string]{avt}"),
                    required: false,
                    comment: None,
                },
            );
        }

        self.structs.insert(
            name.clone(),
            StructDef {
                id: pointer,
                name: name.clone(),
                description,
                fields,
                additional_value_type,
            },
        );
    }

    /// Resolves the Go type expression for a node in field position.
    fn type_of(&mut self, r: SchemaRef, hint: &str) -> String {
        let docs: &'a [Document] = self.docs;
        let node = r.get(docs);

        if let Some(reference) = &node.reference {
            return self.reference_type(r, reference);
        }
        if node.type_value.is_union() {
            self.descend_union(r, hint);
            return "interface{}".to_string();
        }
        match node.effective_kind() {
            Some("object") => self.object_type(r, hint),
            Some("array") => self.array_type(r, hint),
            Some("string") => "string".to_string(),
            Some("integer") => "int".to_string(),
            Some("number") => "float64".to_string(),
            Some("boolean") => "bool".to_string(),
            Some("null") => "nil".to_string(),
            Some(other) => {
                self.errors.push(TypegenError::PrimitiveTypeResolutionFailure {
                    type_value: other.to_string(),
                    pointer: node.pointer.clone(),
                });
                "undefined".to_string()
            }
            None => "interface{}".to_string(),
        }
    }

    /// A union slot itself resolves to `interface{}`, but the object and
    /// array branches still produce their nested declarations so those
    /// structs are not lost.
    fn descend_union(&mut self, r: SchemaRef, hint: &str) {
        let node = r.get(self.docs);
        let kinds: Vec<&str> = node.type_value.kinds();
        if kinds.contains(&"object") && !node.properties.is_empty() {
            match self.node_names.get(&r).cloned() {
                None => {
                    let name: String = self.name_for(r, hint);
                    self.node_names.insert(r, name.clone());
                    self.build_struct(r, name);
                }
                Some(reserved) => {
                    // A declared union: the reservation belongs to the
                    // alias, so the branch struct takes its own name.
                    if !self.structs.contains_key(&reserved) {
                        let name: String = self.name_for(r, hint);
                        self.build_struct(r, name);
                    }
                }
            }
        }
        if kinds.contains(&"array") && node.items.is_some() {
            self.array_type(r, hint);
        }
    }

    fn object_type(&mut self, r: SchemaRef, hint: &str) -> String {
        let node = r.get(self.docs);
        if !node.properties.is_empty() {
            let name: String = self.struct_for(r, hint);
            return format!("*{name}");
        }
        match node.additional.clone() {
            AdditionalProperties::Schema(sub) => {
                let value: String = self.type_of(SchemaRef { doc: r.doc, node: sub }, "");
                format!("map[string]{value}")
            }
            AdditionalProperties::Composed(members) if members.len() == 1 => {
                let value: String = self.type_of(SchemaRef { doc: r.doc, node: members[0] }, "");
                format!("map[string]{value}")
            }
            _ => "map[string]interface{}".to_string(),
        }
    }

    fn array_type(&mut self, r: SchemaRef, hint: &str) -> String {
        let node = r.get(self.docs);
        match node.items {
            None => "[]interface{}".to_string(),
            Some(items) => {
                let elem_hint: String = if hint.is_empty() {
                    String::new()
                } else {
                    format!("{}Items", go_name(hint))
                };
                let elem: String =
                    self.type_of(SchemaRef { doc: r.doc, node: items }, &elem_hint);
                format!("[]{elem}")
            }
        }
    }

    /// Resolves a `$ref` into a pointer to the target's declared type.
    /// Failure degrades the field to `interface{}` and records the error.
    fn reference_type(&mut self, from: SchemaRef, reference: &str) -> String {
        match self.resolver.resolve(self.docs, from, reference) {
            Ok((uri, target)) => {
                if let Some(name) = self.ref_names.get(&uri) {
                    return format!("*{name}");
                }
                let hint: String = target.get(self.docs).json_key.clone();
                let name: String = self.declare(target, &hint);
                self.ref_names.insert(uri, name.clone());
                format!("*{name}")
            }
            Err(_) => {
                self.errors.push(TypegenError::UnresolvedReference {
                    reference: reference.to_string(),
                    document: self.docs[from.doc].root_id().to_string(),
                });
                "interface{}".to_string()
            }
        }
    }

    /// Picks a fresh, unique declaration name for a node.
    fn name_for(&mut self, r: SchemaRef, hint: &str) -> String {
        let node = r.get(self.docs);
        let mut candidate: String = node.title.as_deref().map(go_name).unwrap_or_default();
        if candidate.is_empty() && node.is_root() {
            candidate = node.description.as_deref().map(go_name).unwrap_or_default();
            if candidate.is_empty() {
                candidate = "Root".to_string();
            }
        }
        if candidate.is_empty() {
            candidate = go_name(&node.json_key);
        }
        if candidate.is_empty() {
            candidate = go_name(hint);
        }
        if candidate.is_empty() {
            self.anon_count += 1;
            candidate = format!("Anonymous{}", self.anon_count);
        }
        self.uniquify(candidate)
    }

    fn uniquify(&mut self, base: String) -> String {
        if self.used_names.insert(base.clone()) {
            return base;
        }
        let mut n: u32 = 2;
        loop {
            let candidate: String = format!("{base}{n}");
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Converts an arbitrary JSON key or title into an exported Go
/// identifier: split on every non-alphanumeric rune, capitalize each
/// segment's first letter, and guard a leading digit with an underscore.
#[must_use]
pub fn go_name(raw: &str) -> String {
    let mut name: String = String::with_capacity(raw.len());
    for segment in raw.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
