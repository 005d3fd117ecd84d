//! Reference index and `$ref` resolution.
//!
//! Before type generation, every node of every loaded document is
//! registered in a single flat index keyed by absolute URI: the document
//! base (with and without a bare `#`), one fragment-extended URI per
//! definition, property, `items` and `additionalProperties` child, and a
//! rebased entry wherever a nested node declares its own identifier.
//! `$ref` strings are then resolved against the owning document's base
//! URI with plain RFC 3986 reference resolution and looked up directly.

use std::collections::BTreeMap;

use url::Url;

use crate::error::ResolveError;
use crate::json_pointer;
use crate::schema::{AdditionalProperties, Document, SchemaRef};

/// Flat URI index over a set of parsed documents.
#[derive(Debug, Default)]
pub struct RefResolver {
    index: BTreeMap<String, SchemaRef>,
}

impl RefResolver {
    /// Indexes every document. Fails when two distinct nodes claim the
    /// same URI.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateSchemaUri`] on an identity clash.
    pub fn build(docs: &[Document]) -> Result<Self, ResolveError> {
        let mut resolver: RefResolver = RefResolver::default();
        for doc_idx in 0..docs.len() {
            resolver.map_document(docs, doc_idx)?;
        }
        Ok(resolver)
    }

    fn map_document(&mut self, docs: &[Document], doc_idx: usize) -> Result<(), ResolveError> {
        let mut base: Url = docs[doc_idx].root_uri().clone();
        base.set_fragment(None);

        let root: SchemaRef = SchemaRef {
            doc: doc_idx,
            node: Document::ROOT,
        };
        self.insert(docs, base.as_str().to_string(), root)?;
        self.insert(docs, format!("{base}#"), root)?;
        self.descend(docs, root, &base, false, false)
    }

    /// Registers `r`'s descendants below `base`. When `check_current_id`
    /// is set and the node declares its own identifier, the node is also
    /// registered under that identifier joined to `base`, and its subtree
    /// is indexed a second time below the rebased URI. A fragment-only
    /// identifier is skipped once a rebase already happened on this path
    /// (`ignore_fragments`), since it would alias the pointer entry.
    fn descend(
        &mut self,
        docs: &[Document],
        r: SchemaRef,
        base: &Url,
        check_current_id: bool,
        mut ignore_fragments: bool,
    ) -> Result<(), ResolveError> {
        if check_current_id {
            let id: Option<String> = r.get(docs).id.clone();
            if let Some(id) = id {
                if !(id.starts_with('#') && ignore_fragments) {
                    if let Ok(rebased) = base.join(&id) {
                        self.insert(docs, rebased.as_str().to_string(), r)?;
                        if rebased.fragment().is_none() {
                            self.insert(docs, format!("{rebased}#"), r)?;
                        }
                        self.descend(docs, r, &rebased, false, false)?;
                        ignore_fragments = true;
                    }
                }
            }
        }

        let node = r.get(docs);
        let mut children: Vec<(String, SchemaRef)> = Vec::new();
        for (key, &child) in &node.definitions {
            children.push((
                json_pointer::append("definitions", key),
                SchemaRef { doc: r.doc, node: child },
            ));
        }
        for (key, &child) in &node.properties {
            children.push((
                json_pointer::append("properties", key),
                SchemaRef { doc: r.doc, node: child },
            ));
        }
        if let Some(items) = node.items {
            children.push(("items".to_string(), SchemaRef { doc: r.doc, node: items }));
        }
        // Composition members share a pointer segment and are never
        // `$ref` targets, so only the plain sub-schema form is indexed.
        if let AdditionalProperties::Schema(sub) = &node.additional {
            children.push((
                "additionalProperties".to_string(),
                SchemaRef { doc: r.doc, node: *sub },
            ));
        }

        for (path, child) in children {
            let child_base: Url = extend_fragment(base, &path);
            self.insert(docs, child_base.as_str().to_string(), child)?;
            self.descend(docs, child, &child_base, true, ignore_fragments)?;
        }
        Ok(())
    }

    /// Registers one URI. Re-registering the same node under the same URI
    /// is a no-op; the walk revisits subtrees when a nested identifier
    /// rebases them. Only a different node claiming the URI is an error.
    fn insert(
        &mut self,
        docs: &[Document],
        uri: String,
        r: SchemaRef,
    ) -> Result<(), ResolveError> {
        if let Some(&existing) = self.index.get(&uri) {
            if existing == r {
                return Ok(());
            }
            return Err(ResolveError::DuplicateSchemaUri {
                uri,
                document: docs[r.doc].root_id().to_string(),
            });
        }
        self.index.insert(uri, r);
        Ok(())
    }

    /// Resolves a `$ref` written in the document holding `from` and
    /// returns the canonical URI it landed on together with the target
    /// node.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnresolvedReference`] when the reference
    /// does not name an indexed node.
    pub fn resolve(
        &self,
        docs: &[Document],
        from: SchemaRef,
        reference: &str,
    ) -> Result<(String, SchemaRef), ResolveError> {
        let unresolved = || ResolveError::UnresolvedReference {
            reference: reference.to_string(),
            document: docs[from.doc].root_id().to_string(),
        };

        let base: &Url = docs[from.doc].root_uri();
        let resolved: Url = base.join(reference).map_err(|_| unresolved())?;
        let key: String = resolved.to_string();
        match self.index.get(key.as_str()) {
            Some(&target) => Ok((key, target)),
            None => Err(unresolved()),
        }
    }

    /// Number of indexed URIs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Appends one pointer step to a URI's fragment.
fn extend_fragment(base: &Url, path: &str) -> Url {
    let mut extended: Url = base.clone();
    let mut fragment: String = base.fragment().unwrap_or_default().to_string();
    fragment.push('/');
    fragment.push_str(path);
    extended.set_fragment(Some(&fragment));
    extended
}
