//! Repository content model: qualified names, node types and relations.
//!
//! The repository describes classifications and parent–child links with
//! qualified names instead of Rust types. This module gives those names a
//! small typed surface so callers never compare raw strings.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::id::NodeId;

/// Namespace of the generic content model (`cm:`).
pub const CONTENT_NAMESPACE: &str = "urn:rendition:model:content:1.0";

/// Namespace of the rendition model (`rn:`).
pub const RENDITION_NAMESPACE: &str = "urn:rendition:model:rendition:1.0";

/// Mimetype of sources the pipeline knows how to convert.
pub const MIMETYPE_PDF: &str = "application/pdf";

/// Mimetype written on every derived text rendition.
pub const MIMETYPE_MARKDOWN: &str = "text/markdown";

/// Local name of the relation linking a document to its derived text.
pub const MARKDOWN_RENDITION_NAME: &str = "markdown";

/// Local name of the relation linking a document to its PDF rendition.
pub const PDF_RENDITION_NAME: &str = "pdf";

/// Qualified name: a namespace URI plus a local name.
///
/// Displays (and parses) as `{namespace}local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    namespace: String,
    local_name: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    /// Name in the generic content namespace.
    pub fn content(local_name: impl Into<String>) -> Self {
        Self::new(CONTENT_NAMESPACE, local_name)
    }

    /// Name in the rendition namespace.
    pub fn rendition(local_name: impl Into<String>) -> Self {
        Self::new(RENDITION_NAMESPACE, local_name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl core::fmt::Display for QName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

impl FromStr for QName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('{')
            .ok_or_else(|| ModelError::invalid_qname(format!("missing namespace in '{s}'")))?;
        let (namespace, local_name) = rest
            .split_once('}')
            .ok_or_else(|| ModelError::invalid_qname(format!("unterminated namespace in '{s}'")))?;
        if local_name.is_empty() {
            return Err(ModelError::invalid_qname(format!("empty local name in '{s}'")));
        }
        Ok(Self::new(namespace, local_name))
    }
}

/// Identity of a parent–child link: the relation type plus the child's name
/// under that relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationIdentity {
    pub relation_type: QName,
    pub name: QName,
}

impl RelationIdentity {
    pub fn new(relation_type: QName, name: QName) -> Self {
        Self {
            relation_type,
            name,
        }
    }

    /// `rn:rendition` / `cm:markdown`: the link from a document to its
    /// derived text rendition.
    pub fn markdown_rendition() -> Self {
        Self::new(
            QName::rendition("rendition"),
            QName::content(MARKDOWN_RENDITION_NAME),
        )
    }

    /// Whether this relation links a document to a PDF rendition of itself.
    ///
    /// Matches any relation type in the rendition namespace, since hosts use
    /// more than one relation type for renditions.
    pub fn is_pdf_rendition(&self) -> bool {
        self.relation_type.namespace() == RENDITION_NAMESPACE
            && self.name.local_name() == PDF_RENDITION_NAME
    }
}

impl core::fmt::Display for RelationIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.relation_type, self.name)
    }
}

/// Classification tag marking a node as a rendition (`rn:rendition`).
pub fn rendition_marker() -> QName {
    QName::rendition("rendition")
}

/// Type of a repository node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Generic content node (`cm:content`).
    Content,
    /// Container node (`cm:folder`).
    Folder,
    /// Any other (custom or subtype) node type.
    Other(QName),
}

/// A parent–child association as reported by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildAssociation {
    pub parent: NodeId,
    pub child: NodeId,
    pub relation: RelationIdentity,
}

impl ChildAssociation {
    pub fn new(parent: NodeId, child: NodeId, relation: RelationIdentity) -> Self {
        Self {
            parent,
            child,
            relation,
        }
    }
}

/// Whether `mimetype` is a convertible source (case-insensitive).
pub fn is_convertible_mimetype(mimetype: &str) -> bool {
    mimetype.eq_ignore_ascii_case(MIMETYPE_PDF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qname_parses_its_display_form() {
        let name = QName::rendition("pdf");
        let parsed: QName = name.to_string().parse().unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn qname_rejects_missing_namespace() {
        assert!(matches!(
            "pdf".parse::<QName>(),
            Err(ModelError::InvalidQName(_))
        ));
        assert!(matches!(
            "{urn:x}".parse::<QName>(),
            Err(ModelError::InvalidQName(_))
        ));
    }

    #[test]
    fn pdf_rendition_matches_any_rendition_relation_type() {
        let relation = RelationIdentity::new(QName::rendition("rendition"), QName::content("pdf"));
        assert!(relation.is_pdf_rendition());

        let other_type = RelationIdentity::new(QName::rendition("other"), QName::rendition("pdf"));
        assert!(other_type.is_pdf_rendition());
    }

    #[test]
    fn pdf_rendition_rejects_foreign_namespaces_and_names() {
        let foreign = RelationIdentity::new(QName::content("contains"), QName::content("pdf"));
        assert!(!foreign.is_pdf_rendition());

        assert!(!RelationIdentity::markdown_rendition().is_pdf_rendition());
    }

    #[test]
    fn convertible_mimetype_ignores_case() {
        assert!(is_convertible_mimetype("application/pdf"));
        assert!(is_convertible_mimetype("Application/PDF"));
        assert!(!is_convertible_mimetype("text/plain"));
    }
}
