//! Metadata nodes attached to a module.
//!
//! Debug information lives in a side table of numbered nodes (`!17 = ...`).
//! Instructions and functions only hold references into that table; the
//! typed views defined here ([`LocalVariable`]) give structured access to the
//! few node kinds the rest of the workspace relies on.
use strum::EnumIs;

use crate::types::Type;

/// Numeric identifier of a metadata node (`!17`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetaId(pub u32);

impl std::fmt::Display for MetaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}", self.0)
    }
}

/// A metadata value as it appears in a node field, a tuple element, or a
/// `metadata` call operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum MetaValue {
    /// Reference to a numbered node.
    Ref(MetaId),
    /// String literal (`"x"` or `!"x"`).
    Str(String),
    /// Integer literal.
    Int(i128),
    /// Bare keyword or flag combination (`DW_ATE_signed`, `DIFlagA | DIFlagB`, `null`).
    Word(String),
    /// A value wrapped as metadata (`i32 7`, `ptr %x.addr`).
    Typed { ty: Type, value: String },
    /// An inline node (`!DIExpression()`, `!{}`).
    Node(Box<MetadataNode>),
}

impl MetaValue {
    pub fn as_ref_id(&self) -> Option<MetaId> {
        match self {
            MetaValue::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            MetaValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn collect_references(&self, out: &mut Vec<MetaId>) {
        match self {
            MetaValue::Ref(id) => out.push(*id),
            MetaValue::Node(node) => node.collect_references(out),
            _ => {}
        }
    }
}

/// A `key: value` entry of a specialized node. Positional operands
/// (`!DIExpression(DW_OP_deref)`) have no key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaField {
    pub key: Option<String>,
    pub value: MetaValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum MetadataNode {
    /// `!DIKind(field: value, ...)`
    Specialized {
        kind: String,
        distinct: bool,
        fields: Vec<MetaField>,
    },
    /// `!{elem, ...}`
    Tuple {
        distinct: bool,
        elements: Vec<MetaValue>,
    },
    /// `!"string"`
    Str(String),
}

impl MetadataNode {
    /// Kind of a specialized node without the leading `!` (e.g. `DILocalVariable`).
    pub fn kind(&self) -> Option<&str> {
        match self {
            MetadataNode::Specialized { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// First field named `key` of a specialized node.
    pub fn field(&self, key: &str) -> Option<&MetaValue> {
        match self {
            MetadataNode::Specialized { fields, .. } => fields
                .iter()
                .find(|field| field.key.as_deref() == Some(key))
                .map(|field| &field.value),
            _ => None,
        }
    }

    pub fn is_distinct(&self) -> bool {
        match self {
            MetadataNode::Specialized { distinct, .. } | MetadataNode::Tuple { distinct, .. } => {
                *distinct
            }
            MetadataNode::Str(_) => false,
        }
    }

    pub(crate) fn with_distinct(mut self, value: bool) -> Self {
        match &mut self {
            MetadataNode::Specialized { distinct, .. } | MetadataNode::Tuple { distinct, .. } => {
                *distinct = value
            }
            MetadataNode::Str(_) => {}
        }
        self
    }

    /// Every node id referenced (transitively through inline nodes) by this node.
    pub fn references(&self) -> Vec<MetaId> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<MetaId>) {
        match self {
            MetadataNode::Specialized { fields, .. } => {
                for field in fields {
                    field.value.collect_references(out);
                }
            }
            MetadataNode::Tuple { elements, .. } => {
                for element in elements {
                    element.collect_references(out);
                }
            }
            MetadataNode::Str(_) => {}
        }
    }
}

/// Typed view over a `!DILocalVariable` node.
///
/// Parameters are local variables carrying an `arg:` field holding their
/// 1-based position in the function signature; plain locals have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable<'a> {
    pub name: &'a str,
    pub arg: Option<u32>,
    pub scope: Option<MetaId>,
    pub line: Option<u32>,
}

impl<'a> LocalVariable<'a> {
    pub const KIND: &'static str = "DILocalVariable";

    /// Build the view, `None` if `node` is not a named local variable.
    pub fn from_node(node: &'a MetadataNode) -> Option<Self> {
        if node.kind() != Some(Self::KIND) {
            return None;
        }

        let name = node.field("name").and_then(MetaValue::as_str)?;
        let arg = node
            .field("arg")
            .and_then(MetaValue::as_int)
            .and_then(|arg| u32::try_from(arg).ok());
        let scope = node.field("scope").and_then(MetaValue::as_ref_id);
        let line = node
            .field("line")
            .and_then(MetaValue::as_int)
            .and_then(|line| u32::try_from(line).ok());

        Some(Self {
            name,
            arg,
            scope,
            line,
        })
    }

    /// 0-based argument slot for parameters, `None` for locals.
    pub fn ordinal(&self) -> Option<usize> {
        self.arg
            .and_then(|arg| arg.checked_sub(1))
            .map(|ordinal| ordinal as usize)
    }
}
