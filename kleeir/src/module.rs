//! Modules, functions, basic blocks and the instructions the front-end keeps.
//!
//! Only the instructions that carry information for harness synthesis are
//! decoded in full: calls (which include the `llvm.dbg.*` intrinsics) and debug
//! records (`#dbg_declare(...)`). Every other instruction is kept as an opaque
//! `{dest, opcode}` pair so the program order of a block stays intact.
use std::collections::BTreeMap;

use log::debug;
use smallvec::SmallVec;
use strum::{Display, EnumIs, EnumString, IntoStaticStr};

use crate::{
    metadata::{LocalVariable, MetaId, MetaValue, MetadataNode},
    types::Type,
    utils::Error,
};

/// A formal parameter of a function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    pub ty: Type,
    /// Parameter attributes as written (`noundef nonnull align 8`).
    pub attributes: String,
    /// Local SSA name (`%x`); absent in declarations.
    pub name: Option<String>,
}

/// Kinds of debug markers, shared by the intrinsic (`@llvm.dbg.declare`) and
/// the record (`#dbg_declare`) forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DebugRecordKind {
    Declare,
    Value,
    Assign,
    Label,
}

impl DebugRecordKind {
    pub const INTRINSIC_PREFIX: &'static str = "llvm.dbg.";

    /// Recognize `llvm.dbg.<kind>` intrinsic names.
    pub fn from_intrinsic(callee: &str) -> Option<Self> {
        callee
            .strip_prefix(Self::INTRINSIC_PREFIX)
            .and_then(|suffix| suffix.parse().ok())
    }
}

/// Debug record (`#dbg_declare(ptr %x.addr, !17, !DIExpression(), !18)`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebugRecord {
    pub kind: DebugRecordKind,
    pub operands: Vec<MetaValue>,
}

/// Target of a call instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum Callee {
    /// Call through a global symbol (`@f`).
    Direct(String),
    /// Call through a local value (`%fptr`).
    Indirect(String),
}

/// Operand of a call instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum CallArg {
    /// Ordinary typed value; `value` is the operand text without attributes.
    Value {
        ty: Type,
        attributes: String,
        value: String,
    },
    /// `metadata <value>` operand.
    Metadata(MetaValue),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    pub dest: Option<String>,
    pub ret: Type,
    pub callee: Callee,
    pub args: SmallVec<CallArg, 4>,
}

impl Call {
    /// Name of the called symbol for direct calls.
    pub fn callee_name(&self) -> Option<&str> {
        match &self.callee {
            Callee::Direct(name) => Some(name),
            Callee::Indirect(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum Instruction {
    Call(Call),
    DebugRecord(DebugRecord),
    /// Any instruction the front-end does not decode.
    Other {
        dest: Option<String>,
        opcode: String,
    },
}

/// Where a [`DebugDeclaration`] was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationForm {
    Intrinsic,
    Record,
}

/// A debug marker binding a source variable to a storage location.
///
/// This is the common view over `call void @llvm.dbg.declare(metadata ptr %p,
/// metadata !17, ...)` and `#dbg_declare(ptr %p, !17, ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugDeclaration<'a> {
    pub kind: DebugRecordKind,
    pub form: DeclarationForm,
    pub location: &'a MetaValue,
    pub variable: &'a MetaValue,
}

impl Instruction {
    /// View this instruction as a debug declaration. `dbg.label` markers and
    /// markers missing their variable operand are not declarations.
    pub fn as_debug_declaration(&self) -> Option<DebugDeclaration<'_>> {
        let (kind, form, location, variable) = match self {
            Instruction::Call(call) => {
                let kind = DebugRecordKind::from_intrinsic(call.callee_name()?)?;
                let metadata = |index: usize| match call.args.get(index) {
                    Some(CallArg::Metadata(value)) => Some(value),
                    _ => None,
                };
                (kind, DeclarationForm::Intrinsic, metadata(0)?, metadata(1)?)
            }
            Instruction::DebugRecord(record) => (
                record.kind,
                DeclarationForm::Record,
                record.operands.first()?,
                record.operands.get(1)?,
            ),
            Instruction::Other { .. } => return None,
        };

        if kind.is_label() {
            return None;
        }

        Some(DebugDeclaration {
            kind,
            form,
            location,
            variable,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasicBlock {
    /// Label of the block; the entry block may be unnamed.
    pub label: Option<String>,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Debug declarations of this block, in program order.
    pub fn debug_declarations(&self) -> impl Iterator<Item = DebugDeclaration<'_>> {
        self.instructions
            .iter()
            .filter_map(Instruction::as_debug_declaration)
    }
}

/// A function definition or declaration.
///
/// Declarations have no blocks. For definitions the first block is the entry
/// block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub variadic: bool,
    /// `!dbg` attachment, pointing at the function's `DISubprogram`.
    pub subprogram: Option<MetaId>,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    /// Number of fixed formal parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    pub fn param_type(&self, ordinal: usize) -> Option<&Type> {
        self.params.get(ordinal).map(|param| &param.ty)
    }
}

/// A module: the unit a container is made of.
///
/// Modules come out of the parser unmaterialized; [`Module::materialize`]
/// validates every cross reference before the module is handed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    /// Identifier from the `; ModuleID = '...'` header.
    pub id: Option<String>,
    pub source_filename: Option<String>,
    pub data_layout: Option<String>,
    pub target_triple: Option<String>,
    pub functions: Vec<Function>,
    pub metadata: BTreeMap<MetaId, MetadataNode>,
    pub named_metadata: BTreeMap<String, Vec<MetaId>>,
    materialized: bool,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn metadata_node(&self, id: MetaId) -> Option<&MetadataNode> {
        self.metadata.get(&id)
    }

    /// Resolve a metadata operand to a node, following references.
    pub fn resolve_metadata<'a>(&'a self, value: &'a MetaValue) -> Option<&'a MetadataNode> {
        match value {
            MetaValue::Ref(id) => self.metadata_node(*id),
            MetaValue::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Typed lookup of the local variable an operand describes.
    pub fn local_variable<'a>(&'a self, value: &'a MetaValue) -> Option<LocalVariable<'a>> {
        self.resolve_metadata(value)
            .and_then(LocalVariable::from_node)
    }

    pub fn set_target_triple(&mut self, triple: impl Into<String>) {
        self.target_triple = Some(triple.into());
    }

    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Check that function names are unique and that every metadata
    /// reference used by the module resolves.
    pub fn materialize(&mut self) -> Result<(), Error> {
        if self.materialized {
            return Ok(());
        }

        let mut seen = BTreeMap::new();
        for function in &self.functions {
            if seen.insert(function.name.as_str(), ()).is_some() {
                return Err(Error::DuplicateFunction {
                    name: function.name.clone(),
                });
            }
        }

        for function in &self.functions {
            if let Some(id) = function.subprogram {
                let context = || format!("The `!dbg` attachment of `@{}`", function.name);
                self.check_reference(id, context)?;
            }

            for block in &function.blocks {
                for declaration in block.debug_declarations() {
                    for value in [declaration.location, declaration.variable] {
                        let mut references = Vec::new();
                        match value {
                            MetaValue::Ref(id) => references.push(*id),
                            MetaValue::Node(node) => references.extend(node.references()),
                            _ => {}
                        }
                        for id in references {
                            self.check_reference(id, || {
                                format!("A debug declaration in `@{}`", function.name)
                            })?;
                        }
                    }
                }
            }
        }

        for (owner, node) in &self.metadata {
            for id in node.references() {
                self.check_reference(id, || format!("Metadata node `{}`", owner))?;
            }
        }

        for (name, ids) in &self.named_metadata {
            for id in ids {
                self.check_reference(*id, || format!("Named metadata `!{}`", name))?;
            }
        }

        debug!(
            "Materialized module {} ({} functions, {} metadata nodes)",
            self.id.as_deref().unwrap_or("<unnamed>"),
            self.functions.len(),
            self.metadata.len()
        );
        self.materialized = true;
        Ok(())
    }

    fn check_reference(&self, id: MetaId, context: impl FnOnce() -> String) -> Result<(), Error> {
        if self.metadata.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::UndefinedMetadata {
                id,
                context: context(),
            })
        }
    }
}
