//! Parameter recovery from debug declarations.
//!
//! Formal parameters in IR carry no reliable source names, so the resolver
//! walks the entry block of the function and looks for the debug markers that
//! bind each argument slot to a `DILocalVariable` (the `arg:` field). The
//! matched name is paired with the formal's IR type to produce a
//! [`ParameterDescriptor`].
use std::collections::BTreeSet;

use kleeir::{
    module::{Function, Module},
    types::Type,
};
use log::{debug, warn};
use strum::EnumIs;

use crate::error::{HarnessError, HarnessResult};

/// Storage shape of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum ParamKind {
    /// Any pointer, backed by a byte buffer in the harness.
    Pointer,
    /// Fixed-width integer of the given bit width.
    Integer(u32),
}

impl ParamKind {
    /// Classify an IR type, `None` for shapes the harness cannot model.
    pub fn classify(ty: &Type) -> Option<Self> {
        if ty.is_pointer_like() {
            Some(ParamKind::Pointer)
        } else {
            ty.integer_width().map(ParamKind::Integer)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterDescriptor {
    /// 0-based position in the function signature.
    pub ordinal: usize,
    /// Source-level name recovered from debug information.
    pub name: String,
    pub kind: ParamKind,
}

/// Recover the parameters of `function`, in the order their debug
/// declarations appear in the entry block.
///
/// `module` must be the module owning `function`; its metadata table is used
/// to resolve the declarations.
pub fn resolve_parameters(
    module: &Module,
    function: &Function,
) -> HarnessResult<Vec<ParameterDescriptor>> {
    let arity = function.arity();
    if function.variadic {
        warn!(
            "'{}' is variadic, only its {} fixed parameter(s) are synthesized",
            function.name, arity
        );
    }
    if arity == 0 {
        return Ok(Vec::new());
    }

    let declarations = function
        .entry_block()
        .into_iter()
        .flat_map(|block| block.debug_declarations());

    let mut matched = BTreeSet::new();
    let mut descriptors = Vec::with_capacity(arity);

    for declaration in declarations {
        let Some(variable) = module.local_variable(declaration.variable) else {
            continue;
        };

        let Some(ordinal) = variable.ordinal() else {
            debug!(
                "'{}': skipping local variable '{}'",
                function.name, variable.name
            );
            continue;
        };

        if ordinal >= arity {
            debug!(
                "'{}': skipping '{}' bound to argument slot {} (arity is {})",
                function.name, variable.name, ordinal, arity
            );
            continue;
        }

        if let (Some(scope), Some(subprogram)) = (variable.scope, function.subprogram) {
            if scope != subprogram {
                debug!(
                    "'{}': skipping '{}' from scope {} (inlined callee)",
                    function.name, variable.name, scope
                );
                continue;
            }
        }

        if !matched.insert(ordinal) {
            debug!(
                "'{}': argument slot {} already bound, ignoring repeated marker for '{}'",
                function.name, ordinal, variable.name
            );
            continue;
        }

        let Some(ty) = function.param_type(ordinal) else {
            return Err(HarnessError::UnsupportedParameterType {
                function: function.name.clone(),
                ordinal,
                reason: "argument slot has no formal parameter".to_string(),
            });
        };

        let Some(kind) = ParamKind::classify(ty) else {
            return Err(HarnessError::UnsupportedParameterType {
                function: function.name.clone(),
                ordinal,
                reason: format!(
                    "'{}' has type {}, expected a pointer or an integer",
                    variable.name, ty
                ),
            });
        };

        debug!(
            "'{}': parameter #{} is '{}' ({:?})",
            function.name, ordinal, variable.name, kind
        );
        descriptors.push(ParameterDescriptor {
            ordinal,
            name: variable.name.to_string(),
            kind,
        });

        if descriptors.len() == arity {
            break;
        }
    }

    if descriptors.len() < arity {
        return Err(HarnessError::MissingDebugInfo {
            function: function.name.clone(),
            found: descriptors.len(),
            expected: arity,
        });
    }

    Ok(descriptors)
}
