//! Symbolic-execution harness synthesis.
//!
//! The pipeline is strictly sequential: [`loader`] turns an input container
//! into materialized modules, [`resolver`] recovers the parameters of the
//! function under test from each module's debug information and [`emitter`]
//! renders one C harness per module.
pub mod config;
pub mod emitter;
pub mod error;
pub mod loader;
pub mod logger;
pub mod resolver;

use std::io;

use kleeir::module::Module;
use log::info;

use crate::{
    config::Config,
    emitter::HarnessEmitter,
    error::{HarnessError, HarnessResult},
    loader::{InputSource, load_modules},
    resolver::resolve_parameters,
};

/// Write one harness per module for `function`, in module order.
///
/// Every harness is rendered before anything is written, so `out` is left
/// untouched when any module fails. Returns the number of harnesses written.
pub fn synthesize(
    modules: &[Module],
    function: &str,
    config: &Config,
    out: &mut impl io::Write,
) -> HarnessResult<usize> {
    let emitter = HarnessEmitter::new(config);
    let mut buffer = Vec::new();

    for (index, module) in modules.iter().enumerate() {
        let target = module
            .function(function)
            .ok_or_else(|| HarnessError::FunctionNotFound {
                module: index,
                function: function.to_string(),
            })?;

        let params = resolve_parameters(module, target)?;
        emitter.emit(&mut buffer, &target.name, &params)?;
        info!(
            "Synthesized harness for '{}' in module #{} with {} parameter(s)",
            function,
            index,
            params.len()
        );
    }

    out.write_all(&buffer)
        .and_then(|_| out.flush())
        .map_err(|error| HarnessError::Io {
            source_name: "<output>".to_string(),
            error,
        })?;
    Ok(modules.len())
}

/// Read `input`, load its modules and write their harnesses to `out`.
pub fn run(
    input: &InputSource,
    function: &str,
    config: &Config,
    out: &mut impl io::Write,
) -> HarnessResult<usize> {
    let text = input.read_source()?;
    let modules = load_modules(&text, config)?;
    synthesize(&modules, function, config, out)
}
