//! Module loading: read an input container and turn it into materialized
//! modules stamped with the configured target triple.
use std::{
    io::Read,
    path::{Path, PathBuf},
};

use kleeir::{module::Module, parser::parse_container};
use log::debug;

use crate::{
    config::Config,
    error::{HarnessError, HarnessResult},
};

/// Magic numbers of the binary bitcode container (raw and wrapped).
const BITCODE_MAGIC: [u8; 4] = [b'B', b'C', 0xC0, 0xDE];
const BITCODE_WRAPPER_MAGIC: [u8; 4] = [0xDE, 0xC0, 0x17, 0x0B];

/// Where the input container is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    Path(PathBuf),
}

impl InputSource {
    /// `-` names standard input, anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::Path(PathBuf::from(arg))
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::Path(path) => path.display().to_string(),
        }
    }

    /// Read the whole input as text.
    pub fn read_source(&self) -> HarnessResult<String> {
        let io_error = |error| HarnessError::Io {
            source_name: self.name(),
            error,
        };

        let bytes = match self {
            InputSource::Stdin => {
                let mut bytes = Vec::new();
                std::io::stdin().read_to_end(&mut bytes).map_err(io_error)?;
                bytes
            }
            InputSource::Path(path) => std::fs::read(path).map_err(io_error)?,
        };

        decode(&self.name(), bytes)
    }
}

fn decode(name: &str, bytes: Vec<u8>) -> HarnessResult<String> {
    if bytes.starts_with(&BITCODE_MAGIC) || bytes.starts_with(&BITCODE_WRAPPER_MAGIC) {
        return Err(HarnessError::Load {
            module: None,
            message: format!(
                "'{name}' is a binary bitcode container; disassemble it to textual IR first"
            ),
            diagnostics: Vec::new(),
        });
    }

    String::from_utf8(bytes).map_err(|error| HarnessError::Load {
        module: None,
        message: format!(
            "'{name}' is not valid UTF-8 text (invalid byte at offset {})",
            error.utf8_error().valid_up_to()
        ),
        diagnostics: Vec::new(),
    })
}

/// Parse every module of `text`, materialize it and apply the triple override.
///
/// Fails on the first module that cannot be parsed or materialized, no
/// module is returned in that case.
pub fn load_modules(text: &str, config: &Config) -> HarnessResult<Vec<Module>> {
    let mut modules = parse_container(text)?;

    for (index, module) in modules.iter_mut().enumerate() {
        module
            .materialize()
            .map_err(|error| HarnessError::load_in(index, error))?;

        debug!(
            "Loaded module #{} ({}): {} function(s), target triple {} -> {}",
            index,
            module.id.as_deref().unwrap_or("<unnamed>"),
            module.functions.len(),
            module.target_triple.as_deref().unwrap_or("<none>"),
            config.target_triple
        );
        module.set_target_triple(config.target_triple.as_str());
    }

    Ok(modules)
}

/// Read and load the modules of a file.
pub fn load_path(path: impl AsRef<Path>, config: &Config) -> HarnessResult<Vec<Module>> {
    let source = InputSource::Path(path.as_ref().to_path_buf());
    let text = source.read_source()?;
    load_modules(&text, config)
}
