use kleeir::utils::{Error as IrError, ParseError};
use strum::EnumIs;
use thiserror::Error;

#[derive(Debug, Error, EnumIs)]
pub enum HarnessError {
    #[error("I/O error on '{source_name}': {error}")]
    Io {
        source_name: String,
        #[source]
        error: std::io::Error,
    },

    /// The input container could not be turned into materialized modules.
    /// `diagnostics` carry byte spans into the container text.
    #[error("Failed to load {}: {message}", describe_module(.module))]
    Load {
        module: Option<usize>,
        message: String,
        diagnostics: Vec<ParseError>,
    },

    #[error("Function '{function}' not found in module #{module}")]
    FunctionNotFound { module: usize, function: String },

    #[error(
        "Missing debug information for '{function}': \
         {found} of {expected} parameter(s) have a debug declaration"
    )]
    MissingDebugInfo {
        function: String,
        found: usize,
        expected: usize,
    },

    #[error("Function '{function}' cannot be called from the harness: {reason}")]
    UnsupportedFunctionName { function: String, reason: String },

    #[error("Unsupported type for parameter #{ordinal} of '{function}': {reason}")]
    UnsupportedParameterType {
        function: String,
        ordinal: usize,
        reason: String,
    },
}

fn describe_module(module: &Option<usize>) -> String {
    match module {
        Some(index) => format!("module #{index}"),
        None => "input container".to_string(),
    }
}

impl HarnessError {
    pub(crate) fn load_in(module: usize, error: IrError) -> Self {
        let mut error = HarnessError::from(error);
        if let HarnessError::Load { module: slot, .. } = &mut error {
            *slot = Some(module);
        }
        error
    }
}

impl From<IrError> for HarnessError {
    fn from(error: IrError) -> Self {
        let message = error.to_string();
        match error {
            IrError::ParserErrors { module, errors } => HarnessError::Load {
                module: Some(module),
                message,
                diagnostics: errors,
            },
            _ => HarnessError::Load {
                module: None,
                message,
                diagnostics: Vec::new(),
            },
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
