use std::num::NonZeroU32;

use ariadne::{ColorGenerator, IndexType, Label, Report, ReportKind, Source};
use clap::Parser as ClapParser;
use kleegen::{
    config::{Config, DEFAULT_TARGET_TRIPLE},
    error::HarnessError,
    loader::{InputSource, load_modules},
    logger::{StderrLogger, level_from_verbosity},
    synthesize,
};

/// Synthesize a KLEE harness for a function of an LLVM IR module.
#[derive(ClapParser)]
#[command(name = "llvm-klee", version)]
pub struct Arguments {
    /// Input IR container (textual IR), `-` for standard input
    input: String,

    /// Name of the function under test
    function: String,

    /// Size in bytes of the symbolic buffer backing each pointer parameter
    #[arg(short = 's', long = "buffer-size", default_value = "1024")]
    buffer_size: NonZeroU32,

    /// Target triple stamped on every loaded module
    #[arg(short = 't', long = "triple", default_value = DEFAULT_TARGET_TRIPLE)]
    triple: String,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    quiet: bool,
}

fn fail(error: &HarnessError) -> ! {
    eprintln!("llvm-klee: error: {}", error);
    std::process::exit(1);
}

/// Print `error`, with source excerpts for parse diagnostics.
fn report(file: &str, text: &str, error: &HarnessError) -> ! {
    let HarnessError::Load { diagnostics, .. } = error else {
        fail(error);
    };

    eprintln!("llvm-klee: error: {}", error);

    let mut colors = ColorGenerator::new();
    let color = colors.next();

    for diagnostic in diagnostics {
        let span = (file.to_string(), diagnostic.span.clone());
        let printed = Report::build(ReportKind::Error, span.clone())
            .with_config(ariadne::Config::default().with_index_type(IndexType::Byte))
            .with_message(&diagnostic.message)
            .with_label(
                Label::new(span)
                    .with_message("The error occurred here")
                    .with_color(color),
            )
            .finish()
            .eprint((file.to_string(), Source::from(text)));
        if printed.is_err() {
            eprintln!("llvm-klee: error: {}", diagnostic);
        }
    }
    std::process::exit(1);
}

fn main() {
    let args = Arguments::parse();

    let level = level_from_verbosity(args.verbose, args.quiet);
    if let Err(error) = StderrLogger::new(level).install() {
        eprintln!("llvm-klee: warning: logging disabled: {}", error);
    }

    let config = Config::default()
        .with_buffer_size(args.buffer_size)
        .with_target_triple(args.triple);
    let input = InputSource::from_arg(&args.input);

    let text = match input.read_source() {
        Ok(text) => text,
        Err(error) => fail(&error),
    };

    let mut stdout = std::io::stdout().lock();
    let result = load_modules(&text, &config)
        .and_then(|modules| synthesize(&modules, &args.function, &config, &mut stdout));

    if let Err(error) = result {
        report(&input.name(), &text, &error);
    }
}
