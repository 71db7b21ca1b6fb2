//! `impc SOURCE OUTPUT` — parses an IMP source file, runs it through the
//! code generator, and writes the emitted assembly to `OUTPUT`. Exits
//! non-zero and writes nothing when parsing or code generation raised any
//! diagnostic (§6), printing each one to standard error as
//! `Error! line <n>\n<message>\n`.

#[macro_use]
extern crate clap;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Arg;
use pest::error::LineColLocation;

fn main() -> ExitCode {
    env_logger::init();

    let matches = app_from_crate!()
        .arg(
            Arg::with_name("SOURCE")
                .help("IMP source file to compile")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Path to write the emitted assembly to")
                .required(true)
                .index(2),
        )
        .get_matches();

    let source_path = matches.value_of("SOURCE").unwrap();
    let output_path = matches.value_of("OUTPUT").unwrap();

    match run(source_path, output_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(source_path: &str, output_path: &str) -> Result<()> {
    let source = fs::read_to_string(source_path)
        .with_context(|| format!("reading source file {}", Path::new(source_path).display()))?;

    let program = match imp_syntax::parse(&source) {
        Ok(program) => program,
        Err(err) => {
            let line = match err.line_col {
                LineColLocation::Pos((line, _)) => line,
                LineColLocation::Span((line, _), _) => line,
            };
            report_error(line as u32, &err.to_string());
            anyhow::bail!("compilation failed");
        }
    };

    match imp_codegen::compile(&program) {
        Ok(assembly) => {
            fs::write(output_path, assembly).with_context(|| {
                format!("writing output file {}", Path::new(output_path).display())
            })?;
            log::info!("wrote {output_path}");
            Ok(())
        }
        Err(diagnostics) => {
            for d in &diagnostics {
                report_error(d.line(), &d.to_string());
            }
            anyhow::bail!(
                "compilation failed with {} diagnostic(s)",
                diagnostics.len()
            );
        }
    }
}

fn report_error(line: u32, message: &str) {
    eprintln!("Error! line {line}\n{message}");
}
