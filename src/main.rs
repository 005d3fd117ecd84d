use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use url::Url;

use go_schema_gen::{generate_to_writer, SchemaInput};

/// Generate Go struct definitions from JSON Schema documents.
#[derive(Debug, Parser)]
#[command(name = "go-schema-gen", version)]
struct Args {
    /// Input JSON Schema files; `$ref`s may point across them.
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output file; stdout when omitted.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Package name for the generated Go file.
    #[arg(short = 'p', long = "package", default_value = "models")]
    package: String,

    /// Reject input documents that lack a $schema key.
    #[arg(long = "schema-key-required")]
    schema_key_required: bool,
}

fn main() {
    let args: Args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut inputs: Vec<SchemaInput> = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let text: String =
            fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let absolute: PathBuf = path
            .canonicalize()
            .map_err(|e| format!("{}: {e}", path.display()))?;
        let source_uri: Url = Url::from_file_path(&absolute)
            .map_err(|()| format!("{}: not a representable file path", path.display()))?;
        inputs.push(SchemaInput { text, source_uri });
    }

    // Generation is buffered so a failure never leaves a partial file.
    let mut generated: Vec<u8> = Vec::new();
    generate_to_writer(
        &inputs,
        &args.package,
        args.schema_key_required,
        &mut generated,
    )?;

    match &args.output {
        Some(path) => fs::write(path, &generated)?,
        None => std::io::stdout().write_all(&generated)?,
    }
    Ok(())
}
