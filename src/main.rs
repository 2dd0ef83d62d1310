//! schemalign CLI - Command-line interface
//!
//! Commands:
//!   compile  - Compile an alignment into a mapping document
//!   check    - Compile and report only
//!   rif      - Translate an alignment to RIF
//!   validate - Check an alignment's structure
//!   schema   - Print JSON schemas of the input and output formats

use schemalign::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "SCHEMALIGN_LOG";

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "compile" => cmd_compile(&args[2..]),
        "check" => cmd_check(&args[2..]),
        "rif" => cmd_rif(&args[2..]),
        "validate" => cmd_validate(&args[2..]),
        "schema" => cmd_schema(&args[2..]),
        "version" | "--version" | "-v" => {
            println!("schemalign {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so stdout stays the document
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("schemalign=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!(
        r#"
schemalign - compile schema alignments into app-schema mappings

USAGE:
    schemalign <COMMAND> [OPTIONS]

COMMANDS:
    compile <alignment> <source-schema> <target-schema>   Compile to a mapping document
    check <alignment> <source-schema> <target-schema>     Compile and print the report only
    rif <alignment>                                       Translate to RIF presentation syntax
    validate <alignment>                                  Check alignment structure
    schema [name]                                         Print JSON schema for a file format
    version                                               Print version

OPTIONS:
    --config <file>               Compiler configuration (YAML)
    --format <xml|json|yaml>      Document format (default: from config, else xml)
    --output <file>               Output file (default: stdout)
    --template-dir <dir>          Override documents/app_schema.jinja
    --report                      Print the compile report to stderr (compile)
    --in-order                    Compile cells in file order, no type-first pass
    --json                        JSON output (check, validate)

ENVIRONMENT:
    SCHEMALIGN_LOG                Log filter (default: schemalign=warn)

EXAMPLES:
    schemalign compile landcover.yaml source.yaml lcv.yaml --config inspire.yaml
    schemalign check landcover.yaml source.yaml lcv.yaml --json
    schemalign rif landcover.yaml > landcover.rif
"#
    );
}

/// Inputs shared by `compile` and `check`
struct CompileInputs {
    alignment: Alignment,
    source: SchemaIndex,
    target: SchemaIndex,
    config: CompilerConfig,
}

fn load_compile_inputs(args: &[String], usage: &str) -> Result<CompileInputs> {
    let positional = positional_args(args);
    if positional.len() < 3 {
        return Err(usage.into());
    }
    let config = match parse_flag_value(args, "--config") {
        Some(path) => CompilerConfig::load(Path::new(path))?,
        None => CompilerConfig::default(),
    };
    Ok(CompileInputs {
        alignment: load_alignment(positional[0])?,
        source: SchemaIndex::new(load_schema(positional[1])?),
        target: SchemaIndex::new(load_schema(positional[2])?),
        config,
    })
}

fn run_compiler(inputs: &CompileInputs, args: &[String]) -> CompileOutput {
    let compiler = Compiler::new(&inputs.source, &inputs.target, &inputs.config);
    if args.contains(&"--in-order".to_string()) {
        compiler.compile_in_order(&inputs.alignment)
    } else {
        compiler.compile(&inputs.alignment)
    }
}

fn cmd_compile(args: &[String]) -> Result<()> {
    let inputs = load_compile_inputs(
        args,
        "Usage: schemalign compile <alignment> <source-schema> <target-schema> [--config f] [--format xml|json|yaml]",
    )?;
    let format = match parse_flag_value(args, "--format") {
        Some(f) => f.parse::<OutputFormat>()?,
        None => inputs.config.format,
    };
    let output_path = parse_output_arg(args);

    let output = run_compiler(&inputs, args);

    let rendered = match (format, parse_flag_value(args, "--template-dir")) {
        (OutputFormat::Xml, Some(dir)) => {
            let env = templates::engine_with_override(Path::new(dir))?;
            templates::render_document_with(&env, &output.document)?
        }
        _ => output.document.render(format)?,
    };
    write_output(&output_path, &rendered)?;

    if args.contains(&"--report".to_string()) {
        eprintln!("{}", output.report.to_report());
    }
    if output.report.success {
        Ok(())
    } else {
        Err(format!("{} cell(s) failed to compile", output.report.failure_count()).into())
    }
}

fn cmd_check(args: &[String]) -> Result<()> {
    let inputs = load_compile_inputs(
        args,
        "Usage: schemalign check <alignment> <source-schema> <target-schema> [--config f] [--json]",
    )?;
    let json_output = args.contains(&"--json".to_string());

    let output = run_compiler(&inputs, args);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&output.report)?);
    } else {
        println!("{}", output.report.to_report());
    }

    if output.report.success {
        Ok(())
    } else {
        Err("Compilation failed".into())
    }
}

fn cmd_rif(args: &[String]) -> Result<()> {
    let positional = positional_args(args);
    let Some(path) = positional.first() else {
        return Err("Usage: schemalign rif <alignment> [--config f] [--output f]".into());
    };
    let config = match parse_flag_value(args, "--config") {
        Some(path) => CompilerConfig::load(Path::new(path))?,
        None => CompilerConfig::default(),
    };
    let alignment = load_alignment(path)?;
    let document = translate(&alignment, &config);
    write_output(&parse_output_arg(args), &document.to_string())
}

fn cmd_validate(args: &[String]) -> Result<()> {
    let positional = positional_args(args);
    let Some(path) = positional.first() else {
        return Err("Usage: schemalign validate <alignment> [--json]".into());
    };
    let json_output = args.contains(&"--json".to_string());

    let alignment = load_alignment(path)?;
    let issues = alignment.validate();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else {
        print_validation_report(&issues, path);
    }

    if issues.iter().any(|i| i.severity == Severity::Error) {
        Err("Validation failed".into())
    } else {
        Ok(())
    }
}

fn print_validation_report(issues: &[ValidationIssue], path: &str) {
    println!("Validating {}", path);
    if issues.is_empty() {
        println!("  OK - no issues found");
        return;
    }
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    println!(
        "  {} error(s), {} warning(s)",
        errors,
        issues.len() - errors
    );
    for issue in issues {
        let marker = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &issue.cell {
            Some(cell) => println!("  [{}] {} {}: {}", issue.code, marker, cell, issue.message),
            None => println!("  [{}] {}: {}", issue.code, marker, issue.message),
        }
    }
}

fn cmd_schema(args: &[String]) -> Result<()> {
    let schema_name = args.first().map(|s| s.as_str()).unwrap_or("list");

    match schema_name {
        "list" => {
            println!("Available schemas: alignment, schema, config, document, report");
            Ok(())
        }
        "alignment" => print_schema::<Alignment>(),
        "schema" => print_schema::<Schema>(),
        "config" => print_schema::<CompilerConfig>(),
        "document" => print_schema::<MappingDocument>(),
        "report" => print_schema::<CompileReport>(),
        _ => Err(format!("Unknown schema: {}", schema_name).into()),
    }
}

fn print_schema<T: schemars::JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

// ---------------------------------------------------------------
// Argument and file helpers
// ---------------------------------------------------------------

/// Flags that consume the following argument
const VALUE_FLAGS: &[&str] = &["--config", "--format", "--output", "-o", "--template-dir"];

fn positional_args(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip = true;
        } else if !arg.starts_with('-') {
            out.push(arg.as_str());
        }
    }
    out
}

fn parse_flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_output_arg(args: &[String]) -> Option<PathBuf> {
    parse_flag_value(args, "--output")
        .or_else(|| parse_flag_value(args, "-o"))
        .map(PathBuf::from)
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content).map_err(Error::Io)?;
            eprintln!("Written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn is_json(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn load_alignment(path: &str) -> Result<Alignment> {
    let content = fs::read_to_string(path).map_err(Error::Io)?;
    if is_json(path) {
        Alignment::from_json(&content)
    } else {
        Alignment::from_yaml(&content)
    }
}

fn load_schema(path: &str) -> Result<Schema> {
    let content = fs::read_to_string(path).map_err(Error::Io)?;
    if is_json(path) {
        Schema::from_json(&content)
    } else {
        Schema::from_yaml(&content)
    }
}
