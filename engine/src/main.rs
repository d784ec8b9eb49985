//! SDTL CLI - run dataset transformation programs
//!
//! # Commands
//!
//! ```bash
//! sdtl run program.json                # Run a program, print every result
//! sdtl run program.json --var res -o out.json
//! sdtl functions                       # List registered function signatures
//! sdtl example                         # Print an example program
//! ```
//!
//! A program is the JSON parse tree produced by the external parser: named
//! dataset sources (CSV path or inline rows) and a list of statements.

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use sdtl::{logs, Binding, EngineOptions, Program, Session, REGISTRY};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sdtl")]
#[command(about = "Evaluate statistical dataset transformation programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program and output its results as JSON
    Run {
        /// Program JSON file
        program: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Variables to output (default: everything the program assigns)
        #[arg(long = "var")]
        vars: Vec<String>,

        /// Processing engine (overrides SDTL_ENGINE)
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// List registered function signatures
    Functions,

    /// Print an example program
    Example,
}

fn main() {
    let mut options = EngineOptions::from_env();
    logs::init(options.log_level);

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            program,
            output,
            vars,
            engine,
        } => {
            if let Some(engine) = engine {
                options.engine = engine;
            }
            cmd_run(&program, output.as_deref(), &vars, options)
        }
        Commands::Functions => cmd_functions(),
        Commands::Example => cmd_example(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    path: &Path,
    output: Option<&Path>,
    vars: &[String],
    options: EngineOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Running: {}", path.display());
    let program: Program = serde_json::from_str(&fs::read_to_string(path)?)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut session = Session::with_options(options)?;
    eprintln!("   Engine: {}", session.engine().name());
    session.run_program(&program, base_dir)?;

    let names: Vec<String> = if vars.is_empty() {
        session
            .variables()
            .names()
            .filter(|name| !program.datasets.contains_key(*name))
            .map(str::to_string)
            .collect()
    } else {
        vars.to_vec()
    };

    let mut results = IndexMap::new();
    for name in &names {
        let json = match session.get(name) {
            Some(Binding::Dataset(dataset)) => serde_json::to_value(dataset.to_maps())?,
            Some(Binding::Scalar { value, .. }) => serde_json::to_value(value)?,
            Some(Binding::Ruleset(ruleset)) => serde_json::json!({
                "ruleset": ruleset.name,
                "rules": ruleset.rules.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
            }),
            None => return Err(format!("unknown variable: {}", name).into()),
        };
        results.insert(name.clone(), json);
    }

    eprintln!("✅ {} statement(s), {} result(s)", program.statements.len(), results.len());
    write_output(&serde_json::to_string_pretty(&results)?, output)
}

fn cmd_functions() -> Result<(), Box<dyn std::error::Error>> {
    for signature in REGISTRY.signatures() {
        println!("{}", signature);
    }
    Ok(())
}

fn cmd_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&Program::example())?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
