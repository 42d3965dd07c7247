//! Tern Compiler CLI
//!
//! Thin command-line front end over [`ternc`]: `build` emits the C and
//! stack-machine backends, `dump` prints one pipeline stage as text.
//! All the actual compiling happens in the library; this binary only
//! parses arguments and writes the results out.

use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "ternc")]
#[command(about = "Tern compiler - compile .tern programs to C or a stack-machine listing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a program, writing `<input>.c` and `<input>.sx` next to it.
    Build {
        /// Entry .tern source file
        input: PathBuf,

        /// Output path stem (defaults to the input path without its extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print one pipeline stage as text.
    Dump {
        /// Entry .tern source file
        input: PathBuf,

        #[arg(long, value_enum)]
        stage: Stage,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Stage {
    Tokens,
    Ast,
    AstDot,
    Sym,
    Ir,
    Cfg,
    CfgDot,
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Build { input, output } => build(input, output.as_deref()),
        Command::Dump { input, stage } => dump(input, *stage),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn build(input: &std::path::Path, output: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    let result = ternc::compile_file(input)?;
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }

    let stem = output.map(PathBuf::from).unwrap_or_else(|| input.with_extension(""));
    let c_path = stem.with_extension("c");
    let stack_path = stem.with_extension("sx");

    std::fs::write(&c_path, &result.c_source)?;
    std::fs::write(&stack_path, &result.stack_listing)?;

    println!("Compiled {} -> {}, {}", input.display(), c_path.display(), stack_path.display());
    Ok(())
}

fn dump(input: &std::path::Path, stage: Stage) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(input)?;

    let text = match stage {
        Stage::Tokens => {
            let tokens = ternc::lexer::Lexer::new(&source).tokenize()?;
            ternc::dump::dump_tokens(&tokens.tokens)
        }
        Stage::Ast | Stage::AstDot | Stage::Sym | Stage::Ir | Stage::Cfg | Stage::CfgDot => {
            let result = ternc::compile_file(input)?;
            match stage {
                Stage::Ast => ternc::dump::dump_ast(&result.program),
                Stage::AstDot => ternc::dump::dump_ast_dot(&result.program),
                Stage::Sym => ternc::dump::dump_symbols(&result.semantic),
                Stage::Ir => ternc::dump::dump_ir(&result.ir),
                Stage::Cfg => result.optimized_cfgs.iter().map(ternc::dump::dump_cfg).collect::<Vec<_>>().join("\n"),
                Stage::CfgDot => result.optimized_cfgs.iter().map(ternc::dump::dump_cfg_dot).collect::<Vec<_>>().join("\n"),
                Stage::Tokens => unreachable!(),
            }
        }
    };

    print!("{}", text);
    Ok(())
}
