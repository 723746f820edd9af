//! Jack Compiler Driver
//!
//! Command-line interface for the Jack-to-Hack toolchain: compile Jack
//! classes to VM code, translate VM code to Hack assembly, or run the whole
//! pipeline. Input may be a single file or a directory of source files; a
//! multi-file program is translated with one shared lowering context so the
//! bootstrap is emitted exactly once and synthesized return ids never
//! repeat.

use clap::{Parser, Subcommand};
use jackc_codegen::{bootstrap, to_asm, translate_unit, HackInst, LowerContext};
use jackc_frontend::{compile_source, Tokenizer};
use std::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "jackc")]
#[command(about = "A Jack compiler for the Hack platform")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile Jack source to VM code
    Compile {
        /// Input .jack file or directory of .jack files
        input: PathBuf,

        /// Output file (single-file input only; defaults to <input>.vm)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Translate VM code to Hack assembly
    Translate {
        /// Input .vm file or directory of .vm files
        input: PathBuf,

        /// Output assembly file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile Jack source all the way to Hack assembly
    Build {
        /// Input .jack file or directory of .jack files
        input: PathBuf,

        /// Output assembly file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump the classified tokens of a Jack source file
    Tokens {
        /// Input .jack file
        input: PathBuf,

        /// Emit tokens as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, output } => compile_command(&input, output.as_deref()),
        Commands::Translate { input, output } => translate_command(&input, output.as_deref()),
        Commands::Build { input, output } => build_command(&input, output.as_deref()),
        Commands::Tokens { input, json } => tokens_command(&input, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Collect the source files of one program: either the single given file or
/// every file in the directory with the expected extension, sorted for a
/// deterministic translation order.
fn source_files(input: &Path, extension: &str) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if input.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(input)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension() == Some(OsStr::new(extension)))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(format!("no .{} files in {}", extension, input.display()).into());
        }
        Ok(files)
    } else if input.extension() == Some(OsStr::new(extension)) {
        Ok(vec![input.to_path_buf()])
    } else {
        Err(format!("expected a .{} file or a directory, got {}", extension, input.display())
            .into())
    }
}

/// The class name of a source file is its file stem.
fn class_name(path: &Path) -> Result<String, Box<dyn Error>> {
    Ok(path
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| format!("cannot derive a class name from {}", path.display()))?
        .to_string())
}

fn compile_command(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let files = source_files(input, "jack")?;
    if output.is_some() && files.len() > 1 {
        return Err("--output is only valid for a single input file".into());
    }
    for path in files {
        let source = fs::read_to_string(&path)?;
        let vm = compile_source(&source)?;
        let out_path = match output {
            Some(out) => out.to_path_buf(),
            None => path.with_extension("vm"),
        };
        fs::write(&out_path, vm)?;
        log::info!("compiled {} -> {}", path.display(), out_path.display());
    }
    Ok(())
}

/// Lower a set of VM units behind a single bootstrap, threading one context
/// so return-address ids stay unique across the whole program.
fn lower_program(units: &[(String, String)]) -> Result<Vec<HackInst>, Box<dyn Error>> {
    let mut ctx = LowerContext::new();
    let mut instructions = bootstrap(&mut ctx);
    for (class, source) in units {
        instructions.extend(translate_unit(source, class, &mut ctx)?);
    }
    Ok(instructions)
}

/// Default output path for a whole-program assembly file.
fn asm_output_path(input: &Path) -> PathBuf {
    if input.is_dir() {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        input.join(format!("{name}.asm"))
    } else {
        input.with_extension("asm")
    }
}

fn translate_command(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let files = source_files(input, "vm")?;
    let mut units = Vec::new();
    for path in &files {
        units.push((class_name(path)?, fs::read_to_string(path)?));
    }
    let instructions = lower_program(&units)?;
    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| asm_output_path(input));
    fs::write(&out_path, to_asm(&instructions))?;
    log::info!(
        "translated {} unit(s) -> {} ({} instructions)",
        units.len(),
        out_path.display(),
        instructions.len()
    );
    Ok(())
}

fn build_command(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let files = source_files(input, "jack")?;
    let mut units = Vec::new();
    for path in &files {
        let source = fs::read_to_string(path)?;
        units.push((class_name(path)?, compile_source(&source)?));
    }
    let instructions = lower_program(&units)?;
    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| asm_output_path(input));
    fs::write(&out_path, to_asm(&instructions))?;
    log::info!(
        "built {} class(es) -> {}",
        units.len(),
        out_path.display()
    );
    Ok(())
}

fn tokens_command(input: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(input)?;
    let tokens = Tokenizer::new(&source).tokenize()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{token}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The whole pipeline in memory: Jack source through the compiler and
    /// the lowering engine behind one bootstrap.
    fn build_in_memory(classes: &[(&str, &str)]) -> String {
        let units: Vec<(String, String)> = classes
            .iter()
            .map(|(name, source)| (name.to_string(), compile_source(source).unwrap()))
            .collect();
        to_asm(&lower_program(&units).unwrap())
    }

    #[test]
    fn test_pipeline_compiles_a_class_to_assembly() {
        let asm = build_in_memory(&[(
            "Main",
            "class Main { function void main() { do Output.printInt(1 + 2); return; } }",
        )]);
        assert!(asm.starts_with("@256\n"));
        assert!(asm.contains("(Main.main)\n"));
        assert!(asm.contains("@Output.printInt\n"));
    }

    #[test]
    fn test_if_labels_in_different_subroutines_never_collide() {
        let asm = build_in_memory(&[(
            "Main",
            "class Main { \
               function int a(int x) { if (x) { return 1; } return 0; } \
               function int b(int x) { if (x) { return 2; } return 0; } \
             }",
        )]);
        // identical per-subroutine counters, distinct qualified symbols
        assert!(asm.contains("(Main.a$IF_TRUE0)\n"));
        assert!(asm.contains("(Main.b$IF_TRUE0)\n"));
    }

    #[test]
    fn test_return_ids_unique_across_classes() {
        let asm = build_in_memory(&[
            ("A", "class A { function void f() { do B.g(); return; } }"),
            ("B", "class B { function void g() { return; } }"),
        ]);
        // bootstrap call takes $RET.0, the cross-class call takes $RET.1
        assert_eq!(asm.matches("($RET.0)").count(), 1);
        assert_eq!(asm.matches("($RET.1)").count(), 1);
    }
}
