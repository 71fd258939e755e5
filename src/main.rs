mod bridge;
mod compiler;
mod config;
mod diagnostics;
mod emitter;
mod error;
mod expander;
mod form;
mod highlighter;
mod host;
mod lexer;
mod module;
mod munge;
mod prelude;
mod reader;
mod span;

use bridge::EmbeddedBridge;
use clap::Parser;
use compiler::Compiler;
use error::{CompileError, HisspError, ReadError};
use highlighter::LisspHelper;
use module::Module;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::PathBuf;

/// Reader and compiler for Hissp: a Lisp whose source is a tree of tuples
/// and atoms, compiled to a restricted expression fragment of its host.
#[derive(Parser, Debug)]
#[command(name = "hissp")]
#[command(version = config::VERSION)]
#[command(about = "Read, expand, and compile Lissp source")]
struct CliArgs {
    /// A `.lissp` source file to compile and run (starts a REPL if omitted)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Print each top-level form's emitted host source before running it
    #[arg(long = "emit")]
    emit: bool,
}

fn new_module(name: &str) -> std::rc::Rc<Module> {
    let module = Module::new(name);
    prelude::install(&module);
    module
}

fn main() {
    let args = CliArgs::parse();
    let result = match &args.script {
        Some(path) => run_file(path, args.emit),
        None => {
            run_repl();
            Ok(())
        }
    };
    if let Err(msg) = result {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

fn run_file(path: &PathBuf, emit: bool) -> Result<(), String> {
    let src = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let module_name = module_name_for(path);
    let module = new_module(&module_name);
    let compiler = Compiler::new(module);

    if emit {
        let emitted = compiler
            .compile_text(&src)
            .map_err(|e| diagnostics::render(&e, &path.display().to_string(), &src))?;
        for form in emitted {
            println!("{}", form.text);
        }
        return Ok(());
    }

    compiler
        .eval_text(&src)
        .map(|_| ())
        .map_err(|e| diagnostics::render(&e, &path.display().to_string(), &src))
}

fn module_name_for(path: &PathBuf) -> String {
    path.file_stem().map(|s| s.to_string_lossy().replace(['-', '.'], "_")).unwrap_or_else(|| "__main__".to_string())
}

fn run_repl() {
    let module = new_module("__main__");
    let bridge = EmbeddedBridge::new(module.clone());

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl = match Editor::with_config(rl_config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("failed to initialize REPL: {e}");
            return;
        }
    };
    rl.set_helper(Some(LisspHelper::new()));
    let history_file = ".hissp_history";
    let _ = rl.load_history(history_file);

    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);
    println!("{}", config::WELCOME_FOOTER);

    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { "hissp> " } else { "  ...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if pending.is_empty() {
                    match trimmed {
                        "(quit)" | "(exit)" => break,
                        "(clear)" => {
                            print!("\x1B[2J\x1B[H");
                            continue;
                        }
                        "" => continue,
                        _ => {}
                    }
                }
                pending.push_str(&line);
                pending.push('\n');
                run_pending_forms(&mut pending, &bridge, &module);
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => {
                eprintln!("{e}");
                break;
            }
        }
    }
    let _ = rl.save_history(history_file);
}

/// Read as many complete top-level forms as `pending` currently holds,
/// evaluating and printing each one; leaves an unfinished trailing form (if
/// any) in `pending` so the next line can complete it. A read error other
/// than "ran out of input mid-form" is reported and drops the whole buffer,
/// matching the REPL recovery policy of `spec.md` §7: recover at the
/// top-level-form boundary.
fn run_pending_forms(pending: &mut String, bridge: &EmbeddedBridge, module: &std::rc::Rc<Module>) {
    loop {
        let injector = bridge.injector();
        let mut r = reader::Reader::new(pending, module.clone(), Some(&injector));
        match r.read_one() {
            Ok(Some(form)) => {
                let consumed = r.position().offset as usize;
                match bridge.eval_top(&form) {
                    Ok(value) => {
                        if let Ok(expanded) = expander::expand_one(form.clone(), module) {
                            if let Ok(emitted) = emitter::emit(&expanded) {
                                println!("{}", emitted.text);
                            }
                        }
                        println!("=> {}", prelude::repr(&value));
                    }
                    Err(e) => eprintln!("{}", diagnostics::render(&e, "<stdin>", pending)),
                }
                *pending = pending[consumed..].to_string();
                if pending.trim().is_empty() {
                    pending.clear();
                    return;
                }
            }
            Ok(None) => {
                pending.clear();
                return;
            }
            Err(CompileError { cause: HisspError::Read(ReadError::EofInForm(_)), .. }) => {
                // Incomplete form: wait for more input on the next line.
                return;
            }
            Err(e) => {
                eprintln!("{}", diagnostics::render(&e, "<stdin>", pending));
                pending.clear();
                return;
            }
        }
    }
}
