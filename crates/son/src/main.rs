use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use son_core::{json, SonError, Value};
use son_eval::Interpreter;

#[derive(Parser)]
#[command(name = "son", about = "SON: a Smalltalk whose programs are JSON trees", version)]
struct Cli {
    /// Program file to execute (SON JSON)
    file: Option<String>,

    /// Evaluate an expression and print the result
    #[arg(short, long)]
    eval: Option<String>,

    /// Load the base environment from a JSON image file
    #[arg(long)]
    image: Option<String>,

    /// Suppress the REPL banner
    #[arg(short, long)]
    quiet: bool,

    /// Enter the REPL after running a file or expression
    #[arg(short, long)]
    interactive: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let interpreter = match build_interpreter(cli.image.as_deref()) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut ran_something = false;

    if let Some(expr) = &cli.eval {
        ran_something = true;
        if !run_source(&interpreter, expr) {
            std::process::exit(1);
        }
    }

    if let Some(file) = &cli.file {
        ran_something = true;
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Error: cannot read {file}: {e}");
                std::process::exit(1);
            }
        };
        if !run_source(&interpreter, &source) {
            std::process::exit(1);
        }
    }

    if !ran_something || cli.interactive {
        repl(&interpreter, cli.quiet);
    }
}

fn build_interpreter(image_path: Option<&str>) -> Result<Interpreter, SonError> {
    let Some(path) = image_path else {
        return Ok(Interpreter::new());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| SonError::eval(format!("cannot read image {path}: {e}")))?;
    let blob: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| SonError::eval(format!("invalid image {path}: {e}")))?;
    let blob = blob
        .as_object()
        .ok_or_else(|| SonError::eval(format!("invalid image {path}: expected an object")))?;
    Interpreter::from_image(blob)
}

/// Evaluate a source text, drain scheduled callbacks, print the result.
fn run_source(interpreter: &Interpreter, source: &str) -> bool {
    let result = interpreter.eval_source(source);
    interpreter.run_scheduled();
    match result {
        Ok(value) => {
            println!("{}", render(&value));
            true
        }
        Err(e) => {
            eprintln!("Error: {e}");
            false
        }
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string(&json::value_to_json_lossy(value)).unwrap_or_else(|_| value.to_string())
}

fn repl(interpreter: &Interpreter, quiet: bool) {
    if !quiet {
        println!("SON {} — programs are JSON trees", env!("CARGO_PKG_VERSION"));
        println!("Type a SON expression, e.g. [1, \"+\", 2]. Ctrl-D exits.");
    }

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: cannot start line editor: {e}");
            return;
        }
    };

    // One scope for the whole session, so assignments persist.
    let session = interpreter.new_scope();

    loop {
        match rl.readline("son> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                match interpreter.eval_source_in(line, &session) {
                    Ok(value) => println!("{}", render(&value)),
                    Err(e) => eprintln!("Error: {e}"),
                }
                interpreter.run_scheduled();
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }
}
