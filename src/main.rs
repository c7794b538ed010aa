use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use govol_lisp::{Console, HeapConfig, Interp};

#[derive(Parser)]
#[command(name = "govol-lisp", version, about = "GOVOL LISP interpreter")]
struct Args {
    /// Atom table slots
    #[arg(long, default_value_t = 1000)]
    atoms: usize,
    /// Number table slots
    #[arg(long, default_value_t = 1000)]
    numbers: usize,
    /// List area cells
    #[arg(long, default_value_t = 6000)]
    cells: usize,
    /// Bootstrap library, loaded when the file exists
    #[arg(long, default_value = "lispinit")]
    init: PathBuf,
    /// Transcript log, truncated at startup
    #[arg(long, default_value = "lisp.log")]
    log: PathBuf,
}

/// Terminal console: stdout plus a transcript mirror of everything printed
/// and every line typed.
struct StdConsole {
    log: Option<File>,
}

impl StdConsole {
    fn new(path: &PathBuf) -> Self {
        Self {
            log: File::create(path).ok(),
        }
    }

    fn log_str(&mut self, s: &str) {
        if let Some(f) = &mut self.log {
            let _ = f.write_all(s.as_bytes());
            let _ = f.flush();
        }
    }
}

impl Console for StdConsole {
    fn print(&mut self, s: &str) {
        print!("{s}");
        let _ = io::stdout().flush();
        self.log_str(s);
    }

    fn read_line(&mut self, prompt: Option<char>) -> Option<String> {
        if let Some(p) = prompt {
            self.print(&p.to_string());
        }
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                self.log_str(&line);
                self.log_str("\n");
                Some(line)
            }
        }
    }
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut console = StdConsole::new(&args.log);
    console.print("ENTERING THE GOVOL LISP INTERPRETER\n");

    let config = HeapConfig {
        atoms: args.atoms,
        numbers: args.numbers,
        cells: args.cells,
    };
    let mut interp = match Interp::with_config(console, config) {
        Ok(interp) => interp,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if args.init.exists() {
        interp.boot(&args.init.display().to_string());
    }
    interp.repl();
    ExitCode::SUCCESS
}
