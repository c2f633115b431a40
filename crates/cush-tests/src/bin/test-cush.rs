//! Minimal stand-in for the cush shell.
//!
//! Behaves like cush as far as the test scripts can observe: it prompts with
//! `cush> ` only when stdin is a terminal, records every non-empty line in its
//! history before running it, and implements the `info`, `history` and `exit`
//! built-ins. Anything else runs as an external command.

use std::io::{self, BufRead, IsTerminal, Write};
use std::process::{Command, ExitCode};

use cush_tests::NO_HISTORY_VAR;

const PROMPT: &str = "cush> ";
const MAX_HISTORY: usize = 1000;

fn main() -> ExitCode {
    let interactive = io::stdin().is_terminal();
    let keep_history = std::env::var_os(NO_HISTORY_VAR).is_none();
    let mut history: Vec<String> = Vec::new();
    let mut input = io::stdin().lock();
    let mut line = String::new();

    loop {
        if interactive && write_out(PROMPT).is_err() {
            return ExitCode::FAILURE;
        }

        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("read: {e}");
                return ExitCode::FAILURE;
            }
        }

        let cmdline = line.trim_end_matches(['\n', '\r']);
        if keep_history && !cmdline.is_empty() && history.len() < MAX_HISTORY {
            history.push(cmdline.to_string());
        }

        let argv: Vec<&str> = cmdline.split_whitespace().collect();
        let Some((&program, args)) = argv.split_first() else {
            continue;
        };

        let outcome = match program {
            "exit" => return ExitCode::SUCCESS,
            "info" => info(),
            "history" => print_history(&history),
            _ => external(program, args),
        };
        if let Err(e) = outcome {
            eprintln!("{program}: {e}");
        }
    }
}

fn write_out(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

fn info() -> io::Result<()> {
    let cwd = std::env::current_dir()?;
    write_out(&format!(
        "Hostname: {}\nCurrent Directory: {}\n",
        cush_tests::hostname(),
        cwd.display()
    ))
}

fn print_history(history: &[String]) -> io::Result<()> {
    let listing: String = history
        .iter()
        .enumerate()
        .map(|(i, cmd)| format!("{}: {cmd}\n", i + 1))
        .collect();
    write_out(&listing)
}

fn external(program: &str, args: &[&str]) -> io::Result<()> {
    match Command::new(program).args(args).status() {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            write_out(&format!("{program}: command not found\n"))
        }
        Err(e) => Err(e),
    }
}
