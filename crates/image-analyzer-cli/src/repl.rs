//! Interactive REPL for Image Analyzer.
//!
//! Launch with `image-analyzer repl` (or no subcommand) to enter interactive
//! mode. Type `/help` for available commands, Tab for completion.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};
use tokio::runtime::Handle;

use image_analyzer::is_supported_format;

use crate::check::{render_check, run_check};
use crate::config::{parse_backend, Settings};
use crate::output::{render_candidates, render_json, render_text};
use crate::pipeline::analyze_file;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/analyze", "Caption an image file and list detected objects"),
    ("/backend", "Show or switch backend (hosted | local)"),
    ("/models", "List candidate models for the active backend"),
    ("/check", "Check token and local model server"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
struct AnalyzerHelper;

impl Completer for AnalyzerHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let cmd = parts[0];
        let args = if parts.len() > 1 { parts[1] } else { "" };
        let prefix_start = input.len() - args.len();

        match cmd {
            "/analyze" => {
                let mut files = Vec::new();
                if let Ok(entries) = std::fs::read_dir(".") {
                    for entry in entries.flatten() {
                        if let Some(name) = entry.file_name().to_str() {
                            if is_supported_format(name) {
                                files.push(name.to_string());
                            }
                        }
                    }
                }
                files.sort();
                let matches = files
                    .iter()
                    .filter(|f| f.starts_with(args.trim()))
                    .map(|f| Pair {
                        display: f.clone(),
                        replacement: format!("{f} "),
                    })
                    .collect();
                Ok((prefix_start, matches))
            }
            "/backend" => {
                let matches = ["hosted", "local"]
                    .iter()
                    .filter(|b| b.starts_with(args.trim()))
                    .map(|b| Pair {
                        display: b.to_string(),
                        replacement: format!("{b} "),
                    })
                    .collect();
                Ok((prefix_start, matches))
            }
            _ => Ok((pos, Vec::new())),
        }
    }
}

impl Hinter for AnalyzerHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for AnalyzerHelper {}
impl Validator for AnalyzerHelper {}
impl Helper for AnalyzerHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Session state.
struct ReplState {
    settings: Settings,
    json: bool,
    runtime: Handle,
}

/// Run the interactive REPL.
///
/// Blocks on async work through `runtime`, so call it from
/// `tokio::task::block_in_place` when already inside a runtime.
pub fn run(settings: Settings, json: bool, runtime: Handle) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mimage-analyzer v{}\x1b[0m \x1b[90m\u{2014} Image captions and objects\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!("    Backend: {}", settings.backend);
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<AnalyzerHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(AnalyzerHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".image_analyzer_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut state = ReplState {
        settings,
        json,
        runtime,
    };
    let prompt = " \x1b[36manalyze>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let mut parts = input.splitn(2, ' ');
                let cmd = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "analyze" | "a" => cmd_analyze(args, &state),
                    "backend" => cmd_backend(args, &mut state),
                    "models" => cmd_models(&state),
                    "check" => cmd_check(&state),
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or(std::path::Path::new(".")));
    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completion works for commands and image files.");
    eprintln!();
}

/// The path argument of `/analyze`: the whole remainder of the line, which
/// may contain spaces, with one pair of surrounding quotes removed.
fn path_argument(args: &str) -> &str {
    let args = args.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = args
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    args
}

fn cmd_analyze(args: &str, state: &ReplState) {
    let path = path_argument(args);
    let outcome = state.runtime.block_on(analyze_file(&state.settings, path));

    println!();
    if state.json {
        match render_json(&outcome, state.settings.backend) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("  Failed to render JSON: {e}"),
        }
    } else {
        for line in render_text(&outcome).lines() {
            println!("  {line}");
        }
    }
    println!();
}

fn cmd_backend(args: &str, state: &mut ReplState) {
    if args.is_empty() {
        eprintln!("  Backend: {}", state.settings.backend);
        return;
    }
    match parse_backend(args) {
        Ok(kind) => {
            state.settings = state.settings.with_backend(kind);
            eprintln!("  Backend switched to {kind}");
        }
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_models(state: &ReplState) {
    eprintln!();
    for line in render_candidates(state.settings.backend, &state.settings.candidates()).lines() {
        eprintln!("  {line}");
    }
    eprintln!();
}

fn cmd_check(state: &ReplState) {
    let report = state.runtime.block_on(run_check(&state.settings));
    eprintln!();
    for line in render_check(&report).lines() {
        eprintln!("  {line}");
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_argument_keeps_spaces() {
        assert_eq!(path_argument("my photo.jpg"), "my photo.jpg");
        assert_eq!(path_argument("  my photo.jpg  "), "my photo.jpg");
        assert_eq!(path_argument("pets.png"), "pets.png");
        assert_eq!(path_argument(""), "");
    }

    #[test]
    fn test_path_argument_strips_quotes() {
        assert_eq!(path_argument("\"my photo.jpg\""), "my photo.jpg");
        assert_eq!(path_argument("'my photo.jpg'"), "my photo.jpg");
        assert_eq!(path_argument("\"unbalanced.jpg"), "\"unbalanced.jpg");
    }
}
