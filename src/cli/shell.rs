use std::{
    borrow::Cow,
    io::{self, BufRead},
    path::PathBuf,
};

use rustyline::{
    completion::{Completer, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::{ValidationContext, ValidationResult, Validator},
    Cmd, Context as ReadlineContext, Editor, Helper, KeyEvent,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cli::context::{CliMode, CommandError, LoopControl, ShellContext, SCRIPT_ENV};
use crate::cli::output;
use crate::errors::CliError;
use crate::utils::paths;

const HISTORY_FILE: &str = "history.txt";

pub fn run_cli() -> Result<(), CliError> {
    let mode = match std::env::var_os(SCRIPT_ENV) {
        Some(_) => CliMode::Script,
        None => CliMode::Interactive,
    };
    let mut context = ShellContext::new(mode)?;
    debug!(?mode, "shell started");

    match mode {
        CliMode::Interactive => run_interactive(&mut context),
        CliMode::Script => run_script(&mut context, io::stdin().lock()),
    }
}

fn history_path() -> PathBuf {
    paths::app_home().join(HISTORY_FILE)
}

fn run_interactive(context: &mut ShellContext) -> Result<(), CliError> {
    let mut editor = Editor::<EstateHelper, DefaultHistory>::new()?;
    editor.set_helper(Some(EstateHelper::new(context.completion_table())));
    editor.bind_sequence(KeyEvent::from('?'), Cmd::Complete);

    let history = history_path();
    if editor.load_history(&history).is_err() {
        debug!(path = %history.display(), "no shell history yet");
    }
    output::info("Type `help` for commands, `exit` to leave. Tab completes commands and subcommands.");

    while context.running {
        let line = match editor.readline(&context.prompt()) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                if context.confirm("Leave Estate ERP?").unwrap_or(true) {
                    break;
                }
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line).ok();
        match handle_line(context, line) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => break,
            Err(err) => context.report_error(err),
        }
    }

    if let Err(err) = editor.save_history(&history) {
        warn!(path = %history.display(), %err, "could not save shell history");
    }
    output::info("Goodbye.");
    Ok(())
}

/// One command per line; blank lines and lines starting with `#` are skipped.
fn run_script(context: &mut ShellContext, input: impl BufRead) -> Result<(), CliError> {
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match handle_line(context, trimmed) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => break,
            Err(err) => {
                debug!(line = index + 1, command = trimmed, "script command failed");
                context.report_error(err);
            }
        }
        if !context.running {
            break;
        }
    }
    Ok(())
}

fn handle_line(context: &mut ShellContext, line: &str) -> Result<LoopControl, CommandError> {
    let tokens = match parse_command_line(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            output::warning(err);
            return Ok(LoopControl::Continue);
        }
    };
    let Some((raw, rest)) = tokens.split_first() else {
        return Ok(LoopControl::Continue);
    };
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();
    context.last_command = Some(line.to_string());

    let control = context.dispatch(&raw.to_lowercase(), raw, &args)?;
    if control == LoopControl::Exit {
        context.running = false;
    }
    Ok(control)
}

/// Completes the command word, then the subcommand word listed in its usage.
struct EstateHelper {
    commands: Vec<(String, Vec<String>)>,
}

impl EstateHelper {
    fn new(table: Vec<(&'static str, Vec<&'static str>)>) -> Self {
        let mut commands: Vec<(String, Vec<String>)> = table
            .into_iter()
            .map(|(name, subs)| (name.to_string(), subs.into_iter().map(str::to_string).collect()))
            .collect();
        commands.sort_by(|a, b| a.0.cmp(&b.0));
        Self { commands }
    }

    fn candidates(&self, words: &[&str], partial: &str) -> Vec<String> {
        let partial = partial.to_ascii_lowercase();
        let pool: Vec<&String> = match words {
            [] => self.commands.iter().map(|(name, _)| name).collect(),
            [command] => self
                .commands
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(command))
                .map(|(_, subs)| subs.iter().collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        pool.into_iter()
            .filter(|word| word.starts_with(&partial))
            .cloned()
            .collect()
    }
}

impl Helper for EstateHelper {}

impl Completer for EstateHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &ReadlineContext<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        let start = before.rfind(char::is_whitespace).map_or(0, |idx| idx + 1);
        let words: Vec<&str> = before[..start].split_whitespace().collect();
        let pairs = self
            .candidates(&words, &before[start..])
            .into_iter()
            .map(|word| Pair {
                display: word.clone(),
                replacement: word,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for EstateHelper {
    type Hint = String;
}

impl Highlighter for EstateHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for EstateHelper {
    fn validate(&self, _ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

#[derive(Debug, Error)]
#[error("could not parse line: {0}")]
pub(crate) struct ParseError(#[from] shell_words::ParseError);

pub(crate) fn parse_command_line(input: &str) -> Result<Vec<String>, ParseError> {
    Ok(shell_words::split(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper() -> EstateHelper {
        EstateHelper::new(vec![
            ("voucher", vec!["create", "draft", "post", "reverse"]),
            ("version", vec![]),
            ("lease", vec!["bill", "create"]),
        ])
    }

    #[test]
    fn quoted_arguments_stay_together() {
        let tokens = parse_command_line(r#"voucher create JV dr:5000:10 cr:3000:10 --desc "Opening balance""#)
            .unwrap();
        assert_eq!(tokens.last().map(String::as_str), Some("Opening balance"));
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let err = parse_command_line("tenant add \"Jane").unwrap_err();
        assert!(err.to_string().starts_with("could not parse line"));
    }

    #[test]
    fn first_word_completes_commands() {
        assert_eq!(helper().candidates(&[], "ve"), ["version"]);
        assert_eq!(helper().candidates(&[], "").len(), 3);
    }

    #[test]
    fn second_word_completes_subcommands() {
        assert_eq!(helper().candidates(&["Voucher"], "d"), ["draft"]);
        assert!(helper().candidates(&["voucher", "post"], "").is_empty());
        assert!(helper().candidates(&["unknown"], "").is_empty());
    }
}
