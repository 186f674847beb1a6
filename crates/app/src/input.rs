use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use educare_core::model::{Answer, Point};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Empty,
    UnknownCommand(String),
    MissingValue { command: &'static str },
    InvalidNumber { raw: String },
    InvalidPair { raw: String },
    InvalidPoint { raw: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => write!(f, "type a command, or `help`"),
            InputError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd} (try `help`)"),
            InputError::MissingValue { command } => write!(f, "{command} requires a value"),
            InputError::InvalidNumber { raw } => write!(f, "not a question number: {raw}"),
            InputError::InvalidPair { raw } => write!(f, "expected LEFT=RIGHT, got {raw}"),
            InputError::InvalidPoint { raw } => write!(f, "expected X,Y, got {raw}"),
        }
    }
}

impl std::error::Error for InputError {}

/// One line typed during a quiz attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptInput {
    /// Patch for the current question.
    Answer(Answer),
    Flag,
    Next,
    Previous,
    /// Zero-based question index.
    Go(usize),
    Hide,
    Show,
    Save,
    Submit,
    Status,
    Help,
    Quit,
}

pub const ATTEMPT_HELP: &str = "\
  pick A [B ...]      select options
  write TEXT          short answer / essay text
  code TEXT           code answer
  order A B C         ordering answer
  match L1=R1 ...     matching answer
  point X,Y ...       hotspot coordinates
  flag                toggle review flag
  next | prev | go N  navigate
  hide | show         simulate leaving / returning to the window
  save                save now
  submit              submit the attempt
  status              timer and palette
  quit                leave (progress is kept)";

pub fn parse_attempt(line: &str) -> Result<AttemptInput, InputError> {
    let (command, rest) = split_command(line)?;
    let input = match command {
        "pick" => AttemptInput::Answer(Answer::selections(words(rest, "pick")?)),
        "write" => AttemptInput::Answer(Answer::text(value(rest, "write")?)),
        "code" => AttemptInput::Answer(Answer::code(value(rest, "code")?)),
        "order" => AttemptInput::Answer(Answer::order(words(rest, "order")?)),
        "match" => AttemptInput::Answer(Answer {
            matches: Some(pairs(rest)?),
            ..Answer::default()
        }),
        "point" => AttemptInput::Answer(Answer {
            coordinates: Some(points(rest)?),
            ..Answer::default()
        }),
        "flag" => AttemptInput::Flag,
        "next" | "n" => AttemptInput::Next,
        "prev" | "p" => AttemptInput::Previous,
        "go" => {
            let raw = value(rest, "go")?;
            match raw.parse::<usize>() {
                Ok(number) if number > 0 => AttemptInput::Go(number - 1),
                _ => {
                    return Err(InputError::InvalidNumber {
                        raw: raw.to_owned(),
                    });
                }
            }
        }
        "hide" => AttemptInput::Hide,
        "show" => AttemptInput::Show,
        "save" => AttemptInput::Save,
        "submit" => AttemptInput::Submit,
        "status" | "s" => AttemptInput::Status,
        "help" | "?" => AttemptInput::Help,
        "quit" | "q" | "exit" => AttemptInput::Quit,
        other => return Err(InputError::UnknownCommand(other.to_owned())),
    };
    Ok(input)
}

/// One line typed while working on a coding challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeInput {
    Run,
    Hint,
    Language(String),
    /// Start multi-line code entry, ended by a line containing only `.`.
    Edit,
    Load(PathBuf),
    Reset,
    Tip(Option<String>),
    Submit,
    Show,
    Help,
    Quit,
}

pub const CHALLENGE_HELP: &str = "\
  edit                enter code, finish with a line containing only `.`
  load PATH           replace the code with a file's contents
  lang NAME           switch language
  reset               restore the starter code
  run                 run the tests
  hint                unlock the next hint (costs points)
  tip [CONTEXT]       ask the code companion
  show                print code, timer and last report
  submit              submit for grading
  quit                leave without submitting";

/// Line that ends multi-line code entry.
pub const END_OF_CODE: &str = ".";

pub fn parse_challenge(line: &str) -> Result<ChallengeInput, InputError> {
    let (command, rest) = split_command(line)?;
    let input = match command {
        "run" | "r" => ChallengeInput::Run,
        "hint" => ChallengeInput::Hint,
        "lang" => ChallengeInput::Language(value(rest, "lang")?.to_ascii_lowercase()),
        "edit" => ChallengeInput::Edit,
        "load" => ChallengeInput::Load(PathBuf::from(value(rest, "load")?)),
        "reset" => ChallengeInput::Reset,
        "tip" => ChallengeInput::Tip(Some(rest.to_owned()).filter(|c| !c.is_empty())),
        "submit" => ChallengeInput::Submit,
        "show" | "s" => ChallengeInput::Show,
        "help" | "?" => ChallengeInput::Help,
        "quit" | "q" | "exit" => ChallengeInput::Quit,
        other => return Err(InputError::UnknownCommand(other.to_owned())),
    };
    Ok(input)
}

fn split_command(line: &str) -> Result<(&str, &str), InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    })
}

fn value<'a>(rest: &'a str, command: &'static str) -> Result<&'a str, InputError> {
    if rest.is_empty() {
        return Err(InputError::MissingValue { command });
    }
    Ok(rest)
}

fn words<'a>(rest: &'a str, command: &'static str) -> Result<Vec<&'a str>, InputError> {
    let words: Vec<&str> = rest
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Err(InputError::MissingValue { command });
    }
    Ok(words)
}

fn pairs(rest: &str) -> Result<BTreeMap<String, String>, InputError> {
    if rest.is_empty() {
        return Err(InputError::MissingValue { command: "match" });
    }
    rest.split_whitespace()
        .map(|raw| match raw.split_once('=') {
            Some((left, right)) if !left.is_empty() && !right.is_empty() => {
                Ok((left.to_owned(), right.to_owned()))
            }
            _ => Err(InputError::InvalidPair {
                raw: raw.to_owned(),
            }),
        })
        .collect()
}

fn points(rest: &str) -> Result<Vec<Point>, InputError> {
    if rest.is_empty() {
        return Err(InputError::MissingValue { command: "point" });
    }
    rest.split_whitespace()
        .map(|raw| {
            let invalid = || InputError::InvalidPoint {
                raw: raw.to_owned(),
            };
            let (x, y) = raw.split_once(',').ok_or_else(invalid)?;
            let x = x.parse::<f64>().map_err(|_| invalid())?;
            let y = y.parse::<f64>().map_err(|_| invalid())?;
            Ok(Point { x, y })
        })
        .collect()
}
