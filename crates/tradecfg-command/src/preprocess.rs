//! Input preprocessing
//!
//! Strips chat noise (greetings, politeness, trailing slang, command
//! prefixes) so the grammars only see the command itself.

use once_cell::sync::Lazy;
use regex::Regex;

static NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // trailing punctuation
        r"[?!.]+$",
        // greetings
        r"^(?:hey|hi|hello|yo|what's up|wassup|bro|bruh|mate|man|pal)\b\s*,?\s*",
        // politeness
        r"^(?:please|can you|could you|would you|i want to|i need to|i need)\b\s*,?\s*",
        // chat wrappers
        r"^(?:so|okay|ok|alright|right)\s+,?\s*",
        // politeness after a wrapper ("ok please ...")
        r"^(?:please|can you|could you|would you)\b\s*,?\s*",
        // trailing greetings and slang
        r"\s*,?\s*\b(?:hey|hi|hello|bro|man|boss|my g|fam|please)\s*$",
    ]
    .iter()
    .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("noise pattern is valid"))
    .collect()
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace pattern is valid"));

/// Words that open a command
const COMMAND_STARTERS: &[&str] = &[
    "set", "change", "update", "modify", "adjust", "make", "enable", "disable",
    "show", "display", "list", "get", "find", "what", "compare", "copy", "clone",
    "reset", "restore", "revert", "increase", "decrease", "multiply", "add",
    "subtract", "double", "half", "halve", "tighten", "loosen", "widen", "setup",
    "set up", "linear", "fibonacci", "exponential", "progression", "apply", "go",
];

/// Strip chat noise from raw input
///
/// Falls back to the trimmed input when stripping would leave almost
/// nothing.
#[must_use]
pub fn preprocess(input: &str) -> String {
    let trimmed = input.trim();
    let mut result = trimmed
        .trim_start_matches(['/', '#'])
        .trim()
        .to_string();

    for pattern in NOISE.iter() {
        result = pattern.replace(&result, "").into_owned();
    }
    result = WHITESPACE.replace_all(result.trim(), " ").into_owned();

    if result.len() < 3 {
        return trimmed.to_string();
    }
    result
}

/// Check whether input is only a greeting, with no command in it
#[must_use]
pub fn is_greeting_only(input: &str) -> bool {
    let processed = preprocess(input).to_lowercase();
    !COMMAND_STARTERS.iter().any(|starter| processed.contains(starter))
        && !processed.chars().any(|c| c.is_ascii_digit())
}
