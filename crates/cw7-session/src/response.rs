//! Extraction of CLI text from `<CLI>` reply envelopes.

use once_cell::sync::Lazy;
use regex::Regex;

use cw7_common::Element;

/// Carriage returns before a newline, however many.
static CR_BEFORE_LF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r+\n").expect("Invalid regex pattern"));

/// Runs of newlines left behind by the device pager.
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("Invalid regex pattern"));

/// Collapses platform line-ending artifacts.
///
/// `\r\r\n`, `\r\n` and stray `\r` become `\n`; doubled newlines collapse
/// to one.
pub fn normalize(text: &str) -> String {
    let text = CR_BEFORE_LF.replace_all(text, "\n");
    let text = text.replace('\r', "\n");
    BLANK_RUNS.replace_all(&text, "\n").into_owned()
}

/// Pulls the command output out of a CLI reply.
///
/// The device wraps system-view output in `<Configuration>` and user-view
/// output in `<Execution>`; either is accepted for both RPCs.
pub fn cli_text(reply: &Element) -> String {
    let payload = ["Configuration", "Execution"].iter().find_map(|name| {
        if reply.local_name() == *name {
            Some(reply)
        } else {
            reply.descendant(name)
        }
    });
    payload
        .and_then(Element::text)
        .map(normalize)
        .unwrap_or_default()
}
