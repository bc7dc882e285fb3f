//! Slash-command and language-override parsing. Everything here is pure.

/// Commands the bot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Id,
    Lang,
    To,
    /// Any other `/` command; ignored by the relay.
    Other,
}

impl Command {
    /// Classify the leading token. Returns `None` when the text is not a
    /// slash command at all.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        if !first.starts_with('/') {
            return None;
        }
        // Strip @botname suffix (e.g. "/lang@relay_bot" -> "/lang").
        let cmd = first.split('@').next().unwrap_or(first).to_ascii_lowercase();
        let command = match cmd.as_str() {
            "/start" => Self::Start,
            "/id" => Self::Id,
            "/lang" => Self::Lang,
            "/to" => Self::To,
            _ => Self::Other,
        };
        Some(command)
    }
}

/// Which syntax produced an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSource {
    /// `/lang xx ...`
    Lang,
    /// `/to xx ...`
    To,
    /// `to xx: ...` at the start of the message body.
    Inline,
}

/// A language override found at the start of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override<'a> {
    pub source: OverrideSource,
    /// Lower-cased 2-3 letter language code.
    pub code: String,
    /// Text after the override, trimmed. May be empty.
    pub body: &'a str,
}

/// Extract the language code from a leading `/lang <code>` or `/to <code>`.
///
/// The code must be 2-3 ASCII letters followed by whitespace or the end of
/// the text. Matching is case-insensitive and the result is lower-cased.
pub fn parse_lang_code(text: &str) -> Option<String> {
    parse_command_override(text).map(|o| o.code)
}

/// Recognise any override form: `/lang xx`, `/to xx`, or an inline `to xx:`.
pub fn parse_override(text: &str) -> Option<Override<'_>> {
    parse_command_override(text).or_else(|| parse_inline_override(text))
}

fn parse_command_override(text: &str) -> Option<Override<'_>> {
    let source = match Command::parse(text)? {
        Command::Lang => OverrideSource::Lang,
        Command::To => OverrideSource::To,
        _ => return None,
    };

    let trimmed = text.trim_start();
    let after_cmd = trimmed
        .find(char::is_whitespace)
        .map(|pos| &trimmed[pos..])
        .unwrap_or("");
    let args = after_cmd.trim_start();

    let (code, rest) = split_code(args)?;
    Some(Override {
        source,
        code,
        body: rest.trim(),
    })
}

fn parse_inline_override(text: &str) -> Option<Override<'_>> {
    let trimmed = text.trim_start();
    let head = trimmed.get(..3)?;
    if !head.eq_ignore_ascii_case("to ") {
        return None;
    }
    let args = trimmed[3..].trim_start();
    let colon = args.find(':')?;
    let code = &args[..colon];
    if !is_lang_code(code) {
        return None;
    }
    Some(Override {
        source: OverrideSource::Inline,
        code: code.to_ascii_lowercase(),
        body: args[colon + 1..].trim(),
    })
}

/// Split a leading language code off `args`; the code must end at
/// whitespace or end of string.
fn split_code(args: &str) -> Option<(String, &str)> {
    let end = args.find(char::is_whitespace).unwrap_or(args.len());
    let code = &args[..end];
    if !is_lang_code(code) {
        return None;
    }
    Some((code.to_ascii_lowercase(), &args[end..]))
}

fn is_lang_code(s: &str) -> bool {
    (2..=3).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic())
}
