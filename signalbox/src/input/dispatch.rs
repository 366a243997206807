use crate::railway::infrastructure::ElementId;
use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select { signal: ElementId, persistent: bool, force: bool },
    Deactivate(ElementId),
    Tick(usize),
    Advance(f64),
    Pause,
    Resume,
    TimeFactor(u32),
}

#[derive(Debug, Fail)]
pub enum ParseError {
    #[fail(display = "error in regular expression: {}", _0)]
    RegexError(String),
    #[fail(display = "error converting number on line {}", _0)]
    NumberError(usize),
    #[fail(display = "unrecognized command on line {}: {}", _0, _1)]
    Unrecognized(usize, String),
}

/// Parses a signalman's command script, one command per line
///
/// * select 12
/// * select 12 persistent force
/// * deactivate 12
/// * tick 4
/// * advance 1500
/// * pause / resume
/// * factor 5
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_commands(input: &str) -> Result<Vec<Command>, ParseError> {
    let mut commands = Vec::new();
    let select_re = Regex::new(r"^\s*select\s+(\d+)((?:\s+(?:persistent|force))*)\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;
    let deactivate_re = Regex::new(r"^\s*deactivate\s+(\d+)\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;
    let tick_re = Regex::new(r"^\s*tick(?:\s+(\d+))?\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;
    let advance_re = Regex::new(r"^\s*advance\s+([\d\.]+)\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;
    let factor_re = Regex::new(r"^\s*factor\s+(\d+)\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;
    let word_re = Regex::new(r"^\s*(pause|resume)\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;

    for (n, line) in input.lines().enumerate() {
        let n = n + 1;
        let number = |_| ParseError::NumberError(n);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(groups) = select_re.captures(line) {
            let modifiers = groups[2].split_whitespace().collect::<Vec<_>>();
            commands.push(Command::Select {
                signal: groups[1].parse().map_err(number)?,
                persistent: modifiers.contains(&"persistent"),
                force: modifiers.contains(&"force"),
            });
            continue;
        }
        if let Some(groups) = deactivate_re.captures(line) {
            commands.push(Command::Deactivate(groups[1].parse().map_err(number)?));
            continue;
        }
        if let Some(groups) = tick_re.captures(line) {
            let count = match groups.get(1) {
                Some(m) => m.as_str().parse().map_err(number)?,
                None => 1,
            };
            commands.push(Command::Tick(count));
            continue;
        }
        if let Some(groups) = advance_re.captures(line) {
            let ms = groups[1].parse::<f64>().ok()
                .filter(|ms| ms.is_finite())
                .ok_or(ParseError::NumberError(n))?;
            commands.push(Command::Advance(ms));
            continue;
        }
        if let Some(groups) = factor_re.captures(line) {
            commands.push(Command::TimeFactor(groups[1].parse().map_err(number)?));
            continue;
        }
        if let Some(groups) = word_re.captures(line) {
            commands.push(if &groups[1] == "pause" { Command::Pause } else { Command::Resume });
            continue;
        }
        return Err(ParseError::Unrecognized(n, line.to_string()));
    }

    Ok(commands)
}
