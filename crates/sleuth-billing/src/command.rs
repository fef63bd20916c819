//! Parser for legacy filter command strings.
//!
//! Planning files written for the older command-line tool embed filters as
//! command lines:
//!
//! ```text
//! sleuth filter --instances "*oraprod*,*oracle*" --services "Bare Metal Servers" --logic or
//! ```
//!
//! Anything before the first `--` flag (the program invocation) is ignored.

use sleuth_core::{Result, SleuthError};

use crate::filter::{FilterLogic, FilterSpec};
use crate::models::Column;

/// Parse a filter command string into a [`FilterSpec`].
///
/// Recognized flags: `--instances`, `--services` (or `--service`),
/// `--regions`, `--months`, `--pattern`, `--pattern-column`, `--logic`,
/// and the switch `--exclude`. Values may be quoted and may use the
/// `--flag=value` form.
pub fn parse_filter_command(command: &str) -> Result<FilterSpec> {
    let tokens = tokenize(command)?;
    let mut args = tokens
        .into_iter()
        .skip_while(|t| !t.starts_with("--"))
        .peekable();

    let mut spec = FilterSpec::new();
    let mut pattern: Option<String> = None;
    let mut pattern_column = Column::default();

    while let Some(token) = args.next() {
        let (flag, inline) = match token.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (token, None),
        };

        if flag == "--exclude" {
            spec = spec.with_exclude(true);
            continue;
        }

        if !flag.starts_with("--") {
            return Err(SleuthError::configuration(format!(
                "unexpected argument '{flag}' in filter command: {command}"
            )));
        }

        let value = match inline {
            Some(value) => value,
            None => args
                .next_if(|next| !next.starts_with("--"))
                .ok_or_else(|| {
                    SleuthError::configuration(format!(
                        "missing value for {flag} in filter command: {command}"
                    ))
                })?,
        };

        spec = match flag.as_str() {
            "--instances" | "--instance" => spec.with_instances([value]),
            "--services" | "--service" => spec.with_services([value]),
            "--regions" | "--region" => spec.with_regions([value]),
            "--months" | "--month" => spec.with_months([value]),
            "--logic" => spec.with_logic(value.parse::<FilterLogic>()?),
            "--pattern" => {
                pattern = Some(value);
                spec
            }
            "--pattern-column" => {
                pattern_column = value.parse()?;
                spec
            }
            other => {
                return Err(SleuthError::configuration(format!(
                    "unknown flag '{other}' in filter command: {command}"
                )));
            }
        };
    }

    if let Some(pattern) = pattern {
        spec = spec.with_pattern(pattern_column, pattern);
    }

    Ok(spec)
}

/// Split on whitespace, honouring single and double quotes.
fn tokenize(command: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(SleuthError::configuration(format!(
            "unterminated quote in filter command: {command}"
        )));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
