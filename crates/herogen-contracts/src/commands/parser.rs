use std::path::PathBuf;

use super::registry::{find_spec, ArgKind};
use crate::session::{resolve_theme, Gender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardCommand {
    Noop,
    Upload(PathBuf),
    Camera(Option<String>),
    Gender(Gender),
    Name(String),
    Theme(String),
    Generate,
    Back,
    Regenerate,
    Reset,
    Save(Option<PathBuf>),
    Dismiss,
    Status,
    Help,
    Quit,
    /// Non-command input; the caller decides whether it is a path or an alias.
    Text(String),
    Invalid { command: String, reason: String },
    Unknown { command: String, arg: String },
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> Option<String> {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(parts.join(" ")),
    }
}

fn invalid(command: &str, reason: impl Into<String>) -> WizardCommand {
    WizardCommand::Invalid {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn text_command(command: &str, arg: &str) -> WizardCommand {
    match command {
        "gender" => match arg.parse::<Gender>() {
            Ok(gender) => WizardCommand::Gender(gender),
            Err(reason) => invalid(command, reason),
        },
        "name" => {
            if arg.trim().is_empty() {
                invalid(command, "/name requires an alias")
            } else {
                WizardCommand::Name(arg.to_string())
            }
        }
        "theme" => match resolve_theme(arg) {
            Some(theme) => WizardCommand::Theme(theme),
            None => invalid(command, "/theme requires a preset number or text"),
        },
        _ => WizardCommand::Unknown {
            command: command.to_string(),
            arg: arg.to_string(),
        },
    }
}

fn bare_command(command: &str) -> WizardCommand {
    match command {
        "generate" => WizardCommand::Generate,
        "back" => WizardCommand::Back,
        "regenerate" => WizardCommand::Regenerate,
        "reset" => WizardCommand::Reset,
        "dismiss" => WizardCommand::Dismiss,
        "status" => WizardCommand::Status,
        "help" => WizardCommand::Help,
        "quit" => WizardCommand::Quit,
        other => WizardCommand::Unknown {
            command: other.to_string(),
            arg: String::new(),
        },
    }
}

pub fn parse_command(text: &str) -> WizardCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return WizardCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return WizardCommand::Text(raw_trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        // Absolute paths start with '/' too.
        return WizardCommand::Text(raw_trimmed.to_string());
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let remainder = &slash_tail[command_len..];
    if !remainder.is_empty() && !remainder.starts_with(char::is_whitespace) {
        return WizardCommand::Text(raw_trimmed.to_string());
    }
    let arg = remainder.trim();

    let Some(spec) = find_spec(&command) else {
        return WizardCommand::Unknown {
            command,
            arg: arg.to_string(),
        };
    };

    match spec.arg {
        ArgKind::None => bare_command(&command),
        ArgKind::Text => text_command(&command, arg),
        ArgKind::RequiredPath => match parse_single_path_arg(arg) {
            Some(path) => WizardCommand::Upload(PathBuf::from(path)),
            None => invalid(&command, format!("/{command} requires a path")),
        },
        ArgKind::OptionalPath => {
            let value = parse_single_path_arg(arg);
            if command == "camera" {
                WizardCommand::Camera(value)
            } else {
                WizardCommand::Save(value.map(PathBuf::from))
            }
        }
    }
}
