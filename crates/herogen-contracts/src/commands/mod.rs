mod parser;
mod registry;

pub use parser::{parse_command, WizardCommand};
pub use registry::WIZARD_HELP_COMMANDS;
