#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArgKind {
    None,
    OptionalPath,
    RequiredPath,
    Text,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub arg: ArgKind,
}

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        arg: ArgKind::RequiredPath,
    },
    CommandSpec {
        command: "camera",
        arg: ArgKind::OptionalPath,
    },
    CommandSpec {
        command: "gender",
        arg: ArgKind::Text,
    },
    CommandSpec {
        command: "name",
        arg: ArgKind::Text,
    },
    CommandSpec {
        command: "theme",
        arg: ArgKind::Text,
    },
    CommandSpec {
        command: "generate",
        arg: ArgKind::None,
    },
    CommandSpec {
        command: "back",
        arg: ArgKind::None,
    },
    CommandSpec {
        command: "regenerate",
        arg: ArgKind::None,
    },
    CommandSpec {
        command: "reset",
        arg: ArgKind::None,
    },
    CommandSpec {
        command: "save",
        arg: ArgKind::OptionalPath,
    },
    CommandSpec {
        command: "dismiss",
        arg: ArgKind::None,
    },
    CommandSpec {
        command: "status",
        arg: ArgKind::None,
    },
    CommandSpec {
        command: "help",
        arg: ArgKind::None,
    },
    CommandSpec {
        command: "quit",
        arg: ArgKind::None,
    },
];

pub const WIZARD_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/camera [device]",
    "/gender <male|female|non-binary>",
    "/name <alias>",
    "/theme <number|text>",
    "/generate",
    "/back",
    "/regenerate",
    "/reset",
    "/save [dir]",
    "/dismiss",
    "/status",
    "/help",
    "/quit",
];

pub(crate) fn find_spec(command: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.command == command)
}
