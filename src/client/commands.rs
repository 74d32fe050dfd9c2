pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub example: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "image",
        description: "Generate an image from text description",
        usage: "/image [prompt]",
        example: "/image a beautiful sunset over mountains",
    },
    CommandSpec {
        name: "help",
        description: "Show available commands",
        usage: "/help",
        example: "/help",
    },
    CommandSpec {
        name: "clear",
        description: "Clear current chat session",
        usage: "/clear",
        example: "/clear",
    },
    CommandSpec {
        name: "new",
        description: "Start a new chat session",
        usage: "/new",
        example: "/new",
    },
    CommandSpec {
        name: "retry",
        description: "Regenerate the last answer",
        usage: "/retry",
        example: "/retry",
    },
    CommandSpec {
        name: "sessions",
        description: "List chat sessions",
        usage: "/sessions",
        example: "/sessions",
    },
    CommandSpec {
        name: "switch",
        description: "Switch to another chat session",
        usage: "/switch [id prefix]",
        example: "/switch 3f2a",
    },
    CommandSpec {
        name: "delete",
        description: "Delete a chat session",
        usage: "/delete [id prefix]",
        example: "/delete 3f2a",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Message(String),
    Image(String),
    /// A command that needs an argument was given none.
    MissingArgument(&'static str),
    Help,
    Clear,
    New,
    Retry,
    Sessions,
    Switch(String),
    Delete(String),
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, args) = match command.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (command, ""),
    };

    match name {
        "image" if args.is_empty() => Input::MissingArgument("/image [prompt]"),
        "image" => Input::Image(args.to_string()),
        "help" => Input::Help,
        "clear" => Input::Clear,
        "new" => Input::New,
        "retry" => Input::Retry,
        "sessions" => Input::Sessions,
        "switch" if args.is_empty() => Input::MissingArgument("/switch [id prefix]"),
        "switch" => Input::Switch(args.to_string()),
        "delete" if args.is_empty() => Input::MissingArgument("/delete [id prefix]"),
        "delete" => Input::Delete(args.to_string()),
        other => Input::Unknown(other.to_string()),
    }
}

/// Commands whose name or description contains what follows the `/`.
pub fn suggest(partial: &str) -> Vec<&'static CommandSpec> {
    let Some(query) = partial.strip_prefix('/') else {
        return Vec::new();
    };
    let query = query.to_lowercase();
    COMMANDS.iter()
        .filter(|c| c.name.contains(&query) || c.description.to_lowercase().contains(&query))
        .collect()
}

pub fn help_text() -> String {
    let body = COMMANDS.iter()
        .map(|c| format!("**{}** - {}\nExample: `{}`", c.usage, c.description, c.example))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("**Available Commands**\n\n{}", body)
}

pub fn unknown_command_text(name: &str) -> String {
    format!("Unknown command: {}. Type /help to see available commands.", name)
}
