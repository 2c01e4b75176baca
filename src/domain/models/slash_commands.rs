#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let mut args = text
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if args.is_empty() {
            return None;
        }
        let prefix = args.remove(0);

        let cmd = SlashCommand {
            command: prefix,
            args,
        };
        if cmd.is_quit() || cmd.is_model_list() || cmd.is_export() || cmd.is_help() {
            return Some(cmd);
        }

        return None;
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_model_list(&self) -> bool {
        return ["/ml", "/models"].contains(&self.command.as_str());
    }

    pub fn is_export(&self) -> bool {
        return ["/x", "/export"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }
}

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /models (/ml) - Lists all models installed on the server.
- /export (/x) [PATH] - Saves the current session as JSON. Prints to the terminal when PATH is omitted.
- /quit /exit (/q) - Exit the chat. The session stays saved.
- /help (/h) - Provides this help menu.
        "#;

    return text.trim().to_string();
}
