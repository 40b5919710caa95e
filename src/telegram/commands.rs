use std::fmt::Formatter;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, PartialEq, Eq, Debug)]
#[command(rename_rule = "snake_case")]
pub enum UserCommand {
    #[command(description = "register or show your profile")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "account settings")]
    Settings,
    #[command(description = "cancel current action")]
    Cancel,
    #[command(description = "get a website login code")]
    Web,
}

pub enum UserCommandDisplay {
    Start,
    Help,
    Settings,
    Cancel,
    Web,
}

impl std::fmt::Display for UserCommandDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let string = match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Settings => "settings",
            Self::Cancel => "cancel",
            Self::Web => "web",
        };

        f.write_str(string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_user_commands() {
        let user_command = UserCommand::Start;

        match user_command {
            UserCommand::Start => UserCommandDisplay::Start,
            UserCommand::Help => UserCommandDisplay::Help,
            UserCommand::Settings => UserCommandDisplay::Settings,
            UserCommand::Cancel => UserCommandDisplay::Cancel,
            UserCommand::Web => UserCommandDisplay::Web,
        };
    }

    #[test]
    fn display_matches_parsing() {
        for (display, command) in [
            (UserCommandDisplay::Start, UserCommand::Start),
            (UserCommandDisplay::Help, UserCommand::Help),
            (UserCommandDisplay::Settings, UserCommand::Settings),
            (UserCommandDisplay::Cancel, UserCommand::Cancel),
            (UserCommandDisplay::Web, UserCommand::Web),
        ] {
            assert_eq!(
                UserCommand::parse(&format!("/{display}"), "WiralisBot").ok(),
                Some(command)
            );
        }
    }

    #[test]
    fn addressed_commands_parse() {
        assert_eq!(
            UserCommand::parse("/settings@WiralisBot", "WiralisBot").ok(),
            Some(UserCommand::Settings)
        );
        assert!(UserCommand::parse("/settings@OtherBot", "WiralisBot").is_err());
    }
}
