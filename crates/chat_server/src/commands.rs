//! IRC-style command grammar.
//!
//! A line starting with `/` is a command; anything else is chat text relayed
//! to the sender's channels. Verbs are case-insensitive and take at most one
//! argument; extra arguments are ignored.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, satisfy, space1},
    combinator::{not, opt},
    sequence::preceded,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// /nick <nickname> - set the sender's nickname.
    Nick(Option<String>),
    /// /list - list all channels with their member counts.
    List,
    /// /join [<channel>] - join a channel (default channel when omitted).
    Join(Option<String>),
    /// /leave [<channel>] - leave one channel, or every joined channel.
    Leave(Option<String>),
    /// /quit - disconnect from the server.
    Quit,
    /// /help - static help text.
    Help,
    /// A bare line: chat text for every channel the sender belongs to.
    Say(String),
    /// A slash command with an unrecognized verb.
    Unknown(String),
}

impl Command {
    /// Parses one trimmed frame into a command. Returns `None` for a lone
    /// `/` with nothing behind it, which is silently ignored.
    pub fn parse(line: &str) -> Option<Command> {
        if line.starts_with('/') {
            match command_parser(line) {
                Ok((_, command)) => Some(command),
                Err(_) => None,
            }
        } else {
            Some(Command::Say(line.to_owned()))
        }
    }
}

pub fn command_parser(input: &str) -> IResult<&str, Command> {
    let mut parser = alt((
        valid_nick_command_parser,
        valid_list_command_parser,
        valid_join_command_parser,
        valid_leave_command_parser,
        valid_quit_command_parser,
        valid_help_command_parser,
        unknown_command_parser,
    ));
    parser.parse(input)
}

/// Succeeds only at a whitespace boundary or end of input, consuming nothing.
/// Keeps `/nickname` from matching the `/nick` verb.
fn word_boundary(input: &str) -> IResult<&str, ()> {
    let (rem, _) = not(satisfy(|c: char| !c.is_whitespace())).parse(input)?;
    Ok((rem, ()))
}

/// One optional whitespace-separated argument after the verb.
fn argument_parser(input: &str) -> IResult<&str, Option<&str>> {
    opt(preceded(
        space1,
        take_while1(|c: char| !c.is_whitespace()),
    ))
    .parse(input)
}

fn verb_parser<'a>(name: &'static str, input: &'a str) -> IResult<&'a str, ()> {
    let (rem, _) = preceded(char('/'), tag_no_case(name)).parse(input)?;
    word_boundary(rem)
}

//    Command: /nick
// Parameters: <nickname>
// Missing or over-length arguments are rejected by the processor, not here,
// so the usage error can name the command.
fn valid_nick_command_parser(input: &str) -> IResult<&str, Command> {
    let (rem, ()) = verb_parser("nick", input)?;
    let (rem, arg) = argument_parser(rem)?;
    Ok((rem, Command::Nick(arg.map(str::to_owned))))
}

//    Command: /list
// Parameters: none
fn valid_list_command_parser(input: &str) -> IResult<&str, Command> {
    let (rem, ()) = verb_parser("list", input)?;
    Ok((rem, Command::List))
}

//    Command: /join
// Parameters: [<channel>]
// The channel name is normalized later by prefixing '#' when absent; a
// missing argument means the default channel.
fn valid_join_command_parser(input: &str) -> IResult<&str, Command> {
    let (rem, ()) = verb_parser("join", input)?;
    let (rem, arg) = argument_parser(rem)?;
    Ok((rem, Command::Join(arg.map(str::to_owned))))
}

//    Command: /leave
// Parameters: [<channel>]
// A missing argument leaves every channel the sender currently belongs to.
fn valid_leave_command_parser(input: &str) -> IResult<&str, Command> {
    let (rem, ()) = verb_parser("leave", input)?;
    let (rem, arg) = argument_parser(rem)?;
    Ok((rem, Command::Leave(arg.map(str::to_owned))))
}

//    Command: /quit
// Parameters: none
fn valid_quit_command_parser(input: &str) -> IResult<&str, Command> {
    let (rem, ()) = verb_parser("quit", input)?;
    Ok((rem, Command::Quit))
}

//    Command: /help
// Parameters: none
fn valid_help_command_parser(input: &str) -> IResult<&str, Command> {
    let (rem, ()) = verb_parser("help", input)?;
    Ok((rem, Command::Help))
}

// Fallback: any other slash verb is reported back as unknown.
fn unknown_command_parser(input: &str) -> IResult<&str, Command> {
    let (rem, verb) =
        preceded(char('/'), take_while1(|c: char| !c.is_whitespace())).parse(input)?;
    Ok((rem, Command::Unknown(verb.to_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nick_command_parser() {
        let (rem, command) = valid_nick_command_parser("/nick alice").unwrap();
        assert_eq!(rem, "");
        assert_eq!(command, Command::Nick(Some("alice".to_owned())));

        let (_, command) = valid_nick_command_parser("/nick").unwrap();
        assert_eq!(command, Command::Nick(None), "missing argument still parses");

        let (_, command) = valid_nick_command_parser("/NICK Alice").unwrap();
        assert_eq!(command, Command::Nick(Some("Alice".to_owned())));

        assert!(
            valid_nick_command_parser("/nickname").is_err(),
            "verb must end at a word boundary"
        );
    }

    #[test]
    fn test_valid_join_command_parser() {
        let (_, command) = valid_join_command_parser("/join #general").unwrap();
        assert_eq!(command, Command::Join(Some("#general".to_owned())));

        let (_, command) = valid_join_command_parser("/join programming").unwrap();
        assert_eq!(command, Command::Join(Some("programming".to_owned())));

        let (_, command) = valid_join_command_parser("/join").unwrap();
        assert_eq!(command, Command::Join(None));
    }

    #[test]
    fn test_valid_leave_command_parser() {
        let (_, command) = valid_leave_command_parser("/leave #x").unwrap();
        assert_eq!(command, Command::Leave(Some("#x".to_owned())));

        let (_, command) = valid_leave_command_parser("/leave").unwrap();
        assert_eq!(command, Command::Leave(None));
    }

    #[test]
    fn test_bare_commands() {
        let (_, command) = command_parser("/list").unwrap();
        assert_eq!(command, Command::List);
        let (_, command) = command_parser("/quit").unwrap();
        assert_eq!(command, Command::Quit);
        let (_, command) = command_parser("/help").unwrap();
        assert_eq!(command, Command::Help);
        // Extra arguments are ignored, matching the verb is enough.
        let (_, command) = command_parser("/list everything").unwrap();
        assert_eq!(command, Command::List);
    }

    #[test]
    fn test_unknown_and_plain_lines() {
        assert_eq!(
            Command::parse("/frobnicate now"),
            Some(Command::Unknown("frobnicate".to_owned()))
        );
        assert_eq!(
            Command::parse("hello everyone"),
            Some(Command::Say("hello everyone".to_owned()))
        );
        assert_eq!(Command::parse("/"), None, "a lone slash is ignored");
    }
}
