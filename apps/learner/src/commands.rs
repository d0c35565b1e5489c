use anyhow::bail;
use shared::domain::AssignmentId;

pub const HELP: &str = "\
commands:
  list                          show the track's assignments
  select <assignment_id|none>   change the selected assignment
  comments                      reload the selected assignment's comments
  comment <text>                post a comment
  submit <repository_url>       submit a solution
  review                        fetch a peer submission to review
  send-review <score> <comment> submit the loaded review
  notifications                 show the latest notifications
  reload                        reload assignments and comments
  help                          show this help
  quit                          leave the workspace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List,
    Select(Option<AssignmentId>),
    Comments,
    Comment(String),
    Submit(String),
    Review,
    SendReview { score: String, comment: String },
    Notifications,
    Reload,
    Help,
    Quit,
}

/// Parses one workspace line. Blank lines yield `None`. Free-text arguments
/// are passed through as typed so the workspace does the validation.
pub fn parse(line: &str) -> anyhow::Result<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb {
        "list" | "ls" => ShellCommand::List,
        "select" => match rest {
            "" => bail!("usage: select <assignment_id|none>"),
            "none" => ShellCommand::Select(None),
            raw => ShellCommand::Select(Some(raw.parse::<AssignmentId>()?)),
        },
        "comments" => ShellCommand::Comments,
        "comment" => ShellCommand::Comment(rest.to_string()),
        "submit" => ShellCommand::Submit(rest.to_string()),
        "review" => ShellCommand::Review,
        "send-review" => {
            let (score, comment) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            ShellCommand::SendReview {
                score: score.to_string(),
                comment: comment.trim().to_string(),
            }
        }
        "notifications" | "notes" => ShellCommand::Notifications,
        "reload" => ShellCommand::Reload,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => bail!("unknown command '{other}', type 'help' for a list"),
    };
    Ok(Some(command))
}
