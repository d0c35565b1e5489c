use std::sync::Arc;

use anyhow::anyhow;
use client_core::{
    ClientError, ClientResult, ReviewState, WorkspaceController, WorkspaceSnapshot,
    WorkspaceUpdate,
};
use shared::{
    domain::{AssignmentId, TrackId},
    protocol::SubmitOutcome,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, warn};

use crate::commands::{self, ShellCommand, HELP};

/// Opens `track_id` and reads workspace commands from stdin until `quit` or
/// EOF. The workspace is closed on every exit path.
pub async fn run_workspace(controller: Arc<WorkspaceController>, track_id: TrackId) -> anyhow::Result<()> {
    controller.open_track(track_id).await;
    let result = read_commands(&controller).await;
    controller.close().await;
    result
}

async fn read_commands(controller: &Arc<WorkspaceController>) -> anyhow::Result<()> {
    let mut updates = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    controller.settle().await;
    print_assignments(&controller.snapshot());
    println!("type 'help' for commands");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                let command = match commands::parse(&line) {
                    Ok(Some(ShellCommand::Quit)) => return Ok(()),
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                if let Err(err) = execute(controller, command).await {
                    if err.requires_reauth() {
                        return Err(anyhow!("{err}; run `learner login` again"));
                    }
                    println!("error: {err}");
                }
            }
            update = updates.recv() => match update {
                Ok(WorkspaceUpdate::SessionExpired) => {
                    return Err(anyhow!("session expired; run `learner login` again"));
                }
                Ok(update) => report(&update, &controller.snapshot()),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "shell: missed workspace updates"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn selected(controller: &WorkspaceController) -> ClientResult<AssignmentId> {
    controller
        .snapshot()
        .selected
        .ok_or_else(|| ClientError::conflict("select an assignment first"))
}

async fn execute(controller: &Arc<WorkspaceController>, command: ShellCommand) -> ClientResult<()> {
    match command {
        ShellCommand::List => print_assignments(&controller.snapshot()),
        ShellCommand::Select(assignment_id) => {
            controller.select(assignment_id).await?;
            controller.settle().await;
            print_comments(&controller.snapshot());
        }
        ShellCommand::Comments => {
            controller.load_comments(selected(controller)?).await?;
            print_comments(&controller.snapshot());
        }
        ShellCommand::Comment(text) => {
            controller.add_comment(selected(controller)?, &text).await?;
            controller.settle().await;
            print_comments(&controller.snapshot());
        }
        ShellCommand::Submit(repository_url) => {
            match controller.submit(selected(controller)?, &repository_url).await? {
                SubmitOutcome::Recorded(submission) => {
                    println!("submission {} recorded", submission.id)
                }
                SubmitOutcome::Acknowledged(ack) => println!("{}", ack.message),
            }
        }
        ShellCommand::Review => {
            let review = controller.request_review(selected(controller)?).await?;
            println!(
                "review submission {}: {}",
                review.submission_id, review.repository_url
            );
            println!("score it with: send-review <score> <comment>");
        }
        ShellCommand::SendReview { score, comment } => {
            controller.submit_review(&score, &comment).await?;
            println!("review submitted");
        }
        ShellCommand::Notifications => print_notifications(&controller.snapshot()),
        ShellCommand::Reload => {
            controller.reload().await?;
            controller.settle().await;
            print_assignments(&controller.snapshot());
        }
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => {}
    }
    Ok(())
}

fn report(update: &WorkspaceUpdate, snapshot: &WorkspaceSnapshot) {
    match update {
        WorkspaceUpdate::NotificationsChanged => print_notifications(snapshot),
        WorkspaceUpdate::PollFailed(err) => warn!(error = %err, "shell: notification poll failed"),
        WorkspaceUpdate::LoadFailed { target, error } => {
            println!("failed to load {target:?}: {error}")
        }
        WorkspaceUpdate::ReviewChanged(_) => {
            if let ReviewState::Loaded(draft) = &snapshot.review {
                if !draft.score.is_empty() {
                    println!(
                        "review still open (score '{}', comment '{}')",
                        draft.score, draft.comment
                    );
                }
            }
        }
        _ => {}
    }
}

fn print_assignments(snapshot: &WorkspaceSnapshot) {
    if snapshot.assignments.is_empty() {
        println!("no assignments available yet");
        return;
    }
    for assignment in &snapshot.assignments {
        let marker = if snapshot.selected == Some(assignment.id) {
            '*'
        } else {
            ' '
        };
        println!(
            "{marker} {}  {}  (due {} days after start)",
            assignment.id, assignment.title, assignment.deadline_days
        );
    }
}

fn print_comments(snapshot: &WorkspaceSnapshot) {
    let Some(assignment_id) = snapshot.selected else {
        return;
    };
    if snapshot.comments.is_empty() {
        println!("no comments on assignment {assignment_id}");
    }
    for comment in &snapshot.comments {
        println!(
            "[{}] user {}: {}",
            comment.created_at.format("%Y-%m-%d %H:%M"),
            comment.author_id,
            comment.text
        );
    }
}

fn print_notifications(snapshot: &WorkspaceSnapshot) {
    for notification in &snapshot.notifications {
        println!("! {}", notification.message);
    }
}
