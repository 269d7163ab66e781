//! The `examrun take` command: an attempt driven by commands read from stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use examrun_client::{load_config_from, OfflineAuthenticator};
use examrun_core::gate::PersistenceGate;
use examrun_core::machine::SessionState;
use examrun_core::model::{ExamDefinition, OptionIndex, QuestionNumber};
use examrun_core::session::{ExamSession, Intent, SessionHandle, SessionOptions, SessionView, ViewMode};
use examrun_core::traits::{Authenticator, ExamCatalog};

use super::{api_authenticator, load_catalog, session_store};
use crate::display::{answer_table, exam_title, print_exam, print_question, ViewPrinter};
use crate::prompt::{BridgedPrompt, LineRequest, EMAIL_PROMPT};

const HELP: &str = "Commands:
  <question> <option>  choose an option, e.g. `3 2`
  goto <question>      show one question again
  status               answered count and time left
  submit               hand in your answers
  retry                try a failed save again
  decline              give up on saving the result
  quit                 leave without submitting";

pub async fn execute(
    exam_id: String,
    exams: Option<PathBuf>,
    duration: Option<i64>,
    no_save: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let catalog = load_catalog(exams, &config)?;
    let exam = catalog.get(&exam_id)?;

    let (prompt_tx, mut prompt_rx) = mpsc::channel(1);
    let auth: Arc<dyn Authenticator> = if no_save {
        Arc::new(OfflineAuthenticator)
    } else {
        Arc::new(api_authenticator(
            &config,
            Arc::new(BridgedPrompt::new(prompt_tx)),
        )?)
    };
    let gate = Arc::new(PersistenceGate::new(Arc::new(session_store(&config)?), auth));
    let options = SessionOptions {
        duration_override: duration,
        ..SessionOptions::default()
    };
    let handle = ExamSession::start(&exam, gate, options)?;

    println!("{}", exam_title(&exam));
    print_exam(&exam);
    println!("{HELP}\n");

    let ending = drive(&exam, &handle, &mut prompt_rx).await;
    let view = handle.view();
    handle.close().await;
    let ending = ending?;

    if !view.is_submitted {
        println!("Attempt abandoned.");
        return Ok(());
    }
    if let Some(correct) = &view.correct_answers {
        println!("{}", answer_table(&exam, &view.answers, correct));
    }
    if let Some(id) = view.session_id.as_deref() {
        println!("Review later with: examrun review --session-id {id} --exam-id {}", exam.id);
    }
    if ending == Ending::InputClosed && view.state == SessionState::PersistFailed {
        bail!("the result was not saved");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Finished,
    Quit,
    InputClosed,
}

/// An intent whose effect must show up before more input is read.
#[derive(Debug, Clone, Copy)]
enum Waiting {
    Submit,
    Retry { notices: usize },
}

impl Waiting {
    fn settled(self, view: &SessionView) -> bool {
        match self {
            Waiting::Submit => view.is_submitted,
            Waiting::Retry { notices } => {
                view.state != SessionState::PersistFailed || view.notices.len() > notices
            }
        }
    }
}

fn accepts_commands(view: &SessionView) -> bool {
    (view.mode == ViewMode::Attempt && view.state == SessionState::Draft)
        || view.state == SessionState::PersistFailed
}

/// Feed stdin into the session until it settles.
///
/// Stdin is shared with the login prompt: while the prompt has a line
/// request pending, the next line answers it instead of being a command.
async fn drive(
    exam: &ExamDefinition,
    handle: &SessionHandle,
    prompt_rx: &mut mpsc::Receiver<LineRequest>,
) -> Result<Ending> {
    let mut views = handle.subscribe();
    let mut printer = ViewPrinter::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    let mut pending_prompt: Option<LineRequest> = None;
    let mut waiting: Option<Waiting> = None;

    loop {
        let view = views.borrow_and_update().clone();
        printer.render(&view);
        if waiting.is_some_and(|w| w.settled(&view)) {
            waiting = None;
        }
        if view.state.is_terminal() {
            return Ok(Ending::Finished);
        }

        if !input_open {
            if let Some(request) = pending_prompt.take() {
                let _ = request.send(None);
            }
            if waiting.is_none() {
                match view.state {
                    SessionState::Draft if view.mode == ViewMode::Attempt => {
                        println!("Input closed, submitting.");
                        handle.send(Intent::Submit).await?;
                        waiting = Some(Waiting::Submit);
                    }
                    SessionState::PersistFailed => return Ok(Ending::InputClosed),
                    _ => {}
                }
            }
        }

        let reading = input_open
            && (pending_prompt.is_some() || (waiting.is_none() && accepts_commands(&view)));

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(Ending::Finished);
                }
            }
            Some(request) = prompt_rx.recv(), if pending_prompt.is_none() => {
                println!("{EMAIL_PROMPT}");
                pending_prompt = Some(request);
            }
            line = lines.next_line(), if reading => match line? {
                None => input_open = false,
                Some(line) => {
                    if let Some(request) = pending_prompt.take() {
                        let _ = request.send(Some(line));
                    } else if let Some(next) = handle_line(exam, handle, &view, &line).await? {
                        match next {
                            Next::Wait(w) => waiting = Some(w),
                            Next::Quit => return Ok(Ending::Quit),
                        }
                    }
                }
            },
        }
    }
}

enum Next {
    Wait(Waiting),
    Quit,
}

async fn handle_line(
    exam: &ExamDefinition,
    handle: &SessionHandle,
    view: &SessionView,
    line: &str,
) -> Result<Option<Next>> {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(message) => {
            println!("{message}");
            return Ok(None);
        }
    };

    debug!(?command, state = %view.state, "input");
    match command {
        InputCommand::Empty => {}
        InputCommand::Help => println!("{HELP}"),
        InputCommand::Status => print_status(view),
        InputCommand::Quit => return Ok(Some(Next::Quit)),
        InputCommand::Answer { question, option } => {
            if view.is_submitted {
                println!("Answers can no longer change.");
                return Ok(None);
            }
            let Some(q) = exam.question(question) else {
                println!("There is no question {question}.");
                return Ok(None);
            };
            if option == 0 || option > q.options.len() {
                println!("Question {question} has options 1-{}.", q.options.len());
                return Ok(None);
            }
            let option: OptionIndex = option - 1;
            handle
                .send(Intent::SelectAnswer { question, option })
                .await?;
            println!("Q{question}: {}", option + 1);
        }
        InputCommand::Goto(question) => match exam.question(question) {
            Some(q) => {
                handle.send(Intent::ScrollToQuestion(question)).await?;
                print_question(q);
            }
            None => println!("There is no question {question}."),
        },
        InputCommand::Submit => {
            if view.is_submitted {
                println!("Already submitted.");
            } else {
                handle.send(Intent::Submit).await?;
                return Ok(Some(Next::Wait(Waiting::Submit)));
            }
        }
        InputCommand::Retry => {
            if view.state == SessionState::PersistFailed {
                handle.send(Intent::Retry).await?;
                return Ok(Some(Next::Wait(Waiting::Retry {
                    notices: view.notices.len(),
                })));
            }
            println!("There is no failed save to retry.");
        }
        InputCommand::Decline => {
            if view.state == SessionState::PersistFailed {
                handle.send(Intent::Decline).await?;
            } else {
                println!("There is no save to decline.");
            }
        }
    }
    Ok(None)
}

fn print_status(view: &SessionView) {
    let time = if view.untimed {
        "untimed".to_string()
    } else {
        format!("{} left", view.clock)
    };
    println!(
        "{}/{} answered, {time}, {}",
        view.answers.len(),
        view.total_questions,
        view.state
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputCommand {
    Empty,
    Help,
    Status,
    Quit,
    /// Option numbers are 1-based as typed.
    Answer {
        question: QuestionNumber,
        option: usize,
    },
    Goto(QuestionNumber),
    Submit,
    Retry,
    Decline,
}

fn parse_command(line: &str) -> Result<InputCommand, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let number = |word: &str| {
        word.parse::<u32>()
            .map_err(|_| format!("`{word}` is not a number."))
    };
    match words.as_slice() {
        [] => Ok(InputCommand::Empty),
        ["help" | "?"] => Ok(InputCommand::Help),
        ["status"] => Ok(InputCommand::Status),
        ["quit" | "exit"] => Ok(InputCommand::Quit),
        ["submit"] => Ok(InputCommand::Submit),
        ["retry"] => Ok(InputCommand::Retry),
        ["decline"] => Ok(InputCommand::Decline),
        ["goto" | "g", question] => Ok(InputCommand::Goto(number(question)?)),
        [question, option] => Ok(InputCommand::Answer {
            question: number(question)?,
            option: number(option)? as usize,
        }),
        _ => Err(format!(
            "Unrecognized input `{}`. Type `help` for commands.",
            line.trim()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answers_and_keywords() {
        assert_eq!(
            parse_command("3 2"),
            Ok(InputCommand::Answer {
                question: 3,
                option: 2
            })
        );
        assert_eq!(parse_command("  submit "), Ok(InputCommand::Submit));
        assert_eq!(parse_command("goto 12"), Ok(InputCommand::Goto(12)));
        assert_eq!(parse_command("g 1"), Ok(InputCommand::Goto(1)));
        assert_eq!(parse_command(""), Ok(InputCommand::Empty));
        assert_eq!(parse_command("exit"), Ok(InputCommand::Quit));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_command("3 b").unwrap_err().contains("`b` is not a number"));
        assert!(parse_command("goto").unwrap_err().contains("Unrecognized"));
        assert!(parse_command("1 2 3").unwrap_err().contains("Unrecognized"));
    }

    fn view(state: SessionState, notices: usize) -> SessionView {
        SessionView {
            exam_id: "35".into(),
            mode: ViewMode::Attempt,
            state,
            remaining_seconds: 0,
            clock: "00:00".into(),
            warning: false,
            untimed: false,
            answers: Default::default(),
            correct_answers: None,
            is_submitted: state.is_submitted(),
            score: None,
            total_questions: 3,
            focused_question: None,
            session_id: None,
            notices: vec![examrun_core::machine::Notice::NotSaved; notices],
        }
    }

    #[test]
    fn retry_settles_on_new_notice_or_state_change() {
        let waiting = Waiting::Retry { notices: 1 };
        assert!(!waiting.settled(&view(SessionState::PersistFailed, 1)));
        assert!(waiting.settled(&view(SessionState::PersistFailed, 2)));
        assert!(waiting.settled(&view(SessionState::Persisting, 1)));
        assert!(Waiting::Submit.settled(&view(SessionState::AwaitingIdentity, 0)));
        assert!(!Waiting::Submit.settled(&view(SessionState::Draft, 0)));
    }

    #[test]
    fn commands_only_read_when_actionable() {
        assert!(accepts_commands(&view(SessionState::Draft, 0)));
        assert!(accepts_commands(&view(SessionState::PersistFailed, 0)));
        assert!(!accepts_commands(&view(SessionState::AwaitingIdentity, 0)));
        assert!(!accepts_commands(&view(SessionState::Persisting, 0)));
    }
}
