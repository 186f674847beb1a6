use std::collections::HashMap;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use educare_core::model::{Question, QuestionId, QuestionPayload, QuizId};
use educare_core::session::{AttemptView, SubmissionState, Visibility};
use services::attempt::{LOW_TIME_SECS, TimerDisplay, palette_line};
use services::{AppServices, AttemptCommand, AttemptCommands, AttemptEvent, AttemptLoadError};

use crate::input::{ATTEMPT_HELP, AttemptInput, parse_attempt};

/// Interactive quiz attempt on stdin/stdout.
pub async fn run(services: &AppServices, quiz_id: QuizId) -> Result<()> {
    let loaded = match services.attempt_loader().load(quiz_id).await {
        Ok(loaded) => loaded,
        Err(AttemptLoadError::NotFound(id)) => {
            println!("Quiz {id} was not found or has no questions.");
            return Ok(());
        }
        Err(AttemptLoadError::Closed(status)) => {
            println!("This attempt is {status:?} and can no longer be changed.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let session = &loaded.session;
    println!("{}", session.assessment().title());
    if let Some(description) = session.assessment().description() {
        println!("{description}");
    }
    if session.assessment().proctored() {
        println!("This quiz is proctored: leaving the window is recorded.");
    }
    if loaded.resumed_from_draft {
        println!("Resumed from the copy saved on this device.");
    }
    println!("Type `help` for commands.\n");

    let questions: HashMap<QuestionId, Question> = session
        .questions()
        .iter()
        .map(|q| (q.id(), q.clone()))
        .collect();
    let mut handle = services.attempt_runtime().spawn(loaded.session);
    let commands = handle.commands();

    let view = commands.snapshot().await?;
    print_status(&view);
    print_question(&questions, &view);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_attempt(&line) {
                    Ok(AttemptInput::Quit) => break,
                    Ok(input) => apply(&commands, &questions, input).await?,
                    Err(err) => println!("{err}"),
                }
            }
            event = handle.next_event() => match event {
                Some(event) => print_event(&commands, &questions, &event).await?,
                None => break,
            },
        }
    }

    drop(commands);
    let report = handle.join().await?;
    match report.state {
        SubmissionState::Submitted => println!("Attempt submitted."),
        _ => println!(
            "Progress kept: {} answered, {} used.",
            report.answered,
            TimerDisplay::new(report.time_spent, None)
        ),
    }
    Ok(())
}

async fn apply(
    commands: &AttemptCommands,
    questions: &HashMap<QuestionId, Question>,
    input: AttemptInput,
) -> Result<()> {
    match input {
        AttemptInput::Answer(patch) => {
            let current = commands.snapshot().await?.current_question;
            commands.answer(current, patch).await?;
        }
        AttemptInput::Flag => {
            let current = commands.snapshot().await?.current_question;
            commands.toggle_flag(current).await?;
        }
        AttemptInput::Next => commands.send(AttemptCommand::Next).await?,
        AttemptInput::Previous => commands.send(AttemptCommand::Previous).await?,
        AttemptInput::Go(index) => commands.send(AttemptCommand::Select(index)).await?,
        AttemptInput::Hide => commands.visibility(Visibility::Hidden).await?,
        AttemptInput::Show => commands.visibility(Visibility::Visible).await?,
        AttemptInput::Save => commands.send(AttemptCommand::SaveNow).await?,
        AttemptInput::Submit => commands.submit().await?,
        AttemptInput::Status => {
            let view = commands.snapshot().await?;
            print_status(&view);
            print_question(questions, &view);
        }
        AttemptInput::Help => println!("{ATTEMPT_HELP}"),
        AttemptInput::Quit => {}
    }
    Ok(())
}

async fn print_event(
    commands: &AttemptCommands,
    questions: &HashMap<QuestionId, Question>,
    event: &AttemptEvent,
) -> Result<()> {
    match event {
        AttemptEvent::Tick {
            remaining: Some(left),
            ..
        } if *left > 0 && (*left % 60 == 0 || (*left <= LOW_TIME_SECS && *left % 10 == 0)) => {
            println!("[{}] left", TimerDisplay::new(0, Some(*left)));
        }
        AttemptEvent::Tick { .. } => {}
        AttemptEvent::AnswerRecorded { .. } => println!("Answer recorded."),
        AttemptEvent::FlagToggled { flagged, .. } => {
            println!("{}", if *flagged { "Flagged for review." } else { "Flag removed." });
        }
        AttemptEvent::Moved { .. } => {
            let view = commands.snapshot().await?;
            print_question(questions, &view);
        }
        AttemptEvent::Rejected { reason } => println!("Not accepted: {reason}"),
        AttemptEvent::AutosaveStarted { .. } => {}
        AttemptEvent::AutosaveFinished { ok } => {
            if !ok {
                println!("(autosave failed, will retry)");
            }
        }
        AttemptEvent::WarningRaised(warning) => println!("WARNING: {}", warning.message()),
        AttemptEvent::WarningCleared(_) => {}
        AttemptEvent::Submitting { .. } => println!("Submitting..."),
        AttemptEvent::Submitted(outcome) => {
            let verdict = match outcome.passed {
                Some(true) => " (passed)",
                Some(false) => " (not passed)",
                None => "",
            };
            println!("Score: {:.1}%{verdict}", outcome.percentage);
        }
        AttemptEvent::SubmissionFailed { message } => {
            println!("Submission failed: {message}. Type `submit` to retry.");
        }
        AttemptEvent::Expired => println!("Time is up."),
    }
    Ok(())
}

fn print_status(view: &AttemptView) {
    let timer = TimerDisplay::from_view(view);
    let label = if timer.counting_down { "left" } else { "elapsed" };
    println!(
        "[{timer} {label}] {}/{} answered, {} flagged",
        view.progress.answered, view.progress.total, view.progress.flagged
    );
    println!("{}", palette_line(view));
}

fn print_question(questions: &HashMap<QuestionId, Question>, view: &AttemptView) {
    let Some(question) = questions.get(&view.current_question) else {
        return;
    };
    println!(
        "\nQ{} ({}, {} pts): {}",
        view.progress.current + 1,
        question.kind().as_str(),
        question.points(),
        question.prompt()
    );
    match question.payload() {
        QuestionPayload::Choices { options } => {
            for option in options {
                println!("  {}) {}", option.id, option.text);
            }
        }
        QuestionPayload::FreeText {
            max_length: Some(max),
        } => println!("  (up to {max} characters)"),
        QuestionPayload::FreeText { max_length: None } => {}
        QuestionPayload::Code { language, starter_code } => {
            println!("  language: {language}");
            if !starter_code.is_empty() {
                println!("{starter_code}");
            }
        }
        QuestionPayload::Matching { left, right } => {
            for item in left {
                println!("  {}: {}", item.id, item.text);
            }
            for item in right {
                println!("    {}: {}", item.id, item.text);
            }
        }
        QuestionPayload::Ordering { items } => {
            for item in items {
                println!("  {}: {}", item.id, item.text);
            }
        }
        QuestionPayload::Hotspot { image } => {
            println!("  image: {} ({}x{})", image.url, image.width, image.height);
        }
    }
}
