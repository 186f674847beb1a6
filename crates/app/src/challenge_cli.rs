use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use educare_core::model::{ChallengeId, ExecutionReport};
use educare_core::session::{ChallengeOutcome, ChallengeSession, SubmissionState, SubmissionTrigger};
use services::attempt::TimerDisplay;
use services::{
    ApiError, AppServices, ChallengeCommand, ChallengeCommands, ChallengeEvent,
    ChallengeServiceError, CompanionError,
};

use crate::input::{CHALLENGE_HELP, ChallengeInput, END_OF_CODE, parse_challenge};

/// Interactive coding challenge on stdin/stdout.
pub async fn run(services: &AppServices, id: ChallengeId) -> Result<()> {
    let service = services.challenge_service();
    let session = match service.start(id).await {
        Ok(session) => session,
        Err(ChallengeServiceError::Api(ApiError::NotFound)) => {
            println!("Challenge {id} was not found.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let challenge = session.challenge();
    println!("{}\n\n{}\n", challenge.title(), challenge.description());
    println!(
        "Languages: {} | hints available: {}",
        challenge.languages().join(", "),
        challenge.max_hints()
    );
    println!("Type `help` for commands.\n");
    print_code(session.language(), session.code());

    let mut handle = service.spawn(session);
    let commands = handle.commands();

    // Code typed after `edit`, until the terminating line.
    let mut entry: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match entry.take() {
                    Some(code) => entry = continue_entry(&commands, code, &line).await?,
                    None => match parse_challenge(&line) {
                        Ok(ChallengeInput::Quit) => break,
                        Ok(ChallengeInput::Edit) => {
                            println!("Enter code, then `{END_OF_CODE}` on its own line:");
                            entry = Some(String::new());
                        }
                        Ok(input) => apply(services, &commands, input).await?,
                        Err(err) => println!("{err}"),
                    },
                }
            }
            event = handle.next_event() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    drop(commands);
    let report = handle.join().await?;
    if report.state != SubmissionState::Submitted {
        println!(
            "Left without submitting after {}.",
            TimerDisplay::new(report.time_spent, None)
        );
    }
    Ok(())
}

/// Append `line` to the code being entered, or send it once the terminating
/// line arrives. Returns the code still being entered.
async fn continue_entry(
    commands: &ChallengeCommands,
    mut code: String,
    line: &str,
) -> Result<Option<String>> {
    if line.trim_end() == END_OF_CODE {
        commands.edit_code(code).await?;
        return Ok(None);
    }
    code.push_str(line);
    code.push('\n');
    Ok(Some(code))
}

async fn apply(
    services: &AppServices,
    commands: &ChallengeCommands,
    input: ChallengeInput,
) -> Result<()> {
    match input {
        ChallengeInput::Run => commands.run().await?,
        ChallengeInput::Hint => commands.hint().await?,
        ChallengeInput::Language(language) => commands.select_language(language).await?,
        ChallengeInput::Load(path) => match tokio::fs::read_to_string(&path).await {
            Ok(code) => commands.edit_code(code).await?,
            Err(err) => println!("Could not read {}: {err}", path.display()),
        },
        ChallengeInput::Reset => commands.send(ChallengeCommand::ResetCode).await?,
        ChallengeInput::Tip(context) => {
            let session = commands.snapshot().await?;
            match services
                .companion()
                .tip(session.code(), session.language(), context.as_deref())
                .await
            {
                Ok(tip) => println!("Companion: {tip}"),
                Err(CompanionError::Disabled) => println!("The code companion is not available."),
                Err(err) => println!("No tip: {err}"),
            }
        }
        ChallengeInput::Submit => commands.submit().await?,
        ChallengeInput::Show => print_status(&commands.snapshot().await?),
        ChallengeInput::Help => println!("{CHALLENGE_HELP}"),
        ChallengeInput::Edit | ChallengeInput::Quit => {}
    }
    Ok(())
}

fn print_event(event: &ChallengeEvent) {
    match event {
        ChallengeEvent::Tick {
            remaining: Some(left),
            ..
        } if *left > 0 && *left % 60 == 0 => {
            println!("[{}] left", TimerDisplay::new(0, Some(*left)));
        }
        ChallengeEvent::Tick { .. } => {}
        ChallengeEvent::LanguageSelected { language, code } => print_code(language, code),
        ChallengeEvent::CodeUpdated => println!("Code updated."),
        ChallengeEvent::Rejected { reason } => println!("Not accepted: {reason}"),
        ChallengeEvent::Running => println!("Running tests..."),
        ChallengeEvent::RunFinished(report) => print_report(report),
        ChallengeEvent::RunFailed { message } => println!("Run failed: {message}"),
        ChallengeEvent::HintUnlocked { hint, used, max } => println!(
            "Hint {used}/{max} (-{} pts): {}",
            hint.penalty_points, hint.content
        ),
        ChallengeEvent::HintFailed { message } => println!("No hint: {message}"),
        ChallengeEvent::Submitting {
            trigger: SubmissionTrigger::TimeExpired,
        } => println!("Submitting your code."),
        ChallengeEvent::Submitting { .. } => println!("Submitting..."),
        ChallengeEvent::Submitted(outcome) => print_outcome(outcome),
        ChallengeEvent::SubmissionFailed { message } => {
            println!("Submission failed: {message}. Type `submit` to retry.");
        }
        ChallengeEvent::Expired => println!("Time is up."),
    }
}

fn print_status(session: &ChallengeSession) {
    print_code(session.language(), session.code());
    let timer = TimerDisplay::new(session.clock().elapsed(), session.clock().remaining());
    println!(
        "[{timer}] hints used: {} (-{} pts)",
        session.hints().used(),
        session.hints().penalty()
    );
    if let Some(report) = session.last_report() {
        print_report(report);
    }
}

fn print_code(language: &str, code: &str) {
    println!("--- {language} ---\n{code}\n---");
}

fn print_report(report: &ExecutionReport) {
    if let Some(error) = &report.compile_error {
        println!("Compile error:\n{error}");
        return;
    }
    for result in &report.results {
        let mark = if result.passed { "ok  " } else { "FAIL" };
        println!("  {mark} {} ({:.1} ms)", result.name, result.time_ms);
        if !result.passed {
            if let Some(expected) = &result.expected {
                println!("       expected: {expected}");
            }
            if let Some(actual) = &result.actual {
                println!("       actual:   {actual}");
            }
            if let Some(error) = &result.error {
                println!("       error:    {error}");
            }
        }
    }
    println!(
        "{}/{} passed, score {:.1}",
        report.passed_count, report.total_count, report.score
    );
}

fn print_outcome(outcome: &ChallengeOutcome) {
    let verdict = if outcome.passed { "passed" } else { "not passed" };
    println!("Submitted: score {:.1} ({verdict})", outcome.score);
    if let Some(report) = &outcome.report {
        print_report(report);
    }
}
