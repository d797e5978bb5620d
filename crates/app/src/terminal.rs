//! Line-oriented front end for a quiz run.

use std::error::Error;
use std::fmt::Write as _;

use quiz_core::model::{Manifest, TopicId};
use quiz_core::{Phase, QuizState};
use services::{GlobalStats, QuizLoopService, QuizSession, REPORT_GRACE, SessionProgress};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::task::JoinHandle;

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// `None` on end of input.
    async fn ask(&mut self, label: &str) -> std::io::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(label.as_bytes()).await?;
        stdout.flush().await?;
        Ok(self.lines.next_line().await?.map(|line| line.trim().to_owned()))
    }
}

fn is_quit(input: &str) -> bool {
    matches!(input, "q" | "quit")
}

pub fn print_manifest(manifest: &Manifest) {
    for group in &manifest.categories {
        println!("{}", group.title);
        for topic in &group.topics {
            println!("  {:<24} {}", topic.topic_id.as_str(), topic.name);
        }
    }
    if manifest.topic_count() == 0 {
        println!("(no topics)");
    }
}

/// Play `topic` until the user quits or input ends. Progress is saved by the
/// service, so quitting mid-run resumes next time.
///
/// # Errors
///
/// Returns an error only if the terminal cannot be read or written.
pub async fn play(service: &QuizLoopService, topic: &TopicId) -> Result<(), Box<dyn Error>> {
    let mut prompt = Prompt::new();
    let mut session = loop {
        match service.open_topic(topic).await {
            Ok(session) => break session,
            Err(err) => {
                println!("Could not load {topic}: {err}");
                match prompt.ask("Retry? [y/N] ").await? {
                    Some(answer) if answer.eq_ignore_ascii_case("y") => {}
                    _ => return Ok(()),
                }
            }
        }
    };

    println!("{}", render_header(&session));
    let mut stats = Some(service.spawn_stats_fetch(&session));

    let outcome = run_loop(service, &mut session, &mut prompt, &mut stats).await;
    if let Some(pending) = stats {
        pending.abort();
    }
    if !service.flush_report(&mut session, REPORT_GRACE).await {
        println!("(score report not sent)");
    }
    outcome?;
    Ok(())
}

async fn run_loop(
    service: &QuizLoopService,
    session: &mut QuizSession,
    prompt: &mut Prompt,
    stats: &mut Option<JoinHandle<GlobalStats>>,
) -> std::io::Result<()> {
    let mut restarted_empty = false;
    loop {
        if let Some(finished) = stats.take_if(|handle| handle.is_finished())
            && let Ok(global) = finished.await
            && let Some(line) = render_stats(global)
        {
            println!("{line}");
        }

        let state = session.state();
        match state.phase {
            Phase::Question => {
                let Some(question) = state.current_question else {
                    if restarted_empty {
                        println!("This topic has no questions to play.");
                        return Ok(());
                    }
                    println!("Nothing left to retry, starting over.");
                    restarted_empty = true;
                    service.retry_all(session).await;
                    continue;
                };
                restarted_empty = false;
                println!("{}", render_question(&state, session.progress()));
                let options = question.options().len();
                let Some(input) = prompt.ask(&format!("Answer [1-{options}, q]: ")).await? else {
                    return Ok(());
                };
                if is_quit(&input) {
                    return Ok(());
                }
                match input.parse::<usize>() {
                    Ok(choice) if (1..=options).contains(&choice) => {
                        service.answer(session, choice - 1).await;
                    }
                    _ => println!("Pick a number from 1 to {options}."),
                }
            }
            Phase::Explanation => {
                println!("{}", render_explanation(&state));
                let label = if state.is_last_question() {
                    "Enter for results, q to quit: "
                } else {
                    "Enter for the next question, q to quit: "
                };
                match prompt.ask(label).await? {
                    Some(input) if !is_quit(&input) => {
                        service.next(session).await;
                    }
                    _ => return Ok(()),
                }
            }
            Phase::Result => {
                println!("{}", render_result(&state));
                let has_wrongs = !state.wrongs.is_empty();
                let label = if has_wrongs {
                    "[a] retry all  [w] retry wrong answers  [q] quit: "
                } else {
                    "[a] retry all  [q] quit: "
                };
                let Some(input) = prompt.ask(label).await? else {
                    return Ok(());
                };
                match input.as_str() {
                    "a" => {
                        service.retry_all(session).await;
                    }
                    "w" if has_wrongs => {
                        service.retry_wrongs(session).await;
                    }
                    input if is_quit(input) => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}

fn render_header(session: &QuizSession) -> String {
    let mut out = format!("== {} ==", session.title());
    if session.is_resumed() {
        out.push_str("\nResuming your previous run.");
    }
    out
}

fn render_stats(stats: GlobalStats) -> Option<String> {
    (stats.count > 0).then(|| format!("{} runs so far, average {:.0}%", stats.count, stats.avg))
}

/// Encouragement shown under the score.
fn feedback_message(percentage: u32) -> &'static str {
    match percentage {
        100.. => "Perfect score!",
        80..=99 => "Nice work, keep it up!",
        60..=79 => "Not bad, keep going!",
        _ => "Give it a few more tries!",
    }
}

fn render_question(state: &QuizState<'_>, progress: SessionProgress) -> String {
    let mut out = format!("\n[{}/{}] ", progress.position, progress.total);
    if let Some(question) = state.current_question {
        out.push_str(question.prompt());
        for (i, option) in question.options().iter().enumerate() {
            let _ = write!(out, "\n  {}. {option}", i + 1);
        }
    }
    out
}

fn render_explanation(state: &QuizState<'_>) -> String {
    let Some(question) = state.current_question else {
        return String::new();
    };
    let mut out = match state.last_answer_correct {
        Some(true) => "Correct!".to_owned(),
        _ => format!("Wrong. The answer is: {}", question.correct_answer()),
    };
    let explanation = question.explanation();
    if !explanation.translation.is_empty() {
        let _ = write!(out, "\n  Translation: {}", explanation.translation);
    }
    if !explanation.grammar.is_empty() {
        let _ = write!(out, "\n  Grammar: {}", explanation.grammar);
    }
    if let Some(vocab) = &explanation.vocab {
        let _ = write!(out, "\n  Vocabulary: {vocab}");
    }
    if let Some(restore) = &explanation.restore {
        let _ = write!(out, "\n  Original: {restore}");
    }
    out
}

fn render_result(state: &QuizState<'_>) -> String {
    let mut out = format!(
        "\nScore: {}/{} ({}%)\n{}",
        state.score,
        state.total_questions,
        state.percentage,
        feedback_message(state.percentage)
    );
    if !state.wrongs.is_empty() {
        out.push_str("\nMissed:");
        for question in state.wrongs {
            let _ = write!(out, "\n  - {} ({})", question.prompt(), question.correct_answer());
        }
    }
    out
}
