use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::bail;
use lens_logging::lens_info;
use repolens_core::{update, AnswerOutcome, AppState, Msg, WatchViewModel};
use repolens_engine::EngineConfig;

use crate::cli::Args;
use crate::effects::EffectRunner;
use crate::persistence;

pub fn run(args: Args) -> anyhow::Result<()> {
    let cache_dir = args.cache_dir();
    let mut config = EngineConfig::new(args.base_url.clone(), cache_dir.clone());
    config.auth_token = args.token.clone();
    config.poll_interval = args.poll_interval();

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(config, msg_tx)?;

    let mut state = AppState::new();
    state = dispatch(
        state,
        Msg::RestoreWatchHistory(persistence::load_watch_history(&cache_dir)),
        &runner,
    );
    state = dispatch(
        state,
        Msg::WatchRepo {
            repo_id: args.repo_id.clone(),
        },
        &runner,
    );
    if let Some(conversation_id) = args.conversation.clone() {
        state = dispatch(
            state,
            Msg::OpenConversation {
                conversation_id,
                recent_assistant_ids: Vec::new(),
            },
            &runner,
        );
    }

    let deadline = Instant::now() + args.timeout();
    let mut question = args.question.clone();
    let mut last_ask = Instant::now();
    let mut last_line = String::new();
    render(&state.view(), &mut last_line);

    loop {
        if Instant::now() > deadline {
            bail!("timed out watching repo {}", args.repo_id);
        }
        let msg = match msg_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(msg) => msg,
            Err(mpsc::RecvTimeoutError::Timeout) => Msg::Tick,
            Err(mpsc::RecvTimeoutError::Disconnected) => bail!("engine stopped unexpectedly"),
        };
        state = dispatch(state, msg, &runner);

        let rerender = state.consume_dirty();
        let view = state.view();
        if rerender {
            render(&view, &mut last_line);
        }

        if view.has_error {
            bail!(
                "ingestion of {} failed: {}",
                args.repo_id,
                view.error.as_deref().unwrap_or("unknown error")
            );
        }
        if view.ready {
            if let Some(question) = question.take() {
                lens_info!("repo {} ready, submitting question", args.repo_id);
                state = dispatch(state, Msg::AskQuestion { question }, &runner);
                last_ask = Instant::now();
                continue;
            }
            match &view.last_answer {
                Some(AnswerOutcome::Answered { message_id, answer }) => {
                    print_answer(&state, &args, message_id, answer);
                    return Ok(());
                }
                Some(AnswerOutcome::Failed { message }) => {
                    bail!("question failed: {message}");
                }
                // The answer endpoint can lag its own readiness signal;
                // retry until it accepts the question.
                Some(AnswerOutcome::NotReady) => {
                    if let Some(question) = &args.question {
                        if last_ask.elapsed() >= Duration::from_secs(1) {
                            state = dispatch(
                                state,
                                Msg::AskQuestion {
                                    question: question.clone(),
                                },
                                &runner,
                            );
                            last_ask = Instant::now();
                        }
                    } else {
                        println!("repo {} is ready", args.repo_id);
                        return Ok(());
                    }
                }
                None => {
                    if args.question.is_none() {
                        println!("repo {} is ready", args.repo_id);
                        return Ok(());
                    }
                    // Otherwise the question is in flight.
                }
            }
        }
    }
}

fn dispatch(state: AppState, msg: Msg, runner: &EffectRunner) -> AppState {
    let (state, effects) = update(state, msg);
    runner.enqueue(effects);
    state
}

/// One line per visible transition; quiet otherwise.
fn render(view: &WatchViewModel, last_line: &mut String) {
    let line = match view.overall_percent {
        Some(percent) => format!("{} {percent}%", view.active_label),
        None => view.active_label.clone(),
    };
    if line != *last_line {
        println!("{line}");
        *last_line = line;
    }
}

fn print_answer(state: &AppState, args: &Args, message_id: &str, answer: &str) {
    println!("\n{answer}");
    let conversation_id = args.conversation.clone().unwrap_or_default();
    let contexts = state
        .contexts_for(&conversation_id)
        .and_then(|map| map.get(message_id));
    if let Some(contexts) = contexts {
        for item in contexts {
            println!("  [{}]", item.filename);
        }
    }
}
