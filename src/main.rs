use std::io::Write as _;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use hanzi_deck::audio::{AudioCache, PlaybackController, PlaybackState, SpeakerOutput};
use hanzi_deck::db::{self, AudioStore};
use hanzi_deck::gateway::{ApiGateway, HttpTransport};
use hanzi_deck::practice::DEFAULT_SPREE_GOAL;
use hanzi_deck::quiz::QuizScore;
use hanzi_deck::speech::{RecognitionEvent, Recognizer, SpeechInput, SpeechMode, SpeechOutcome};
use hanzi_deck::{Config, ControlId, FieldId, PatternSet, Structured, Tutor, View, render};

/// hanzi - Chinese grammar patterns with an AI tutor
#[derive(Parser)]
#[command(name = "hanzi", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show today's patterns
    Daily {
        /// Draw a new selection for today
        #[arg(long)]
        new: bool,
    },
    /// Show a pattern card
    Show {
        /// Pattern text or pinyin
        pattern: String,
    },
    /// Mark a pattern as learned
    Learn {
        /// Pattern text or pinyin
        pattern: String,
    },
    /// Translate between Chinese and English
    Translate {
        /// Text to translate
        text: String,
    },
    /// Chat with the tutor
    Chat {
        /// Open the chat around a pattern
        #[arg(long, conflicts_with = "roleplay")]
        pattern: Option<String>,
        /// Roleplay a scenario (e.g. "ordering at a restaurant")
        #[arg(long)]
        roleplay: Option<String>,
    },
    /// Correct a piece of writing
    Correct {
        /// Text to correct
        text: String,
    },
    /// Show past writing corrections
    History,
    /// Suggest a writing topic
    Topic {
        /// Build the topic around a pattern
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Explain a character
    Char {
        /// Character to explain
        character: String,
    },
    /// Speak a sentence
    Speak {
        /// Text to speak
        text: String,
        /// Voice to use
        #[arg(long)]
        speaker: Option<String>,
    },
    /// Check pronunciation of a sentence
    Pronounce {
        /// Sentence to read aloud
        reference: String,
    },
    /// Generate and play a listening script
    Script {
        /// Build the script around a pattern
        #[arg(required_unless_present = "situational")]
        pattern: Option<String>,
        /// Build the script around a situation instead
        #[arg(long, conflicts_with = "pattern")]
        situational: Option<String>,
    },
    /// Practice a pattern with generated problems
    Practice {
        /// Pattern text or pinyin
        pattern: String,
        /// Number of problems
        #[arg(long, default_value_t = DEFAULT_SPREE_GOAL)]
        goal: u32,
    },
    /// Take a multiple-choice quiz
    Quiz {
        /// Number of questions
        #[arg(long, default_value = "5")]
        questions: usize,
    },
    /// Show or clear the audio cache
    Cache {
        /// Remove every cached clip
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,hanzi_deck=info",
        1 => "info,hanzi_deck=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let pool = db::init(config.db_path())?;
    let transport = HttpTransport::new(config.api.url.clone(), config.api.key.clone())?;
    let gateway = ApiGateway::new(Arc::new(transport)).with_policy(config.api.retry.clone());

    let view: Arc<dyn View> = Arc::new(TerminalView);
    let cache = AudioCache::new(AudioStore::new(pool.clone()), config.audio.memory_cache);
    let playback = PlaybackController::new(
        gateway.clone(),
        cache,
        Arc::new(SpeakerOutput),
        Arc::clone(&view),
    )
    .with_line_gap(config.audio.line_gap);

    let mut tutor = Tutor::new(gateway, PatternSet::bundled()?, pool, Arc::new(playback))?;
    let speaker = config.audio.speaker.as_deref();

    match cli.command {
        Command::Daily { new } => {
            for pattern in tutor.daily_patterns(new)? {
                let learned = tutor.learning_counts().get(&pattern.pattern);
                println!("{}\n", render::pattern_card(pattern, learned));
            }
        }
        Command::Show { pattern } => {
            let found = tutor.pattern(&pattern)?;
            let learned = tutor.learning_counts().get(&found.pattern);
            println!("{}", render::pattern_card(found, learned));
        }
        Command::Learn { pattern } => {
            let count = tutor.mark_learned(&pattern)?;
            println!("Learned {pattern} {count} time(s)");
        }
        Command::Translate { text } => {
            println!("{}", render::translation(&tutor.translate(&text).await?));
        }
        Command::Chat { pattern, roleplay } => {
            chat(&mut tutor, &view, pattern.as_deref(), roleplay.as_deref(), speaker).await?;
        }
        Command::Correct { text } => {
            println!("{}", render::correction(&tutor.correct_writing(&text).await?));
        }
        Command::History => {
            println!("{}", render::correction_history(&tutor.correction_history()?));
        }
        Command::Topic { pattern } => {
            println!(
                "{}",
                render::writing_topic(&tutor.writing_topic(pattern.as_deref()).await?)
            );
        }
        Command::Char { character } => {
            println!(
                "{}",
                render::character(&tutor.character_info(&character).await?)
            );
        }
        Command::Speak { text, speaker: voice } => {
            let button = ControlId::new("speak");
            let voice = voice.as_deref().or(speaker);
            until_interrupted(&tutor, tutor.playback().play_tts(&text, Some(&button), None, voice))
                .await?;
        }
        Command::Pronounce { reference } => {
            let input = speech_input(&tutor, &view);
            println!("Read aloud: {reference}");
            let outcome = input
                .press(&ControlId::new("mic-pronounce"), SpeechMode::Evaluate { reference })
                .await?;
            tracing::debug!(?outcome, "pronunciation check finished");
        }
        Command::Script {
            pattern,
            situational,
        } => {
            let script = match (&situational, &pattern) {
                (Some(scenario), _) => tutor.situational_script(scenario).await?,
                (None, Some(pattern)) => tutor.conversation_script(pattern).await?,
                (None, None) => anyhow::bail!("give a pattern or --situational"),
            };
            let Structured::Parsed(script) = script else {
                println!("{}", hanzi_deck::schema::DEGRADED_MESSAGE);
                return Ok(());
            };
            println!("{}", render::script(&script));
            let control = ControlId::new("script");
            until_interrupted(&tutor, tutor.playback().play_script(&control, &script.lines))
                .await?;
        }
        Command::Practice { pattern, goal } => practice(&tutor, &view, &pattern, goal).await?,
        Command::Quiz { questions } => quiz(&tutor, questions).await?,
        Command::Cache { clear } => {
            let cache = tutor.playback().cache();
            if clear {
                let removed = cache.clear()?;
                println!("Removed {removed} cached clip(s)");
            } else {
                let store = cache.store();
                println!(
                    "{} clip(s) on disk, {} bytes; {} in memory",
                    store.len()?,
                    store.size_bytes()?,
                    cache.memory_len()
                );
            }
        }
    }

    Ok(())
}

/// Interactive chat loop
async fn chat(
    tutor: &mut Tutor,
    view: &Arc<dyn View>,
    pattern: Option<&str>,
    roleplay: Option<&str>,
    speaker: Option<&str>,
) -> anyhow::Result<()> {
    let opening = match (pattern, roleplay) {
        (Some(p), _) => Some(tutor.start_chat_with_pattern(p).await?),
        (None, Some(scenario)) => Some(tutor.start_roleplay(scenario).await?),
        (None, None) => {
            tutor.start_chat();
            None
        }
    };
    print!("{}", render::transcript(tutor.conversation().turns()));
    println!("(/mic to speak, /suggest for ideas, /say to hear the last reply, /quit to leave)");

    let input = speech_input(tutor, view);
    let mic = ControlId::new("mic-chat");
    let mut last_reply = opening;

    loop {
        let Some(line) = read_line("you> ").await? else {
            break;
        };
        let message = match line.as_str() {
            "" => continue,
            "/quit" => break,
            "/suggest" => {
                println!("{}", render::suggestions(&tutor.suggest_reply().await?));
                continue;
            }
            "/say" => {
                if let Some(reply) = &last_reply {
                    let button = ControlId::new("chat-reply");
                    let _ = tutor
                        .playback()
                        .play_tts(reply, Some(&button), None, speaker)
                        .await;
                }
                continue;
            }
            "/mic" => match input.press(&mic, SpeechMode::Fill(FieldId::ChatInput)).await {
                Ok(SpeechOutcome::Filled {
                    text,
                    submitted: true,
                }) => text,
                Ok(_) | Err(_) => continue,
            },
            _ => line,
        };

        match tutor.send_chat(&message).await {
            Ok(reply) => {
                println!("tutor> {reply}");
                last_reply = Some(reply);
            }
            Err(e) => view.alert(&e.user_message()),
        }
    }

    Ok(())
}

/// Practice spree loop
async fn practice(
    tutor: &Tutor,
    view: &Arc<dyn View>,
    pattern: &str,
    goal: u32,
) -> anyhow::Result<()> {
    let mut spree = tutor.start_spree(pattern, goal)?;
    let input = speech_input(tutor, view);
    let mic = ControlId::new("mic-practice");

    while !spree.is_finished() {
        let problem = match tutor.next_problem(&mut spree).await? {
            Structured::Parsed(problem) => problem,
            Structured::Degraded { .. } => {
                println!("{}", hanzi_deck::schema::DEGRADED_MESSAGE);
                continue;
            }
        };

        println!("\n[{} left] {}", spree.remaining(), problem.question);
        if let Some(hint) = &problem.hint {
            println!("  hint: {hint}");
        }

        let Some(mut answer) = read_line("answer (/mic to speak)> ").await? else {
            break;
        };
        if answer == "/mic" {
            answer = match input
                .press(&mic, SpeechMode::Fill(FieldId::PracticeAnswer))
                .await
            {
                Ok(SpeechOutcome::Filled { text, .. }) => text,
                Ok(_) | Err(_) => String::new(),
            };
        }

        if spree.record_answer(&problem.answer, &answer) {
            println!("Correct!");
        } else {
            println!("Expected: {}", problem.answer);
        }
        if let Some(pinyin) = &problem.pinyin {
            println!("  {pinyin}");
        }
    }

    if spree.gave_up() {
        println!("\nThe tutor could not produce readable problems. Please try again later.");
    }
    println!("\n{}/{} correct", spree.correct, spree.answered);
    Ok(())
}

/// Multiple-choice quiz loop
async fn quiz(tutor: &Tutor, count: usize) -> anyhow::Result<()> {
    if tutor.quiz_done_today()? {
        println!("You already finished a quiz today. Here is another one.\n");
    }

    let questions = tutor.quiz(count);
    let mut score = QuizScore::default();
    for (i, question) in questions.iter().enumerate() {
        print!("{}", render::quiz_question(i + 1, question));
        let Some(answer) = read_line("> ").await? else {
            return Ok(());
        };
        let choice = render::parse_option(&answer, question.options.len());
        if score.record(question, choice) {
            println!("Correct!\n");
        } else {
            println!(
                "The answer was {}) {}\n",
                render::option_letter(question.answer),
                question.options[question.answer]
            );
        }
    }

    tutor.complete_quiz()?;
    println!("Score: {score}");
    Ok(())
}

/// Run a playback future, stopping playback on Ctrl-C
async fn until_interrupted(
    tutor: &Tutor,
    playing: impl std::future::Future<Output = hanzi_deck::Result<()>>,
) -> anyhow::Result<()> {
    tokio::select! {
        result = playing => match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_stopped() => Ok(()),
            Err(e) => Err(e.into()),
        },
        _ = tokio::signal::ctrl_c() => {
            tutor.playback().stop();
            Ok(())
        }
    }
}

fn speech_input(tutor: &Tutor, view: &Arc<dyn View>) -> SpeechInput {
    SpeechInput::new(
        Arc::new(TypedRecognizer::default()),
        tutor.gateway().clone(),
        Arc::clone(view),
    )
}

/// Read one trimmed line from stdin; `None` at end of input
async fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let line = tokio::task::spawn_blocking(|| -> std::io::Result<Option<String>> {
        let mut buf = String::new();
        let n = std::io::stdin().read_line(&mut buf)?;
        Ok((n > 0).then_some(buf))
    })
    .await??;

    Ok(line.map(|l| l.trim().to_string()))
}

/// Prints controller state to the terminal
struct TerminalView;

impl View for TerminalView {
    fn render_playback(&self, state: &PlaybackState) {
        if let Some(line) = &state.line {
            tracing::debug!(%line, "playing line");
        }
    }

    fn render_script(&self, control: &ControlId, running: bool) {
        if running {
            println!("Playing {control} (Ctrl-C to stop)");
        }
    }

    fn render_listening(&self, active: Option<&ControlId>) {
        if active.is_some() {
            println!("Listening... type what you said and press Enter");
        }
    }

    fn fill_field(&self, _field: &FieldId, text: &str) {
        println!("heard: {text}");
    }

    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Recognizer that takes the transcript from a typed line
///
/// Stands in for a speech engine on terminals without one. An empty line
/// counts as unrecognized speech.
#[derive(Default)]
struct TypedRecognizer {
    events: Arc<Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>>,
}

impl Recognizer for TypedRecognizer {
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> hanzi_deck::Result<()> {
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);

        let slot = Arc::clone(&self.events);
        std::thread::Builder::new()
            .name("hanzi-typed-speech".to_string())
            .spawn(move || {
                let mut buf = String::new();
                let event = match std::io::stdin().read_line(&mut buf) {
                    Ok(_) if !buf.trim().is_empty() => {
                        RecognitionEvent::Result(buf.trim().to_string())
                    }
                    Ok(_) => RecognitionEvent::NoMatch,
                    Err(_) => RecognitionEvent::Error(
                        hanzi_deck::RecognitionErrorKind::AudioCapture,
                    ),
                };

                let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(tx) = sender {
                    let _ = tx.send(event);
                    let _ = tx.send(RecognitionEvent::End);
                }
            })?;

        Ok(())
    }

    fn stop(&self) {
        let sender = self.events.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tx) = sender {
            let _ = tx.send(RecognitionEvent::End);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["hanzi", "-vv", "practice", "是…的", "--goal", "3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Practice { goal: 3, .. }));

        let cli = Cli::try_parse_from(["hanzi", "script", "--situational", "at the bank"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Script { pattern: None, situational: Some(_) }
        ));
    }

    #[test]
    fn script_needs_a_source() {
        assert!(Cli::try_parse_from(["hanzi", "script"]).is_err());
    }

    #[test]
    fn chat_modes_conflict() {
        assert!(
            Cli::try_parse_from(["hanzi", "chat", "--pattern", "把", "--roleplay", "taxi"])
                .is_err()
        );
    }
}
