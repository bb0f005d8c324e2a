//! Terminal front end
//!
//! Reads source text and commands line by line, runs comparisons while
//! rendering committed progress, and collects votes.

use crate::api::{ArenaClient, LeaderboardEntry};
use crate::credentials::{require_token, BearerToken, StaticTokenSource, TokenSource};
use crate::error::AppError;
use crate::preferences::{self, Preferences, PreferencesError};
use crate::streaming::{
    DualState, DualStreamController, SessionOutcome, Side, SingleStreamController, StreamError,
    StreamStage, StreamState,
};
use crate::translation::{language_code_to_name, TranslationConfig};
use crate::voting::{Ballot, VoteChoice};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info, warn};

const HELP: &str = "\
Type text to compare two anonymous translations, then vote.
  :lang <code>            set the target language (e.g. de, ja)
  :prompt [text]          set or clear the custom prompt
  :template <name>        use a server prompt template as the custom prompt
  :single <model> <text>  translate with one model
  :token <value>          use this API token for the session
  :leaderboard            show model rankings
  :quit                   exit";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Compare(String),
    Lang(String),
    Prompt(Option<String>),
    Template(String),
    Single { model: String, text: String },
    Token(String),
    Leaderboard,
    Help,
    Quit,
    Empty,
    Invalid(&'static str),
}

pub(crate) fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return Command::Compare(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match name {
        "lang" if rest.is_empty() => Command::Invalid("usage: :lang <code>"),
        "lang" => Command::Lang(rest.to_string()),
        "prompt" if rest.is_empty() => Command::Prompt(None),
        "prompt" => Command::Prompt(Some(rest.to_string())),
        "template" if rest.is_empty() => Command::Invalid("usage: :template <name>"),
        "template" => Command::Template(rest.to_string()),
        "single" => match rest.split_once(char::is_whitespace) {
            Some((model, text)) if !text.trim().is_empty() => Command::Single {
                model: model.to_string(),
                text: text.trim().to_string(),
            },
            _ => Command::Invalid("usage: :single <model> <text>"),
        },
        "token" if rest.is_empty() => Command::Invalid("usage: :token <value>"),
        "token" => Command::Token(rest.to_string()),
        "leaderboard" => Command::Leaderboard,
        "help" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => Command::Invalid("unknown command, try :help"),
    }
}

fn stage_label(state: &StreamState) -> &'static str {
    match state.stage() {
        StreamStage::Idle => "waiting",
        StreamStage::Streaming => "streaming",
        StreamStage::Complete => "done",
        StreamStage::Failed => "failed",
        StreamStage::Cancelled => "stopped",
    }
}

/// One-line status of both sides
pub(crate) fn render_progress(state: &DualState) -> String {
    Side::BOTH
        .iter()
        .map(|&side| {
            let s = state.side(side);
            format!("{side}: {} ({} chars)", stage_label(s), s.text.chars().count())
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub(crate) fn render_output(label: &str, state: &StreamState) -> String {
    let mut out = format!("── {label} [{}] ──\n", stage_label(state));
    if !state.text.is_empty() {
        out.push_str(&state.text);
        out.push('\n');
    }
    if let Some(error) = &state.error {
        out.push_str(&format!("error: {error}\n"));
    }
    out
}

pub(crate) fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "No votes recorded yet.".to_string();
    }
    let width = entries.iter().map(|e| e.model.len()).max().unwrap_or(5).max(5);
    let mut out = format!(
        "  #  {:<width$}  {:>8}  {:>6}  {}\n",
        "model", "score", "votes", "W-L-T"
    );
    for (rank, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<width$}  {:>8.1}  {:>6}  {}\n",
            rank + 1,
            entry.model,
            entry.score,
            entry.votes,
            win_loss_tie(entry)
        ));
    }
    out
}

fn win_loss_tie(entry: &LeaderboardEntry) -> String {
    if entry.wins.is_none() && entry.losses.is_none() && entry.ties.is_none() {
        return "-".to_string();
    }
    let count = |n: Option<u64>| n.unwrap_or_default();
    format!(
        "{}-{}-{}",
        count(entry.wins),
        count(entry.losses),
        count(entry.ties)
    )
}

/// Run a session future, turning Ctrl-C into `stop()` until it returns.
async fn until_finished<F, S>(session: F, stop: S) -> F::Output
where
    F: Future,
    S: Fn(),
{
    tokio::pin!(session);
    loop {
        tokio::select! {
            output = &mut session => return output,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Ctrl-C handler unavailable");
                    return session.await;
                }
                info!("Interrupted, stopping translation");
                stop();
            }
        }
    }
}

/// Interactive driver over any line-oriented input
pub(crate) struct Console<R> {
    input: Lines<R>,
    client: Arc<ArenaClient>,
    tokens: Box<dyn TokenSource>,
    dual: Arc<DualStreamController>,
    single: Arc<SingleStreamController>,
    preferences_path: Option<PathBuf>,
    config: TranslationConfig,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub(crate) fn new(
        input: R,
        client: Arc<ArenaClient>,
        tokens: Box<dyn TokenSource>,
        dual: Arc<DualStreamController>,
        single: Arc<SingleStreamController>,
        preferences_path: Option<PathBuf>,
    ) -> Self {
        let prefs = preferences_path
            .as_deref()
            .map(preferences::load_preferences_from)
            .unwrap_or_default();
        Self {
            input: input.lines(),
            client,
            tokens,
            dual,
            single,
            preferences_path,
            config: TranslationConfig::from_preferences(&prefs),
        }
    }

    /// Process input until `:quit` or end of input.
    pub(crate) async fn run(&mut self) -> Result<(), AppError> {
        println!(
            "Translating into {}. Type :help for commands.",
            language_code_to_name(&self.config.target_language)
        );
        while let Some(line) = self.input.next_line().await? {
            let result = match parse_command(&line) {
                Command::Quit => break,
                Command::Empty => Ok(()),
                Command::Help => {
                    println!("{HELP}");
                    Ok(())
                }
                Command::Invalid(usage) => {
                    println!("{usage}");
                    Ok(())
                }
                Command::Compare(text) => self.compare(&text).await,
                Command::Lang(code) => self.set_language(&code),
                Command::Prompt(prompt) => self.set_prompt(prompt),
                Command::Template(name) => self.use_template(&name).await,
                Command::Single { model, text } => self.translate_single(&model, &text).await,
                Command::Token(raw) => self.set_token(raw),
                Command::Leaderboard => self.show_leaderboard().await,
            };
            if let Err(e) = result {
                // I/O failures on the console itself end the loop
                if let AppError::Io(_) = e {
                    return Err(e);
                }
                warn!(error = %e, "Command failed");
                println!("Error: {e}");
            }
        }
        Ok(())
    }

    async fn compare(&mut self, text: &str) -> Result<(), AppError> {
        let token = require_token(self.tokens.as_ref())?;
        let pair = self
            .client
            .suggest_models(token.as_str(), &self.config.target_language)
            .await?;
        let request = self
            .config
            .comparison(text, &pair.model_a, &pair.model_b);

        let mut rx = self.dual.subscribe();
        let progress = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let line = render_progress(&rx.borrow_and_update());
                eprint!("\r{line}");
            }
        });
        let dual = self.dual.clone();
        // Stop even when no model is streaming; the connection may still be open
        let outcome = until_finished(self.dual.start(Some(token.as_str()), &request), || {
            debug!(any_streaming = dual.any_streaming(), "Stopping comparison");
            dual.stop()
        })
        .await;
        progress.abort();
        eprintln!();

        let state = self.dual.state();
        match outcome {
            Err(StreamError::Validation(message)) => println!("{message}"),
            Err(StreamError::Busy) => println!("A comparison is already running"),
            Ok(outcome) => {
                print!("{}", render_output("Model A", &state.a));
                print!("{}", render_output("Model B", &state.b));
                match outcome {
                    SessionOutcome::Finished if self.dual.both_complete() => {
                        self.collect_vote(&token, &state, &pair.model_a, &pair.model_b)
                            .await?
                    }
                    SessionOutcome::Finished => println!("Comparison ended with errors."),
                    SessionOutcome::Cancelled => println!("Stopped."),
                    SessionOutcome::Failed(message) => println!("Comparison failed: {message}"),
                }
            }
        }
        self.dual.reset();
        Ok(())
    }

    async fn collect_vote(
        &mut self,
        token: &BearerToken,
        state: &DualState,
        model_a: &str,
        model_b: &str,
    ) -> Result<(), AppError> {
        if let Err(e) = Ballot::from_state(state, VoteChoice::Tie) {
            println!("Voting unavailable: {e}");
            return Ok(());
        }

        print!("Which is better? [a / b / tie / bad, empty to skip] ");
        std::io::stdout().flush()?;
        let Some(answer) = self.input.next_line().await? else {
            return Ok(());
        };
        if answer.trim().is_empty() {
            return Ok(());
        }

        let ballot = Ballot::from_state(state, answer.parse()?)?;
        self.client.submit_vote(token.as_str(), &ballot).await?;
        println!("Vote recorded. Model A was {model_a}, Model B was {model_b}.");
        Ok(())
    }

    async fn translate_single(&mut self, model: &str, text: &str) -> Result<(), AppError> {
        let token = self.tokens.bearer_token();
        let request = self.config.request(text);
        let single = self.single.clone();
        let outcome = until_finished(
            self.single
                .start(token.as_ref().map(BearerToken::as_str), model, &request),
            || single.stop(),
        )
        .await;
        println!();

        match outcome {
            Err(e) => println!("{e}"),
            Ok(SessionOutcome::Cancelled) => println!("Stopped."),
            Ok(_) => {
                let state = self.single.state();
                if let Some(error) = &state.error {
                    println!("{model} failed: {error}");
                }
            }
        }
        self.single.reset();
        Ok(())
    }

    fn set_token(&mut self, raw: String) -> Result<(), AppError> {
        let token = BearerToken::new(raw)?;
        self.tokens = Box::new(StaticTokenSource::new(Some(token)));
        println!("Token set for this session.");
        Ok(())
    }

    fn update_preferences<F>(&mut self, update: F) -> Result<(), PreferencesError>
    where
        F: FnOnce(&mut Preferences),
    {
        let path = self
            .preferences_path
            .clone()
            .ok_or(PreferencesError::NoConfigDir)?;
        let mut prefs = preferences::load_preferences_from(&path);
        update(&mut prefs);
        preferences::save_preferences_to(&path, &prefs)?;
        self.config = TranslationConfig::from_preferences(&prefs);
        Ok(())
    }

    fn set_language(&mut self, code: &str) -> Result<(), AppError> {
        let code = code.trim().to_string();
        self.update_preferences(|prefs| prefs.target_language = Some(code))?;
        println!(
            "Translating into {}.",
            language_code_to_name(&self.config.target_language)
        );
        Ok(())
    }

    fn set_prompt(&mut self, prompt: Option<String>) -> Result<(), AppError> {
        let cleared = prompt.is_none();
        self.update_preferences(|prefs| prefs.custom_prompt = prompt)?;
        println!("{}", if cleared { "Custom prompt cleared." } else { "Custom prompt saved." });
        Ok(())
    }

    async fn use_template(&mut self, name: &str) -> Result<(), AppError> {
        let token = require_token(self.tokens.as_ref())?;
        let template = self.client.prompt_template(token.as_str(), name).await?;
        self.update_preferences(|prefs| prefs.custom_prompt = Some(template.template))?;
        println!("Using template '{}' as the custom prompt.", template.name);
        Ok(())
    }

    async fn show_leaderboard(&mut self) -> Result<(), AppError> {
        let token = self.tokens.bearer_token();
        let entries = self
            .client
            .leaderboard(token.as_ref().map(BearerToken::as_str))
            .await?;
        print!("{}", render_leaderboard(&entries));
        Ok(())
    }

    #[cfg(test)]
    fn config(&self) -> &TranslationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::streaming::{DualCallbacks, SingleCallbacks, DEFAULT_DEBOUNCE};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(
            parse_command("Good morning"),
            Command::Compare("Good morning".to_string())
        );
        assert_eq!(parse_command(":lang de"), Command::Lang("de".to_string()));
        assert_eq!(parse_command(":prompt"), Command::Prompt(None));
        assert_eq!(
            parse_command(":prompt  Keep it formal "),
            Command::Prompt(Some("Keep it formal".to_string()))
        );
        assert_eq!(
            parse_command(":single m-1 Hello there"),
            Command::Single {
                model: "m-1".to_string(),
                text: "Hello there".to_string()
            }
        );
        assert!(matches!(parse_command(":single m-1"), Command::Invalid(_)));
        assert!(matches!(parse_command(":lang"), Command::Invalid(_)));
        assert!(matches!(parse_command(":frobnicate"), Command::Invalid(_)));
        assert_eq!(parse_command(":leaderboard"), Command::Leaderboard);
        assert_eq!(parse_command(":q"), Command::Quit);
    }

    #[test]
    fn test_render_progress() {
        let state = DualState {
            a: StreamState {
                text: "Grüße".to_string(),
                is_streaming: true,
                ..StreamState::default()
            },
            b: StreamState {
                is_complete: true,
                ..StreamState::default()
            },
        };
        assert_eq!(
            render_progress(&state),
            "Model A: streaming (5 chars) | Model B: done (0 chars)"
        );
    }

    #[test]
    fn test_render_leaderboard() {
        let entries = vec![
            LeaderboardEntry {
                model: "m-1".to_string(),
                score: 1012.25,
                votes: 7,
                wins: Some(4),
                losses: Some(2),
                ties: None,
            },
            LeaderboardEntry {
                model: "m-2".to_string(),
                score: 980.0,
                votes: 3,
                wins: None,
                losses: None,
                ties: None,
            },
        ];
        let table = render_leaderboard(&entries);
        let rows: Vec<&str> = table.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].contains("m-1") && rows[1].ends_with("4-2-0"));
        assert!(rows[2].contains("m-2") && rows[2].ends_with('-'));
        assert!(table.contains("1012.2") || table.contains("1012.3"));
        assert_eq!(render_leaderboard(&[]), "No votes recorded yet.");
    }

    fn make_console(
        server: &MockServer,
        input: &'static [u8],
        prefs: PathBuf,
    ) -> Console<&'static [u8]> {
        let config = ApiConfig {
            base_url: format!("{}/api", server.uri()),
            request_timeout_secs: 5,
            connect_timeout_secs: 5,
            stream_idle_timeout_secs: 5,
            max_retries: 0,
        };
        let client = Arc::new(ArenaClient::new(&config).expect("client"));
        let dual = Arc::new(DualStreamController::new(
            client.clone(),
            DualCallbacks::default(),
            DEFAULT_DEBOUNCE,
        ));
        let single = Arc::new(SingleStreamController::new(
            client.clone(),
            SingleCallbacks::default(),
            DEFAULT_DEBOUNCE,
        ));
        let token = BearerToken::new("tok").expect("token");
        Console::new(
            input,
            client,
            Box::new(StaticTokenSource::new(Some(token))),
            dual,
            single,
            Some(prefs),
        )
    }

    #[tokio::test]
    async fn test_compare_then_vote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models/suggest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "model_a": "m-a", "model_b": "m-b" })),
            )
            .mount(&server)
            .await;
        let body = "data: {\"channel\":\"A\",\"chunk\":\"Hallo\",\"complete\":true,\"output_id\":\"oa\"}\n\n\
                    data: {\"channel\":\"B\",\"chunk\":\"Servus\",\"complete\":true,\"output_id\":\"ob\"}\n\n";
        Mock::given(method("POST"))
            .and(path("/api/translate/compare/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/votes"))
            .and(body_json(json!({
                "output_a_id": "oa",
                "output_b_id": "ob",
                "winner": "model_b"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let mut console = make_console(&server, b"Hello\nb\n:quit\n", dir.path().join("prefs.json"));
        console.run().await.expect("console runs");
    }

    #[tokio::test]
    async fn test_language_and_prompt_are_persisted() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs_path = dir.path().join("prefs.json");

        let mut console = make_console(
            &server,
            b":lang ja\n:prompt Use polite form\n",
            prefs_path.clone(),
        );
        console.run().await.expect("console runs");

        assert_eq!(console.config().target_language, "ja");
        assert_eq!(
            console.config().custom_prompt.as_deref(),
            Some("Use polite form")
        );
        let stored = preferences::load_preferences_from(&prefs_path);
        assert_eq!(stored.target_language.as_deref(), Some("ja"));

        let mut console = make_console(&server, b":prompt\n", prefs_path.clone());
        console.run().await.expect("console runs");
        assert_eq!(console.config().custom_prompt, None);
        assert_eq!(console.config().target_language, "ja");
    }
}
