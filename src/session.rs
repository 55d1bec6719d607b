use crate::controller::InteractionState;
use crate::dashboard::{Dashboard, Update};
use crate::models::Label;
use crate::output;
use anyhow::{Context, Result};
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
Commands:
  analyze <text>     classify a piece of text
  close              collapse the current result
  feedback           open the correction prompt for the current result
  label <label>      send a correction (normal, offensive, hate or 0-2)
  cancel             close the correction prompt
  next | prev        page through prediction history
  history            show the history table
  analytics          show the analytics dashboard
  refresh            re-fetch analytics
  help               show this message
  quit               leave the session";

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Analyze(String),
    Close,
    Feedback,
    Label(Label),
    Cancel,
    Next,
    Prev,
    History,
    Analytics,
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a label, use normal, offensive or hate")]
    BadLabel(String),
}

impl SessionCommand {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "analyze" | "a" => {
                if rest.is_empty() {
                    return Err(ParseError::MissingArgument("analyze"));
                }
                Self::Analyze(rest.to_string())
            }
            "close" => Self::Close,
            "feedback" | "f" => Self::Feedback,
            "label" => {
                if rest.is_empty() {
                    return Err(ParseError::MissingArgument("label"));
                }
                let label =
                    Label::from_str(rest).map_err(|_| ParseError::BadLabel(rest.to_string()))?;
                Self::Label(label)
            }
            "cancel" => Self::Cancel,
            "next" | "n" => Self::Next,
            "prev" | "p" => Self::Prev,
            "history" | "h" => Self::History,
            "analytics" | "stats" => Self::Analytics,
            "refresh" | "r" => Self::Refresh,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Apply one command to the dashboard. Returns the immediate reply and the
/// view to show once its background fetch lands.
fn execute(
    dashboard: &mut Dashboard,
    command: SessionCommand,
    featured_model: &str,
) -> (String, Option<Update>) {
    let reply = match command {
        SessionCommand::Analyze(text) => match dashboard.analyze(&text) {
            Ok(()) => output::render_controller(dashboard.controller()),
            Err(rejected) => format!("Cannot analyze: {}\n", rejected),
        },
        SessionCommand::Close => {
            dashboard.close_result();
            output::render_controller(dashboard.controller())
        }
        SessionCommand::Feedback => {
            if !dashboard.open_feedback() {
                return ("There is no expanded result to correct.\n".to_string(), None);
            }
            output::render_controller(dashboard.controller())
        }
        SessionCommand::Label(label) => {
            if dashboard.controller().state() != InteractionState::FeedbackOpen {
                return ("Open the correction prompt with 'feedback' first.\n".to_string(), None);
            }
            if !dashboard.submit_feedback(label) {
                return ("A correction is already being sent.\n".to_string(), None);
            }
            output::render_controller(dashboard.controller())
        }
        SessionCommand::Cancel => {
            dashboard.cancel_feedback();
            output::render_controller(dashboard.controller())
        }
        SessionCommand::Next => return page_history(dashboard, Dashboard::next_page),
        SessionCommand::Prev => return page_history(dashboard, Dashboard::prev_page),
        SessionCommand::History => {
            let mut out = output::render_history(dashboard.history());
            out.push_str(&output::render_breakdown(&dashboard.history().class_breakdown()));
            out
        }
        SessionCommand::Analytics => output::render_analytics(dashboard.analytics(), featured_model),
        SessionCommand::Refresh => {
            dashboard.refresh_analytics();
            return ("Refreshing analytics...\n".to_string(), Some(Update::Analytics));
        }
        SessionCommand::Help => format!("{}\n", HELP),
        SessionCommand::Quit => String::new(),
    };
    (reply, None)
}

fn page_history(
    dashboard: &mut Dashboard,
    step: fn(&mut Dashboard) -> bool,
) -> (String, Option<Update>) {
    if !step(dashboard) {
        return ("No page in that direction.\n".to_string(), None);
    }
    ("Loading page...\n".to_string(), Some(Update::History))
}

/// Render a completed update. Prediction changes always show; view
/// refreshes only when the user is waiting for that view.
fn render_update(
    dashboard: &Dashboard,
    update: Update,
    watching: &mut Option<Update>,
    featured_model: &str,
) -> Option<String> {
    match update {
        Update::Prediction => Some(output::render_controller(dashboard.controller())),
        Update::History if *watching == Some(update) && !dashboard.history().is_loading() => {
            *watching = None;
            Some(output::render_history(dashboard.history()))
        }
        Update::Analytics if *watching == Some(update) && !dashboard.analytics().is_loading() => {
            *watching = None;
            Some(output::render_analytics(dashboard.analytics(), featured_model))
        }
        Update::History | Update::Analytics => None,
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}

/// Read commands from stdin until `quit` or end of input, applying
/// background completions as they arrive
pub async fn run(dashboard: &mut Dashboard, featured_model: &str) -> Result<()> {
    dashboard.start();
    dashboard.settle().await;
    println!("{}", HELP);
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut watching = None;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                match SessionCommand::parse(&line) {
                    Ok(Some(SessionCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        debug!(?command, "session command");
                        let (reply, watch) = execute(dashboard, command, featured_model);
                        print!("{}", reply);
                        if watch.is_some() {
                            watching = watch;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
                prompt()?;
            }
            Some(update) = dashboard.next_completion() => {
                if let Some(text) = render_update(dashboard, update, &mut watching, featured_model) {
                    print!("\n{}", text);
                    prompt()?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DashboardDataClient;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            SessionCommand::parse("analyze you are stupid").unwrap(),
            Some(SessionCommand::Analyze("you are stupid".to_string()))
        );
        assert_eq!(SessionCommand::parse("  NEXT ").unwrap(), Some(SessionCommand::Next));
        assert_eq!(SessionCommand::parse("q").unwrap(), Some(SessionCommand::Quit));
        assert_eq!(
            SessionCommand::parse("label hate").unwrap(),
            Some(SessionCommand::Label(Label::Hate))
        );
        assert_eq!(
            SessionCommand::parse("label 0").unwrap(),
            Some(SessionCommand::Label(Label::Normal))
        );
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(SessionCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            SessionCommand::parse("analyze"),
            Err(ParseError::MissingArgument("analyze"))
        );
        assert_eq!(
            SessionCommand::parse("label angry"),
            Err(ParseError::BadLabel("angry".to_string()))
        );
        assert!(matches!(
            SessionCommand::parse("dance"),
            Err(ParseError::Unknown(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_analyze_and_correct() {
        let mut server = mockito::Server::new_async().await;
        let _predict = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_body(
                json!({"label": 1, "confidence": 0.87, "language": "en", "latency_ms": 42})
                    .to_string(),
            )
            .create_async()
            .await;
        let _feedback = server
            .mock("POST", "/feedback")
            .with_status(200)
            .with_body(json!({"status": "ok"}).to_string())
            .create_async()
            .await;
        let _history = server
            .mock("GET", "/history")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(json!({"data": [], "pages": 0}).to_string())
            .create_async()
            .await;
        let _analytics = server
            .mock("GET", "/analytics")
            .with_status(200)
            .with_body(json!({"total_predictions": 1}).to_string())
            .create_async()
            .await;

        let client = DashboardDataClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let mut dashboard = Dashboard::new(client, 20);

        let (out, _) = execute(
            &mut dashboard,
            SessionCommand::Analyze("you are stupid".to_string()),
            "BiLSTM",
        );
        assert!(out.contains("Analyzing..."));
        dashboard.settle().await;
        let out = output::render_controller(dashboard.controller());
        assert!(out.contains("Offensive"));
        assert!(out.contains("87.0%"));

        let (out, _) = execute(&mut dashboard, SessionCommand::Label(Label::Hate), "BiLSTM");
        assert!(out.contains("'feedback' first"));

        execute(&mut dashboard, SessionCommand::Feedback, "BiLSTM");
        let (out, _) = execute(&mut dashboard, SessionCommand::Label(Label::Hate), "BiLSTM");
        assert!(out.contains("Sending feedback..."));
        dashboard.settle().await;
        assert!(output::render_controller(dashboard.controller()).contains("Feedback saved. Thank you!"));

        let (out, _) = execute(&mut dashboard, SessionCommand::Analytics, "BiLSTM");
        assert!(out.contains("Total Predictions: 1"));
    }

    #[tokio::test]
    async fn test_refresh_shows_analytics_when_it_lands() {
        let mut server = mockito::Server::new_async().await;
        let _analytics = server
            .mock("GET", "/analytics")
            .with_status(200)
            .with_body(json!({"total_predictions": 7}).to_string())
            .create_async()
            .await;
        let client = DashboardDataClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let mut dashboard = Dashboard::new(client, 20);

        let (out, watch) = execute(&mut dashboard, SessionCommand::Refresh, "BiLSTM");
        assert!(out.contains("Refreshing"));
        let mut watching = watch;

        let update = dashboard.next_completion().await.unwrap();
        assert_eq!(update, Update::Analytics);
        let text = render_update(&dashboard, update, &mut watching, "BiLSTM").unwrap();
        assert!(text.contains("Total Predictions: 7"));
        assert!(watching.is_none());
        assert!(render_update(&dashboard, update, &mut watching, "BiLSTM").is_none());
    }
}
