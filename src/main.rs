// Headless quizlink player: drives PlayerClient from stdin commands

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use tracing::{error, info, warn};

use quizlink::client::config::Config;
use quizlink::client::logging::init_logging;
use quizlink::client::PlayerClient;
use quizlink::core::session::SessionEvent;
use quizlink::core::types::AnswerValue;

const FRAME: Duration = Duration::from_millis(20);

const HELP: &str = "commands: team <name> | answer <value> | buzz <sound> | photo <path> | \
                    away | back | blur | focus | status | quit";

enum Command {
    Team(String),
    Answer(String),
    Buzz(String),
    Photo(PathBuf),
    Visible(bool),
    Focused(bool),
    Status,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match word.to_ascii_lowercase().as_str() {
        "team" if !rest.is_empty() => Command::Team(rest.to_string()),
        "answer" if !rest.is_empty() => Command::Answer(rest.to_string()),
        "buzz" if !rest.is_empty() => Command::Buzz(rest.to_string()),
        "photo" if !rest.is_empty() => Command::Photo(PathBuf::from(rest)),
        "away" => Command::Visible(false),
        "back" => Command::Visible(true),
        "blur" => Command::Focused(false),
        "focus" => Command::Focused(true),
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::PhaseChanged { from, to } => info!(from = ?from, to = ?to, "Screen changed"),
        SessionEvent::Revealed { correct: Some(true) } => info!("Correct!"),
        SessionEvent::Revealed { correct: Some(false) } => info!("Not this time"),
        SessionEvent::IdentityCleared { reason } => {
            warn!(reason = ?reason, "Team name declined, pick another with `team <name>`")
        }
        other => info!(event = ?other, "Session"),
    }
}

/// Returns false when the user asked to quit
fn apply(client: &mut PlayerClient, command: Command) -> bool {
    match command {
        Command::Team(name) => {
            client.submit_team_name(&name);
        }
        Command::Answer(value) => {
            let outcome = client.submit_answer(AnswerValue::from(value));
            info!(outcome = ?outcome, "Answer");
        }
        Command::Buzz(sound) => {
            client.select_buzzer(&sound);
        }
        Command::Photo(path) => match client.update_team_photo(Path::new(&path)) {
            Ok(sent) => info!(sent, "Team photo updated"),
            Err(e) => error!(error = %e, "Team photo rejected"),
        },
        Command::Visible(visible) => client.report_visibility(visible),
        Command::Focused(focused) => client.report_focus(focused),
        Command::Status => match serde_json::to_string_pretty(&client.snapshot()) {
            Ok(json) => println!("status: {:?}\n{}", client.status(), json),
            Err(e) => error!(error = %e, "Could not render status"),
        },
        Command::Quit => return false,
    }
    true
}

fn main() -> ExitCode {
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_file = (!config.logging.log_file.is_empty())
        .then(|| PathBuf::from(&config.logging.log_file));
    init_logging(config.logging.console, log_file);
    if let Some(e) = config_error {
        warn!(error = %e, "[config] Using defaults");
    }

    let mut client = match PlayerClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to initialize player");
            return ExitCode::FAILURE;
        }
    };
    info!(device_id = %client.identity().device_id, "{}", HELP);
    client.start();

    let input = spawn_stdin_reader();
    loop {
        match input.try_recv() {
            Ok(line) => match parse_command(&line) {
                Some(command) => {
                    if !apply(&mut client, command) {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!("{}", HELP),
            },
            // stdin closed: keep playing
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }

        for event in client.update() {
            log_event(&event);
        }

        if let Some(e) = client.terminal_error() {
            error!(error = %e, "Giving up");
            client.shutdown();
            return ExitCode::FAILURE;
        }

        thread::sleep(FRAME);
    }

    client.shutdown();
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_command("team  Night Owls "), Some(Command::Team(t)) if t == "Night Owls"));
        assert!(matches!(parse_command("ANSWER 42"), Some(Command::Answer(a)) if a == "42"));
        assert!(matches!(parse_command("away"), Some(Command::Visible(false))));
        assert!(matches!(parse_command("focus"), Some(Command::Focused(true))));
        assert!(matches!(parse_command("quit"), Some(Command::Quit)));
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        assert!(parse_command("team").is_none());
        assert!(parse_command("answer   ").is_none());
        assert!(parse_command("dance").is_none());
    }
}
