//! Interactive session: the terminal stand-in for the single-page app.

use super::{build_session, send_and_print};
use crate::render::{self, Transcript};
use anyhow::Result;
use derma_application::DermaSession;
use derma_core::BackendConfig;
use derma_core::image::SelectedFile;
use derma_core::notification::NotificationQueue;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  /image <path>  select an image (clears the previous result)
  /analyze       analyze the selected image
  /result        show the current analysis result
  /clear         clear the image and its result
  /reset         start the conversation over
  /help          show this help
  /quit          exit
Anything else is sent to the assistant.";

/// A parsed line of input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Image(&'a str),
    Analyze,
    Result,
    Clear,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Message(trimmed);
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    match name {
        "image" => Command::Image(argument),
        "analyze" => Command::Analyze,
        "result" => Command::Result,
        "clear" => Command::Clear,
        "reset" => Command::Reset,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    }
}

pub async fn run(config: BackendConfig) -> Result<()> {
    let (session, notifications) = build_session(config);
    println!("Derma-AI assistant (backend: {})", session.config().base_url());
    println!("Type /help for commands.\n");

    let mut transcript = Transcript::new();
    transcript.render(&session.snapshot().await);
    transcript.print();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Command::Quit => break,
            Command::Help => println!("{}\n", HELP),
            Command::Unknown(name) => eprintln!("Unknown command '/{}'. Type /help.", name),
            Command::Image(path) => select_image(&session, &notifications, path).await,
            Command::Analyze => match session.analyze().await {
                Some(result) => render::print_prediction(&result),
                None => eprintln!("Select an image first with /image <path>."),
            },
            Command::Result => match session.prediction().await {
                Some(result) => render::print_prediction(&result),
                None => println!("Upload and analyze an image to see results.\n"),
            },
            Command::Clear => {
                session.clear_image().await;
                println!("Image cleared.\n");
            }
            Command::Reset => {
                session.reset_conversation().await;
                transcript = Transcript::new();
                transcript.render(&session.snapshot().await);
                transcript.print();
            }
            Command::Message("") => {}
            Command::Message(text) => {
                send_and_print(&session, &mut transcript, &notifications, text).await;
            }
        }
    }

    Ok(())
}

async fn select_image(session: &DermaSession, notifications: &NotificationQueue, path: &str) {
    if path.is_empty() {
        eprintln!("Usage: /image <path>");
        return;
    }

    match SelectedFile::from_path(path).await {
        Ok(file) => {
            if let Err(e) = session.select_image(file).await {
                tracing::debug!("Image rejected: {}", e);
            }
        }
        Err(e) => eprintln!("{}", e),
    }
    render::print_notifications(notifications);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("/image  ~/spot.png "), Command::Image("~/spot.png"));
        assert_eq!(parse("/image"), Command::Image(""));
        assert_eq!(parse("/analyze"), Command::Analyze);
        assert_eq!(parse("  /quit"), Command::Quit);
        assert_eq!(parse("/exit"), Command::Quit);
        assert_eq!(parse("/bogus arg"), Command::Unknown("bogus"));
        assert_eq!(parse("  is it eczema? "), Command::Message("is it eczema?"));
        assert_eq!(parse("   "), Command::Message(""));
    }
}
