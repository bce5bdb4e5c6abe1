//! CourseChat CLI
//!
//! A line-oriented terminal front-end for a chat session.

use anyhow::Context;
use coursechat::{
    auth::HttpAuthClient,
    catalog::{CatalogProvider, StaticCatalog},
    config::ChatConfig,
    context::ContextBinder,
    session::{ChatSession, HydrationOutcome, SubmitOutcome},
    store::{Author, Message},
    transport::HttpTransport,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /courses, /bind <course> <document>, /unbind, /history, /resend <id>, /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    coursechat::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "coursechat.json".to_string());
    let config = ChatConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path))?;

    let username = std::env::var("COURSECHAT_USER").context("COURSECHAT_USER is not set")?;
    let password = std::env::var("COURSECHAT_PASSWORD").context("COURSECHAT_PASSWORD is not set")?;

    let auth = Arc::new(HttpAuthClient::new(&config)?);
    let identity = auth.login(&username, &password).await.context("login failed")?;
    println!("Signed in as {}", identity.username);

    let transport = Arc::new(HttpTransport::new(&config)?);
    let (session, hydration) = ChatSession::mount(transport, auth, config.retry.clone()).await?;
    match hydration {
        HydrationOutcome::Loaded(count) => println!("Loaded {} messages", count),
        HydrationOutcome::Failed(failure) => {
            println!("Warning: history unavailable ({})", failure.reason)
        }
        HydrationOutcome::Discarded => {}
    }
    print_log(&session.messages().await);

    let catalog = StaticCatalog::builtin();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut words = line.split_whitespace();

        match words.next() {
            Some("/quit") => break,
            Some("/help") => println!("{}", HELP),
            Some("/courses") => {
                for course in catalog.courses() {
                    println!("[{}] {}", course.id, course.title);
                    for doc in ContextBinder::choices(&catalog, course.id) {
                        println!("    ({}) {} - {}", doc.id, doc.name, doc.locator);
                    }
                }
            }
            Some("/bind") => {
                let ids: Vec<u64> = words.filter_map(|w| w.parse().ok()).collect();
                match ids.as_slice() {
                    [course_id, document_id] => {
                        session.bind(*course_id, *document_id).await;
                        println!("Context: course {} document {}", course_id, document_id);
                    }
                    _ => println!("Usage: /bind <course> <document>"),
                }
            }
            Some("/unbind") => {
                session.clear_context().await;
                println!("Context cleared");
            }
            Some("/history") => print_log(&session.messages().await),
            Some("/resend") => match words.next() {
                Some(id) => match session.resend(id).await {
                    Ok(outcome) => print_outcome(&session, &outcome).await,
                    Err(e) => println!("Cannot resend: {}", e),
                },
                None => println!("Usage: /resend <id>"),
            },
            _ => match session.submit(line).await {
                Ok(outcome) => print_outcome(&session, &outcome).await,
                Err(e) => println!("Error: {}", e),
            },
        }
    }

    session.unmount().await;
    Ok(())
}

async fn print_outcome(session: &ChatSession, outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Ignored | SubmitOutcome::Discarded { .. } => {}
        SubmitOutcome::Confirmed { reply_id, .. } => {
            if let Some(reply) = match reply_id {
                Some(id) => session.message(id).await,
                None => None,
            } {
                print_message(&reply);
            }
        }
        SubmitOutcome::Failed {
            message_id,
            failure,
        } => println!("✗ {} (resend with /resend {})", failure.reason, message_id),
    }
}

fn print_log(messages: &[Message]) {
    for message in messages {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let who = match message.author {
        Author::User => "you",
        Author::Assistant => "assistant",
    };
    println!(
        "{} {}: {} [{}]",
        message.status_indicator(),
        who,
        message.text,
        message.status_text()
    );
}
