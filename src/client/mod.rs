pub mod commands;
pub mod consumer;
pub mod dispatcher;
pub mod image;
pub mod render;
pub mod store;
pub mod transport;

use crate::cli::ChatArgs;
use commands::{ parse_input, suggest, Input };
use dispatcher::{ Dispatch, Dispatcher, Outcome };
use image::ImageClient;
use log::info;
use render::TranscriptPrinter;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use store::SessionStore;
use tokio::io::{ AsyncBufReadExt, BufReader };
use transport::RelayClient;

/// Interactive loop: one line of input per turn, transcript printed as it streams.
pub async fn run(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("Relay endpoint: {}", args.relay_url);
    info!("Image endpoint: {}", args.image_base_url);

    let store = SessionStore::new();
    let dispatcher = Dispatcher::new(
        store.clone(),
        Arc::new(RelayClient::new(args.relay_url.clone())),
        ImageClient::new(&args.image_base_url)?,
        args.model.clone(),
        args.temperature
    );

    let mut updates = store.subscribe();
    let renderer = tokio::spawn(async move {
        let mut printer = TranscriptPrinter::new();
        loop {
            let snapshot = updates.borrow_and_update().clone();
            let out = printer.render(&snapshot);
            if !out.is_empty() {
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(out.as_bytes());
                let _ = stdout.flush();
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    });

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input.next_line().await? {
        let parsed = parse_input(&line);
        if let Input::Unknown(_) = &parsed {
            let hints: Vec<_> = suggest(line.trim()).iter().map(|c| c.usage).collect();
            if !hints.is_empty() {
                println!("Did you mean: {}", hints.join(", "));
            }
        }
        // Input is read while a reply streams; the pending turn makes later sends Busy.
        match dispatcher.start(parsed) {
            Dispatch::Started(job) => {
                tokio::spawn(job.run());
            }
            Dispatch::Done(Outcome::Busy) => println!("(still answering, wait for the reply to finish)"),
            Dispatch::Done(Outcome::Notice(text)) => println!("{}", text),
            Dispatch::Done(_) => {}
        }
    }

    drop(dispatcher);
    drop(store);
    let _ = renderer.await;
    Ok(())
}
