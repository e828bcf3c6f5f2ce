use anyhow::Result;
use std::process;

use nosh_core::service::{ChatOutcome, NoshService};

pub(crate) fn cmd_ask(
    service: &NoshService,
    query: &str,
    grams: Option<u32>,
    json: bool,
) -> Result<()> {
    let outcome = service.answer(query, grams);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.to_response())?);
        if !matches!(outcome, ChatOutcome::Answer(_)) {
            process::exit(2);
        }
        return Ok(());
    }

    match outcome {
        ChatOutcome::Answer(answer) => {
            println!("{}", answer.text);
            let confidence = answer.confidence;
            if confidence < 1.0 {
                eprintln!("(matched '{}', confidence {confidence})", answer.matched_name);
            }
        }
        ChatOutcome::MissingQuery { message } | ChatOutcome::NotFound { message, .. } => {
            eprintln!("{message}");
            process::exit(2);
        }
    }

    Ok(())
}
