//! Interactive terminal chat with the model.

use crate::config::{BotConfig, InferenceConfig};
use crate::conversation::ConversationTurn;
use crate::error::Result;
use crate::llm::TogetherClient;
use tokio::io::{AsyncBufReadExt as _, BufReader};

const HELP_TEXT: &str = "Available commands:\n\
  /help   - show this help message\n\
  /clear  - clear conversation history\n\
  /config - show current configuration\n\
  /exit   - exit the chat";

/// Run the chat REPL until `/exit` or end of input.
pub async fn run(inference: InferenceConfig, bot: BotConfig) -> Result<()> {
    let client = TogetherClient::new(inference)?;
    let mut history: Vec<ConversationTurn> = Vec::new();

    println!("Chat started. Type /help for available commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            match command {
                "exit" => break,
                "help" => println!("{HELP_TEXT}"),
                "clear" => {
                    history.clear();
                    println!("Conversation history cleared.");
                }
                "config" => print_config(&client, &bot),
                other => println!("Unknown command: /{other}"),
            }
            continue;
        }

        match client.generate_reply(&history, input, &bot.system_prompt).await {
            Ok(reply) => {
                println!("\nAssistant:\n{reply}\n");
                history.push(ConversationTurn {
                    speaker: "you".into(),
                    input: input.to_string(),
                    response: Some(reply),
                });
            }
            Err(error) => {
                tracing::error!(%error, "chat completion failed");
                eprintln!("Error: {error}");
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_prompt() -> Result<()> {
    use std::io::Write as _;
    print!("you> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn print_config(client: &TogetherClient, bot: &BotConfig) {
    let model = client.model_config();
    println!(
        "Model: {}\nTemperature: {}\nTop-p: {}\nTop-k: {}\nMax tokens: {}\nCooldown: {}s",
        model.model,
        model.temperature,
        model.top_p,
        model.top_k,
        model
            .max_tokens
            .map(|n| n.to_string())
            .unwrap_or_else(|| "service default".into()),
        bot.cooldown.as_secs(),
    );
}
