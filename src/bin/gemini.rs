//! Command-line interface for the Gemini connector.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use futures_util::StreamExt;

use gemini_connector::{init_tracing, Client, GeminiConfig};

#[derive(Parser)]
#[command(name = "gemini", version, about = "Gemini AI connector")]
struct Args {
    /// Path to a JSON configuration file (defaults to environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prompt for text generation
    #[arg(short, long)]
    prompt: Option<String>,

    /// Start interactive chat mode
    #[arg(long)]
    chat: bool,

    /// Validate the connection and exit
    #[arg(long)]
    validate: bool,

    /// Print information about the configured model
    #[arg(long)]
    model_info: bool,

    /// Stream the response chunk by chunk
    #[arg(long)]
    stream: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run(Args::parse()).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => GeminiConfig::from_file(path)?,
        None => GeminiConfig::from_env()?,
    };
    let _log_guard = init_tracing(&config.log_level, config.log_file.as_deref());

    let client = Client::new(config)?;

    if args.validate {
        let ok = client.validate_connection().await;
        println!(
            "Connection validation: {}",
            if ok { "SUCCESS" } else { "FAILED" }
        );
    } else if args.model_info {
        let report = client.model_info().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if args.chat {
        run_chat_loop(&client).await;
    } else if let Some(prompt) = &args.prompt {
        if args.stream {
            println!("Streaming response:");
            let mut stream = client.generate_text_stream(prompt).await?;
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                write!(stdout, "{}", chunk?)?;
                stdout.flush()?;
            }
            println!();
        } else {
            let result = client.generate_text(prompt).await?;
            println!("Response: {}", result.text);
            println!("Tokens used: {}", result.usage.total_tokens);
            println!("Generation time: {:.2}s", result.elapsed.as_secs_f64());
        }
    } else {
        Args::command().print_help()?;
        println!();
    }

    Ok(())
}

async fn run_chat_loop(client: &Client) {
    println!("Starting interactive chat mode. Type 'quit' to exit.");
    let stdin = std::io::stdin();

    loop {
        print!("\nYou: ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                eprintln!("Error reading input: {err}");
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match client.generate_text(input).await {
            Ok(result) => println!("\nGemini: {}", result.text),
            Err(err) => println!("Error: {err}"),
        }
    }
}
