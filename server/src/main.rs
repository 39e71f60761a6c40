use clap::Parser;
use log::{error, info};
use server::network::{QuizServer, ServerHandle};
use server::questions;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Main-method of the application.
/// Parses command-line arguments, loads the question file, then runs the
/// accept loop alongside the operator command loop until shutdown.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "5004")]
        port: u16,
        /// Question file path (five-line blocks: prompt, A, B, C, correct label)
        #[clap(short = 'f', long, default_value = "quiz_qa.txt")]
        question_file: String,
        /// Questions per game; cycles through the file if it holds fewer
        #[clap(short = 'n', long, default_value = "5")]
        question_count: usize,
    }

    env_logger::init();
    let args = Args::parse();

    let questions = questions::load_questions(&args.question_file, args.question_count)?;
    info!(
        "Loaded {} questions from {}",
        questions.len(),
        args.question_file
    );

    let address = format!("{}:{}", args.host, args.port);
    let server = QuizServer::new(&address, questions).await?;
    let handle = server.handle();

    // Accept-loop task
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    // Operator command task
    let command_task = {
        let handle = handle.clone();
        tokio::spawn(async move {
            run_command_loop(handle).await;
        })
    };

    // Handle shutdown gracefully
    tokio::select! {
        result = server_task => {
            if let Err(e) = result {
                error!("Server task panicked: {}", e);
            }
        }
        result = command_task => {
            if let Err(e) = result {
                error!("Command task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown().await;
        }
    }

    Ok(())
}

/// Reads operator commands from stdin: `start` begins a game, `quit` shuts
/// the server down. Start failures are reported with their reason, never
/// fatal.
async fn run_command_loop(handle: ServerHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Operator commands: \"start\" begins a game, \"quit\" shuts down");

    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "start" => {
                if let Err(e) = handle.start_game().await {
                    error!("Cannot start game: {}", e);
                }
            }
            "quit" => {
                handle.shutdown().await;
                break;
            }
            "" => {}
            other => error!("Unknown command {:?} (use \"start\" or \"quit\")", other),
        }
    }
}
