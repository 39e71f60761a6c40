//! Minimal line-protocol client for poking a running trivia server.
//!
//! Connects, registers the given username, prints every server line, and
//! forwards stdin lines verbatim (type `ANSWER:A` to answer). Exits when the
//! server closes the connection.

use std::env;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:5004".to_string());
    let username = args.next().unwrap_or_else(|| "tester".to_string());

    println!("Connecting to {} as {:?}", addr, username);
    let stream = TcpStream::connect(&addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut server_lines = BufReader::new(read_half).lines();

    // The first line is the raw username, no framing tag.
    write_half
        .write_all(format!("{}\n", username).as_bytes())
        .await?;

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = server_lines.next_line() => match line? {
                Some(line) => {
                    println!("<< {}", line);
                    if line == "GAMEOVER" {
                        break;
                    }
                }
                None => {
                    println!("Server closed the connection");
                    break;
                }
            },
            line = stdin_lines.next_line() => match line? {
                Some(line) => {
                    write_half.write_all(format!("{}\n", line).as_bytes()).await?;
                }
                None => break,
            },
        }
    }

    Ok(())
}
