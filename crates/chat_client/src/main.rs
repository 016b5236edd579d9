//! Terminal chat client: wraps stdin lines into command envelopes and
//! pretty-prints the responses and events coming back. All protocol
//! correctness lives on the server side; this is a thin collaborator.

use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{Duration, sleep};

use chat_server::protocol::CommandEnvelope;

#[derive(Parser, Debug)]
#[command(name = "chat_client", version)]
struct Args {
    /// Server host to connect to
    #[arg(default_value = "127.0.0.1")]
    server: String,

    /// Server port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.server, args.port);
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected to {addr}");
    println!("Type /help for available commands.");

    let (read_half, mut write_half) = stream.into_split();
    tokio::spawn(receive_frames(read_half));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut nickname = String::new();

    while let Some(line) = stdin.next_line().await? {
        let line = line.trim().to_owned();
        if line.is_empty() {
            continue;
        }

        // Track the nickname locally so later envelopes carry it, the same
        // way the server-side context update expects.
        if let Some(rest) = line.strip_prefix("/nick ") {
            if let Some(nick) = rest.split_whitespace().next() {
                nickname = nick.to_owned();
            }
        }

        let envelope = CommandEnvelope::new(line.clone(), nickname.clone());
        let mut frame = serde_json::to_string(&envelope)?;
        frame.push('\n');
        write_half.write_all(frame.as_bytes()).await?;

        if line == "/quit" {
            // Give the farewell response a moment to arrive.
            sleep(Duration::from_millis(200)).await;
            break;
        }
    }
    Ok(())
}

async fn receive_frames(read_half: tokio::net::tcp::OwnedReadHalf) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => display_frame(&line),
            Ok(None) | Err(_) => {
                println!("Disconnected from server.");
                std::process::exit(0);
            }
        }
    }
}

fn display_frame(line: &str) {
    let Ok(value) = serde_json::from_str::<Value>(line) else {
        println!("{line}");
        return;
    };
    match value["type"].as_str() {
        Some("response") => {
            let message = value["message"].as_str().unwrap_or_default();
            if value["success"].as_bool().unwrap_or(false) {
                println!("{message}");
            } else {
                println!("Error: {message}");
            }
        }
        Some("event") => display_event(&value),
        _ => println!("{line}"),
    }
}

fn display_event(value: &Value) {
    let field = |name: &str| value[name].as_str().unwrap_or("Unknown").to_owned();
    match value["event"].as_str() {
        Some("message") => {
            println!("[{}] <{}> {}", field("channel"), field("nickname"), field("message"));
        }
        Some("user_joined") => {
            println!("*** {} joined {}", field("nickname"), field("channel"));
        }
        Some("user_left") => {
            println!("*** {} left {}", field("nickname"), field("channel"));
        }
        Some("nick_change") => {
            println!(
                "*** {} is now known as {} in {}",
                field("old_nickname"),
                field("new_nickname"),
                field("channel")
            );
        }
        Some("channel_list") => {
            println!("Channels:");
            if let Some(channels) = value["channels"].as_array() {
                for channel in channels {
                    println!(
                        "  {} ({} users)",
                        channel["name"].as_str().unwrap_or("?"),
                        channel["users"].as_u64().unwrap_or(0)
                    );
                }
            }
        }
        _ => {}
    }
}
