use std::io::{self, BufRead};
use std::thread;

use clap::Parser;
use framecast::{Client, ClientConfig, StreamEvent};

#[derive(Parser)]
#[command(
    name = "framecast-client",
    about = "Requests and plays a video stream from a framecast server"
)]
struct Args {
    /// The server's address
    #[arg(default_value = "127.0.0.1")]
    server_address: String,

    /// The server's control port
    #[arg(default_value_t = 7777)]
    server_port: u16,

    /// Local port to receive the data channel on
    #[arg(default_value_t = 7778)]
    data_port: u16,

    /// The video file to play
    #[arg(default_value = "movie.Mjpeg")]
    video_file: String,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let client = match Client::connect(ClientConfig {
        server_host: args.server_address.clone(),
        server_port: args.server_port,
        data_port: args.data_port,
        file_name: args.video_file,
    }) {
        Ok(client) => client,
        Err(e) => {
            eprintln!(
                "Connection to {}:{} failed: {}",
                args.server_address, args.server_port, e
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = client.setup() {
        eprintln!("Setup failed: {}", e);
        std::process::exit(1);
    }

    // Playback starts automatically once SETUP succeeds.
    let events = client.events().clone();
    let printer = thread::spawn(move || {
        let mut frames = 0u64;
        let mut bytes = 0u64;
        for event in events {
            match event {
                StreamEvent::Frame { sequence, payload } => {
                    frames += 1;
                    bytes += payload.len() as u64;
                    print!("\rframe {sequence} ({frames} received, {bytes} bytes)");
                }
                StreamEvent::SetupFailed { file_name } => {
                    eprintln!("Server has no file named {file_name}");
                }
                StreamEvent::ServerError => {
                    eprintln!("Server reported an internal error");
                }
                StreamEvent::BindFailed { port } => {
                    eprintln!("Unable to bind data port {port}");
                }
                StreamEvent::Closed => {
                    println!("\nSession closed.");
                    break;
                }
            }
        }
    });

    println!("Streaming — 'p' toggles pause/play, 'q' quits.");
    let stdin = io::stdin();
    let mut paused = false;
    for line in stdin.lock().lines() {
        let command = match line {
            Ok(line) => line.trim().to_lowercase(),
            Err(_) => break,
        };
        let result = match command.as_str() {
            "p" => {
                paused = !paused;
                if paused { client.pause() } else { client.play() }
            }
            "q" => break,
            _ => continue,
        };
        if let Err(e) = result {
            eprintln!("Control channel failed: {}", e);
            break;
        }
    }

    if let Err(e) = client.teardown() {
        eprintln!("Teardown failed: {}", e);
    }
    client.join();
    let _ = printer.join();
}
