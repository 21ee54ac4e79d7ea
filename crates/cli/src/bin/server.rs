use clap::Parser;
use framecast::Server;

#[derive(Parser)]
#[command(
    name = "framecast-server",
    about = "Streams a frame-packed video file to one client"
)]
struct Args {
    /// Port to listen on for control connections
    #[arg(default_value_t = 7777)]
    port: u16,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let server = match Server::bind(args.port) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to bind port {}: {}", args.port, e);
            std::process::exit(1);
        }
    };

    // One client per process lifetime: serve returns after teardown.
    if let Err(e) = server.serve() {
        eprintln!("Session ended with error: {}", e);
        std::process::exit(1);
    }
}
