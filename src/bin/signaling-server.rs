// Rendezvous/relay server for P2Pong sync matches
// Pairs a host listening under `host_<match>` with the guest dialing it and
// relays their frames.
//
// Usage: cargo run --bin signaling-server [bind-addr]

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    p2pong_sync::logging::init(false)?;

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8080".to_string());

    p2pong_sync::network::signaling::run(&addr).await
}
