//! End-to-end fan-out benchmark for Herald.
//!
//! Connects N WebSocket clients, then drives the server's `/test/push` hook
//! and counts how many robot responses reach the clients.
//!
//! ```bash
//! herald &
//! e2e_throughput 64 127.0.0.1:8000
//! ```

use futures_util::StreamExt;
use herald_bench::is_robot_response;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const DEFAULT_SERVER: &str = "127.0.0.1:8000";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let server = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Herald End-to-End Fan-out Benchmark                 ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Make sure the server is running: cargo run --release        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    run_fanout_benchmark(num_clients, &server).await;
}

async fn run_fanout_benchmark(num_clients: usize, server: &str) {
    println!("📊 Fan-out Benchmark: {} clients on {}", num_clients, server);
    println!("   Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let received = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();

    // Spawn client tasks
    for client_id in 0..num_clients {
        let received = Arc::clone(&received);
        let barrier = Arc::clone(&barrier);
        let url = format!("ws://{}/ws", server);

        let handle = tokio::spawn(async move {
            if let Err(e) = run_client(&url, received, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        });
        handles.push(handle);
    }

    // Wait for all clients to connect
    barrier.wait().await;
    println!("✓ All {} clients connected", num_clients);

    let published = Arc::new(AtomicU64::new(0));
    let producer = {
        let server = server.to_string();
        let published = Arc::clone(&published);
        tokio::spawn(async move {
            loop {
                match trigger_push(&server).await {
                    Ok(()) => {
                        published.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        eprintln!("Producer error: {}", e);
                        break;
                    }
                }
            }
        })
    };

    // Warmup phase
    println!("⏳ Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    // Reset counters and start measurement
    received.store(0, Ordering::SeqCst);
    published.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("📈 Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total_received = received.load(Ordering::SeqCst);
    let total_published = published.load(Ordering::SeqCst);
    producer.abort();

    let publish_rate = total_published as f64 / elapsed.as_secs_f64();
    let delivery_rate = total_received as f64 / elapsed.as_secs_f64();
    let expected = total_published * num_clients as u64;
    let coverage = if expected == 0 {
        0.0
    } else {
        total_received as f64 / expected as f64 * 100.0
    };

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Clients:              {:>10}                           ║",
        num_clients
    );
    println!(
        "║  Duration:             {:>10.2}s                          ║",
        elapsed.as_secs_f64()
    );
    println!(
        "║  Published:            {:>10} ({:>8.0} /s)              ║",
        total_published, publish_rate
    );
    println!(
        "║  Delivered:            {:>10} ({:>8.0} /s)              ║",
        total_received, delivery_rate
    );
    println!(
        "║  Coverage:             {:>10.1}%                          ║",
        coverage
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    for handle in handles {
        handle.abort();
    }
}

async fn run_client(url: &str, received: Arc<AtomicU64>, barrier: Arc<Barrier>) -> Result<(), BoxError> {
    let (ws, _) = connect_async(url).await?;
    let (_sender, mut receiver) = ws.split();

    barrier.wait().await;

    while let Some(result) = receiver.next().await {
        if let Message::Text(text) = result? {
            if is_robot_response(&text) {
                received.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    Ok(())
}

/// Hit the publish hook once over a fresh connection.
async fn trigger_push(server: &str) -> Result<(), BoxError> {
    let mut stream = TcpStream::connect(server).await?;
    let request = format!(
        "GET /test/push HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        server
    );
    stream.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    if !response.starts_with(b"HTTP/1.1 200") {
        return Err("publish hook did not answer 200".into());
    }
    Ok(())
}
