use anyhow::{anyhow, bail, Context};
use bingx_connector::bingx::{BingxClient, Interval};
use bingx_connector::stream::{BingxWebSocketClient, StreamEvent, Subscription};
use futures::StreamExt;
use std::fmt::Debug;
use std::time::Duration;

/// Listen keys expire after an hour without a keepalive
const LISTEN_KEY_KEEPALIVE: Duration = Duration::from_secs(30 * 60);

enum Command {
    Klines { symbol: String, interval: Interval },
    History { symbol: String, interval: Interval, limit: Option<u32> },
    Orders,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    // Logs go to stderr, events to stdout
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match command {
        Command::Klines { symbol, interval } => run_klines(&symbol, interval).await,
        Command::History { symbol, interval, limit } => run_history(&symbol, interval, limit).await,
        Command::Orders => run_orders().await,
    }
}

/// Parse command-line arguments
fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let rest: Vec<&str> = args.iter().skip(1).map(String::as_str).collect();

    match rest.as_slice() {
        [] | ["--help"] | ["-h"] => {
            print_usage();
            std::process::exit(0);
        }
        ["klines", symbol, interval] => Ok(Command::Klines {
            symbol: symbol.to_string(),
            interval: parse_interval(interval)?,
        }),
        ["history", symbol, interval] => Ok(Command::History {
            symbol: symbol.to_string(),
            interval: parse_interval(interval)?,
            limit: None,
        }),
        ["history", symbol, interval, limit] => Ok(Command::History {
            symbol: symbol.to_string(),
            interval: parse_interval(interval)?,
            limit: Some(limit.parse().with_context(|| format!("invalid limit: {}", limit))?),
        }),
        ["orders"] => Ok(Command::Orders),
        other => bail!("Unknown arguments: {}", other.join(" ")),
    }
}

fn parse_interval(value: &str) -> anyhow::Result<Interval> {
    value.parse::<Interval>().map_err(|e| anyhow!(e))
}

/// Print usage information
fn print_usage() {
    println!("bingx-connector - BingX perpetual swap market data and order stream client");
    println!();
    println!("USAGE:");
    println!("    bingx-connector <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    klines <SYMBOL> <INTERVAL>            Stream aggregated candles (e.g. BTC-USDT 1m)");
    println!("    history <SYMBOL> <INTERVAL> [LIMIT]   Fetch historical candles over REST");
    println!("    orders                                Stream order updates for the account");
    println!("    --help, -h                            Print this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    BINGX_API_KEY       BingX API key (required for orders)");
    println!("    BINGX_SECRET_KEY    BingX secret key (required for orders)");
    println!("    BINGX_BASE_URL      REST base URL (default: https://open-api.bingx.com)");
    println!("    BINGX_WS_URL        Stream URL (default: wss://open-api-swap.bingx.com/swap-market)");
    println!("    RUST_LOG            Logging level (default: info)");
}

async fn run_klines(symbol: &str, interval: Interval) -> anyhow::Result<()> {
    let client = BingxWebSocketClient::from_env();
    let subscription = client
        .kline_stream(symbol, interval)
        .await
        .context("failed to open kline stream")?;

    tracing::info!(symbol = %symbol, interval = %interval, "Streaming candles, Ctrl-C to stop");
    pump(subscription).await
}

async fn run_history(symbol: &str, interval: Interval, limit: Option<u32>) -> anyhow::Result<()> {
    let client = BingxClient::from_env()?;
    let klines = client.get_klines(symbol, interval, None, None, limit).await?;

    for kline in &klines {
        println!(
            "{} o={} h={} l={} c={} v={}",
            kline.time, kline.open, kline.high, kline.low, kline.close, kline.volume
        );
    }
    tracing::info!(count = klines.len(), "Fetched candles");
    Ok(())
}

async fn run_orders() -> anyhow::Result<()> {
    let rest = BingxClient::from_env()?;
    if !rest.has_credentials() {
        bail!("BINGX_API_KEY and BINGX_SECRET_KEY must be set");
    }

    let listen_key = rest.create_listen_key().await?;
    let client = BingxWebSocketClient::from_env();
    let subscription = client
        .order_update_stream(&listen_key)
        .await
        .context("failed to open account stream")?;

    let keepalive = {
        let rest = rest.clone();
        let listen_key = listen_key.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LISTEN_KEY_KEEPALIVE);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match rest.extend_listen_key(&listen_key).await {
                    Ok(()) => tracing::debug!("Listen key extended"),
                    Err(e) => tracing::warn!(error = %e, "Failed to extend listen key"),
                }
            }
        })
    };

    tracing::info!("Streaming order updates, Ctrl-C to stop");
    let result = pump(subscription).await;

    keepalive.abort();
    if let Err(e) = rest.close_listen_key(&listen_key).await {
        tracing::warn!(error = %e, "Failed to close listen key");
    }
    result
}

/// Prints events until Ctrl-C or the session ends
async fn pump<T: Debug>(mut subscription: Subscription<T>) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                subscription.stop();
                subscription.wait().await;
                return Ok(());
            }
            event = subscription.next() => match event {
                Some(StreamEvent::Data(data)) => println!("{:?}", data),
                Some(StreamEvent::Error(e)) => tracing::warn!(error = %e, "Stream error"),
                None => {
                    tracing::info!("Stream closed");
                    return Ok(());
                }
            },
        }
    }
}
