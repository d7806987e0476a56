//! SMS Relay - CLI
//!
//! Runs the relay server, or acts as a terminal client against one.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sms_relay::client::RelayClient;
use sms_relay::config::{
    Config, DEFAULT_BIND_ADDR, DEFAULT_CARRIER_BASE_URL, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_RELAY_CAPACITY,
};
use sms_relay::phone::{is_e164, normalize_phone};
use sms_relay::poller::{render_line, send_and_record, PollLoop, Transcript};
use sms_relay::server;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SMS Relay - carrier webhook in, drain-on-poll out
#[derive(Parser)]
#[command(name = "sms-relay")]
#[command(about = "Relay SMS between a carrier and a polling client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Address to listen on
        #[arg(long, env = "SMS_RELAY_BIND", default_value_t = DEFAULT_BIND_ADDR)]
        bind: SocketAddr,

        /// Maximum undelivered inbound messages kept in memory
        #[arg(long, default_value_t = DEFAULT_RELAY_CAPACITY)]
        capacity: usize,

        /// Carrier account SID
        #[arg(long, env = "TWILIO_ACCOUNT_SID", default_value = "", hide_env_values = true)]
        account_sid: String,

        /// Carrier auth token
        #[arg(long, env = "TWILIO_AUTH_TOKEN", default_value = "", hide_env_values = true)]
        auth_token: String,

        /// Number outbound messages are sent from
        #[arg(long, env = "TWILIO_PHONE_NUMBER", default_value = "")]
        from_number: String,

        /// Carrier API base URL
        #[arg(long, env = "TWILIO_BASE_URL", default_value = DEFAULT_CARRIER_BASE_URL)]
        carrier_url: String,
    },

    /// Poll a relay and print incoming messages until Ctrl-C
    Watch {
        /// Relay base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,

        /// Poll interval in milliseconds
        #[arg(short = 'i', long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
        interval_ms: u64,
    },

    /// Send one SMS through a relay
    Send {
        /// Destination number (E.164)
        to: String,

        /// Message text
        body: String,

        /// Relay base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,
    },

    /// Interactive session: print incoming messages, send each stdin line
    Chat {
        /// Destination number (E.164)
        #[arg(long)]
        to: String,

        /// Relay base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,

        /// Poll interval in milliseconds
        #[arg(short = 'i', long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
        interval_ms: u64,
    },

    /// Check whether a number is valid E.164
    CheckNumber {
        /// Number to check
        number: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            capacity,
            account_sid,
            auth_token,
            from_number,
            carrier_url,
        } => {
            let config = Config {
                bind_addr: bind,
                relay_capacity: capacity,
                carrier_base_url: carrier_url,
                carrier_account_sid: account_sid,
                carrier_auth_token: auth_token,
                carrier_from_number: from_number,
                ..Config::default()
            };
            cmd_serve(&config).await
        }
        Commands::Watch { url, interval_ms } => cmd_watch(&url, interval_ms).await,
        Commands::Send { to, body, url } => cmd_send(&url, &to, &body).await,
        Commands::Chat {
            to,
            url,
            interval_ms,
        } => cmd_chat(&url, &to, interval_ms).await,
        Commands::CheckNumber { number } => cmd_check_number(&number),
    }
}

// ============================================================================
// CLI Commands
// ============================================================================

async fn cmd_serve(config: &Config) -> anyhow::Result<()> {
    server::run(config)
        .await
        .with_context(|| format!("relay server on {}", config.bind_addr))
}

async fn cmd_watch(url: &str, interval_ms: u64) -> anyhow::Result<()> {
    let config = Config {
        poll_interval_ms: interval_ms,
        ..Config::default()
    };
    config.validate()?;

    let client = RelayClient::new(url).context("building relay client")?;
    let transcript = Arc::new(Mutex::new(Transcript::new()));

    let handle = PollLoop::new(client, config.poll_interval(), transcript.clone())
        .on_messages(|batch| {
            for msg in batch {
                println!("{}", render_line(msg));
            }
        })
        .spawn();

    info!("Watching {} every {}ms (Ctrl-C to stop)", url, interval_ms);
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    handle.cancel().await;
    let total = transcript.lock().await.len();
    println!("\n{} messages received", total);
    Ok(())
}

async fn cmd_send(url: &str, to: &str, body: &str) -> anyhow::Result<()> {
    let client = RelayClient::new(url).context("building relay client")?;
    let receipt = client
        .send(to, body)
        .await
        .with_context(|| format!("sending to {}", to))?;

    println!("Message sent ({}, {})", receipt.sid, receipt.status);
    Ok(())
}

async fn cmd_chat(url: &str, to: &str, interval_ms: u64) -> anyhow::Result<()> {
    let config = Config {
        poll_interval_ms: interval_ms,
        ..Config::default()
    };
    config.validate()?;

    let client = RelayClient::new(url).context("building relay client")?;
    let transcript = Arc::new(Mutex::new(Transcript::new()));

    let handle = PollLoop::new(client.clone(), config.poll_interval(), transcript.clone())
        .on_messages(|batch| {
            for msg in batch {
                println!("{}", render_line(msg));
            }
        })
        .spawn();

    info!("Chatting with {} via {} (Ctrl-D to stop)", to, url);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let body = line.trim();
        if body.is_empty() {
            continue;
        }
        match send_and_record(&client, &transcript, to, body).await {
            Ok(sent) => println!("{}", render_line(&sent)),
            Err(e) => eprintln!("{}", e),
        }
    }

    handle.cancel().await;
    Ok(())
}

fn cmd_check_number(number: &str) -> anyhow::Result<()> {
    if is_e164(number) {
        println!("valid: {}", normalize_phone(number));
        Ok(())
    } else {
        anyhow::bail!("not a valid E.164 number: {}", number)
    }
}
