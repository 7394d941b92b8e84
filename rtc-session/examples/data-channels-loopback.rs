//! data-channels-loopback connects two peer connections through the
//! in-process loopback engine, opens a data channel and exchanges messages.
//!
//! Descriptions are passed around as JSON text, the way a signaling server
//! would carry them.

use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use log::info;
use rtc_session::api::{APIBuilder, PeerConnection};
use rtc_session::peer_connection::configuration::{
    RTCConfigurationBuilder, RTCIceGatheringPolicy,
};

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "data-channels-loopback")]
#[command(author = "Rain Liu <yliu@webrtc.rs>")]
#[command(version = "0.1.0")]
#[command(about = "An example of data channels between two loopback peers.", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    /// Forward candidates one by one instead of waiting for gathering to end.
    #[arg(short, long)]
    trickle: bool,
    #[arg(short, long, default_value_t = 5)]
    messages: usize,
}

async fn signal(from: &PeerConnection, to: &PeerConnection) -> Result<()> {
    let description = from.local_description_finalized().await?;
    let json = serde_json::to_string(&description)?;
    info!("{} -> {}: {json}", from.id(), to.id());
    to.set_remote_description(json).await?;
    Ok(())
}

async fn trickle(from: &PeerConnection, to: &PeerConnection) -> Result<()> {
    let mut candidates = from.candidates();
    while let Some(candidate) = candidates.next().await {
        info!("{} -> {}: candidate {}", from.id(), to.id(), candidate.candidate);
        to.add_ice_candidate(candidate).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;

    if cli.debug {
        env_logger::Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let policy = if cli.trickle {
        RTCIceGatheringPolicy::Trickle
    } else {
        RTCIceGatheringPolicy::Complete
    };
    let config = RTCConfigurationBuilder::new()
        .with_ice_gathering_policy(policy)
        .with_ice_gathering_timeout(Duration::from_secs(2))
        .build();

    let api = APIBuilder::new().build();
    let offer_pc = api.new_peer_connection(config.clone())?;
    let answer_pc = api.new_peer_connection(config)?;
    let mut incoming = answer_pc.incoming_data_channels()?;

    let data_channel = offer_pc.create_data_channel("data", None).await?;

    let offer = offer_pc.create_offer(None).await?;
    offer_pc.set_local_description(offer).await?;
    signal(&offer_pc, &answer_pc).await?;

    let answer = answer_pc.create_answer(None).await?;
    answer_pc.set_local_description(answer).await?;
    signal(&answer_pc, &offer_pc).await?;

    if cli.trickle {
        trickle(&offer_pc, &answer_pc).await?;
        trickle(&answer_pc, &offer_pc).await?;
    }

    tokio::time::timeout(DEFAULT_TIMEOUT_DURATION, offer_pc.connected()).await??;
    println!("Peer connection state: {}", offer_pc.connection_state());

    let remote = tokio::time::timeout(DEFAULT_TIMEOUT_DURATION, incoming.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("answer peer closed before the data channel arrived"))?;
    let mut received = remote.messages();
    let echo = remote.clone();
    let echo_task = tokio::spawn(async move {
        while let Some(message) = received.next().await {
            if let Some(text) = message.as_text() {
                println!("Message from DataChannel '{}': '{text}'", echo.label());
                let _ = echo.send_text(format!("echo: {text}"));
            }
        }
    });

    tokio::time::timeout(DEFAULT_TIMEOUT_DURATION, data_channel.ready()).await??;
    println!("Data channel '{}'-'{}' open", data_channel.label(), data_channel.id());

    let mut echoes = data_channel.messages();
    for n in 0..cli.messages {
        let message = format!("message {n}");
        println!("Sending '{message}'");
        data_channel.send_text(message)?;
        if let Some(echo) = tokio::time::timeout(DEFAULT_TIMEOUT_DURATION, echoes.next()).await? {
            println!("Received '{}'", echo.as_text().unwrap_or_default());
        }
    }

    offer_pc.close();
    answer_pc.close();
    echo_task.await?;

    Ok(())
}
