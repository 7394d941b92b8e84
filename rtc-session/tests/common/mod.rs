#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rtc_session::api::PeerConnection;

pub const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);

pub fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

/// Awaits `future`, failing the test instead of hanging forever.
pub async fn within<F: Future>(future: F) -> Result<F::Output> {
    Ok(tokio::time::timeout(DEFAULT_TIMEOUT_DURATION, future).await?)
}

/// Runs a full offer/answer round, exchanging finalized descriptions only.
pub async fn negotiate(offerer: &PeerConnection, answerer: &PeerConnection) -> Result<()> {
    let offer = offerer.create_offer(None).await?;
    offerer.set_local_description(offer).await?;
    let offer = within(offerer.local_description_finalized()).await??;

    answerer.set_remote_description(offer).await?;
    let answer = answerer.create_answer(None).await?;
    answerer.set_local_description(answer).await?;
    let answer = within(answerer.local_description_finalized()).await??;

    offerer.set_remote_description(answer).await?;
    Ok(())
}
