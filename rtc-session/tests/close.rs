/// Connection teardown: idempotence, pending work and the remote side.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;

use rtc_session::api::APIBuilder;
use rtc_session::engine::loopback::{LoopbackNetwork, LoopbackOptions};
use rtc_session::error::Error;
use rtc_session::peer_connection::configuration::RTCConfiguration;
use rtc_session::peer_connection::state::{RTCNegotiationState, RTCPeerConnectionState};

mod common;
use common::{init_logger, negotiate, within};

#[tokio::test]
async fn test_close_is_idempotent() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let pc = api.new_peer_connection(RTCConfiguration::default())?;

    pc.close();
    pc.close();

    match within(pc.connected()).await? {
        Err(Error::ErrConnectionClosed) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert!(pc.is_closed());
    assert_eq!(pc.connection_state(), RTCPeerConnectionState::Closed);
    assert_eq!(pc.negotiation_state(), RTCNegotiationState::Closed);

    match pc.create_offer(None).await {
        Err(Error::ErrConnectionClosed) => {}
        other => panic!("unexpected {other:?}"),
    }
    match pc.create_data_channel("chat", None).await {
        Err(Error::ErrConnectionClosed) => {}
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    match pc.local_description_finalized().await {
        Err(Error::ErrConnectionClosed) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert!(within(pc.candidates().next()).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_close_resolves_pending_operations() -> Result<()> {
    init_logger();

    // the pass never ends on its own, so finalization stays pending
    let network = LoopbackNetwork::new(LoopbackOptions {
        signal_end_of_candidates: false,
        ..Default::default()
    });
    let api = APIBuilder::new()
        .with_engine_factory(Arc::new(network))
        .build();
    let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default())?);
    let mut incoming = pc.incoming_data_channels()?;

    let chat = pc.create_data_channel("chat", None).await?;
    let offer = pc.create_offer(None).await?;
    pc.set_local_description(offer).await?;

    let finalized = tokio::spawn({
        let pc = Arc::clone(&pc);
        async move { pc.local_description_finalized().await }
    });
    let candidates = pc.candidates();
    let ready = tokio::spawn({
        let chat = chat.clone();
        async move { chat.ready().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    pc.close();

    match within(finalized).await?? {
        Err(Error::ErrConnectionClosed) => {}
        other => panic!("unexpected {other:?}"),
    }
    match within(ready).await?? {
        Err(Error::ErrConnectionClosed) => {}
        other => panic!("unexpected {other:?}"),
    }
    within(chat.closed()).await?;
    assert_eq!(within(candidates.collect::<Vec<_>>()).await?.len(), 3);
    assert!(within(incoming.next()).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_remote_close() -> Result<()> {
    init_logger();

    let network = LoopbackNetwork::default();
    let api = APIBuilder::new()
        .with_engine_factory(Arc::new(network.clone()))
        .build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;
    let mut incoming = answerer.incoming_data_channels()?;

    let chat = offerer.create_data_channel("chat", None).await?;
    negotiate(&offerer, &answerer).await?;
    within(chat.ready()).await??;
    let remote = within(incoming.next()).await?.expect("incoming data channel");
    within(remote.ready()).await??;
    assert_eq!(network.endpoint_count()?, 2);

    // dropping the handle closes the connection
    drop(offerer);

    within(remote.closed()).await?;
    within(chat.closed()).await?;
    within(async {
        while answerer.connection_state() != RTCPeerConnectionState::Disconnected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(network.endpoint_count()?, 1);

    // sends on closed channels stay silent
    chat.send_text("anyone?")?;
    remote.send_text("anyone?")?;

    Ok(())
}
