/// Data channel lifecycle between two loopback peers.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use futures::StreamExt;

use rtc_session::api::APIBuilder;
use rtc_session::data_channel::{RTCDataChannelInit, RTCDataChannelState};
use rtc_session::engine::loopback::{LoopbackNetwork, LoopbackOptions};
use rtc_session::error::Error;
use rtc_session::peer_connection::configuration::{RTCConfiguration, RTCConfigurationBuilder};

mod common;
use common::{init_logger, negotiate, within};

const TEST_MESSAGE: &str = "Hello from offer!";
const ECHO_MESSAGE: &str = "Echo from answer!";

#[tokio::test]
async fn test_data_channel_exchange() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;
    let mut incoming = answerer.incoming_data_channels()?;

    let chat = offerer
        .create_data_channel(
            "chat",
            Some(RTCDataChannelInit {
                protocol: "chat-v1".to_owned(),
                ..Default::default()
            }),
        )
        .await?;
    assert_eq!(chat.ready_state(), RTCDataChannelState::Connecting);
    assert_eq!(chat.label(), "chat");

    negotiate(&offerer, &answerer).await?;
    within(chat.ready()).await??;

    let remote = within(incoming.next()).await?.expect("incoming data channel");
    assert_eq!(remote.label(), "chat");
    assert_eq!(remote.protocol(), "chat-v1");
    within(remote.ready()).await??;

    let mut received = remote.messages();
    let mut echoed = chat.messages();

    chat.send_text(TEST_MESSAGE)?;
    chat.send(Bytes::from_static(&[1, 2, 3]))?;

    let message = within(received.next()).await?.expect("text message");
    assert!(message.is_string);
    assert_eq!(message.as_text(), Some(TEST_MESSAGE));
    let message = within(received.next()).await?.expect("binary message");
    assert!(!message.is_string);
    assert_eq!(message.data, Bytes::from_static(&[1, 2, 3]));

    remote.send_text(ECHO_MESSAGE)?;
    let message = within(echoed.next()).await?.expect("echo message");
    assert_eq!(message.as_text(), Some(ECHO_MESSAGE));

    Ok(())
}

#[tokio::test]
async fn test_data_channel_opened_after_connect() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;
    let mut incoming = answerer.incoming_data_channels()?;

    negotiate(&offerer, &answerer).await?;
    within(offerer.connected()).await??;

    let late = within(offerer.open_data_channel("late", None)).await??;
    assert_eq!(late.ready_state(), RTCDataChannelState::Open);

    let remote = within(incoming.next()).await?.expect("incoming data channel");
    assert_eq!(remote.label(), "late");
    // remote ids never collide with locally opened ones
    assert_ne!(remote.id() % 2, late.id() % 2);

    Ok(())
}

#[tokio::test]
async fn test_message_once() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;
    let mut incoming = answerer.incoming_data_channels()?;

    let chat = offerer.create_data_channel("chat", None).await?;
    negotiate(&offerer, &answerer).await?;
    within(chat.ready()).await??;
    let remote = within(incoming.next()).await?.expect("incoming data channel");
    within(remote.ready()).await??;

    let first = remote.message_once();
    chat.send_text("one")?;
    chat.send_text("two")?;
    let message = within(first).await??;
    assert_eq!(message.as_text(), Some("one"));
    let message = within(remote.message_once()).await??;
    assert_eq!(message.as_text(), Some("two"));

    // closing the channel fails waiters and ends subscriptions
    let pending = remote.message_once();
    let mut messages = remote.messages();
    chat.close();
    within(chat.closed()).await?;
    within(remote.closed()).await?;
    match within(pending).await? {
        Err(Error::ErrDataChannelClosed) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert!(within(messages.next()).await?.is_none());
    match within(remote.message_once()).await? {
        Err(Error::ErrDataChannelClosed) => {}
        other => panic!("unexpected {other:?}"),
    }

    // sending on a closed channel does nothing
    chat.send_text("three")?;
    assert_eq!(chat.ready_state(), RTCDataChannelState::Closed);

    Ok(())
}

#[tokio::test]
async fn test_messages_before_subscription_are_kept() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;
    let mut incoming = answerer.incoming_data_channels()?;

    let chat = offerer.create_data_channel("chat", None).await?;
    negotiate(&offerer, &answerer).await?;
    within(chat.ready()).await??;
    chat.send_text("hello")?;
    chat.send_text("again")?;

    let remote = within(incoming.next()).await?.expect("incoming data channel");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut received = remote.messages();
    let message = within(received.next()).await?.expect("first message");
    assert_eq!(message.as_text(), Some("hello"));
    let message = within(received.next()).await?.expect("second message");
    assert_eq!(message.as_text(), Some("again"));

    // a later subscriber only sees what arrives from now on
    let mut late = remote.messages();
    chat.send_text("live")?;
    assert_eq!(
        within(received.next()).await?.expect("live message").as_text(),
        Some("live")
    );
    assert_eq!(
        within(late.next()).await?.expect("live message").as_text(),
        Some("live")
    );

    // messages nobody took stay readable after the channel closed
    chat.send_text("last words")?;
    drop(received);
    drop(late);
    tokio::time::sleep(Duration::from_millis(20)).await;
    chat.close();
    within(remote.closed()).await?;
    assert_eq!(
        within(remote.message_once()).await??.as_text(),
        Some("last words")
    );

    Ok(())
}

#[tokio::test]
async fn test_send_before_open_is_dropped() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;
    let mut incoming = answerer.incoming_data_channels()?;

    let chat = offerer.create_data_channel("chat", None).await?;
    chat.send_text("too early")?;

    negotiate(&offerer, &answerer).await?;
    within(chat.ready()).await??;
    let remote = within(incoming.next()).await?.expect("incoming data channel");
    within(remote.ready()).await??;

    let next = remote.message_once();
    chat.send_text("on time")?;
    assert_eq!(within(next).await??.as_text(), Some("on time"));

    Ok(())
}

#[tokio::test]
async fn test_data_channel_validation() -> Result<()> {
    init_logger();

    let network = LoopbackNetwork::new(LoopbackOptions {
        rejected_labels: vec!["doomed".to_owned()],
        ..Default::default()
    });
    let api = APIBuilder::new()
        .with_engine_factory(Arc::new(network))
        .build();
    let offerer = api.new_peer_connection(
        RTCConfigurationBuilder::new()
            .with_max_message_size(16)
            .build(),
    )?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;

    let long_label = "x".repeat(65536);
    let tests = vec![
        (
            "both lifetime and retransmits",
            "reliable",
            RTCDataChannelInit {
                max_packet_life_time: Some(100),
                max_retransmits: Some(3),
                ..Default::default()
            },
            Error::ErrRetransmitsOrPacketLifeTime,
        ),
        (
            "label too long",
            long_label.as_str(),
            RTCDataChannelInit::default(),
            Error::ErrStringSizeLimit,
        ),
    ];
    for (name, label, init, expected) in tests {
        let err = offerer
            .create_data_channel(label, Some(init))
            .await
            .unwrap_err();
        assert_eq!(err, expected, "testCase: {name}");
    }

    let chat = offerer.create_data_channel("chat", None).await?;
    match offerer.create_data_channel("chat", None).await {
        Err(Error::ErrDataChannelLabelInUse(label)) => assert_eq!(label, "chat"),
        other => panic!("unexpected {other:?}"),
    }

    let doomed = offerer.create_data_channel("doomed", None).await?;
    match within(doomed.ready()).await? {
        Err(Error::ErrDataChannelOpen(label)) => assert_eq!(label, "doomed"),
        other => panic!("unexpected {other:?}"),
    }
    within(doomed.closed()).await?;

    negotiate(&offerer, &answerer).await?;
    within(chat.ready()).await??;

    assert_eq!(
        chat.send(vec![0u8; 17]).unwrap_err(),
        Error::ErrOutboundPacketTooLarge
    );
    chat.send(vec![0u8; 16])?;

    Ok(())
}

#[tokio::test]
async fn test_incoming_data_channels_single_subscriber() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let pc = api.new_peer_connection(RTCConfiguration::default())?;

    let _incoming = pc.incoming_data_channels()?;
    match pc.incoming_data_channels() {
        Err(Error::ErrAlreadySubscribed) => {}
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }

    Ok(())
}
