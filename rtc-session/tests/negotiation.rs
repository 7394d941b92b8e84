/// Offer/answer rounds through the async API on the loopback engine.
use anyhow::Result;
use futures::StreamExt;
use serde_json::json;

use rtc_session::api::APIBuilder;
use rtc_session::error::Error;
use rtc_session::media_stream::{MediaSource, MediaStreamConstraints, StaticCaptureDevice};
use rtc_session::peer_connection::configuration::{RTCConfiguration, RTCOfferOptions};
use rtc_session::peer_connection::sdp::{RTCSdpType, RTCSessionDescription};
use rtc_session::peer_connection::state::{
    RTCNegotiationState, RTCPeerConnectionState, RTCSignalingState,
};

mod common;
use common::{init_logger, negotiate, within};

#[tokio::test]
async fn test_offer_answer_round() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;

    let offer = offerer.create_offer(None).await?;
    assert_eq!(offer.sdp_type, RTCSdpType::Offer);
    assert_eq!(offerer.negotiation_state(), RTCNegotiationState::OfferCreated);

    offerer.set_local_description(offer.clone()).await?;
    assert_eq!(offerer.signaling_state(), RTCSignalingState::HaveLocalOffer);
    assert_eq!(offerer.local_description(), Some(offer));

    let offer = within(offerer.local_description_finalized()).await??;
    answerer.set_remote_description(offer).await?;
    assert_eq!(
        answerer.negotiation_state(),
        RTCNegotiationState::RemoteDescriptionSet
    );

    let answer = answerer.create_answer(None).await?;
    assert_eq!(answer.sdp_type, RTCSdpType::Answer);
    answerer.set_local_description(answer).await?;
    let answer = within(answerer.local_description_finalized()).await??;
    offerer.set_remote_description(answer).await?;

    within(offerer.connected()).await??;
    within(answerer.connected()).await??;

    for pc in [&offerer, &answerer] {
        assert_eq!(pc.negotiation_state(), RTCNegotiationState::Negotiated);
        assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
        assert_eq!(pc.connection_state(), RTCPeerConnectionState::Connected);
        assert!(pc.local_description().is_some());
        assert!(pc.remote_description().is_some());
    }

    Ok(())
}

#[tokio::test]
async fn test_operations_out_of_order() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let pc = api.new_peer_connection(RTCConfiguration::default())?;

    let err = pc.create_answer(None).await.unwrap_err();
    assert!(err.is_invalid_state(), "create_answer on idle: {err}");

    let answer = RTCSessionDescription::answer("v=0\r\n".to_owned())?;
    let err = pc.set_remote_description(answer).await.unwrap_err();
    assert!(err.is_invalid_state(), "remote answer on idle: {err}");

    // rejected operations leave the state untouched
    assert_eq!(pc.negotiation_state(), RTCNegotiationState::Idle);
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);

    let offer = pc.create_offer(None).await?;
    let err = pc.create_offer(None).await.unwrap_err();
    assert!(err.is_invalid_state(), "second create_offer: {err}");

    pc.set_local_description(offer.clone()).await?;
    let err = pc.set_local_description(offer.clone()).await.unwrap_err();
    assert!(err.is_invalid_state(), "second set_local_description: {err}");
    assert_eq!(pc.local_description(), Some(offer));

    Ok(())
}

#[tokio::test]
async fn test_description_normalization() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;

    let tests = vec![
        ("missing type", json!({ "sdp": "v=0\r\n" })),
        ("missing sdp", json!({ "type": "offer" })),
        ("unknown type", json!({ "type": "bogus", "sdp": "v=0\r\n" })),
        ("rollback", json!({ "type": "rollback", "sdp": "" })),
    ];
    for (name, value) in tests {
        match answerer.set_remote_description(value).await {
            Err(Error::ErrInvalidSessionDescription(_)) => {}
            other => panic!("testCase: {name}: unexpected {other:?}"),
        }
    }

    // an attribute bag is as good as a typed description
    let offer = offerer.create_offer(None).await?;
    offerer.set_local_description(offer).await?;
    let offer = within(offerer.local_description_finalized()).await??;
    answerer
        .set_remote_description(json!({ "type": "offer", "sdp": offer.sdp }))
        .await?;
    assert_eq!(answerer.remote_description(), Some(offer));

    Ok(())
}

#[tokio::test]
async fn test_engine_rejects_foreign_description() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let pc = api.new_peer_connection(RTCConfiguration::default())?;

    let foreign = RTCSessionDescription::offer(
        "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n"
            .to_owned(),
    )?;
    match pc.set_remote_description(foreign).await {
        Err(Error::ErrNegotiation(_)) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(pc.negotiation_state(), RTCNegotiationState::Idle);
    assert!(pc.remote_description().is_none());

    Ok(())
}

#[tokio::test]
async fn test_media_sections_follow_streams_and_options() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;

    let source = MediaSource::new(std::sync::Arc::new(StaticCaptureDevice::default()));
    let stream = source
        .acquire(MediaStreamConstraints {
            audio: true,
            video: false,
        })
        .await?;
    offerer.add_stream(&stream).await?;
    // attaching twice is a no-op
    offerer.add_stream(&stream).await?;

    let offer = offerer
        .create_offer(Some(RTCOfferOptions {
            offer_to_receive_video: true,
            ..Default::default()
        }))
        .await?;
    assert_eq!(offer.media_kinds(), vec!["audio", "video", "application"]);

    // streams can only be attached before negotiation starts
    let err = offerer.add_stream(&stream).await.unwrap_err();
    assert!(err.is_invalid_state(), "{err}");

    offerer.set_local_description(offer).await?;
    let offer = within(offerer.local_description_finalized()).await??;
    answerer.set_remote_description(offer.clone()).await?;
    let answer = answerer.create_answer(None).await?;
    assert_eq!(answer.media_kinds(), offer.media_kinds());

    Ok(())
}

#[tokio::test]
async fn test_negotiate_helper_connects() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;

    negotiate(&offerer, &answerer).await?;
    within(offerer.connected()).await??;
    within(answerer.connected()).await??;

    // no renegotiation once negotiated
    let err = offerer.create_offer(None).await.unwrap_err();
    assert!(err.is_invalid_state(), "{err}");

    Ok(())
}

#[tokio::test]
async fn test_remote_streams_announced_on_connect() -> Result<()> {
    init_logger();

    let api = APIBuilder::new().build();
    let offerer = api.new_peer_connection(RTCConfiguration::default())?;
    let answerer = api.new_peer_connection(RTCConfiguration::default())?;
    let mut offerer_remote = offerer.remote_streams()?;
    let mut answerer_remote = answerer.remote_streams()?;
    match offerer.remote_streams() {
        Err(Error::ErrAlreadySubscribed) => {}
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }

    let source = MediaSource::new(std::sync::Arc::new(StaticCaptureDevice::default()));
    let microphone = source
        .acquire(MediaStreamConstraints {
            audio: true,
            video: false,
        })
        .await?;
    let camera = source
        .acquire(MediaStreamConstraints {
            audio: false,
            video: true,
        })
        .await?;
    offerer.add_stream(&microphone).await?;
    answerer.add_stream(&camera).await?;

    negotiate(&offerer, &answerer).await?;
    within(offerer.connected()).await??;

    let stream = within(answerer_remote.next()).await?.expect("offerer stream");
    assert_eq!(stream, microphone);
    let stream = within(offerer_remote.next()).await?.expect("answerer stream");
    assert_eq!(stream.stream_id(), camera.stream_id());
    assert_eq!(stream.get_video_tracks().count(), 1);

    offerer.close();
    assert!(within(offerer_remote.next()).await?.is_none());

    Ok(())
}
