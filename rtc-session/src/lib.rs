//! # rtc-session - WebRTC negotiation and data channel lifecycle
//!
//! This crate drives the offer/answer exchange, local candidate gathering and
//! data channel lifecycle of a WebRTC peer connection. Packet transport is
//! left to an external **engine** behind the [`engine::Engine`] trait; this
//! crate decides *what* the engine is asked to do and *when*, and turns its
//! notifications into states, continuations and event streams.
//!
//! ## Layers
//!
//! - [`peer_connection::RTCPeerConnection`] is a sans-I/O state machine
//!   implementing [`sansio::Protocol`]. It owns the negotiation state, the
//!   operations chain, the gathering pass and every data channel. Nothing in
//!   it blocks or spawns.
//! - [`api`] wraps it in a tokio task per connection and exposes `async`
//!   operations, [`futures::Stream`]s of candidates, channels and messages.
//! - [`engine::loopback`] is an in-process engine that connects peer
//!   connections created from the same [`engine::loopback::LoopbackNetwork`].
//!   Tests and the demo run on it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use rtc_session::api::APIBuilder;
//! use rtc_session::peer_connection::configuration::RTCConfiguration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = APIBuilder::new().build();
//! let alice = api.new_peer_connection(RTCConfiguration::default())?;
//! let bob = api.new_peer_connection(RTCConfiguration::default())?;
//! let mut incoming = bob.incoming_data_channels()?;
//!
//! // 1. Channels created before negotiation are announced once connected
//! let chat = alice.create_data_channel("chat", None).await?;
//!
//! // 2. Offer/answer; with the default `complete` gathering policy the
//! //    finalized descriptions already carry every candidate
//! let offer = alice.create_offer(None).await?;
//! alice.set_local_description(offer).await?;
//! bob.set_remote_description(alice.local_description_finalized().await?)
//!     .await?;
//!
//! let answer = bob.create_answer(None).await?;
//! bob.set_local_description(answer).await?;
//! alice
//!     .set_remote_description(bob.local_description_finalized().await?)
//!     .await?;
//!
//! // 3. Exchange messages
//! let remote = incoming.next().await.ok_or("connection closed")?;
//! let message = remote.message_once();
//! chat.ready().await?;
//! chat.send_text("hello")?;
//! assert_eq!(message.await?.as_text(), Some("hello"));
//!
//! alice.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Gathering policy
//!
//! [`RTCIceGatheringPolicy::Complete`](peer_connection::configuration::RTCIceGatheringPolicy)
//! waits for the end of candidates and merges them into the finalized local
//! description, so a single description per side is enough. With `Trickle`
//! the description is final as soon as it is applied and candidates are
//! forwarded one by one from [`api::PeerConnection::candidates`].
//!
//! ## Logging
//!
//! Every log line of a connection is prefixed with its id (`[pc-N]`). The
//! crate only uses the [`log`](https://docs.rs/log) facade; pick any logger in
//! the application.

#![warn(rust_2018_idioms)]

pub use sansio;

pub mod api;
pub mod data_channel;
pub mod engine;
pub mod error;
pub mod media_stream;
pub mod peer_connection;
pub(crate) mod util;
