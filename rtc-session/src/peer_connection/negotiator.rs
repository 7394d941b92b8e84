use std::collections::VecDeque;

use log::{debug, trace};

use crate::engine::{EngineCommand, RequestId};
use crate::error::{Error, Result};
use crate::peer_connection::configuration::{RTCAnswerOptions, RTCOfferOptions};
use crate::peer_connection::event::{RTCPeerConnectionEvent, RTCPeerConnectionIceErrorEvent};
use crate::peer_connection::sdp::{RTCSdpType, RTCSessionDescription};
use crate::peer_connection::state::negotiation_state::{
    NegotiationOp, check_next_negotiation_state,
};
use crate::peer_connection::state::signaling_state::{
    StateChangeOp, check_next_signaling_state, proposed_signaling_state,
};
use crate::peer_connection::state::{RTCNegotiationState, RTCSignalingState};
use crate::peer_connection::transport::RTCIceCandidateInit;

#[derive(Debug, Clone)]
pub(crate) enum Operation {
    CreateOffer(RTCOfferOptions),
    CreateAnswer(RTCAnswerOptions),
    SetLocalDescription(RTCSessionDescription),
    SetRemoteDescription(RTCSessionDescription),
    AddIceCandidate(RTCIceCandidateInit),
}

impl Operation {
    fn failed(&self, request: RequestId, err: Error) -> RTCPeerConnectionEvent {
        match self {
            Operation::CreateOffer(_) => RTCPeerConnectionEvent::OnOfferCreated(request, Err(err)),
            Operation::CreateAnswer(_) => {
                RTCPeerConnectionEvent::OnAnswerCreated(request, Err(err))
            }
            Operation::SetLocalDescription(_) => {
                RTCPeerConnectionEvent::OnLocalDescriptionSet(request, Err(err))
            }
            Operation::SetRemoteDescription(_) => {
                RTCPeerConnectionEvent::OnRemoteDescriptionSet(request, Err(err))
            }
            Operation::AddIceCandidate(_) => {
                RTCPeerConnectionEvent::OnIceCandidateAdded(request, Err(err))
            }
        }
    }
}

#[derive(Debug)]
struct InFlight {
    request: RequestId,
    operation: Operation,
    next_state: RTCNegotiationState,
    next_signaling_state: RTCSignalingState,
}

/// Serializes negotiation operations and tracks the offer/answer state.
///
/// Operations are queued in issue order and validated only when they reach
/// the head of the queue, against the state left by everything before them.
/// At most one operation is outstanding toward the engine. Every queued
/// operation completes exactly once.
pub(crate) struct SessionNegotiator {
    state: RTCNegotiationState,
    signaling_state: RTCSignalingState,
    local_description: Option<RTCSessionDescription>,
    remote_description: Option<RTCSessionDescription>,
    operations: VecDeque<(RequestId, Operation)>,
    in_flight: Option<InFlight>,
    events: VecDeque<RTCPeerConnectionEvent>,
    log_id: String,
}

impl Default for SessionNegotiator {
    fn default() -> Self {
        SessionNegotiator {
            state: RTCNegotiationState::Idle,
            signaling_state: RTCSignalingState::Stable,
            local_description: None,
            remote_description: None,
            operations: VecDeque::new(),
            in_flight: None,
            events: VecDeque::new(),
            log_id: String::new(),
        }
    }
}

impl SessionNegotiator {
    pub(crate) fn with_log_id(mut self, log_id: &str) -> Self {
        self.log_id = log_id.to_owned();
        self
    }

    pub(crate) fn state(&self) -> RTCNegotiationState {
        self.state
    }

    pub(crate) fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state
    }

    pub(crate) fn local_description(&self) -> Option<&RTCSessionDescription> {
        self.local_description.as_ref()
    }

    pub(crate) fn remote_description(&self) -> Option<&RTCSessionDescription> {
        self.remote_description.as_ref()
    }

    /// No operation was ever issued.
    pub(crate) fn is_idle(&self) -> bool {
        self.state == RTCNegotiationState::Idle
            && self.in_flight.is_none()
            && self.operations.is_empty()
    }

    pub(crate) fn poll_event(&mut self) -> Option<RTCPeerConnectionEvent> {
        self.events.pop_front()
    }

    pub(crate) fn enqueue(&mut self, request: RequestId, operation: Operation) {
        if self.state == RTCNegotiationState::Closed {
            self.events
                .push_back(operation.failed(request, Error::ErrConnectionClosed));
            return;
        }
        trace!("[{}] queue request {request}: {operation:?}", self.log_id);
        self.operations.push_back((request, operation));
    }

    /// Starts the next queued operation if none is outstanding. Operations
    /// that fail validation complete immediately and the next one is tried.
    pub(crate) fn dispatch(&mut self) -> Option<EngineCommand> {
        if self.in_flight.is_some() {
            return None;
        }

        while let Some((request, operation)) = self.operations.pop_front() {
            match self.validate(&operation) {
                Ok((next_state, next_signaling_state)) => {
                    let command = match &operation {
                        Operation::CreateOffer(options) => EngineCommand::GenerateOffer {
                            request,
                            options: *options,
                        },
                        Operation::CreateAnswer(options) => EngineCommand::GenerateAnswer {
                            request,
                            options: *options,
                        },
                        Operation::SetLocalDescription(description) => {
                            EngineCommand::ApplyLocalDescription {
                                request,
                                description: description.clone(),
                            }
                        }
                        Operation::SetRemoteDescription(description) => {
                            EngineCommand::ApplyRemoteDescription {
                                request,
                                description: description.clone(),
                            }
                        }
                        Operation::AddIceCandidate(candidate) => EngineCommand::AddIceCandidate {
                            request,
                            candidate: candidate.clone(),
                        },
                    };
                    self.in_flight = Some(InFlight {
                        request,
                        operation,
                        next_state,
                        next_signaling_state,
                    });
                    return Some(command);
                }
                Err(err) => {
                    debug!("[{}] request {request} rejected: {err}", self.log_id);
                    if let (Operation::AddIceCandidate(candidate), Error::ErrCandidateMalformed(_)) =
                        (&operation, &err)
                    {
                        self.events
                            .push_back(RTCPeerConnectionEvent::OnIceCandidateErrorEvent(
                                RTCPeerConnectionIceErrorEvent {
                                    candidate: candidate.clone(),
                                    error_text: err.to_string(),
                                },
                            ));
                    }
                    self.events.push_back(operation.failed(request, err));
                }
            }
        }

        None
    }

    fn validate(&self, operation: &Operation) -> Result<(RTCNegotiationState, RTCSignalingState)> {
        match operation {
            Operation::CreateOffer(_) => Ok((
                check_next_negotiation_state(self.state, NegotiationOp::CreateOffer)?,
                self.signaling_state,
            )),
            Operation::CreateAnswer(_) => {
                let next = check_next_negotiation_state(self.state, NegotiationOp::CreateAnswer)?;
                if !self
                    .remote_description
                    .as_ref()
                    .is_some_and(|desc| desc.sdp_type == RTCSdpType::Offer)
                {
                    return Err(Error::ErrNoRemoteDescription);
                }
                Ok((next, self.signaling_state))
            }
            Operation::SetLocalDescription(description) => {
                let next = check_next_negotiation_state(
                    self.state,
                    NegotiationOp::SetLocal(description.sdp_type),
                )?;
                let next_signaling_state = check_next_signaling_state(
                    self.signaling_state,
                    proposed_signaling_state(StateChangeOp::SetLocal, description.sdp_type),
                    StateChangeOp::SetLocal,
                    description.sdp_type,
                )?;
                Ok((next, next_signaling_state))
            }
            Operation::SetRemoteDescription(description) => {
                let next = check_next_negotiation_state(
                    self.state,
                    NegotiationOp::SetRemote(description.sdp_type),
                )?;
                let next_signaling_state = check_next_signaling_state(
                    self.signaling_state,
                    proposed_signaling_state(StateChangeOp::SetRemote, description.sdp_type),
                    StateChangeOp::SetRemote,
                    description.sdp_type,
                )?;
                Ok((next, next_signaling_state))
            }
            Operation::AddIceCandidate(candidate) => {
                if self.state == RTCNegotiationState::Closed {
                    return Err(Error::ErrConnectionClosed);
                }
                if self.remote_description.is_none() {
                    return Err(Error::ErrNoRemoteDescription);
                }
                if !candidate.is_end_of_candidates() {
                    candidate.to_candidate()?;
                }
                Ok((self.state, self.signaling_state))
            }
        }
    }

    fn take_in_flight(
        &mut self,
        request: RequestId,
        matches_operation: impl Fn(&Operation) -> bool,
    ) -> Option<InFlight> {
        let pending = self.in_flight.as_ref().is_some_and(|in_flight| {
            in_flight.request == request && matches_operation(&in_flight.operation)
        });
        if pending {
            self.in_flight.take()
        } else {
            debug!(
                "[{}] ignoring completion for unknown request {request}",
                self.log_id
            );
            None
        }
    }

    fn set_state(&mut self, state: RTCNegotiationState) {
        if self.state != state {
            self.state = state;
            self.events
                .push_back(RTCPeerConnectionEvent::OnNegotiationStateChangeEvent(state));
        }
    }

    fn set_signaling_state(&mut self, state: RTCSignalingState) {
        if self.signaling_state != state {
            self.signaling_state = state;
            self.events
                .push_back(RTCPeerConnectionEvent::OnSignalingStateChangeEvent(state));
        }
    }

    /// Completion of `create_offer` or `create_answer`.
    pub(crate) fn on_generated(
        &mut self,
        request: RequestId,
        result: Result<RTCSessionDescription>,
    ) {
        let Some(in_flight) = self.take_in_flight(request, |op| {
            matches!(op, Operation::CreateOffer(_) | Operation::CreateAnswer(_))
        }) else {
            return;
        };

        let is_offer = matches!(in_flight.operation, Operation::CreateOffer(_));
        let result = result.and_then(|desc| {
            desc.validate()?;
            match (is_offer, desc.sdp_type) {
                (true, RTCSdpType::Offer) | (false, RTCSdpType::Answer) => Ok(desc),
                (_, sdp_type) => Err(Error::ErrNegotiation(format!(
                    "engine generated a description of type {sdp_type}"
                ))),
            }
        });

        if result.is_ok() {
            self.set_state(in_flight.next_state);
        }
        self.events.push_back(if is_offer {
            RTCPeerConnectionEvent::OnOfferCreated(request, result)
        } else {
            RTCPeerConnectionEvent::OnAnswerCreated(request, result)
        });
    }

    /// Completion of `set_local_description` or `set_remote_description`.
    ///
    /// For a local description, returns the committed description or the
    /// failure, so the current gathering pass can be settled.
    pub(crate) fn on_applied(
        &mut self,
        request: RequestId,
        result: Result<()>,
    ) -> Option<Result<RTCSessionDescription>> {
        let in_flight = self.take_in_flight(request, |op| {
            matches!(
                op,
                Operation::SetLocalDescription(_) | Operation::SetRemoteDescription(_)
            )
        })?;

        match (in_flight.operation, result) {
            (Operation::SetLocalDescription(description), Ok(())) => {
                self.local_description = Some(description.clone());
                self.set_state(in_flight.next_state);
                self.set_signaling_state(in_flight.next_signaling_state);
                self.events
                    .push_back(RTCPeerConnectionEvent::OnLocalDescriptionSet(request, Ok(())));
                Some(Ok(description))
            }
            (Operation::SetLocalDescription(_), Err(err)) => {
                self.events.push_back(RTCPeerConnectionEvent::OnLocalDescriptionSet(
                    request,
                    Err(err.clone()),
                ));
                Some(Err(err))
            }
            (Operation::SetRemoteDescription(description), Ok(())) => {
                self.remote_description = Some(description);
                self.set_state(in_flight.next_state);
                self.set_signaling_state(in_flight.next_signaling_state);
                self.events
                    .push_back(RTCPeerConnectionEvent::OnRemoteDescriptionSet(request, Ok(())));
                None
            }
            (_, result) => {
                self.events
                    .push_back(RTCPeerConnectionEvent::OnRemoteDescriptionSet(request, result));
                None
            }
        }
    }

    /// Completion of `add_ice_candidate`. A rejected candidate is reported
    /// but leaves the negotiation untouched.
    pub(crate) fn on_candidate_added(&mut self, request: RequestId, result: Result<()>) {
        let Some(in_flight) =
            self.take_in_flight(request, |op| matches!(op, Operation::AddIceCandidate(_)))
        else {
            return;
        };

        if let (Operation::AddIceCandidate(candidate), Err(err)) = (&in_flight.operation, &result) {
            self.events
                .push_back(RTCPeerConnectionEvent::OnIceCandidateErrorEvent(
                    RTCPeerConnectionIceErrorEvent {
                        candidate: candidate.clone(),
                        error_text: err.to_string(),
                    },
                ));
        }
        self.events
            .push_back(RTCPeerConnectionEvent::OnIceCandidateAdded(request, result));
    }

    /// Fails the outstanding and every queued operation, in issue order.
    pub(crate) fn close(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            self.events.push_back(
                in_flight
                    .operation
                    .failed(in_flight.request, Error::ErrConnectionClosed),
            );
        }
        while let Some((request, operation)) = self.operations.pop_front() {
            self.events
                .push_back(operation.failed(request, Error::ErrConnectionClosed));
        }
        self.set_state(RTCNegotiationState::Closed);
        self.set_signaling_state(RTCSignalingState::Closed);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SDP: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\na=mid:0\r\n";

    fn desc(sdp_type: RTCSdpType) -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type,
            sdp: SDP.to_owned(),
        }
    }

    fn drain(n: &mut SessionNegotiator) -> Vec<RTCPeerConnectionEvent> {
        let mut events = vec![];
        while let Some(event) = n.poll_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_negotiator_offerer_round() {
        let mut n = SessionNegotiator::default();

        n.enqueue(1, Operation::CreateOffer(RTCOfferOptions::receive_audio_video()));
        n.enqueue(2, Operation::SetLocalDescription(desc(RTCSdpType::Offer)));

        let Some(EngineCommand::GenerateOffer { request: 1, options }) = n.dispatch() else {
            panic!("expected GenerateOffer");
        };
        assert!(options.offer_to_receive_audio && options.offer_to_receive_video);
        // the second operation waits for the first
        assert!(n.dispatch().is_none());

        n.on_generated(1, Ok(desc(RTCSdpType::Offer)));
        assert_eq!(n.state(), RTCNegotiationState::OfferCreated);

        let Some(EngineCommand::ApplyLocalDescription { request: 2, .. }) = n.dispatch() else {
            panic!("expected ApplyLocalDescription");
        };
        assert_eq!(
            n.on_applied(2, Ok(())),
            Some(Ok(desc(RTCSdpType::Offer)))
        );
        assert_eq!(n.state(), RTCNegotiationState::LocalDescriptionSet);
        assert_eq!(n.signaling_state(), RTCSignalingState::HaveLocalOffer);

        n.enqueue(3, Operation::SetRemoteDescription(desc(RTCSdpType::Answer)));
        assert!(n.dispatch().is_some());
        assert_eq!(n.on_applied(3, Ok(())), None);
        assert_eq!(n.state(), RTCNegotiationState::Negotiated);
        assert_eq!(n.signaling_state(), RTCSignalingState::Stable);

        let completions: Vec<_> = drain(&mut n)
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    RTCPeerConnectionEvent::OnOfferCreated(..)
                        | RTCPeerConnectionEvent::OnLocalDescriptionSet(..)
                        | RTCPeerConnectionEvent::OnRemoteDescriptionSet(..)
                )
            })
            .collect();
        assert_eq!(
            completions,
            vec![
                RTCPeerConnectionEvent::OnOfferCreated(1, Ok(desc(RTCSdpType::Offer))),
                RTCPeerConnectionEvent::OnLocalDescriptionSet(2, Ok(())),
                RTCPeerConnectionEvent::OnRemoteDescriptionSet(3, Ok(())),
            ]
        );
    }

    #[test]
    fn test_negotiator_answerer_round() {
        let mut n = SessionNegotiator::default();

        n.enqueue(1, Operation::SetRemoteDescription(desc(RTCSdpType::Offer)));
        assert!(n.dispatch().is_some());
        n.on_applied(1, Ok(()));
        assert_eq!(n.state(), RTCNegotiationState::RemoteDescriptionSet);
        assert_eq!(n.signaling_state(), RTCSignalingState::HaveRemoteOffer);

        n.enqueue(2, Operation::CreateAnswer(RTCAnswerOptions::default()));
        assert!(n.dispatch().is_some());
        n.on_generated(2, Ok(desc(RTCSdpType::Answer)));
        assert_eq!(n.state(), RTCNegotiationState::AnswerCreated);

        n.enqueue(3, Operation::SetLocalDescription(desc(RTCSdpType::Answer)));
        assert!(n.dispatch().is_some());
        assert!(matches!(n.on_applied(3, Ok(())), Some(Ok(_))));
        assert_eq!(n.state(), RTCNegotiationState::Negotiated);
        assert_eq!(n.signaling_state(), RTCSignalingState::Stable);
    }

    #[test]
    fn test_negotiator_rejects_out_of_order() {
        let tests = vec![
            (
                "answer without remote offer",
                vec![Operation::CreateAnswer(RTCAnswerOptions::default())],
                Error::ErrInvalidState("create_answer is not valid in state idle".to_owned()),
            ),
            (
                "remote answer without local offer",
                vec![Operation::SetRemoteDescription(desc(RTCSdpType::Answer))],
                Error::ErrInvalidState(
                    "set_remote_description(answer) is not valid in state idle".to_owned(),
                ),
            ),
            (
                "candidate without remote description",
                vec![Operation::AddIceCandidate(RTCIceCandidateInit {
                    candidate: "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host".to_owned(),
                    ..Default::default()
                })],
                Error::ErrNoRemoteDescription,
            ),
        ];

        for (name, operations, expected_err) in tests {
            let mut n = SessionNegotiator::default();
            for (request, operation) in operations.into_iter().enumerate() {
                n.enqueue(request as RequestId, operation);
            }
            assert!(n.dispatch().is_none(), "testCase: {name}");

            let errors: Vec<Error> = drain(&mut n)
                .into_iter()
                .filter_map(|e| match e {
                    RTCPeerConnectionEvent::OnAnswerCreated(_, Err(err))
                    | RTCPeerConnectionEvent::OnRemoteDescriptionSet(_, Err(err))
                    | RTCPeerConnectionEvent::OnIceCandidateAdded(_, Err(err)) => Some(err),
                    _ => None,
                })
                .collect();
            assert_eq!(errors, vec![expected_err.clone()], "testCase: {name}");
            assert!(expected_err.is_invalid_state(), "testCase: {name}");
            assert_eq!(n.state(), RTCNegotiationState::Idle, "testCase: {name}");
        }
    }

    #[test]
    fn test_negotiator_second_local_description() {
        let mut n = SessionNegotiator::default();
        n.enqueue(1, Operation::SetLocalDescription(desc(RTCSdpType::Offer)));
        n.enqueue(2, Operation::SetLocalDescription(desc(RTCSdpType::Offer)));
        assert!(n.dispatch().is_some());
        n.on_applied(1, Ok(()));
        assert!(n.dispatch().is_none());

        let last = drain(&mut n).pop();
        assert!(matches!(
            last,
            Some(RTCPeerConnectionEvent::OnLocalDescriptionSet(2, Err(Error::ErrInvalidState(_))))
        ));
        assert_eq!(n.local_description(), Some(&desc(RTCSdpType::Offer)));
    }

    #[test]
    fn test_negotiator_malformed_candidate() {
        let mut n = SessionNegotiator::default();
        n.enqueue(1, Operation::SetRemoteDescription(desc(RTCSdpType::Offer)));
        assert!(n.dispatch().is_some());
        n.on_applied(1, Ok(()));
        drain(&mut n);

        let malformed = RTCIceCandidateInit {
            candidate: "candidate:garbage".to_owned(),
            ..Default::default()
        };
        n.enqueue(2, Operation::AddIceCandidate(malformed.clone()));
        assert!(n.dispatch().is_none());

        let events = drain(&mut n);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            RTCPeerConnectionEvent::OnIceCandidateErrorEvent(e) if e.candidate == malformed
        ));
        assert!(matches!(
            &events[1],
            RTCPeerConnectionEvent::OnIceCandidateAdded(2, Err(Error::ErrCandidateMalformed(_)))
        ));
        assert_eq!(n.state(), RTCNegotiationState::RemoteDescriptionSet);

        // remote end-of-candidates is forwarded
        n.enqueue(3, Operation::AddIceCandidate(RTCIceCandidateInit::default()));
        assert!(matches!(
            n.dispatch(),
            Some(EngineCommand::AddIceCandidate { request: 3, .. })
        ));
    }

    #[test]
    fn test_negotiator_engine_failure_keeps_state() {
        let mut n = SessionNegotiator::default();
        n.enqueue(1, Operation::SetRemoteDescription(desc(RTCSdpType::Offer)));
        assert!(n.dispatch().is_some());
        n.on_applied(1, Err(Error::ErrNegotiation("incompatible".to_owned())));
        assert_eq!(n.state(), RTCNegotiationState::Idle);
        assert_eq!(n.remote_description(), None);

        // stale and unknown completions are ignored
        n.on_applied(1, Ok(()));
        n.on_generated(7, Ok(desc(RTCSdpType::Offer)));
        assert_eq!(
            drain(&mut n),
            vec![RTCPeerConnectionEvent::OnRemoteDescriptionSet(
                1,
                Err(Error::ErrNegotiation("incompatible".to_owned()))
            )]
        );
    }

    #[test]
    fn test_negotiator_close_fails_pending() {
        let mut n = SessionNegotiator::default();
        n.enqueue(1, Operation::CreateOffer(RTCOfferOptions::default()));
        n.enqueue(2, Operation::SetLocalDescription(desc(RTCSdpType::Offer)));
        assert!(n.dispatch().is_some());

        n.close();
        n.close();
        n.enqueue(3, Operation::CreateOffer(RTCOfferOptions::default()));
        n.on_generated(1, Ok(desc(RTCSdpType::Offer)));

        assert_eq!(
            drain(&mut n),
            vec![
                RTCPeerConnectionEvent::OnOfferCreated(1, Err(Error::ErrConnectionClosed)),
                RTCPeerConnectionEvent::OnLocalDescriptionSet(2, Err(Error::ErrConnectionClosed)),
                RTCPeerConnectionEvent::OnNegotiationStateChangeEvent(RTCNegotiationState::Closed),
                RTCPeerConnectionEvent::OnSignalingStateChangeEvent(RTCSignalingState::Closed),
                RTCPeerConnectionEvent::OnOfferCreated(3, Err(Error::ErrConnectionClosed)),
            ]
        );
    }
}
