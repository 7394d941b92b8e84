use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::peer_connection::configuration::RTCIceGatheringPolicy;
use crate::peer_connection::event::{RTCPeerConnectionEvent, RTCPeerConnectionIceEvent};
use crate::peer_connection::sdp::RTCSessionDescription;
use crate::peer_connection::state::RTCIceGatheringState;
use crate::peer_connection::transport::RTCIceCandidateInit;

#[derive(Debug, Default)]
struct GatheringPass {
    candidates: Vec<RTCIceCandidateInit>,
    applied: Option<RTCSessionDescription>,
    complete: bool,
    finalized: bool,
    deadline: Option<Instant>,
}

/// Turns the engine's per-candidate notifications into a single "local
/// description finalized" signal per gathering pass.
///
/// A pass starts when a local description is handed to the engine and is
/// terminated by the end-of-candidates sentinel. Nothing is accepted into a
/// pass after its sentinel.
pub(crate) struct CandidateGatherer {
    policy: RTCIceGatheringPolicy,
    timeout: Option<Duration>,
    state: RTCIceGatheringState,
    pass: Option<GatheringPass>,
    events: VecDeque<RTCPeerConnectionEvent>,
    log_id: String,
}

impl CandidateGatherer {
    pub(crate) fn new(policy: RTCIceGatheringPolicy, timeout: Option<Duration>) -> Self {
        CandidateGatherer {
            policy,
            timeout,
            state: RTCIceGatheringState::New,
            pass: None,
            events: VecDeque::new(),
            log_id: String::new(),
        }
    }

    pub(crate) fn with_log_id(mut self, log_id: &str) -> Self {
        self.log_id = log_id.to_owned();
        self
    }

    pub(crate) fn state(&self) -> RTCIceGatheringState {
        self.state
    }

    /// Candidates of the current pass, in discovery order.
    pub(crate) fn candidates(&self) -> &[RTCIceCandidateInit] {
        self.pass
            .as_ref()
            .map(|pass| pass.candidates.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.pass.as_ref().is_some_and(|pass| pass.complete)
    }

    pub(crate) fn poll_event(&mut self) -> Option<RTCPeerConnectionEvent> {
        self.events.pop_front()
    }

    fn set_state(&mut self, state: RTCIceGatheringState) {
        if self.state != state {
            self.state = state;
            self.events
                .push_back(RTCPeerConnectionEvent::OnIceGatheringStateChangeEvent(state));
        }
    }

    fn finalize(&mut self, result: Result<RTCSessionDescription>) {
        if let Some(pass) = self.pass.as_mut() {
            if pass.finalized {
                return;
            }
            pass.finalized = true;
            self.events
                .push_back(RTCPeerConnectionEvent::OnLocalDescriptionFinalized(result));
        }
    }

    /// Starts a new pass, discarding the candidates of the previous one.
    pub(crate) fn begin_pass(&mut self, now: Instant) {
        if self.pass.as_ref().is_some_and(|pass| !pass.finalized) {
            self.finalize(Err(Error::ErrNegotiation(
                "gathering pass superseded by a new local description".to_owned(),
            )));
        }

        self.pass = Some(GatheringPass {
            deadline: self.timeout.map(|timeout| now + timeout),
            ..Default::default()
        });
        self.events
            .push_back(RTCPeerConnectionEvent::OnIceGatheringPassStarted);
        self.set_state(RTCIceGatheringState::Gathering);
    }

    pub(crate) fn observe(&mut self, candidate: Option<RTCIceCandidateInit>) {
        let Some(pass) = self.pass.as_mut().filter(|pass| !pass.complete) else {
            warn!(
                "[{}] dropping ice candidate outside of an active gathering pass: {candidate:?}",
                self.log_id
            );
            return;
        };

        let event = RTCPeerConnectionIceEvent::from(candidate);
        if let Some(candidate) = &event.candidate {
            pass.candidates.push(candidate.clone());
        } else {
            pass.complete = true;
            pass.deadline = None;
            debug!(
                "[{}] gathering pass complete with {} candidate(s)",
                self.log_id,
                pass.candidates.len()
            );
        }

        let complete = event.is_end_of_candidates();
        self.events
            .push_back(RTCPeerConnectionEvent::OnIceCandidateEvent(event));
        if complete {
            self.set_state(RTCIceGatheringState::Complete);
            self.try_finalize();
        }
    }

    pub(crate) fn on_local_applied(&mut self, description: RTCSessionDescription) {
        if let Some(pass) = self.pass.as_mut() {
            pass.applied = Some(description);
            self.try_finalize();
        }
    }

    /// The engine rejected the local description; the pass fails with `err`.
    pub(crate) fn on_local_failed(&mut self, err: Error) {
        self.finalize(Err(err));
        self.pass = None;
        self.set_state(RTCIceGatheringState::New);
    }

    fn try_finalize(&mut self) {
        let Some(pass) = self.pass.as_ref() else {
            return;
        };
        let Some(applied) = pass.applied.as_ref() else {
            return;
        };

        let finalized = match self.policy {
            RTCIceGatheringPolicy::Trickle => applied.clone(),
            RTCIceGatheringPolicy::Complete | RTCIceGatheringPolicy::Unspecified => {
                if !pass.complete {
                    return;
                }
                applied.with_candidates(&pass.candidates)
            }
        };
        self.finalize(Ok(finalized));
    }

    pub(crate) fn handle_timeout(&mut self, now: Instant) {
        let expired = self
            .pass
            .as_ref()
            .and_then(|pass| pass.deadline)
            .is_some_and(|deadline| deadline <= now);
        if expired {
            warn!(
                "[{}] ice gathering timed out, completing pass without end-of-candidates",
                self.log_id
            );
            self.observe(None);
        }
    }

    pub(crate) fn poll_timeout(&self) -> Option<Instant> {
        self.pass.as_ref().and_then(|pass| pass.deadline)
    }

    /// Fails a pending finalization; the connection is going away.
    pub(crate) fn close(&mut self) {
        self.finalize(Err(Error::ErrConnectionClosed));
        if let Some(pass) = self.pass.as_mut() {
            pass.complete = true;
            pass.deadline = None;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peer_connection::sdp::RTCSdpType;

    const OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\na=mid:0\r\n";

    fn offer() -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type: RTCSdpType::Offer,
            sdp: OFFER_SDP.to_owned(),
        }
    }

    fn host(n: u16) -> Option<RTCIceCandidateInit> {
        Some(RTCIceCandidateInit {
            candidate: format!("candidate:{n} 1 udp 2130706431 127.0.0.1 {} typ host", 50000 + n),
            sdp_mid: Some("0".to_owned()),
            sdp_mline_index: Some(0),
            ..Default::default()
        })
    }

    fn empty() -> Option<RTCIceCandidateInit> {
        Some(RTCIceCandidateInit::default())
    }

    fn finalized(g: &mut CandidateGatherer) -> Vec<Result<RTCSessionDescription>> {
        let mut out = vec![];
        while let Some(event) = g.poll_event() {
            if let RTCPeerConnectionEvent::OnLocalDescriptionFinalized(result) = event {
                out.push(result);
            }
        }
        out
    }

    #[test]
    fn test_gatherer_finalizes_once_after_sentinel() {
        let tests = vec![
            ("null sentinel", vec![host(1), host(2), host(3), None], 3),
            ("empty sentinel", vec![host(1), host(2), host(3), empty()], 3),
            ("no candidates", vec![None], 0),
            (
                "candidates after sentinel",
                vec![host(1), None, host(2), None, empty()],
                1,
            ),
        ];

        for (name, candidates, expected_count) in tests {
            let mut g = CandidateGatherer::new(RTCIceGatheringPolicy::Complete, None);
            g.begin_pass(Instant::now());
            g.on_local_applied(offer());
            for candidate in candidates {
                g.observe(candidate);
            }

            let results = finalized(&mut g);
            assert_eq!(results.len(), 1, "testCase: {name}");
            let Ok(desc) = &results[0] else {
                panic!("testCase: {name}: {:?}", results[0]);
            };
            assert_eq!(desc.sdp_type, RTCSdpType::Offer, "testCase: {name}");
            assert_eq!(
                desc.sdp.matches("a=candidate:").count(),
                expected_count,
                "testCase: {name}"
            );
            assert_eq!(g.candidates().len(), expected_count, "testCase: {name}");
            assert_eq!(g.state(), RTCIceGatheringState::Complete, "testCase: {name}");
        }
    }

    #[test]
    fn test_gatherer_waits_for_sentinel() {
        let mut g = CandidateGatherer::new(RTCIceGatheringPolicy::Complete, None);
        g.begin_pass(Instant::now());
        g.observe(host(1));
        g.observe(host(2));
        g.on_local_applied(offer());
        assert!(finalized(&mut g).is_empty());

        g.observe(None);
        assert_eq!(finalized(&mut g).len(), 1);
    }

    #[test]
    fn test_gatherer_sentinel_before_apply() {
        let mut g = CandidateGatherer::new(RTCIceGatheringPolicy::Complete, None);
        g.begin_pass(Instant::now());
        g.observe(host(1));
        g.observe(None);
        assert!(finalized(&mut g).is_empty());

        g.on_local_applied(offer());
        assert_eq!(finalized(&mut g).len(), 1);
    }

    #[test]
    fn test_gatherer_trickle() {
        let mut g = CandidateGatherer::new(RTCIceGatheringPolicy::Trickle, None);
        g.begin_pass(Instant::now());
        g.on_local_applied(offer());

        let results = finalized(&mut g);
        assert_eq!(results, vec![Ok(offer())]);

        g.observe(host(1));
        g.observe(None);
        assert!(finalized(&mut g).is_empty());
        assert_eq!(g.candidates().len(), 1);
    }

    #[test]
    fn test_gatherer_apply_failure() {
        let mut g = CandidateGatherer::new(RTCIceGatheringPolicy::Complete, None);
        g.begin_pass(Instant::now());
        g.observe(host(1));
        g.on_local_failed(Error::ErrNegotiation("rejected".to_owned()));
        g.observe(None);

        assert_eq!(
            finalized(&mut g),
            vec![Err(Error::ErrNegotiation("rejected".to_owned()))]
        );
        assert_eq!(g.state(), RTCIceGatheringState::New);
    }

    #[test]
    fn test_gatherer_timeout() {
        let start = Instant::now();
        let mut g =
            CandidateGatherer::new(RTCIceGatheringPolicy::Complete, Some(Duration::from_secs(2)));
        g.begin_pass(start);
        g.on_local_applied(offer());
        g.observe(host(1));
        assert_eq!(g.poll_timeout(), Some(start + Duration::from_secs(2)));

        g.handle_timeout(start + Duration::from_secs(1));
        assert!(finalized(&mut g).is_empty());

        g.handle_timeout(start + Duration::from_secs(2));
        assert_eq!(finalized(&mut g).len(), 1);
        assert_eq!(g.poll_timeout(), None);
    }

    #[test]
    fn test_gatherer_superseded_pass() {
        let mut g = CandidateGatherer::new(RTCIceGatheringPolicy::Complete, None);
        g.begin_pass(Instant::now());
        g.on_local_applied(offer());
        g.observe(host(1));
        while g.poll_event().is_some() {}

        g.begin_pass(Instant::now());
        let events: Vec<RTCPeerConnectionEvent> = std::iter::from_fn(|| g.poll_event()).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            RTCPeerConnectionEvent::OnLocalDescriptionFinalized(Err(Error::ErrNegotiation(_)))
        ));
        assert_eq!(events[1], RTCPeerConnectionEvent::OnIceGatheringPassStarted);
        assert_eq!(g.state(), RTCIceGatheringState::Gathering);
        assert!(g.candidates().is_empty());

        g.on_local_applied(offer());
        g.observe(None);
        assert!(matches!(finalized(&mut g).as_slice(), [Ok(_)]));
    }

    #[test]
    fn test_gatherer_close() {
        let mut g = CandidateGatherer::new(RTCIceGatheringPolicy::Complete, None);
        g.close();
        assert!(finalized(&mut g).is_empty());

        g.begin_pass(Instant::now());
        g.observe(host(1));
        g.close();
        g.close();
        g.observe(None);
        assert_eq!(finalized(&mut g), vec![Err(Error::ErrConnectionClosed)]);
    }
}
