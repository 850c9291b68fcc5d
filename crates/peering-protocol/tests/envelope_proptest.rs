use bytes::Bytes;
use peering_protocol::{unwrap, wrap, Frame, PeerId, PeeringError, StateEnvelope};
use proptest::prelude::*;

/// Broker names as an operator would type them.
fn arb_peer_id() -> impl Strategy<Value = PeerId> {
    "[A-Za-z0-9_.:-]{1,32}".prop_map(|s| PeerId::new(s).unwrap())
}

fn arb_payload() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..2048).prop_map(Bytes::from)
}

proptest! {
    /// unwrap(wrap(p, b)) == (p, b) for every origin and payload.
    #[test]
    fn wrap_then_unwrap_is_identity(origin in arb_peer_id(), payload in arb_payload()) {
        let (got_origin, got_payload) = unwrap(wrap(&origin, payload.clone())).expect("decode");
        prop_assert_eq!(got_origin, origin);
        prop_assert_eq!(got_payload, payload);
    }

    /// The struct form obeys the same law.
    #[test]
    fn envelope_struct_round_trip(origin in arb_peer_id(), payload in arb_payload()) {
        let env = StateEnvelope::new(origin, payload);
        let decoded = StateEnvelope::from_frame(env.clone().into_frame()).expect("decode");
        prop_assert_eq!(decoded, env);
    }

    /// A wrapped frame always has exactly three parts, origin first.
    #[test]
    fn wrap_is_self_addressed(origin in arb_peer_id(), payload in arb_payload()) {
        let frame = wrap(&origin, payload);
        prop_assert_eq!(frame.len(), 3);
        prop_assert_eq!(&frame.parts()[0][..], origin.as_bytes());
        prop_assert!(frame.parts()[1].is_empty());
    }

    /// Anything with fewer than two parts is rejected, whatever it holds.
    #[test]
    fn short_frames_are_malformed(parts in prop::collection::vec(arb_payload(), 0..2)) {
        let err = unwrap(Frame::from_parts(parts)).unwrap_err();
        prop_assert!(matches!(err, PeeringError::MalformedEnvelope { .. }), "got {:?}", err);
    }

    /// Decoding arbitrary frames never panics.
    #[test]
    fn unwrap_total_on_arbitrary_frames(parts in prop::collection::vec(arb_payload(), 0..6)) {
        let _ = unwrap(Frame::from_parts(parts));
    }
}
