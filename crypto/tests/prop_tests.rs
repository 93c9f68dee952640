use proptest::prelude::*;

use spigot_crypto::{SessionSnapshot, TokenCodec};
use spigot_types::{FaucetAmount, SessionId, TargetAddress, Timestamp};

fn arb_snapshot() -> impl Strategy<Value = SessionSnapshot> {
    (
        any::<u64>(),
        prop::collection::vec(any::<u8>(), 8..24),
        any::<u128>(),
        any::<bool>(),
        "[1-9a-f]{40}",
    )
        .prop_map(|(start, preimage, balance, claimable, addr_hex)| SessionSnapshot {
            id: SessionId::random(),
            start_time: Timestamp::new(start),
            target_addr: TargetAddress::parse(&format!("0x{addr_hex}")).unwrap(),
            preimage: {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD.encode(preimage)
            },
            balance: FaucetAmount::new(balance),
            claimable,
        })
}

proptest! {
    /// verify(sign(x)) == x for every snapshot.
    #[test]
    fn sign_verify_round_trips(snapshot in arb_snapshot(), secret in ".{1,64}") {
        let codec = TokenCodec::new(secret);
        let token = codec.sign(&snapshot);
        prop_assert_eq!(codec.verify(&token).unwrap(), snapshot);
    }

    /// A token never verifies under a different secret.
    #[test]
    fn token_is_bound_to_secret(snapshot in arb_snapshot()) {
        let token = TokenCodec::new("secret-a").sign(&snapshot);
        prop_assert!(TokenCodec::new("secret-b").verify(&token).is_err());
    }

    /// Arbitrary strings never verify (no panics either).
    #[test]
    fn junk_never_verifies(junk in ".{0,200}") {
        let codec = TokenCodec::new("test-secret");
        prop_assert!(codec.verify(&junk).is_err());
    }
}
