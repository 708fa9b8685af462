use proptest::prelude::*;

use phonelink_types::{Address, ProcessStep, RecoverableSignature, RequestId, Timestamp};

fn any_step() -> impl Strategy<Value = ProcessStep> {
    prop_oneof![
        Just(ProcessStep::None),
        Just(ProcessStep::ReceivedRegister),
        Just(ProcessStep::ReceivedBroadcast),
        Just(ProcessStep::SentSms),
        Just(ProcessStep::ReceivedCode),
        Just(ProcessStep::Voted),
        Just(ProcessStep::Finished),
    ]
}

proptest! {
    /// Uppercasing the hex digits of an address never changes its identity.
    #[test]
    fn address_parse_ignores_case(bytes in prop::array::uniform20(0u8..)) {
        let addr = Address::new(bytes);
        let upper = format!("0x{}", addr.to_string()[2..].to_uppercase());
        prop_assert_eq!(upper.parse::<Address>().unwrap(), addr);
    }

    /// Parsing arbitrary text never panics.
    #[test]
    fn parsers_never_panic(s in "\\PC{0,140}") {
        let _ = s.parse::<Address>();
        let _ = s.parse::<RequestId>();
        let _ = s.parse::<RecoverableSignature>();
    }

    /// A step can never be followed by an earlier one.
    #[test]
    fn steps_are_antisymmetric(a in any_step(), b in any_step()) {
        if a != b && a.can_advance_to(b) {
            prop_assert!(!b.can_advance_to(a));
        }
    }

    /// has_expired flips exactly at `start + duration`.
    #[test]
    fn expiry_boundary(start in 0u64..1_000_000, duration in 0u64..100_000) {
        let t = Timestamp::new(start);
        prop_assert!(t.has_expired(duration, Timestamp::new(start + duration)));
        if duration > 0 {
            prop_assert!(!t.has_expired(duration, Timestamp::new(start + duration - 1)));
        }
    }
}
