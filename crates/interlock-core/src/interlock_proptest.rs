#[cfg(test)]
mod proptest_interlock {
    use crate::actuator::{AlarmIndication, MachineCommand};
    use crate::compliance::*;
    use crate::interlock::*;
    use crate::tags::PpeTag;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn tag() -> impl Strategy<Value = PpeTag> {
        (0u16..10).prop_map(PpeTag::from_class)
    }

    fn config() -> InterlockConfig {
        InterlockConfig {
            warn_grace: Duration::from_secs(15),
            fault_grace: Duration::from_secs(20),
            warn_sound: false,
            fault_sound: true,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Property: compliance is exactly set containment
        #[test]
        fn compliance_matches_set_containment(
            required in prop::collection::vec(tag(), 1..5),
            detected in prop::collection::vec(tag(), 0..12),
        ) {
            let required_set = RequiredSet::new(required.iter().copied());
            let result = DetectionResult::new(detected.clone());
            let seen: HashSet<PpeTag> = detected.iter().copied().collect();
            let expected = !detected.is_empty()
                && detected.len() >= required_set.len()
                && required_set.iter().all(|t| seen.contains(&t));

            prop_assert_eq!(is_compliant(&required_set, Some(&result)), expected);
            prop_assert!(!is_compliant(&required_set, None));
        }

        // Property: detection order never changes the verdict
        #[test]
        fn compliance_ignores_order(
            required in prop::collection::vec(tag(), 1..4),
            detected in prop::collection::vec(tag(), 0..10),
        ) {
            let mut detected = detected;
            let required_set = RequiredSet::new(required);
            let forward = is_compliant(&required_set, Some(&DetectionResult::new(detected.clone())));
            detected.reverse();
            let backward = is_compliant(&required_set, Some(&DetectionResult::new(detected)));
            prop_assert_eq!(forward, backward);
        }

        // Property: a compliant frame always lands in Compliant with green
        #[test]
        fn compliant_input_always_recovers(
            history in prop::collection::vec((any::<bool>(), 0u64..30_000_000), 0..40),
        ) {
            let mut interlock = Interlock::new(config());
            let mut now = 0u64;
            for (ok, dt) in history {
                now += dt;
                interlock.advance(ok, now);
            }
            let step = interlock.advance(true, now + 1);
            prop_assert_eq!(step.to, InterlockState::Compliant);
            prop_assert_eq!(step.alarm.indication(), AlarmIndication::Green);
        }

        // Property: power is only cut from Startup or on Fault expiry
        #[test]
        fn power_off_only_from_startup_or_fault(
            history in prop::collection::vec((any::<bool>(), 0u64..30_000_000), 1..60),
        ) {
            let mut interlock = Interlock::new(config());
            let mut now = 0u64;
            for (ok, dt) in history {
                now += dt;
                let step = interlock.advance(ok, now);
                if step.machine == MachineCommand::PowerOff {
                    prop_assert!(matches!(step.from, InterlockState::Startup | InterlockState::Fault));
                    prop_assert_eq!(step.to, InterlockState::Startup);
                }
                if matches!(step.from, InterlockState::Compliant | InterlockState::Warning) && !ok {
                    prop_assert_eq!(step.machine, MachineCommand::Keep);
                }
            }
        }
    }
}
