//! Invariants of the reconciler over arbitrary notification sequences.

mod mock_player;

use std::sync::Arc;

use mock_player::{receiver, RecordingPlayer};
use onkyo_link::LoopbackLink;
use onkyo_sync::{PlaybackNotification, PlaybackStatus, Reconciler, Settings};
use proptest::prelude::*;

fn status() -> impl Strategy<Value = PlaybackStatus> {
    prop_oneof![
        Just(PlaybackStatus::Playing),
        Just(PlaybackStatus::Paused),
        Just(PlaybackStatus::Stopped),
        Just(PlaybackStatus::Unknown),
    ]
}

fn notification() -> impl Strategy<Value = PlaybackNotification> {
    (status(), proptest::option::of(0u8..=100))
        .prop_map(|(status, volume)| PlaybackNotification { status, volume })
}

fn settings() -> impl Strategy<Value = Settings> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0u8..=100,
        proptest::option::of(0u8..=100),
    )
        .prop_map(|(power_on, set_volume, set_input, max_volume, set_volume_value)| Settings {
            power_on,
            set_volume,
            set_input,
            max_volume,
            set_volume_value,
            ..Default::default()
        })
}

fn bound_reconciler(settings: Settings) -> (Reconciler, Arc<LoopbackLink>) {
    let (link, _events) = LoopbackLink::new();
    let link = Arc::new(link);
    let mut reconciler = Reconciler::new(
        link.clone(),
        Arc::new(settings),
        Arc::new(RecordingPlayer::new()),
    );
    reconciler.bind(receiver());
    (reconciler, link)
}

proptest! {
    #[test]
    fn repeated_notification_dispatches_once(
        settings in settings(),
        history in proptest::collection::vec(notification(), 0..8),
        repeated in notification(),
        repeats in 2usize..6,
    ) {
        let (mut reconciler, link) = bound_reconciler(settings);
        for n in history {
            reconciler.on_playback(n).unwrap();
        }

        reconciler.on_playback(repeated).unwrap();
        let after_first = link.sent().len();
        for _ in 1..repeats {
            reconciler.on_playback(repeated).unwrap();
        }

        prop_assert_eq!(link.sent().len(), after_first);
    }

    #[test]
    fn wire_volume_never_exceeds_max(
        settings in settings(),
        notifications in proptest::collection::vec(notification(), 1..16),
    ) {
        let max_wire = u16::from(settings.max_volume) * 2;
        let (mut reconciler, link) = bound_reconciler(settings);
        for n in notifications {
            reconciler.on_playback(n).unwrap();
        }

        for command in link.sent() {
            if let Some(value) = command.strip_prefix("main.volume=") {
                let value: u16 = value.parse().unwrap();
                prop_assert!(value <= max_wire, "{} above {}", value, max_wire);
            }
        }
    }

    #[test]
    fn power_on_runs_only_from_off(
        notifications in proptest::collection::vec(notification(), 1..16),
    ) {
        let (mut reconciler, link) = bound_reconciler(Settings {
            standby: false,
            ..Default::default()
        });
        for n in notifications {
            reconciler.on_playback(n).unwrap();
        }

        // Without standby the receiver is never turned off again
        let power_ons = link.sent().iter().filter(|c| *c == "main.power=on").count();
        prop_assert!(power_ons <= 1);
    }
}
