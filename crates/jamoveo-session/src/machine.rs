//! Rehearsal state machine.
//!
//! ```text
//!            start                 song_chosen
//!   Idle ───────────▶ Waiting ─────────────────▶ Live(song)
//!    ▲                 │  ▲    song_not_chosen     │ │
//!    │      stop       │  └────────────────────────┘ │ song_chosen
//!    ├─────────────────┘                             └──▶ Live(other)
//!    │                  stop / leader left           │
//!    └───────────────────────────────────────────────┘
//! ```
//!
//! Pure functions only: the store applies them under its write lock.

use jamoveo_core::{ActionKind, SessionError, SessionState, SongRef};

/// Something that may move the session.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Leader turned rehearsal on.
    Start,
    /// Leader put a resolved song in play.
    Choose(SongRef),
    /// Leader cleared the current song.
    Clear,
    /// Leader turned rehearsal off.
    Stop,
    /// An admin connection went away.
    LeaderLeft,
}

impl Event {
    /// The action this event is reported as.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Start => ActionKind::StartRehearsal,
            Self::Choose(_) => ActionKind::SongChosen,
            Self::Clear => ActionKind::SongNotChosen,
            Self::Stop | Self::LeaderLeft => ActionKind::StopRehearsal,
        }
    }
}

/// Whether `action` may be applied in `state` at all.
///
/// Used to refuse `song_chosen` before paying for a catalog lookup.
pub fn precheck(state: &SessionState, action: ActionKind) -> Result<(), SessionError> {
    let allowed = match action {
        ActionKind::StartRehearsal | ActionKind::StopRehearsal => true,
        ActionKind::SongChosen => state.is_active(),
        ActionKind::SongNotChosen => matches!(state, SessionState::Live(_)),
    };
    if allowed {
        Ok(())
    } else {
        Err(SessionError::InvalidTransition {
            action,
            phase: state.phase(),
        })
    }
}

/// Next state for `event`, `None` when nothing changes.
pub fn apply(state: &SessionState, event: Event) -> Result<Option<SessionState>, SessionError> {
    precheck(state, event.kind())?;
    let next = match (state, event) {
        (SessionState::Idle, Event::Start) => SessionState::Waiting,
        (_, Event::Start) => return Ok(None),
        (SessionState::Live(current), Event::Choose(song)) if *current == song => return Ok(None),
        (_, Event::Choose(song)) => SessionState::Live(song),
        (_, Event::Clear) => SessionState::Waiting,
        (SessionState::Idle, Event::Stop | Event::LeaderLeft) => return Ok(None),
        (_, Event::Stop | Event::LeaderLeft) => SessionState::Idle,
    };
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use jamoveo_core::{Phase, SongId};
    use proptest::prelude::*;
    use serde_json::Map;

    use super::*;

    fn song(id: &str) -> SongRef {
        SongRef::new(SongId::from_raw(id), format!("Title {id}"), "Artist", Map::new())
    }

    fn run(events: impl IntoIterator<Item = Event>) -> SessionState {
        let mut state = SessionState::Idle;
        for event in events {
            if let Ok(Some(next)) = apply(&state, event) {
                state = next;
            }
        }
        state
    }

    #[test]
    fn documented_sequence_lands_on_second_song() {
        let state = run([
            Event::Start,
            Event::Choose(song("s1")),
            Event::Clear,
            Event::Choose(song("s2")),
        ]);
        assert_eq!(state, SessionState::Live(song("s2")));
    }

    #[test]
    fn start_is_idempotent() {
        assert_eq!(apply(&SessionState::Idle, Event::Start).unwrap(), Some(SessionState::Waiting));
        assert_eq!(apply(&SessionState::Waiting, Event::Start).unwrap(), None);
        assert_eq!(
            apply(&SessionState::Live(song("s1")), Event::Start).unwrap(),
            None
        );
    }

    #[test]
    fn choose_requires_rehearsal() {
        let err = apply(&SessionState::Idle, Event::Choose(song("s1"))).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                action: ActionKind::SongChosen,
                phase: Phase::Idle,
            }
        );
    }

    #[test]
    fn choose_switches_songs_while_live() {
        let next = apply(&SessionState::Live(song("s1")), Event::Choose(song("s2"))).unwrap();
        assert_eq!(next, Some(SessionState::Live(song("s2"))));
    }

    #[test]
    fn choosing_the_same_song_is_no_change() {
        let next = apply(&SessionState::Live(song("s1")), Event::Choose(song("s1"))).unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn clear_only_from_live() {
        assert_eq!(
            apply(&SessionState::Live(song("s1")), Event::Clear).unwrap(),
            Some(SessionState::Waiting)
        );
        assert!(apply(&SessionState::Waiting, Event::Clear).is_err());
        assert!(apply(&SessionState::Idle, Event::Clear).is_err());
    }

    #[test]
    fn stop_and_leader_left() {
        for event in [Event::Stop, Event::LeaderLeft] {
            assert_eq!(apply(&SessionState::Idle, event.clone()).unwrap(), None);
            assert_eq!(
                apply(&SessionState::Waiting, event.clone()).unwrap(),
                Some(SessionState::Idle)
            );
            assert_eq!(
                apply(&SessionState::Live(song("s1")), event).unwrap(),
                Some(SessionState::Idle)
            );
        }
    }

    #[test]
    fn precheck_matches_apply() {
        let states = [SessionState::Idle, SessionState::Waiting, SessionState::Live(song("s1"))];
        let events = [Event::Start, Event::Choose(song("s2")), Event::Clear, Event::Stop];
        for state in &states {
            for event in &events {
                assert_eq!(
                    precheck(state, event.kind()).is_ok(),
                    apply(state, event.clone()).is_ok(),
                    "{state:?} / {event:?}"
                );
            }
        }
    }

    fn event_strategy() -> impl Strategy<Value = Event> {
        prop_oneof![
            Just(Event::Start),
            (0u8..4).prop_map(|n| Event::Choose(song(&format!("s{n}")))),
            Just(Event::Clear),
            Just(Event::Stop),
            Just(Event::LeaderLeft),
        ]
    }

    /// Two-field reference model: `(active, current_song)`.
    fn model_step(model: (bool, Option<String>), event: &Event) -> (bool, Option<String>) {
        match (model, event) {
            ((false, _), Event::Start) => (true, None),
            ((true, song), Event::Start) => (true, song),
            ((true, _), Event::Choose(s)) => (true, Some(s.id.as_str().to_string())),
            ((true, Some(_)), Event::Clear) => (true, None),
            (_, Event::Stop | Event::LeaderLeft) => (false, None),
            (unchanged, _) => unchanged,
        }
    }

    proptest! {
        #[test]
        fn song_implies_active_on_the_wire(events in prop::collection::vec(event_strategy(), 0..40)) {
            let mut state = SessionState::Idle;
            for event in events {
                if let Ok(Some(next)) = apply(&state, event) {
                    state = next;
                }
                let json = serde_json::to_value(&state).unwrap();
                if !json["current_song"].is_null() {
                    prop_assert_eq!(&json["rehearsal_state"], "active");
                }
            }
        }

        #[test]
        fn agrees_with_two_field_model(events in prop::collection::vec(event_strategy(), 0..40)) {
            let mut state = SessionState::Idle;
            let mut model = (false, None);
            for event in events {
                model = model_step(model, &event);
                if let Ok(Some(next)) = apply(&state, event) {
                    state = next;
                }
                prop_assert_eq!(state.is_active(), model.0);
                prop_assert_eq!(
                    state.current_song().map(|s| s.id.as_str().to_string()),
                    model.1.clone()
                );
            }
        }

        #[test]
        fn rejected_events_are_pure(events in prop::collection::vec(event_strategy(), 0..20)) {
            let mut state = SessionState::Idle;
            for event in events {
                let before = state.clone();
                match apply(&state, event) {
                    Ok(Some(next)) => state = next,
                    Ok(None) | Err(_) => prop_assert_eq!(&state, &before),
                }
            }
        }
    }
}
