//! Assistant turn coordination tests

use std::sync::Arc;

use assistive_visions::controller::{TurnPhase, messages};
use assistive_visions::location::{Coordinates, FixedLocation, LocationError};
use assistive_visions::voice::RecognitionErrorKind;
use assistive_visions::{ApplicationMode, Config, DisplayUpdate, GestureEvent};

mod common;

use common::Harness;

#[tokio::test(start_paused = true)]
async fn round_trip_speaks_reply_and_listens_again() {
    let mut h = Harness::new();
    h.start_assistant().await;
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Listening));

    h.assistant.reply(Some("It's 3 PM"));
    h.hear("what time is it").await;

    assert_eq!(h.last_spoken().as_deref(), Some("It's 3 PM"));
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Speaking));
    assert!(h.controller.is_speaking());
    assert!(h.speech.listening().is_none());

    let turn = h.controller.current_turn().unwrap();
    assert_eq!(turn.transcript, "what time is it");
    assert_eq!(turn.reply.as_deref(), Some("It's 3 PM"));

    let requests = h.assistant.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].speech, "what time is it");
    assert_eq!(requests[0].location_hint, None);

    h.finish_speaking().await;
    assert_eq!(h.controller.mode(), ApplicationMode::Assistant);
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Listening));
    assert!(h.speech.listening().is_some());
    assert_eq!(h.speech.starts(), 2);
    h.assert_no_violations();
}

#[tokio::test(start_paused = true)]
async fn listening_is_announced_once() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.hear("hello").await;
    h.finish_speaking().await;

    let announcements = h
        .spoken()
        .iter()
        .filter(|s| s.as_str() == messages::LISTENING)
        .count();
    assert_eq!(announcements, 1);
}

#[tokio::test(start_paused = true)]
async fn location_hint_is_attached_when_known() {
    let location = FixedLocation(Coordinates {
        latitude: 40.7128,
        longitude: -74.006,
    });
    let mut h = Harness::with_location(&Config::default(), Arc::new(location));
    h.start_assistant().await;

    h.hear("where am I").await;

    let requests = h.assistant.requests();
    assert_eq!(
        requests[0].location_hint.as_deref(),
        Some("Lat: 40.71, Lon: -74.01")
    );
}

#[tokio::test(start_paused = true)]
async fn missing_location_is_noticed_not_fatal() {
    let mut h = Harness::new();
    h.start_assistant().await;
    h.display_updates();

    h.hear("where am I").await;

    assert_eq!(h.last_spoken().as_deref(), Some("Here is my answer."));
    assert!(
        h.display_updates()
            .contains(&DisplayUpdate::Notice(LocationError::Unavailable.notice().to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn permission_denied_at_start_returns_to_idle() {
    let mut h = Harness::new();
    h.speech.refuse_recognition(RecognitionErrorKind::PermissionDenied);

    h.gesture(GestureEvent::LongPressStart).await;
    h.finish_speaking().await;

    assert_eq!(h.controller.mode(), ApplicationMode::Idle);
    assert_eq!(
        h.last_spoken().as_deref(),
        Some(RecognitionErrorKind::PermissionDenied.user_message())
    );

    h.finish_speaking().await;
    assert_eq!(h.speech.start_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn audio_capture_failure_is_fatal() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.recognition_error(RecognitionErrorKind::AudioCaptureUnavailable)
        .await;

    assert_eq!(h.controller.mode(), ApplicationMode::Idle);
    assert_eq!(
        h.last_spoken().as_deref(),
        Some(RecognitionErrorKind::AudioCaptureUnavailable.user_message())
    );
    h.finish_speaking().await;
    assert_eq!(h.speech.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_speech_ends_the_session() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.recognition_error(RecognitionErrorKind::NoSpeech).await;

    assert_eq!(h.controller.mode(), ApplicationMode::Idle);
    assert_eq!(
        h.last_spoken().as_deref(),
        Some(RecognitionErrorKind::NoSpeech.user_message())
    );
    h.finish_speaking().await;
    assert_eq!(h.speech.starts(), 1);
    assert!(h.speech.listening().is_none());
}

#[tokio::test(start_paused = true)]
async fn network_error_retries_after_message() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.recognition_error(RecognitionErrorKind::NetworkError).await;

    assert_eq!(h.controller.mode(), ApplicationMode::Assistant);
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Announcing));
    let message = h.last_spoken().unwrap();
    assert!(message.starts_with(RecognitionErrorKind::NetworkError.user_message()));
    assert!(message.ends_with(messages::TRY_AGAIN));
    assert!(h.speech.listening().is_none());

    h.finish_speaking().await;
    assert!(h.speech.listening().is_some());
    assert_eq!(h.speech.starts(), 2);
    h.assert_no_violations();
}

#[tokio::test(start_paused = true)]
async fn retried_errors_never_end_the_session() {
    let mut h = Harness::new();
    h.start_assistant().await;

    for attempt in 0..5 {
        let kind = if attempt % 2 == 0 {
            RecognitionErrorKind::NetworkError
        } else {
            RecognitionErrorKind::Other("aborted".into())
        };
        h.recognition_error(kind).await;
        assert_eq!(h.controller.mode(), ApplicationMode::Assistant);
        assert!(h.last_spoken().unwrap().ends_with(messages::TRY_AGAIN));
        h.finish_speaking().await;
        assert!(h.speech.listening().is_some());
    }

    assert_eq!(h.speech.starts(), 6);
    h.assert_no_violations();
}

#[tokio::test(start_paused = true)]
async fn retried_errors_do_not_count_as_silence() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.end_silently().await;
    h.end_silently().await;
    h.recognition_error(RecognitionErrorKind::NetworkError).await;
    h.finish_speaking().await;

    assert_eq!(h.controller.mode(), ApplicationMode::Assistant);
    assert!(h.speech.listening().is_some());
}

#[tokio::test(start_paused = true)]
async fn silence_cap_is_configurable() {
    let mut config = Config::default();
    config.assistant.max_silent_sessions = 1;
    let mut h = Harness::with_config(&config);
    h.start_assistant().await;

    h.recognition_error(RecognitionErrorKind::NetworkError).await;
    h.finish_speaking().await;
    assert_eq!(h.controller.mode(), ApplicationMode::Assistant);

    h.end_silently().await;
    assert_eq!(h.controller.mode(), ApplicationMode::Idle);
    assert_eq!(h.last_spoken().as_deref(), Some(messages::NOT_HEARD));
}

#[tokio::test(start_paused = true)]
async fn a_heard_question_resets_the_silence_count() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.end_silently().await;
    h.end_silently().await;

    h.hear("hello").await;
    h.finish_speaking().await;

    h.end_silently().await;
    h.end_silently().await;
    assert_eq!(h.controller.mode(), ApplicationMode::Assistant);
    assert!(h.speech.listening().is_some());
}

#[tokio::test(start_paused = true)]
async fn silent_sessions_relisten_until_the_cap() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.end_silently().await;
    assert!(h.speech.listening().is_some());
    h.end_silently().await;
    assert!(h.speech.listening().is_some());
    assert_eq!(h.speech.starts(), 3);

    h.end_silently().await;
    assert_eq!(h.controller.mode(), ApplicationMode::Idle);
    assert_eq!(h.last_spoken().as_deref(), Some(messages::NOT_HEARD));
    h.assert_no_violations();
}

#[tokio::test(start_paused = true)]
async fn interim_transcripts_only_update_status() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.hear_interim("what ti").await;

    assert_eq!(h.controller.status(), messages::heard("what ti"));
    assert!(h.assistant.requests().is_empty());
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Listening));
    assert!(h.speech.listening().is_some());
}

#[tokio::test(start_paused = true)]
async fn empty_final_transcript_is_ignored() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.hear("   ").await;

    assert!(h.assistant.requests().is_empty());
    assert!(h.speech.listening().is_some());
}

#[tokio::test(start_paused = true)]
async fn swipe_up_interrupts_reply_and_listens() {
    let mut h = Harness::new();
    h.start_assistant().await;
    h.assistant.reply(Some("A very long answer that goes on and on."));
    h.hear("tell me a story").await;
    assert!(h.controller.is_speaking());

    h.gesture(GestureEvent::SwipeUp).await;

    assert!(!h.controller.is_speaking());
    assert!(!h.speech.is_speaking());
    assert!(h.speech.listening().is_some());
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Listening));
    assert_eq!(h.speech.starts(), 2);
    h.assert_no_violations();
}

#[tokio::test(start_paused = true)]
async fn single_tap_interrupts_reply() {
    let mut h = Harness::new();
    h.start_assistant().await;
    h.hear("tell me a story").await;

    h.gesture(GestureEvent::SingleTap).await;

    assert!(!h.controller.is_speaking());
    assert!(h.speech.listening().is_some());
    assert_eq!(h.speech.starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn swipe_while_listening_changes_nothing() {
    let mut h = Harness::new();
    h.start_assistant().await;

    h.gesture(GestureEvent::SwipeUp).await;

    assert_eq!(h.speech.starts(), 1);
    assert!(h.speech.listening().is_some());
}

#[tokio::test(start_paused = true)]
async fn assistant_failure_speaks_fallback_and_listens_again() {
    let mut h = Harness::new();
    h.start_assistant().await;
    h.assistant.reply(None);

    h.hear("what's the weather").await;
    assert_eq!(h.last_spoken().as_deref(), Some(messages::ASSISTANT_FAILED));

    h.finish_speaking().await;
    assert_eq!(h.controller.mode(), ApplicationMode::Assistant);
    assert!(h.speech.listening().is_some());
}

#[tokio::test(start_paused = true)]
async fn empty_reply_asks_to_rephrase() {
    let mut h = Harness::new();
    h.start_assistant().await;
    h.assistant.reply(Some("  "));

    h.hear("hmm").await;

    assert_eq!(h.last_spoken().as_deref(), Some(messages::EMPTY_REPLY));
}

#[tokio::test(start_paused = true)]
async fn reply_after_stop_is_discarded() {
    let mut h = Harness::new();
    h.assistant.hold();
    h.start_assistant().await;

    h.hear("slow question").await;
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Querying));
    assert_eq!(h.controller.status(), messages::PROCESSING);

    h.gesture(GestureEvent::LongPressStart).await;
    assert_eq!(h.controller.mode(), ApplicationMode::Idle);

    h.assistant.release(1);
    h.settle().await;

    assert_eq!(h.last_spoken().as_deref(), Some(messages::ASSISTANT_OFF));
    assert!(!h.spoken().iter().any(|s| s == "Here is my answer."));
}

#[tokio::test(start_paused = true)]
async fn reply_from_previous_session_is_discarded() {
    let mut h = Harness::new();
    h.assistant.hold();
    h.start_assistant().await;
    h.hear("first question").await;

    h.gesture(GestureEvent::LongPressStart).await;
    h.finish_speaking().await;
    h.start_assistant().await;

    h.assistant.release(1);
    h.settle().await;

    assert!(!h.spoken().iter().any(|s| s == "Here is my answer."));
    assert_eq!(h.controller.turn_phase(), Some(TurnPhase::Listening));
    assert!(h.speech.listening().is_some());
    h.assert_no_violations();
}

#[tokio::test(start_paused = true)]
async fn leaving_during_reply_does_not_relisten() {
    let mut h = Harness::new();
    h.start_assistant().await;
    h.hear("question").await;
    assert!(h.controller.is_speaking());

    h.gesture(GestureEvent::LongPressStart).await;
    assert_eq!(h.controller.mode(), ApplicationMode::Idle);
    h.finish_speaking().await;

    assert!(h.speech.listening().is_none());
    assert_eq!(h.speech.starts(), 1);
}
