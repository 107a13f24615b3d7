//! Read-aloud pipeline integration tests
//!
//! Runs the coordinator against fake services; no audio hardware needed.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parley::conversation::{NewTurn, TurnUpdate};
use parley::{
    AudioOutput, CoachService, ConversationLog, Feedback, PlaybackCoordinator, PlaybackOutcome,
    Role,
};

mod common;

use common::{FakeCoach, FakeOutput, calls, voices, wait_until};

fn coordinator(
    coach: &Arc<FakeCoach>,
    output: &Arc<FakeOutput>,
) -> (Arc<ConversationLog>, Arc<PlaybackCoordinator>) {
    let log = Arc::new(ConversationLog::new());
    let coordinator = Arc::new(PlaybackCoordinator::new(
        Arc::clone(&log),
        Arc::clone(coach) as Arc<dyn CoachService>,
        Arc::clone(output) as Arc<dyn AudioOutput>,
        voices(),
        Duration::from_secs(5),
    ));
    (log, coordinator)
}

#[tokio::test]
async fn test_user_turn_gets_ipa_and_grammar() {
    let coach = FakeCoach::new();
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::User, "I goed home", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Played);

    let turn = log.get(id).unwrap();
    assert_eq!(turn.ipa.as_deref(), Some("ipa:I goed home"));
    let grammar = turn.grammar_feedback.unwrap();
    assert_eq!(grammar.ready().unwrap().corrections.len(), 1);
    assert_eq!(coach.voices(), ["Puck"]);
    assert_eq!(output.played(), 1);
    assert!(playback.playing().is_none());
}

#[tokio::test]
async fn test_agent_turn_skips_grammar() {
    let coach = FakeCoach::new();
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::Agent, "How was your day?", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Played);

    let turn = log.get(id).unwrap();
    assert!(turn.ipa.is_some());
    assert!(turn.grammar_feedback.is_none());
    assert_eq!(calls(&coach.grammar_calls), 0);
    assert_eq!(coach.voices(), ["Zephyr"]);
}

#[tokio::test]
async fn test_second_request_rejected_while_playing() {
    let coach = FakeCoach::new();
    let output = FakeOutput::gated();
    let (log, playback) = coordinator(&coach, &output);
    let first = log.append(NewTurn::new(Role::Agent, "first", true));
    let second = log.append(NewTurn::new(Role::User, "second", true));

    let running = {
        let playback = Arc::clone(&playback);
        tokio::spawn(async move { playback.play(first).await })
    };
    wait_until(|| output.started.load(Ordering::SeqCst) == 1).await;
    assert_eq!(playback.playing(), Some(first));

    assert_eq!(playback.play(second).await, PlaybackOutcome::Busy);
    let untouched = log.get(second).unwrap();
    assert!(untouched.ipa.is_none());
    assert!(untouched.grammar_feedback.is_none());
    assert_eq!(calls(&coach.ipa_calls), 1);

    output.finish(1);
    assert_eq!(running.await.unwrap(), PlaybackOutcome::Played);
    assert!(playback.playing().is_none());

    // Lock released: the rejected turn can now be played
    output.finish(1);
    assert_eq!(playback.play(second).await, PlaybackOutcome::Played);
}

#[tokio::test]
async fn test_unfinished_or_system_turns_not_playable() {
    let coach = FakeCoach::new();
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let system = log.append(NewTurn::new(Role::System, "connected", true));
    let empty = log.append(NewTurn::new(Role::Agent, "  ", true));
    let open = log.append(NewTurn::new(Role::User, "still talk", false));

    for id in [system, empty, open] {
        assert_eq!(playback.play(id).await, PlaybackOutcome::NotPlayable);
    }
    assert_eq!(calls(&coach.ipa_calls), 0);
    assert!(playback.playing().is_none());
}

#[tokio::test]
async fn test_speech_failure_rolls_back() {
    let coach = FakeCoach::new();
    coach.fail_speech.store(true, Ordering::SeqCst);
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::User, "I goed home", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Failed);

    let turn = log.get(id).unwrap();
    assert!(turn.ipa.is_none());
    assert!(turn.grammar_feedback.is_none());
    assert!(playback.playing().is_none());
    assert_eq!(output.played(), 0);

    coach.fail_speech.store(false, Ordering::SeqCst);
    assert_eq!(playback.play(id).await, PlaybackOutcome::Played);
}

#[tokio::test]
async fn test_missing_audio_rolls_back() {
    let coach = FakeCoach::new();
    coach.no_audio.store(true, Ordering::SeqCst);
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::User, "hello", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::NoAudio);

    let turn = log.get(id).unwrap();
    assert!(turn.ipa.is_none());
    assert!(turn.grammar_feedback.is_none());
    assert!(playback.playing().is_none());
}

#[tokio::test]
async fn test_output_failure_rolls_back() {
    let coach = FakeCoach::new();
    let output = FakeOutput::new();
    output.fail.store(true, Ordering::SeqCst);
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::Agent, "hello", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Failed);
    assert!(log.get(id).unwrap().ipa.is_none());
    assert!(playback.playing().is_none());
}

#[tokio::test]
async fn test_rollback_clears_preexisting_enrichment() {
    let coach = FakeCoach::new();
    coach.fail_speech.store(true, Ordering::SeqCst);
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::Agent, "hello", true));
    log.update_by_id(id, TurnUpdate::new().ipa("həˈloʊ"));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Failed);
    assert!(log.get(id).unwrap().ipa.is_none());
    assert_eq!(calls(&coach.ipa_calls), 0);
}

#[tokio::test]
async fn test_ipa_failure_does_not_stop_playback() {
    let coach = FakeCoach::new();
    coach.fail_ipa.store(true, Ordering::SeqCst);
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::User, "hello", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Played);

    let turn = log.get(id).unwrap();
    assert!(turn.ipa.is_none());
    assert!(turn.grammar_feedback.unwrap().ready().is_some());
}

#[tokio::test]
async fn test_grammar_failure_does_not_stop_playback() {
    let coach = FakeCoach::new();
    coach.fail_grammar.store(true, Ordering::SeqCst);
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::User, "hello", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Played);

    let turn = log.get(id).unwrap();
    assert!(turn.ipa.is_some());
    assert!(turn.grammar_feedback.is_none());
}

#[tokio::test]
async fn test_existing_enrichment_not_refetched() {
    let coach = FakeCoach::new();
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::User, "hello", true));

    assert_eq!(playback.play(id).await, PlaybackOutcome::Played);
    assert_eq!(playback.play(id).await, PlaybackOutcome::Played);

    assert_eq!(calls(&coach.ipa_calls), 1);
    assert_eq!(calls(&coach.grammar_calls), 1);
    assert_eq!(calls(&coach.speech_calls), 2);
}

#[tokio::test]
async fn test_grammar_placeholder_shown_during_fetch() {
    let coach = FakeCoach::gated();
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::User, "hello", true));

    let running = {
        let playback = Arc::clone(&playback);
        tokio::spawn(async move { playback.play(id).await })
    };

    // Let the IPA fetch through; grammar then waits on the gate
    coach.open_gate(1);
    wait_until(|| {
        log.get(id)
            .and_then(|t| t.grammar_feedback)
            .is_some_and(|f| f.is_analyzing())
    })
    .await;
    assert!(log.get(id).unwrap().ipa.is_some());

    coach.open_gate(2);
    assert_eq!(running.await.unwrap(), PlaybackOutcome::Played);
    assert!(matches!(
        log.get(id).unwrap().grammar_feedback,
        Some(Feedback::Ready(_))
    ));
}

#[tokio::test]
async fn test_turn_removed_mid_playback_fails_cleanly() {
    let coach = FakeCoach::gated();
    let output = FakeOutput::new();
    let (log, playback) = coordinator(&coach, &output);
    let id = log.append(NewTurn::new(Role::Agent, "hello", true));

    let running = {
        let playback = Arc::clone(&playback);
        tokio::spawn(async move { playback.play(id).await })
    };
    wait_until(|| calls(&coach.ipa_calls) == 1).await;

    log.clear();
    coach.open_gate(1);

    assert_eq!(running.await.unwrap(), PlaybackOutcome::Failed);
    assert!(log.is_empty());
    assert!(playback.playing().is_none());
}
