//! End-to-end playback scenarios through the controller task
//!
//! These tests drive a [`RecordingEngine`] by hand, so every engine report
//! arrives exactly when the test emits it.

use anyhow::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trackdeck::engine::{EngineEventSink, EngineResult, MediaEngine};
use trackdeck::utils::PlaybackConfig;
use trackdeck::{
    Command, EngineEvent, Phase, PlaybackState, PlayerController, PlayerError, Playlist,
    SimulatedEngine, Track, ValidationError,
};
use trackdeck_integration_tests::{
    sample_tracks, settle, wait_for_state, EngineCall, RecordingEngine, WAIT,
};

/// Controller whose clock is slow enough to stay out of the way
async fn controller_with(tracks: usize) -> Result<(PlayerController, Arc<RecordingEngine>)> {
    let config = PlaybackConfig {
        tick_interval_ms: 60_000,
        ..Default::default()
    };
    let engine = Arc::new(RecordingEngine::new());
    let controller = PlayerController::spawn(engine.clone(), config);
    controller
        .load_playlist(Playlist::new(sample_tracks(tracks, 180_000)))
        .await?;
    Ok((controller, engine))
}

async fn playing(controller: &PlayerController, engine: &RecordingEngine, index: usize) -> Result<PlaybackState> {
    controller.dispatch(Command::SelectIndex(index)).await?;
    engine.emit(EngineEvent::Ready(180_000));
    engine.emit(EngineEvent::PlayingChanged(true));
    wait_for_state(controller, |s| {
        s.current_index == Some(index) && s.phase == Phase::Ready && s.is_playing && !s.play_request_pending
    })
    .await
}

#[tokio::test]
async fn test_select_then_ready_reports_duration() -> Result<()> {
    let (controller, engine) = controller_with(3).await?;

    for i in 0..3 {
        controller.dispatch(Command::SelectIndex(i)).await?;
        engine.emit(EngineEvent::Ready(200_000 + i as u64));
        let state = wait_for_state(&controller, |s| {
            s.current_index == Some(i) && s.phase == Phase::Ready
        })
        .await?;
        assert_eq!(state.duration_ms, 200_000 + i as u64);
    }

    assert_eq!(engine.loads(), vec![0, 1, 2]);
    Ok(())
}

#[tokio::test]
async fn test_three_track_scenario() -> Result<()> {
    let (controller, engine) = controller_with(3).await?;
    playing(&controller, &engine, 0).await?;

    engine.emit(EngineEvent::PositionTick(30_000));
    let state = wait_for_state(&controller, |s| s.position_ms == 30_000).await?;
    assert!((state.percent - 16.67).abs() < 0.01);
    assert_eq!(state.elapsed, "0:30");
    assert_eq!(state.total(), "3:00");

    engine.emit(EngineEvent::Ended);
    let state = wait_for_state(&controller, |s| s.current_index == Some(1)).await?;
    assert_eq!(state.phase, Phase::Loading);
    assert_eq!(engine.loads(), vec![0, 1]);
    Ok(())
}

#[tokio::test]
async fn test_next_at_last_track_is_noop() -> Result<()> {
    let (controller, engine) = controller_with(3).await?;
    let before = playing(&controller, &engine, 2).await?;
    let calls_before = engine.calls().len();

    controller.dispatch(Command::SeekToNext).await?;
    assert_eq!(controller.current_state(), before);
    assert_eq!(engine.calls().len(), calls_before);
    Ok(())
}

#[tokio::test]
async fn test_engine_overrides_optimistic_play() -> Result<()> {
    let (controller, engine) = controller_with(1).await?;
    playing(&controller, &engine, 0).await?;

    controller.dispatch(Command::PlayPause).await?;
    engine.emit(EngineEvent::PlayingChanged(false));
    wait_for_state(&controller, |s| !s.is_playing && !s.play_request_pending).await?;

    controller.dispatch(Command::PlayPause).await?;
    let optimistic = controller.current_state();
    assert!(optimistic.is_playing);
    assert!(optimistic.play_request_pending);

    engine.emit(EngineEvent::PlayingChanged(false));
    let state = wait_for_state(&controller, |s| !s.play_request_pending).await?;
    assert!(!state.is_playing);
    assert_eq!(
        engine.calls().iter().filter(|c| **c == EngineCall::Play).count(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn test_play_pause_on_empty_playlist() -> Result<()> {
    let (controller, engine) = controller_with(0).await?;
    let before = controller.current_state();

    let err = controller.dispatch(Command::PlayPause).await.unwrap_err();
    assert!(matches!(
        err,
        PlayerError::Validation(ValidationError::NoActiveTrack)
    ));
    assert_eq!(controller.current_state(), before);
    assert_eq!(engine.calls(), vec![EngineCall::SetPlaylist(0)]);
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_select_changes_nothing() -> Result<()> {
    let (controller, engine) = controller_with(3).await?;
    let before = playing(&controller, &engine, 1).await?;

    let err = controller.dispatch(Command::SelectIndex(3)).await.unwrap_err();
    assert_eq!(
        err.validation(),
        Some(&ValidationError::OutOfRange { index: 3, len: 3 })
    );
    assert_eq!(controller.current_state(), before);
    Ok(())
}

#[tokio::test]
async fn test_seek_to_percent_is_idempotent() -> Result<()> {
    let (controller, engine) = controller_with(1).await?;
    playing(&controller, &engine, 0).await?;

    controller.dispatch(Command::SeekToPercent(50.0)).await?;
    let once = controller.current_state();
    controller.dispatch(Command::SeekToPercent(50.0)).await?;
    assert_eq!(controller.current_state(), once);
    assert_eq!(once.position_ms, 90_000);

    let seeks: Vec<_> = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, EngineCall::Seek(_)))
        .collect();
    assert_eq!(seeks, vec![EngineCall::Seek(90_000), EngineCall::Seek(90_000)]);
    Ok(())
}

#[tokio::test]
async fn test_reports_after_stop_are_ignored() -> Result<()> {
    let (controller, engine) = controller_with(2).await?;
    playing(&controller, &engine, 0).await?;

    controller.dispatch(Command::Stop).await?;
    let stopped = controller.current_state();
    assert_eq!(stopped.phase, Phase::Idle);
    assert_eq!(stopped.current_index, Some(0));

    engine.emit(EngineEvent::PositionTick(50_000));
    engine.emit(EngineEvent::Ready(180_000));
    engine.emit(EngineEvent::Ended);
    settle(&controller).await;
    assert_eq!(controller.current_state(), stopped);
    Ok(())
}

#[tokio::test]
async fn test_load_failure_then_retry() -> Result<()> {
    let (controller, engine) = controller_with(2).await?;
    controller.dispatch(Command::SelectIndex(1)).await?;

    engine.emit(EngineEvent::LoadFailed("codec not supported".to_string()));
    let failed = wait_for_state(&controller, |s| s.last_error.is_some()).await?;
    assert_eq!(failed.phase, Phase::Idle);
    assert_eq!(failed.current_index, Some(1));
    assert!(!failed.is_playing);

    // Play from a failed load re-issues the load
    controller.dispatch(Command::PlayPause).await?;
    engine.emit(EngineEvent::Ready(180_000));
    let state = wait_for_state(&controller, |s| s.phase == Phase::Ready).await?;
    assert!(state.last_error.is_none());
    assert_eq!(engine.loads(), vec![1, 1]);
    Ok(())
}

#[tokio::test]
async fn test_playlist_replace_keeps_selected_track() -> Result<()> {
    let (controller, engine) = controller_with(3).await?;
    playing(&controller, &engine, 2).await?;

    let mut tracks = sample_tracks(3, 180_000);
    tracks.rotate_left(2);
    controller.load_playlist(Playlist::new(tracks)).await?;

    let state = controller.current_state();
    assert_eq!(state.current_index, Some(0));
    assert_eq!(state.track.map(|t| t.id.to_string()), Some("t2".to_string()));
    assert!(state.is_playing);

    controller.clear_playlist().await?;
    let state = controller.current_state();
    assert_eq!(state.current_index, None);
    assert_eq!(state.phase, Phase::Idle);
    assert!(engine.calls().contains(&EngineCall::Stop));
    Ok(())
}

#[tokio::test]
async fn test_engine_advance_without_reload() -> Result<()> {
    let (controller, engine) = controller_with(3).await?;
    playing(&controller, &engine, 0).await?;

    engine.emit(EngineEvent::TrackChanged(1));
    let state = wait_for_state(&controller, |s| s.current_index == Some(1)).await?;
    assert_eq!(state.position_ms, 0);
    assert_eq!(state.duration_ms, 180_000);
    assert_eq!(engine.loads(), vec![0]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_clock_samples_engine_position() -> Result<()> {
    let engine = Arc::new(RecordingEngine::new());
    let controller = PlayerController::spawn(engine.clone(), PlaybackConfig::default());
    controller
        .load_playlist(Playlist::new(sample_tracks(1, 180_000)))
        .await?;
    playing(&controller, &engine, 0).await?;

    engine.set_position(5_000);
    let state = wait_for_state(&controller, |s| s.position_ms == 5_000).await?;
    assert_eq!(state.elapsed, "0:05");

    // Paused: the clock goes quiet even though the engine moves
    controller.dispatch(Command::PlayPause).await?;
    engine.emit(EngineEvent::PlayingChanged(false));
    wait_for_state(&controller, |s| !s.is_playing && !s.play_request_pending).await?;
    engine.set_position(9_000);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(controller.current_state().position_ms, 5_000);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_dispatch_is_serialized() -> Result<()> {
    let (controller, engine) = controller_with(10).await?;
    let controller = Arc::new(controller);

    let mut handles = Vec::new();
    for i in 0..10 {
        let controller = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            controller.dispatch(Command::SelectIndex(i)).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let mut loads = engine.loads();
    let last = *loads.last().unwrap();
    assert_eq!(controller.current_state().current_index, Some(last));
    loads.sort_unstable();
    assert_eq!(loads, (0..10).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_detaches_engine() -> Result<()> {
    let (controller, engine) = controller_with(2).await?;
    playing(&controller, &engine, 0).await?;
    let last = controller.current_state();

    controller.shutdown().await?;
    assert!(!engine.is_attached());
    engine.emit(EngineEvent::Ended);

    assert!(matches!(
        controller.dispatch(Command::SeekToNext).await,
        Err(PlayerError::ControllerClosed)
    ));
    assert_eq!(controller.current_state(), last);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_simulated_playlist_runs_to_the_end() -> Result<()> {
    let engine = Arc::new(SimulatedEngine::new().with_load_delay(Duration::from_millis(20)));
    let controller = PlayerController::spawn(engine, PlaybackConfig::default());
    controller
        .load_playlist(Playlist::new(sample_tracks(3, 4_000)))
        .await?;

    controller.dispatch(Command::SelectIndex(0)).await?;
    let state = wait_for_state(&controller, |s| {
        s.current_index == Some(2) && s.phase == Phase::Ended
    })
    .await?;

    assert!(!state.is_playing);
    assert_eq!(state.position_ms, 4_000);
    assert_eq!(state.percent, 100.0);
    Ok(())
}

/// Engine whose first position query is still running when a seek lands
///
/// The query blocks until `seek_to` has been called and then answers with
/// the position from before the seek.
#[derive(Default)]
struct SeekRacingEngine {
    sampling: AtomicBool,
    seeked: Mutex<bool>,
    seek_done: Condvar,
}

impl MediaEngine for SeekRacingEngine {
    fn attach(&self, _sink: EngineEventSink) {}
    fn set_playlist(&self, _tracks: &[Track]) -> EngineResult<()> {
        Ok(())
    }
    fn load(&self, _index: usize, _track: &Track, _start: bool) -> EngineResult<()> {
        Ok(())
    }
    fn play(&self) -> EngineResult<()> {
        Ok(())
    }
    fn pause(&self) -> EngineResult<()> {
        Ok(())
    }
    fn stop(&self) -> EngineResult<()> {
        Ok(())
    }
    fn seek_to(&self, _position_ms: u64) -> EngineResult<()> {
        *self.seeked.lock() = true;
        self.seek_done.notify_all();
        Ok(())
    }
    fn current_position_ms(&self) -> u64 {
        let mut seeked = self.seeked.lock();
        if !self.sampling.swap(true, Ordering::SeqCst) {
            if !*seeked {
                self.seek_done.wait_for(&mut seeked, Duration::from_secs(5));
            }
            return 1_000;
        }
        if *seeked {
            90_000
        } else {
            1_000
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sample_taken_before_seek_is_dropped() -> Result<()> {
    let engine = Arc::new(SeekRacingEngine::default());
    let config = PlaybackConfig {
        tick_interval_ms: 500,
        ..Default::default()
    };
    let controller = PlayerController::spawn(engine.clone(), config);
    controller
        .load_playlist(Playlist::new(sample_tracks(1, 180_000)))
        .await?;
    let sink = controller.event_sink();

    controller.dispatch(Command::SelectIndex(0)).await?;
    sink.emit(EngineEvent::Ready(180_000));
    sink.emit(EngineEvent::PlayingChanged(true));
    wait_for_state(&controller, |s| {
        s.phase == Phase::Ready && s.is_playing && !s.play_request_pending
    })
    .await?;

    // The clock is now blocked inside its first position query
    tokio::time::timeout(WAIT, async {
        while !engine.sampling.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    controller.dispatch(Command::SeekToPercent(50.0)).await?;
    assert_eq!(controller.current_state().position_ms, 90_000);

    // Let the released query post its sample, then drain the mailbox
    tokio::time::sleep(Duration::from_millis(50)).await;
    settle(&controller).await;

    let state = controller.current_state();
    assert_eq!(state.position_ms, 90_000);
    assert_eq!(state.phase, Phase::Ready);
    Ok(())
}
