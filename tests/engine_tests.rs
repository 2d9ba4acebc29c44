//! Hardware-free engine integration tests
//!
//! Drives the engine's command surface and pulls blocks straight from
//! the shared stream core, standing in for a device callback.

use ambiplayer::{
    AudioBuffer, ChannelFormat, DecoderVariant, Error, EventBus, PlaybackEngine, PlayerEvent,
    TransportState,
};

const BLOCK_FRAMES: usize = 512;

/// Interleaved 4-channel ramp: sample value encodes (frame, channel).
fn ramp_buffer(frames: usize, channels: usize, sample_rate: u32) -> AudioBuffer {
    let samples: Vec<f32> = (0..frames * channels).map(|i| i as f32).collect();
    AudioBuffer::new(samples, channels, sample_rate, ChannelFormat::Acn)
}

fn pull_block(core: &ambiplayer::playback::StreamCore, device_channels: usize) -> Vec<f32> {
    let mut data = vec![f32::NAN; BLOCK_FRAMES * device_channels];
    core.fill(&mut data, device_channels);
    data
}

#[test]
fn test_open_buffer_commits_and_resets() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(1000, 4, 48000));

    assert_eq!(engine.transport(), TransportState::Stopped);
    assert_eq!(engine.position_frames(), 0);
    assert_eq!(engine.active_decoder(), None);
    assert_eq!(engine.current_track(), None);
}

#[test]
fn test_play_without_track_is_ignored() {
    let engine = PlaybackEngine::default();
    engine.play();
    assert_eq!(engine.transport(), TransportState::Stopped);
}

#[test]
fn test_raw_passthrough_identity_and_zero_fill() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(1000, 2, 48000));
    engine.play();

    let core = engine.stream_core();
    let data = pull_block(&core, 4);

    // Two source channels pass through, two device channels stay silent
    assert_eq!(data[0], 0.0);
    assert_eq!(data[1], 1.0);
    assert_eq!(data[2], 0.0);
    assert_eq!(data[3], 0.0);
    assert_eq!(data[4], 2.0);
    assert_eq!(data[5], 3.0);
    assert_eq!(engine.position_frames(), BLOCK_FRAMES);
}

#[test]
fn test_uhj_produces_stereo_from_four_channels() {
    let mut engine = PlaybackEngine::default();
    // Pure omni content: every frame is W=0.5, rest 0
    let mut samples = vec![0.0f32; 1000 * 4];
    for frame in 0..1000 {
        samples[frame * 4] = 0.5;
    }
    engine.open_buffer(AudioBuffer::new(samples, 4, 48000, ChannelFormat::Acn));
    engine.set_decoder(DecoderVariant::StereoUhj).unwrap();
    engine.play();

    let core = engine.stream_core();
    let data = pull_block(&core, 2);

    // Omni only: L == R, nonzero
    assert!(data[0] > 0.0);
    assert!((data[0] - data[1]).abs() < 1e-6);
    // Every frame of the block decodes the same way
    assert!((data[0] - data[2 * 100]).abs() < 1e-6);
}

#[test]
fn test_uhj_rejected_on_stereo_source() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(100, 2, 48000));
    engine.play();
    let position_before = engine.position_frames();

    match engine.set_decoder(DecoderVariant::StereoUhj) {
        Err(Error::UnsupportedChannelCount { decoder, channels }) => {
            assert_eq!(decoder, "StereoUhj");
            assert_eq!(channels, 2);
        }
        other => panic!("expected UnsupportedChannelCount, got {:?}", other),
    }

    // Failed assignment commits nothing
    assert_eq!(engine.active_decoder(), None);
    assert_eq!(engine.transport(), TransportState::Playing);
    assert_eq!(engine.position_frames(), position_before);
}

#[test]
fn test_ambisonics_assignment_fails_not_implemented() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(100, 4, 48000));

    assert!(matches!(
        engine.set_decoder(DecoderVariant::Ambisonics),
        Err(Error::NotImplemented(_))
    ));
    assert_eq!(engine.active_decoder(), None);
}

#[test]
fn test_decoder_swap_lands_on_block_boundary() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(4 * BLOCK_FRAMES, 4, 48000));
    engine.play();

    let core = engine.stream_core();

    // First block decodes Raw
    let raw_block = pull_block(&core, 2);
    assert_eq!(raw_block[0], 0.0);
    assert_eq!(raw_block[1], 1.0);

    // Swap mid-stream; the entire next block uses the new decoder
    engine.set_decoder(DecoderVariant::StereoUhj).unwrap();
    let uhj_block = pull_block(&core, 2);

    for frame in 0..BLOCK_FRAMES {
        let source_frame = BLOCK_FRAMES + frame;
        let w = (source_frame * 4) as f32;
        let y = (source_frame * 4 + 1) as f32 * 0.577_350_27;
        let x = (source_frame * 4 + 3) as f32 * 0.577_350_27;
        let s = 0.939_692_6 * w + 0.185_574_0 * x;
        let d = 0.655_451_6 * y;

        assert!((uhj_block[frame * 2] - 0.5 * (s + d)).abs() < 1e-2);
        assert!((uhj_block[frame * 2 + 1] - 0.5 * (s - d)).abs() < 1e-2);
    }
}

#[test]
fn test_pause_resume_preserves_position() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(10 * BLOCK_FRAMES, 4, 48000));
    engine.play();

    let core = engine.stream_core();
    pull_block(&core, 2);
    pull_block(&core, 2);
    let position = engine.position_frames();
    assert_eq!(position, 2 * BLOCK_FRAMES);

    engine.pause();
    assert_eq!(engine.transport(), TransportState::Paused);

    // Paused blocks render silence and do not advance
    let silent = pull_block(&core, 2);
    assert!(silent.iter().all(|&s| s == 0.0));
    assert_eq!(engine.position_frames(), position);

    engine.play();
    pull_block(&core, 2);
    assert_eq!(engine.position_frames(), position + BLOCK_FRAMES);
}

#[test]
fn test_pause_when_not_playing_is_ignored() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(100, 2, 48000));

    engine.pause();
    assert_eq!(engine.transport(), TransportState::Stopped);
}

#[test]
fn test_stop_preserves_position() {
    let mut engine = PlaybackEngine::default();
    engine.open_buffer(ramp_buffer(10 * BLOCK_FRAMES, 4, 48000));
    engine.play();

    let core = engine.stream_core();
    pull_block(&core, 2);
    engine.stop();

    assert_eq!(engine.transport(), TransportState::Stopped);
    assert_eq!(engine.position_frames(), BLOCK_FRAMES);
}

#[test]
fn test_tail_block_zero_padded_and_autostop() {
    let mut engine = PlaybackEngine::default();
    // Buffer ends 100 frames into the final block
    let frames = BLOCK_FRAMES + 100;
    engine.open_buffer(ramp_buffer(frames, 2, 48000));
    engine.play();

    let core = engine.stream_core();
    pull_block(&core, 2);
    let tail = pull_block(&core, 2);

    assert_eq!(tail[99 * 2], ((BLOCK_FRAMES + 99) * 2) as f32);
    assert!(tail[100 * 2..].iter().all(|&s| s == 0.0));

    assert_eq!(engine.transport(), TransportState::Stopped);
    assert_eq!(engine.position_frames(), frames);
}

#[test]
fn test_end_to_end_uhj_playback_with_events() {
    let events = EventBus::new(1024);
    let mut rx = events.subscribe();
    let mut engine = PlaybackEngine::new(events);

    // 2 seconds of 4-channel 48 kHz material
    let frames = 96_000;
    engine.open_buffer(ramp_buffer(frames, 4, 48000));
    engine.set_decoder(DecoderVariant::StereoUhj).unwrap();
    engine.set_channel_format(ChannelFormat::Acn);
    engine.play();

    let core = engine.stream_core();
    let mut blocks = 0;
    while engine.transport() == TransportState::Playing {
        pull_block(&core, 2);
        blocks += 1;
        assert!(blocks <= frames / BLOCK_FRAMES + 1, "playback never ended");
    }

    assert_eq!(engine.position_frames(), frames);
    assert_eq!(engine.transport(), TransportState::Stopped);
    assert_eq!(blocks, frames / BLOCK_FRAMES + 1); // 187.5 blocks rounds up

    let mut saw_playing = false;
    let mut saw_eof = false;
    let mut saw_stopped = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            PlayerEvent::StateChanged {
                new_state: TransportState::Playing,
                ..
            } => saw_playing = true,
            PlayerEvent::StateChanged {
                new_state: TransportState::Stopped,
                ..
            } => saw_stopped = true,
            PlayerEvent::EndOfFile { .. } => saw_eof = true,
            _ => {}
        }
    }
    assert!(saw_playing);
    assert!(saw_eof);
    assert!(saw_stopped);
}

#[test]
fn test_channel_format_swap_changes_decode() {
    let mut engine = PlaybackEngine::default();
    let mut samples = vec![0.0f32; 100 * 4];
    for frame in 0..100 {
        samples[frame * 4] = 0.5; // omni only
    }
    engine.open_buffer(AudioBuffer::new(samples, 4, 48000, ChannelFormat::Acn));
    engine.set_decoder(DecoderVariant::StereoUhj).unwrap();
    engine.play();

    let core = engine.stream_core();
    let mut acn = vec![0.0f32; 2];
    core.fill(&mut acn, 2);

    // FuMa applies the sqrt(2) omni gain, so the same data decodes louder
    engine.set_channel_format(ChannelFormat::FuMa);
    let mut fuma = vec![0.0f32; 2];
    core.fill(&mut fuma, 2);

    assert!((fuma[0] / acn[0] - std::f32::consts::SQRT_2).abs() < 1e-3);
}

#[test]
fn test_set_device_failure_reports_and_stops() {
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let mut engine = PlaybackEngine::new(events);
    engine.open_buffer(ramp_buffer(100, 2, 48000));
    engine.play();

    let result = engine.set_device(Some("no-such-device-7f3a"));
    assert!(matches!(result, Err(Error::DeviceUnavailable(_))));
    assert_eq!(engine.transport(), TransportState::Stopped);
    assert_eq!(engine.device_name(), None);

    let mut saw_error = false;
    while let Ok(event) = rx.try_recv() {
        if let PlayerEvent::Error { kind, .. } = event {
            assert_eq!(kind, "device_unavailable");
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[test]
fn test_volume_clamped() {
    let engine = PlaybackEngine::default();
    engine.set_volume(1.7);
    assert_eq!(engine.volume(), 1.0);
    engine.set_volume(-0.3);
    assert_eq!(engine.volume(), 0.0);
    engine.set_volume(0.4);
    assert_eq!(engine.volume(), 0.4);
}
