use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use super::*;
use crate::audio::{encode_frames, AlertSounds};
use crate::config::DeviceConfig;
use crate::protocol::ListeningMode;
use crate::sim::{
    pcm_frame, PassthroughProcessor, ScriptedOta, Sent, SimCodec, SimDevice, SimWakeWord,
};
use crate::voice::{AudioProcessor, WakeWordDetector};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn started_with(ctx: DeviceContext, config: DeviceConfig) -> Application {
    let mut app = Application::new(ctx, config).expect("new");
    app.start().expect("start");
    app.settle();
    app
}

fn started(device: &SimDevice) -> Application {
    started_with(device.context(), SimDevice::fast_config())
}

/// Wait for everything already posted to the main loop, without touching
/// the background queue.
fn sync_main(app: &Application) {
    app.inner.main_queue.schedule(|| {});
    app.inner.main_queue.wait_for_completion();
}

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Toggle into a conversation and let the server start talking.
fn speaking(app: &Application, device: &SimDevice) {
    app.toggle_chat_state();
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Listening);

    device
        .transport
        .deliver_json(&json!({"type": "tts", "state": "start"}));
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Speaking);
}

fn upgrade_config(idle_poll_ms: u64) -> DeviceConfig {
    let mut config = SimDevice::fast_config();
    config.upgrade.enabled = true;
    config.upgrade.idle_poll_ms = idle_poll_ms;
    config
}

// ---------------------------------------------------------------------------
// Startup and state machine
// ---------------------------------------------------------------------------

#[test]
fn start_reaches_idle() {
    let device = SimDevice::new();
    let app = started(&device);

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert!(device.codec.is_started());
    assert_eq!(device.display.statuses().last().map(String::as_str), Some("Standby"));
    assert_eq!(
        device.led.repaints().last(),
        Some(&(DeviceState::Idle, false))
    );
}

#[test]
fn start_twice_is_an_error() {
    let device = SimDevice::new();
    let mut app = started(&device);
    assert!(matches!(app.start(), Err(AppError::AlreadyStarted)));
}

#[test]
fn codec_failure_is_fatal_and_terminal() {
    let device = SimDevice::new();
    device.codecs.fail_creation(true);

    let mut app = Application::new(device.context(), SimDevice::fast_config()).unwrap();
    assert!(matches!(app.start(), Err(AppError::Codec(_))));
    app.settle();
    assert_eq!(app.device_state(), DeviceState::FatalError);

    app.toggle_chat_state();
    app.settle();
    assert_eq!(app.device_state(), DeviceState::FatalError);
    assert!(device.transport.sent().is_empty());
}

#[test]
fn repeating_a_state_has_no_side_effects() {
    let device = SimDevice::new();
    let app = started(&device);

    for state in DeviceState::ALL {
        app.inner.schedule(move |inner| inner.set_device_state(state));
        app.settle();

        let shown = device.display.shown().len();
        let repaints = device.led.repaints().len();
        let enables = device.codec.enable_output_calls().len();
        let sent = device.transport.sent().len();

        app.inner.schedule(move |inner| inner.set_device_state(state));
        app.settle();

        assert_eq!(app.device_state(), state);
        assert_eq!(device.display.shown().len(), shown, "display redrawn for {state}");
        assert_eq!(device.led.repaints().len(), repaints, "led repainted for {state}");
        assert_eq!(device.codec.enable_output_calls().len(), enables, "codec reset for {state}");
        assert_eq!(device.transport.sent().len(), sent, "session touched for {state}");
    }
}

#[test]
fn entry_effects_run_after_background_drains() {
    let device = SimDevice::new();
    let app = started(&device);

    let background = Arc::downgrade(&app.inner.background_queue().unwrap());
    let observed = Arc::new(Mutex::new(Vec::new()));
    {
        let observed = Arc::clone(&observed);
        device.display.set_status_hook(Box::new(move |_: &str| {
            let quiescent = background.upgrade().map_or(true, |q| q.is_quiescent());
            observed.lock().unwrap().push(quiescent);
        }));
    }

    let finished = Arc::new(Mutex::new(0));
    for _ in 0..3 {
        let finished = Arc::clone(&finished);
        app.inner.offload(move || {
            thread::sleep(Duration::from_millis(20));
            *finished.lock().unwrap() += 1;
        });
    }
    app.toggle_chat_state();
    app.settle();

    assert_eq!(*finished.lock().unwrap(), 3);
    let observed = observed.lock().unwrap();
    assert!(!observed.is_empty());
    assert!(observed.iter().all(|&quiescent| quiescent));
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

#[test]
fn toggle_with_failing_channel_alerts_and_returns_to_idle() {
    let device = SimDevice::new();
    device.transport.set_open_succeeds(false);
    let app = started(&device);

    app.toggle_chat_state();
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert_eq!(
        device.display.notifications(),
        vec!["Failed to open audio channel"]
    );
    assert!(device.display.statuses().contains(&"Connecting...".to_string()));
    assert!(!app.keep_listening());
}

#[test]
fn toggle_from_idle_listens_with_keep_listening() {
    let device = SimDevice::new();
    let app = started(&device);

    app.toggle_chat_state();
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Listening);
    assert!(app.keep_listening());

    let sent = device.transport.sent();
    assert_eq!(sent[0], Sent::OpenChannel);
    assert!(sent.contains(&Sent::StartListening(ListeningMode::AutoStop)));
    assert!(sent.iter().any(|s| matches!(s, Sent::IotDescriptors(_))));
    assert!(sent.iter().any(|s| matches!(s, Sent::IotStates(_))));
    assert_eq!(device.board.power_save_calls(), vec![false]);
}

#[test]
fn toggle_while_listening_closes_channel() {
    let device = SimDevice::new();
    let app = started(&device);
    app.toggle_chat_state();
    app.settle();

    app.toggle_chat_state();
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert!(device.transport.sent().contains(&Sent::CloseChannel));
    assert_eq!(device.board.power_save_calls(), vec![false, true]);
    assert_eq!(
        device.display.chat_messages().last(),
        Some(&(String::new(), String::new()))
    );
}

#[test]
fn toggle_while_speaking_aborts() {
    let device = SimDevice::new();
    let app = started(&device);
    speaking(&app, &device);

    app.toggle_chat_state();
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Speaking);
    assert!(device
        .transport
        .sent()
        .contains(&Sent::AbortSpeaking(AbortReason::None)));
}

#[test]
fn intents_without_transport_do_nothing() {
    let device = SimDevice::new();
    let mut ctx = device.context();
    ctx.transport = None;
    let app = started_with(ctx, SimDevice::fast_config());

    app.toggle_chat_state();
    app.start_listening();
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert!(device.transport.sent().is_empty());
}

#[test]
fn push_to_talk_round_trip() {
    let device = SimDevice::new();
    let app = started(&device);

    app.start_listening();
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Listening);
    assert!(!app.keep_listening());
    assert!(device
        .transport
        .sent()
        .contains(&Sent::StartListening(ListeningMode::ManualStop)));

    app.stop_listening();
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Idle);
    assert!(device.transport.sent().contains(&Sent::StopListening));
}

#[test]
fn start_listening_with_failing_channel_alerts() {
    let device = SimDevice::new();
    device.transport.set_open_succeeds(false);
    let app = started(&device);

    app.start_listening();
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert_eq!(device.display.notifications().len(), 1);
}

#[test]
fn start_listening_while_speaking_interrupts_and_clears_queue() {
    let device = SimDevice::new();
    let app = started(&device);
    speaking(&app, &device);

    for i in 0..5 {
        device.transport.deliver_audio(pcm_frame(&[i; 4]));
    }
    assert_eq!(app.decode_queue_len(), 5);

    app.start_listening();
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Listening);
    assert_eq!(app.decode_queue_len(), 0);
    let sent = device.transport.sent();
    assert!(sent.contains(&Sent::AbortSpeaking(AbortReason::None)));
    assert!(sent.contains(&Sent::StartListening(ListeningMode::ManualStop)));
}

// ---------------------------------------------------------------------------
// Incoming messages
// ---------------------------------------------------------------------------

#[test]
fn tts_stop_returns_to_listening_when_keep_listening() {
    let device = SimDevice::new();
    let app = started(&device);
    speaking(&app, &device);

    device
        .transport
        .deliver_json(&json!({"type": "tts", "state": "stop"}));
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Listening);
    let auto_starts = device
        .transport
        .sent()
        .iter()
        .filter(|s| **s == Sent::StartListening(ListeningMode::AutoStop))
        .count();
    assert_eq!(auto_starts, 2);
}

#[test]
fn tts_stop_goes_idle_after_push_to_talk() {
    let device = SimDevice::new();
    let app = started(&device);
    app.start_listening();
    app.settle();
    device
        .transport
        .deliver_json(&json!({"type": "tts", "state": "start"}));
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Speaking);

    device
        .transport
        .deliver_json(&json!({"type": "tts", "state": "stop"}));
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Idle);
}

#[test]
fn incoming_audio_only_queued_while_speaking() {
    let device = SimDevice::new();
    let app = started(&device);

    device.transport.deliver_audio(pcm_frame(&[1, 2]));
    assert_eq!(app.decode_queue_len(), 0);

    speaking(&app, &device);
    for _ in 0..3 {
        device.transport.deliver_audio(pcm_frame(&[1, 2]));
    }
    assert_eq!(app.decode_queue_len(), 3);
}

#[test]
fn display_messages_and_iot_commands() {
    let device = SimDevice::new();
    let app = started(&device);

    device
        .transport
        .deliver_json(&json!({"type": "stt", "text": "what time is it"}));
    device.transport.deliver_json(&json!({
        "type": "tts", "state": "sentence_start", "text": "noon"
    }));
    device
        .transport
        .deliver_json(&json!({"type": "llm", "emotion": "happy"}));
    device.transport.deliver_json(&json!({
        "type": "iot", "commands": [{"name": "Lamp", "method": "TurnOn"}]
    }));
    app.settle();

    assert_eq!(
        device.display.chat_messages(),
        vec![
            ("user".to_string(), "what time is it".to_string()),
            ("assistant".to_string(), "noon".to_string()),
        ]
    );
    assert_eq!(device.display.last_emotion().as_deref(), Some("happy"));
    assert_eq!(device.things.invoked().len(), 1);
}

#[test]
fn malformed_messages_are_dropped() {
    let device = SimDevice::new();
    let app = started(&device);
    let shown = device.display.shown().len();

    device.transport.deliver_json(&json!({"state": "start"}));
    device.transport.deliver_json(&json!({"type": "tts"}));
    device.transport.deliver_json(&json!({"type": "stt"}));
    device.transport.deliver_json(&json!({"type": "weather"}));
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert_eq!(device.display.shown().len(), shown);
}

#[test]
fn network_error_raises_alert() {
    let device = SimDevice::new();
    let app = started(&device);

    device.transport.raise_network_error("Server not found");
    app.settle();

    assert_eq!(device.display.notifications(), vec!["Server not found"]);
}

#[test]
fn iot_states_pushed_only_when_changed() {
    let device = SimDevice::new();
    let app = started(&device);
    app.toggle_chat_state();
    app.settle();

    app.update_iot_states();
    app.settle();
    device.things.set_power(true);
    app.update_iot_states();
    app.settle();

    let pushes = device
        .transport
        .sent()
        .iter()
        .filter(|s| matches!(s, Sent::IotStates(_)))
        .count();
    assert_eq!(pushes, 2);
}

#[test]
fn channel_is_set_up_before_listening_starts() {
    let device = SimDevice::new();
    let app = started(&device);
    app.toggle_chat_state();
    app.settle();

    let sent = device.transport.sent();
    let position = |wanted: fn(&Sent) -> bool| sent.iter().position(wanted);
    let opened = position(|s| matches!(s, Sent::OpenChannel));
    let descriptors = position(|s| matches!(s, Sent::IotDescriptors(_)));
    let listening = position(|s| matches!(s, Sent::StartListening(_)));
    let states = position(|s| matches!(s, Sent::IotStates(_)));

    assert!(opened.is_some() && descriptors.is_some(), "{sent:?}");
    assert!(opened < descriptors, "{sent:?}");
    assert!(descriptors < listening, "{sent:?}");
    assert!(listening < states, "{sent:?}");
}

// ---------------------------------------------------------------------------
// Audio pipeline
// ---------------------------------------------------------------------------

#[test]
fn output_ready_plays_one_frame_per_signal() {
    let device = SimDevice::new();
    let app = started(&device);
    speaking(&app, &device);

    device.transport.deliver_audio(pcm_frame(&[1, 2, 3]));
    device.transport.deliver_audio(pcm_frame(&[4, 5, 6]));

    device.codec.fire_output_ready();
    app.settle();
    assert_eq!(device.codec.played(), vec![vec![1, 2, 3]]);
    assert_eq!(app.decode_queue_len(), 1);

    device.codec.fire_output_ready();
    app.settle();
    assert_eq!(device.codec.played().len(), 2);
}

#[test]
fn playback_is_resampled_to_codec_rate() {
    let device = SimDevice::with_codec(SimCodec::new(16_000, 24_000, 1), 16_000);
    let app = started(&device);
    speaking(&app, &device);

    assert_eq!(device.codecs.decoder_rates(), vec![24_000, 16_000]);

    device.transport.deliver_audio(pcm_frame(&[100; 160]));
    device.codec.fire_output_ready();
    app.settle();

    let played = device.codec.played();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].len(), 240);
}

#[test]
fn abort_drops_in_flight_decode() {
    let device = SimDevice::new();
    let app = started(&device);
    speaking(&app, &device);
    device.transport.deliver_audio(pcm_frame(&[7; 8]));

    // Hold the worker so the decode task is still queued when the abort
    // lands.
    let (release, gate) = mpsc::channel::<()>();
    app.inner.offload(move || {
        let _ = gate.recv();
    });
    device.codec.fire_output_ready();
    sync_main(&app);
    assert_eq!(app.decode_queue_len(), 0);

    app.abort_speaking(AbortReason::None);
    sync_main(&app);
    release.send(()).unwrap();
    app.settle();

    assert!(device.codec.played().is_empty());
    assert!(device
        .transport
        .sent()
        .contains(&Sent::AbortSpeaking(AbortReason::None)));
}

#[test]
fn next_utterance_plays_after_abort() {
    let device = SimDevice::new();
    let app = started(&device);
    speaking(&app, &device);
    app.abort_speaking(AbortReason::None);
    app.settle();

    // A fresh tts:start issues a new cancellation flag.
    device
        .transport
        .deliver_json(&json!({"type": "tts", "state": "start"}));
    app.settle();
    device.transport.deliver_audio(pcm_frame(&[3; 4]));
    device.codec.fire_output_ready();
    app.settle();

    assert_eq!(device.codec.played(), vec![vec![3; 4]]);
}

#[test]
fn idle_silence_disables_output_exactly_once() {
    let device = SimDevice::new();
    let app = started(&device);

    device.codec.fire_output_ready();
    sync_main(&app);
    assert!(device.codec.enable_output_calls().is_empty());

    device
        .clock
        .advance(SimDevice::past_silence_timeout(&SimDevice::fast_config()));
    for _ in 0..5 {
        device.codec.fire_output_ready();
        sync_main(&app);
    }

    assert_eq!(device.codec.enable_output_calls(), vec![false]);
}

#[test]
fn silence_outside_idle_keeps_output_on() {
    let device = SimDevice::new();
    let app = started(&device);
    app.toggle_chat_state();
    app.settle();
    let before = device.codec.enable_output_calls();

    device.clock.advance(Duration::from_secs(60));
    device.codec.fire_output_ready();
    sync_main(&app);

    assert_eq!(device.codec.enable_output_calls(), before);
}

#[test]
fn capture_is_encoded_and_sent_only_while_listening() {
    let device = SimDevice::with_codec(SimCodec::new(48_000, 16_000, 1), 16_000);
    let app = started(&device);

    // 60 ms at 48 kHz becomes exactly one 60 ms frame at 16 kHz.
    device.codec.push_input(vec![10; 2880]);
    device.codec.fire_input_ready();
    app.settle();
    assert_eq!(device.transport.audio_frames_sent(), 0);

    app.toggle_chat_state();
    app.settle();
    device.codec.push_input(vec![10; 2880]);
    device.codec.fire_input_ready();
    app.settle();

    assert_eq!(device.transport.audio_frames_sent(), 1);
    let frame = device.transport.sent().into_iter().find_map(|s| match s {
        Sent::Audio(frame) => Some(frame),
        _ => None,
    });
    assert_eq!(frame.map(|f| f.len()), Some(960 * 2));
}

#[test]
fn stereo_capture_is_resampled_per_channel() {
    let device = SimDevice::with_codec(SimCodec::new(48_000, 16_000, 2), 16_000);
    let app = started(&device);
    app.toggle_chat_state();
    app.settle();

    // 60 ms of interleaved mic + reference at 48 kHz.
    let interleaved: Vec<i16> = (0..2880).flat_map(|_| [1000, -1000]).collect();
    device.codec.push_input(interleaved);
    device.codec.fire_input_ready();
    app.settle();

    // 960 samples per channel, interleaved, fills two mono frames.
    assert_eq!(device.transport.audio_frames_sent(), 2);
}

#[test]
fn decoder_rebuild_waits_for_in_flight_playback() {
    let device = SimDevice::new();
    let app = started(&device);

    let seen = Arc::new(Mutex::new(None));
    {
        let seen = Arc::clone(&seen);
        let codecs = Arc::clone(&device.codecs);
        app.inner.offload(move || {
            thread::sleep(Duration::from_millis(50));
            *seen.lock().unwrap() = Some(codecs.decoder_rates().len());
        });
    }
    app.inner.set_decode_sample_rate(24_000);

    assert_eq!(*seen.lock().unwrap(), Some(1));
    assert_eq!(device.codecs.decoder_rates(), vec![16_000, 24_000]);
}

#[test]
fn alert_plays_registered_sound() {
    let device = SimDevice::new();
    let payloads: [&[u8]; 3] = [&[1, 2, 3], &[1, 2, 3, 4, 5, 6, 7], &[]];
    let sounds = AlertSounds::new().with_sound("Configuring WiFi", encode_frames(payloads));
    let app = started_with(
        device.context().with_alert_sounds(sounds),
        SimDevice::fast_config(),
    );

    app.alert("Info", "Configuring WiFi");
    app.settle();

    assert_eq!(device.display.notifications(), vec!["Configuring WiFi"]);
    assert_eq!(app.decode_queue_len(), 3);
}

#[test]
fn alert_after_aborted_conversation_is_audible() {
    let device = SimDevice::new();
    let sounds = AlertSounds::new().with_sound(
        "Configuring WiFi",
        encode_frames([pcm_frame(&[5; 4]).as_slice()]),
    );
    let app = started_with(
        device.context().with_alert_sounds(sounds),
        SimDevice::fast_config(),
    );
    speaking(&app, &device);

    app.abort_speaking(AbortReason::None);
    app.settle();
    device.transport.remote_close();
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Idle);

    app.alert("Info", "Configuring WiFi");
    app.settle();
    assert_eq!(app.decode_queue_len(), 1);

    device.codec.fire_output_ready();
    app.settle();
    assert_eq!(device.codec.played(), vec![vec![5; 4]]);
}

#[test]
fn truncated_alert_sound_queues_nothing() {
    let device = SimDevice::new();
    let sounds = AlertSounds::new().with_sound("PIN is not ready", vec![0u8, 9, 1, 2]);
    let app = started_with(
        device.context().with_alert_sounds(sounds),
        SimDevice::fast_config(),
    );

    app.alert("Error", "PIN is not ready");
    app.settle();

    assert_eq!(device.display.notifications(), vec!["PIN is not ready"]);
    assert_eq!(app.decode_queue_len(), 0);
}

// ---------------------------------------------------------------------------
// Voice analysis
// ---------------------------------------------------------------------------

#[test]
fn wake_word_in_idle_starts_listening() {
    let device = SimDevice::new();
    let detector = Arc::new(SimWakeWord::new(vec![vec![1, 1], vec![2, 2]]));
    let app = started_with(
        device.context().with_wake_word(detector.clone()),
        SimDevice::fast_config(),
    );
    assert!(detector.is_detection_running());

    detector.trigger("hey device");
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Listening);
    assert!(app.keep_listening());
    assert!(detector.is_detection_running());

    let sent = device.transport.sent();
    let replay: Vec<_> = sent
        .iter()
        .filter_map(|s| match s {
            Sent::Audio(frame) => Some(frame.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(replay, vec![vec![1, 1], vec![2, 2]]);
    assert!(sent.contains(&Sent::WakeWordDetected("hey device".into())));
}

#[test]
fn wake_word_while_speaking_aborts() {
    let device = SimDevice::new();
    let detector = Arc::new(SimWakeWord::new(Vec::new()));
    let app = started_with(
        device.context().with_wake_word(detector.clone()),
        SimDevice::fast_config(),
    );
    speaking(&app, &device);

    detector.trigger("hey device");
    app.settle();

    assert!(device
        .transport
        .sent()
        .contains(&Sent::AbortSpeaking(AbortReason::WakeWordDetected)));
    assert!(detector.is_detection_running());
}

#[test]
fn wake_word_with_failing_channel_returns_to_idle() {
    let device = SimDevice::new();
    device.transport.set_open_succeeds(false);
    let detector = Arc::new(SimWakeWord::new(vec![vec![1]]));
    let app = started_with(
        device.context().with_wake_word(detector.clone()),
        SimDevice::fast_config(),
    );

    detector.trigger("hey device");
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert_eq!(device.transport.audio_frames_sent(), 0);
    assert!(detector.is_detection_running());
}

#[test]
fn captured_audio_feeds_wake_word_instead_of_encoder() {
    let device = SimDevice::new();
    let detector = Arc::new(SimWakeWord::new(Vec::new()));
    let app = started_with(
        device.context().with_wake_word(detector.clone()),
        SimDevice::fast_config(),
    );

    device.codec.push_input(vec![0; 960]);
    device.codec.fire_input_ready();
    app.settle();

    assert_eq!(detector.fed(), 1);
    assert_eq!(device.transport.audio_frames_sent(), 0);
}

#[test]
fn voice_activity_tracked_only_while_listening() {
    let device = SimDevice::new();
    let detector = Arc::new(SimWakeWord::new(Vec::new()));
    let app = started_with(
        device.context().with_wake_word(detector.clone()),
        SimDevice::fast_config(),
    );

    detector.set_voice_activity(true);
    app.settle();
    assert!(!app.is_voice_detected());

    app.toggle_chat_state();
    app.settle();
    detector.set_voice_activity(true);
    app.settle();

    assert!(app.is_voice_detected());
    assert_eq!(
        device.led.repaints().last(),
        Some(&(DeviceState::Listening, true))
    );
}

#[test]
fn audio_processor_output_is_encoded_while_listening() {
    let device = SimDevice::new();
    let processor = Arc::new(PassthroughProcessor::new());
    let app = started_with(
        device.context().with_audio_processor(processor.clone()),
        SimDevice::fast_config(),
    );
    assert!(!processor.is_running());

    app.toggle_chat_state();
    app.settle();
    assert!(processor.is_running());

    device.codec.push_input(vec![5; 960]);
    device.codec.fire_input_ready();
    app.settle();
    assert_eq!(device.transport.audio_frames_sent(), 1);

    app.toggle_chat_state();
    app.settle();
    assert!(!processor.is_running());
}

// ---------------------------------------------------------------------------
// Upgrade
// ---------------------------------------------------------------------------

#[test]
fn current_firmware_is_marked_valid() {
    let device = SimDevice::new();
    let ota = Arc::new(ScriptedOta::new("1.0.0").failing_checks(2));
    let app = started_with(device.context().with_ota(ota.clone()), upgrade_config(5));

    wait_until("version notification", || {
        device.display.notifications().contains(&"Version 1.0.0".to_string())
    });
    assert!(ota.is_marked_valid());
    assert_eq!(ota.checks(), 3);
    assert_eq!(ota.upgrades_started(), 0);
    assert_eq!(app.device_state(), DeviceState::Idle);
}

#[test]
fn new_firmware_is_installed_and_device_restarts() {
    let device = SimDevice::new();
    let ota = Arc::new(ScriptedOta::new("1.0.0").offering("2.0.0"));
    let app = started_with(device.context().with_ota(ota.clone()), upgrade_config(5));

    wait_until("restart", || device.board.restarts() == 1);
    app.settle();

    assert_eq!(app.device_state(), DeviceState::Upgrading);
    assert!(app.inner.background_queue().is_none());
    assert_eq!(device.codec.enable_output_calls(), vec![false]);

    let statuses = device.display.statuses();
    assert!(statuses.contains(&"New version 2.0.0".to_string()));
    assert_eq!(statuses.last().map(String::as_str), Some("100% 64KB/s"));
}

#[test]
fn failed_upgrade_still_restarts() {
    let device = SimDevice::new();
    let ota = Arc::new(
        ScriptedOta::new("1.0.0")
            .offering("2.0.0")
            .upgrade_fails(true),
    );
    let _app = started_with(device.context().with_ota(ota.clone()), upgrade_config(5));

    wait_until("restart", || device.board.restarts() == 1);
    assert_eq!(
        device.display.statuses().last().map(String::as_str),
        Some("Upgrade failed")
    );
}

#[test]
fn upgrade_waits_for_idle() {
    let device = SimDevice::new();
    let ota = Arc::new(ScriptedOta::new("1.0.0").offering("2.0.0"));
    let mut app = Application::new(device.context().with_ota(ota.clone()), upgrade_config(100))
        .unwrap();
    app.start().unwrap();
    app.toggle_chat_state();
    app.settle();
    assert_eq!(app.device_state(), DeviceState::Listening);

    thread::sleep(Duration::from_millis(350));
    assert_eq!(ota.upgrades_started(), 0);
    assert_eq!(app.device_state(), DeviceState::Listening);

    app.stop_listening();
    wait_until("restart", || device.board.restarts() == 1);
    assert_eq!(ota.upgrades_started(), 1);
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[test]
fn shutdown_stops_the_main_loop() {
    let device = SimDevice::new();
    let ota = Arc::new(ScriptedOta::new("1.0.0").failing_checks(usize::MAX));
    let mut app = started_with(device.context().with_ota(ota), upgrade_config(5));

    app.shutdown();
    app.toggle_chat_state();
    thread::sleep(Duration::from_millis(20));

    assert_eq!(app.device_state(), DeviceState::Idle);
    assert!(device.transport.sent().is_empty());
    assert!(app.inner.background_queue().is_none());

    // Idempotent, and drop after shutdown is fine.
    app.shutdown();
}
