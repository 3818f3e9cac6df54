//! Host simulator: runs the device core against simulated hardware and a
//! loopback session for one scripted conversation.
//!
//! # Sequence
//!
//! 1. Initialise logging and load [`DeviceConfig`].
//! 2. Start the [`Application`] on a [`SimDevice`].
//! 3. Press the chat button, let the "server" transcribe and answer with a
//!    few audio frames, drain them through the codec, then hang up.
//! 4. Print what the device did and shut down.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use voice_device_core::{
    config::DeviceConfig,
    sim::{pcm_frame, ScriptedOta, SimDevice},
    Application,
};

/// 60 ms of a 440 Hz tone at 16 kHz.
fn tone_frame(phase: usize) -> Vec<u8> {
    let samples: Vec<i16> = (0..960)
        .map(|i| {
            let t = (phase * 960 + i) as f32 / 16_000.0;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16
        })
        .collect();
    pcm_frame(&samples)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice device simulator starting up");

    let config = DeviceConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        DeviceConfig::default()
    });

    let device = SimDevice::new();
    let ota = Arc::new(ScriptedOta::new(env!("CARGO_PKG_VERSION")));
    let mut app = Application::new(device.context().with_ota(ota), config)
        .context("building application")?;
    app.start().context("starting application")?;
    app.settle();

    // --- Conversation --------------------------------------------------------
    app.toggle_chat_state();
    app.settle();

    device
        .transport
        .deliver_json(&json!({"type": "stt", "text": "what is the weather"}));
    device
        .transport
        .deliver_json(&json!({"type": "llm", "emotion": "happy"}));
    device
        .transport
        .deliver_json(&json!({"type": "tts", "state": "start"}));
    app.settle();

    device.transport.deliver_json(&json!({
        "type": "tts", "state": "sentence_start", "text": "Sunny all day."
    }));
    for phase in 0..5 {
        device.transport.deliver_audio(tone_frame(phase));
    }
    while app.decode_queue_len() > 0 {
        device.codec.fire_output_ready();
        app.settle();
    }

    device
        .transport
        .deliver_json(&json!({"type": "tts", "state": "stop"}));
    app.settle();

    app.toggle_chat_state();
    app.settle();

    // --- Summary -------------------------------------------------------------
    log::info!("final state: {}", app.device_state());
    log::info!("frames played: {}", device.codec.played().len());
    for message in device.display.chat_messages() {
        log::info!("chat: {message:?}");
    }
    for call in device.transport.sent() {
        log::debug!("sent: {call:?}");
    }

    app.shutdown();
    Ok(())
}
