//! Fuzz target: `mqtt::dispatch::decode`
//!
//! Splits the input into a topic and a payload and checks that decoding
//! never panics and never yields more commands than the topic can match.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use duorelay::app::commands::AppCommand;
use duorelay::config::DeviceConfig;
use duorelay::mqtt::dispatch::decode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let cfg = DeviceConfig::default();

    // First byte picks the split point between topic and payload.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (topic, payload) = rest.split_at(split);
    let Ok(topic) = core::str::from_utf8(topic) else {
        return;
    };

    let commands = decode(topic, payload, &cfg.channels);
    let known = cfg.channels.iter().any(|c| c.command_topic.as_str() == topic);
    if !known {
        assert!(commands.is_empty(), "foreign topic produced commands");
    }
    for cmd in &commands {
        if let AppCommand::SetRelay { channel, .. } = cmd {
            assert_eq!(cfg.channel(*channel).command_topic.as_str(), topic);
        }
    }

    // Same payload on a real command topic.
    let _ = decode(&cfg.channels[0].command_topic, payload, &cfg.channels);
});
