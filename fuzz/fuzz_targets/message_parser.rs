//! Fuzz target for wire line parsing and classification
//!
//! Feeds arbitrary frames through the line buffer, the parser and the event
//! classifier. None of them may panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

use tmi_ebooks::{Event, LineBuffer, Message};

fuzz_target!(|data: &[u8]| {
    // Frames arrive as WebSocket text, so only valid UTF-8 is interesting
    if let Ok(input) = str::from_utf8(data) {
        if input.is_empty() {
            return;
        }

        let mut buffer = LineBuffer::new();
        for line in buffer.push(input).into_iter().flatten() {
            if let Ok(message) = line.parse::<Message>() {
                let _ = Event::classify(&message);
                let _ = message.to_string();
            }
        }

        // A whole frame parsed as a single line should not panic either
        let _ = input.parse::<Message>();
    }
});
