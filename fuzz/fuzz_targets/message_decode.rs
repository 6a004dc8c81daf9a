//! Fuzz target for wire decoding
//!
//! Feeds arbitrary bytes to every decoder a peer can reach:
//! - Normal and prekey messages
//! - Group messages
//! - Session keys and exported session keys
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.
//! Whatever does decode must re-encode to the same message.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_proto::{ExportedSessionKey, GroupMessage, Message, PreKeyMessage, SessionKey};

fuzz_target!(|data: &[u8]| {
    let _ = Message::decode(data);
    let _ = GroupMessage::decode(data);
    let _ = SessionKey::from_bytes(data);

    if let Ok(message) = PreKeyMessage::decode(data) {
        let again =
            PreKeyMessage::decode(&message.encode()).expect("re-encoded prekey message decodes");
        assert_eq!(again, message);
    }

    if let Ok(key) = ExportedSessionKey::from_bytes(data) {
        assert_eq!(key.to_bytes().as_slice(), data);
    }
});
