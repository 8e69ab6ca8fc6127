#![no_main]

use chronos_resp::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try to parse the input as a RESP command
    if let Ok((command, consumed)) = Command::parse(data) {
        // Consumed bytes must stay within the input
        assert!(consumed <= data.len());

        // The command name is always a known verb
        let name = command.name();
        assert!(!name.is_empty());

        // Argument slices must be walkable without panics
        match &command {
            Command::Del { keys } => {
                for key in keys {
                    assert!(key.len() <= data.len());
                }
            }
            Command::Set { key, value, ex, px } => {
                assert!(key.len() <= data.len());
                assert!(value.len() <= data.len());
                let _ = (ex, px);
            }
            Command::Get { key }
            | Command::Ttl { key }
            | Command::Expire { key, .. } => {
                assert!(key.len() <= data.len());
            }
            Command::Keys { pattern } => {
                assert!(pattern.len() <= data.len());
            }
            _ => {}
        }
    }
    // Parse errors are expected for malformed input - not a bug
});
