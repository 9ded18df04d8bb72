#![no_main]

use libfuzzer_sys::fuzz_target;
use lobby_session::interpreter::EventInterpreter;
use lobby_session::protocol::LobbyEvent;

fuzz_target!(|data: &[u8]| {
    let Ok(event) = serde_json::from_slice::<LobbyEvent>(data) else {
        return;
    };

    // Any event that decodes must interpret without panicking, whichever
    // participant is local.
    let interpreter = EventInterpreter::new(true);
    let _ = interpreter.interpret("fuzz", event.clone(), "Alice");
    let _ = interpreter.interpret("fuzz", event, "");
});
