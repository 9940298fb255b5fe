#![no_main]

use ldap_failover::protocol::decode::decode_message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut rest = data;

    // Several responses may arrive in one TCP segment
    while !rest.is_empty() {
        match decode_message(rest) {
            Ok((_, consumed)) => {
                assert!(consumed > 0 && consumed <= rest.len());
                rest = &rest[consumed..];
            }
            Err(_) => break,
        }
    }
});
