#![no_main]
use libfuzzer_sys::fuzz_target;
use ppef::Sequence;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the parser; anything it accepts
    // must decode and survive a byte round-trip.
    if let Ok(seq) = Sequence::from_bytes(data) {
        let values = seq.decode().expect("accepted sequence must decode");
        assert_eq!(values.len() as u64, seq.len());

        let bytes = seq.to_bytes();
        let reloaded = Sequence::from_bytes(&bytes).expect("re-serialized bytes must parse");
        assert_eq!(reloaded.decode().unwrap(), values);
    }
});
