#![no_main]
use libfuzzer_sys::fuzz_target;
use ppef::{BitReader, BitWriter};

fuzz_target!(|data: Vec<(u64, u8)>| {
    let items: Vec<(u64, u32)> = data
        .into_iter()
        .map(|(v, w)| (v, u32::from(w) % 65))
        .collect();

    let mut writer = BitWriter::new();
    for &(v, w) in &items {
        writer.put(v, w);
    }
    let words = writer.into_words();

    let mut reader = BitReader::new(&words);
    for &(v, w) in &items {
        let expect = if w == 64 { v } else { v & ((1u64 << w) - 1) };
        assert_eq!(reader.get(w), expect);
    }
});
