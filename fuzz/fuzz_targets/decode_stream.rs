#![no_main]

use {
    gobwire::{Decoder, Error, Gob},
    libfuzzer_sys::fuzz_target,
    std::collections::{BTreeMap, HashMap},
};

#[derive(Gob, Debug, Default, PartialEq)]
struct Header {
    version: u8,
    flags: [bool; 4],
    tag: String,
}

#[derive(Gob, Debug, Default, PartialEq)]
struct Record {
    header: Header,
    ids: Vec<i64>,
    payload: Vec<u8>,
    labels: BTreeMap<String, u32>,
    children: Vec<Header>,
}

macro_rules! fuzz_roundtrip {
    ($data:expr, $ty:ty) => {
        if let Ok(value) = gobwire::deserialize::<$ty>($data) {
            let serialized = gobwire::serialize(&value).expect("serialize should succeed");
            let roundtrip: $ty =
                gobwire::deserialize(&serialized).expect("roundtrip deserialize should succeed");
            assert_eq!(value, roundtrip, "roundtrip failed for {}", stringify!($ty));
        }
    };
}

fuzz_target!(|data: &[u8]| {
    fuzz_roundtrip!(data, u64);
    fuzz_roundtrip!(data, String);
    fuzz_roundtrip!(data, Vec<i32>);
    fuzz_roundtrip!(data, HashMap<String, Vec<u8>>);
    fuzz_roundtrip!(data, Header);
    fuzz_roundtrip!(data, Record);

    // Walk the whole stream; after a content error the decoder must either
    // continue at the next message or report a terminal state.
    let mut dec = Decoder::new(data);
    for _ in 0..64 {
        match dec.skip() {
            Ok(()) => {}
            Err(Error::Eof | Error::Poisoned) => break,
            Err(_) if dec.is_poisoned() => break,
            Err(_) => {}
        }
    }
});
