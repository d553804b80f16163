use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};


pub type ErrorStr = &'static str;
pub type ResultV = Result<(), ErrorStr>;

const CID_CHARSET: &[u8] = b"0123456789abcdef";

pub fn generate_hex_id(length: u32) -> String {
    let mut rng = rand::thread_rng();

    (0..length).map(
        |_| {
            let idx = rng.gen_range(0..CID_CHARSET.len());
            CID_CHARSET[idx] as char
        }
    ).collect()
}


fn current_duration() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("Time went backwards")
}

pub fn time_us() -> u128 {
    current_duration().as_micros()
}
