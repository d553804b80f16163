use crate::utils::{generate_hex_id, time_us};


/// Correlation context for one accepted connection. The `cid` shows up in
/// every log line the connection produces, so interleaved workers can be
/// told apart in the log.
pub struct Context {
    pub cid: String,
    pub start_time_us: u128,
    pub finish_time_us: u128,
}

impl Context {
    pub fn new() -> Context {
        Context {
            cid: generate_hex_id(8),
            start_time_us: time_us(),
            finish_time_us: 0,
        }
    }

    /// Restart the timer for the next request on the same connection.
    pub fn reset(&mut self) {
        self.start_time_us = time_us();
        self.finish_time_us = 0;
    }

    pub fn fix(&mut self) {
        self.finish_time_us = time_us();
    }

    pub fn time_ms(&self) -> f32 {
        ((self.finish_time_us - self.start_time_us) as f32) / 1000.0
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
