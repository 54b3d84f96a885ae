// tests/common/mod.rs
//
// Shared by the integration test files; each compiles it separately and uses
// only part of it.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// Request to add two numbers.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddRequest {
    pub a: i32,
    pub b: i32,
}

/// Response containing the sum.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddResponse {
    pub sum: i32,
}

#[cfg(feature = "logging")]
mod imp {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }
}

#[cfg(not(feature = "logging"))]
mod imp {
    #[inline]
    pub fn init() {}
}

pub fn init_logging() {
    imp::init();
}
