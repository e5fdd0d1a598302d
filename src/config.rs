// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;

/// How often the session clock recomputes the remaining time.
pub const CLOCK_TICK_MILLIS: u64 = 1000;

/// Cadence of proctoring captures while a session is in progress.
pub const CAPTURE_INTERVAL_SECS: u64 = 20;

/// Captured frames are downscaled to at most this width (aspect ratio kept).
pub const CAPTURE_MAX_WIDTH: u32 = 320;

/// JPEG quality (1-100) used when re-encoding a captured frame.
pub const CAPTURE_JPEG_QUALITY: u8 = 70;

/// Subtracted from the server-issued end time so the client always submits
/// before the server's own cutoff.
pub const DEADLINE_SKEW_SECS: u64 = 2;

/// No samples are taken or accepted once fewer than this many seconds remain.
pub const SAMPLE_CUTOFF_SECS: i64 = 30;

/// Upper bound for one uploaded proctoring sample.
pub const MAX_SAMPLE_BYTES: usize = 1024 * 1024;

/// Grace period after `sessionEndTime` during which a submission is still accepted.
pub const SUBMISSION_GRACE_SECS: i64 = 0;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub seed_demo_quiz: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let seed_demo_quiz = env::var("SEED_DEMO_QUIZ")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            seed_demo_quiz,
        }
    }
}
