// src/handlers/mod.rs

pub mod proctoring;
pub mod quiz;
pub mod review;
