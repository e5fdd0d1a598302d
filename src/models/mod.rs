// src/models/mod.rs

pub mod proctoring;
pub mod question;
pub mod quiz;
pub mod submission;
