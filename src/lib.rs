// Quizlink player client library

pub mod client;
pub mod core;
