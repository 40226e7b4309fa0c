#![deny(warnings)]

pub mod acoustic;
pub mod asr;
pub mod chat;
pub mod config;
pub mod decode;
pub mod feedback;
pub mod pipeline;
pub mod sentiment;
pub mod util;
