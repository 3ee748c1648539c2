#![allow(dead_code)]

pub mod server;
pub mod socket_guard;
