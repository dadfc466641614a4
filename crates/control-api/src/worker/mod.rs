//! Signed client for the runner's private surface.

mod client;

pub(crate) use client::*;
