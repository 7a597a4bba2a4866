//! # wdmta
//!
//! WhatsApp-Discord Message Transfer Automation: a Discord bot that forwards
//! chat messages between WhatsApp groups and Discord channels, with a WuzAPI
//! server doing the WhatsApp side.

pub mod bindings;
pub mod cli;
pub mod config;
pub mod discord;
pub mod error;
pub mod logging;
pub mod relay;
pub mod whatsapp;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
