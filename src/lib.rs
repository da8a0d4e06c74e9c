//! Round orchestration engine for a disc golf league Discord bot:
//! lifecycle state machine, cross-module RPC over a message bus, timer
//! scheduling and the scorecard import pipeline.

pub mod bus;
pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod import;
pub mod scheduler;
pub mod services;
pub mod state;
