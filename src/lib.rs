//! Threshold alerts for instrument prices.
//!
//! A [`monitor::Monitor`] polls a quote service on a fixed cadence, keeps a
//! bounded price history per instrument, and raises a sell or buy alert once
//! per threshold crossing.

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod ui;
