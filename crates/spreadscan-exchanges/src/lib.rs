//! Venue adapters.
//!
//! Every adapter follows the same contract: fetch the venue's endpoints
//! concurrently, abort on any transport/status/decode failure without
//! writing, normalize into the canonical snapshot records (defensive
//! numeric parsing, per-column sanitization, separator-stripped symbols,
//! rows with non-positive prices dropped), then hand the batch to the
//! snapshot writer in one transaction. What differs per venue is only the
//! endpoint set, the payload shape, and a handful of unit conventions.

pub mod client;
pub mod signing;

pub mod backpack;
pub mod binance;
pub mod bitget;
pub mod bybit;
pub mod gate;
pub mod huobi;
pub mod kraken;
pub mod kucoin;
pub mod mexc;
pub mod okx;
pub mod whitebit;
