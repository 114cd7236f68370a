//! Cross-context change-signal transport for Tessel.
//!
//! A [`ChangeSignalBus`] fans every published [`ChangeSignal`] out to all live
//! subscribers, including subscribers living in the publishing context. Each
//! subscriber owns a private FIFO queue, so signals from a single writer are
//! observed in publication order and a slow subscriber never loses signals.
//! Nothing is persisted: a subscriber only sees signals published while it is
//! subscribed.
//!
//! [`ChangeSignal`]: tessel_core::signal::ChangeSignal

mod bus;

pub use bus::{ChangeSignalBus, Subscription, SubscriptionId};
