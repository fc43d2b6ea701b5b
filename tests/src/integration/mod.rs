//! # Integration Flows
//!
//! The routing actor driven against an in-process network of simulated
//! nodes: seeds answer pings, lookups return the true closest nodes and
//! report them as learned.

pub mod sim;

#[cfg(test)]
mod flows;
