pub mod batch_index;
pub mod config;
pub mod correct;
pub mod fsops;
pub mod layout;
pub mod locate;
pub mod manifest;
pub mod reel;
pub mod rename;
pub mod xml;

#[cfg(test)]
pub(crate) mod fixtures;
