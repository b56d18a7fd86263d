//! Request handlers module

pub mod group;
