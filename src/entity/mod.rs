//! Entity module - SeaORM entity definitions

pub mod group;
