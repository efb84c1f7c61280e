//! Core data types for Custodia

pub mod action;
pub mod principal;
