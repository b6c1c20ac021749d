//! CLI Commands

pub mod check;
pub mod doctor;
pub mod list;
pub mod run;
