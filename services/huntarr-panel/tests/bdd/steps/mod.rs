//! BDD step definitions for the huntarr panel

pub mod activation_steps;
pub mod countdown_steps;
pub mod history_steps;
pub mod reset_steps;
