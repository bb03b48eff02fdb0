pub mod capture;
pub mod cloak;
pub mod control;
pub mod output;
pub mod session;
