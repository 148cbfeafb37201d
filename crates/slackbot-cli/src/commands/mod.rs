pub mod pending;
pub mod run;
