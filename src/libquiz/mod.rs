pub mod bank;
pub mod db;
pub mod domain;
pub mod flag;
pub mod item;
pub mod letter;
pub mod session;
