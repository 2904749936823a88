pub mod blocklist;
pub mod example;
