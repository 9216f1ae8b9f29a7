pub mod account;
pub mod auth;
pub mod ballot;
pub mod mongodb;
pub mod pagination;
pub mod question;
pub mod receipt;
pub mod tally;
