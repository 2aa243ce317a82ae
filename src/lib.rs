pub mod approval;
pub mod config;
pub mod drafting;
pub mod error;
pub mod mailer;
pub mod research;
pub mod server;
pub mod shutdown;
pub mod workflow;
