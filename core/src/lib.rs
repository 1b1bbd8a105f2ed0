pub mod category;
pub mod error;
pub mod insights;
pub mod notifications;
pub mod parse;
