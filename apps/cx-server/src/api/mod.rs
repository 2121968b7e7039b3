pub mod meta;
pub mod notifications;
