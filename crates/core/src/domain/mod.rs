pub mod channel;
pub mod cooldown;
pub mod message;
pub mod office_hours;
