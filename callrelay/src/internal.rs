mod fatal;
mod panic_payload;
mod relay;
pub(crate) mod runner;

pub(crate) use fatal::fatal;
pub(crate) use panic_payload::{normalize_message, panic_value, raise};
pub(crate) use relay::Relay;
