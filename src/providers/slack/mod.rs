mod client;
mod interaction;

pub use client::SlackClient;
pub use interaction::decode_interaction;
