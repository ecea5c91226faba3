mod client;
pub mod links;

pub use client::GitLabClient;
