mod client;
mod sign;
mod snapshot;
mod token;

pub use client::{ImouClient, ImouError};
