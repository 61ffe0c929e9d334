pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Actions, Decrypt, Encrypt, Init, Probe, Run, Set, Version};
