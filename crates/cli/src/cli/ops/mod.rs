pub mod actions;
pub mod decrypt;
pub mod encrypt;
pub mod init;
pub mod probe;
pub mod run;
pub mod set;
pub mod version;

pub use actions::Actions;
pub use decrypt::Decrypt;
pub use encrypt::Encrypt;
pub use init::Init;
pub use probe::Probe;
pub use run::Run;
pub use set::Set;
pub use version::Version;
