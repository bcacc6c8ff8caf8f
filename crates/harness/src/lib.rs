pub mod backoffice;
pub mod confirm;
pub mod shared;

pub use backoffice::TestBackoffice;
pub use confirm::ScriptedConfirm;
pub use shared::SharedDatabase;
