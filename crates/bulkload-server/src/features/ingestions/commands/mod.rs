pub mod delete;
pub mod reset;
pub mod submit;

pub use delete::DeleteIngestionCommand;
pub use reset::ResetIngestionCommand;
pub use submit::{SubmitIngestionCommand, SubmitIngestionResponse};
