pub mod change_language;
pub mod email;
pub mod generate;

pub use change_language::{ChangeLanguageCommand, ChangeLanguageResponse};
pub use email::{EmailCarePlanCommand, EmailCarePlanResponse};
pub use generate::GenerateCarePlanCommand;
