//! Care plans: generation, language changes, speech, documents and email
//!
//! Plans are kept per caller and patient in the [`CarePlanStore`]; every
//! route other than generation works from the stored plan.
//!
//! [`CarePlanStore`]: crate::state::CarePlanStore

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{
    ChangeLanguageCommand, ChangeLanguageResponse, EmailCarePlanCommand, EmailCarePlanResponse,
    GenerateCarePlanCommand,
};
pub use routes::care_plans_routes;
