//! Step Views

mod confirmation;
mod info;
mod payment;
mod plan;

pub use confirmation::ConfirmationStep;
pub use info::InfoStep;
pub use payment::PaymentStep;
pub use plan::PlanStep;
