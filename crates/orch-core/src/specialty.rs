//! The closed vocabulary of worker specialties.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of worker that should execute a task.
///
/// Closed vocabulary per the task model: a task's specialty selects which
/// per-specialty queue it lands in and which worker pool drains it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Specialty {
    Frontend,
    Backend,
    Testing,
    Docs,
    Infra,
    Integration,
}

impl Specialty {
    /// All known specialties, in a stable order.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Frontend,
            Self::Backend,
            Self::Testing,
            Self::Docs,
            Self::Infra,
            Self::Integration,
        ]
    }
}
