pub mod anilist;
pub mod error;
pub mod traits;

pub use error::ProviderError;
pub use traits::{
    AiringSchedule, EditOptions, ListEntry, ListFilter, ListPlugin, ListStatus, ScheduleSource,
};
