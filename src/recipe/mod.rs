mod card;
mod config;
mod demos;
mod standard;

pub use card::{RandomSampler, TaskCard, TemplateIndex, Templates};
pub use config::RecipeConfig;
pub use demos::{AddDemosField, CreateDemosPool};
pub use standard::Recipe;
