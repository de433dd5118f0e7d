pub mod run;
pub mod user;

pub use run::{Coordinate, Run, RunId};
pub use user::UserId;
