mod basic;
pub mod io;

pub mod prelude {
    use crate::basic;
    pub use basic::*;

    pub use basic::ecs::prelude::*;
    pub use crate::io::{Element, ParseError, Profile, load_profile, load_profile_file};
}
