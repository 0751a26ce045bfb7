pub mod capacity;
pub mod member_finder;
