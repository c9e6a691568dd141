//! Built-in reaction models.

mod hodgkin_huxley;
mod passive;

pub use hodgkin_huxley::HodgkinHuxley1952;
pub use passive::PassiveMembrane;
