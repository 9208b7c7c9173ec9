pub mod delivery;
pub mod live;

pub use delivery::Delivery;
pub use live::LiveChannel;
