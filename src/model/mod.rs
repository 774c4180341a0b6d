//! Value types shared by the worker, the pricing store and consumers

pub mod buyout;
pub mod item;
pub mod location;
pub mod tabs;

pub use buyout::{Buyout, BuyoutSource, BuyoutType, Currency};
pub use item::{ElementType, FrameType, Item, SocketGroup};
pub use location::{Location, LocationKind, TabColour};
pub use tabs::{parse_tabs, TabInfo, TabSignature};
