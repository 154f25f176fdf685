//! Trade group value objects.

mod group_state;
mod leg_kind;
mod order_side;
mod position_side;

pub use group_state::GroupState;
pub use leg_kind::LegKind;
pub use order_side::OrderSide;
pub use position_side::PositionSide;
