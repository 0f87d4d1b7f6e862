pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{OrderSide, SymbolState, Trigger, UsdtGate};
pub use error::CoreError;
pub use structs::{decimal_places, BalanceUpdate, Order, PriceTick, ProfitSnapshot};
