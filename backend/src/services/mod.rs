//! Business logic services for the Site Stock Management Platform

pub mod category;
pub mod consumption;
pub mod history;
pub mod item;
pub mod schema;
pub mod stock_calc;

pub use category::CategoryService;
pub use consumption::{ConsumptionContext, ConsumptionService};
pub use history::HistoryService;
pub use item::ItemService;
