pub mod purchase_orders;
pub mod purchases;
pub mod root;
