pub mod disputes;
pub mod listings;
pub mod order_items;
pub mod order_status_history;
pub mod orders;
pub mod payments;
pub mod users;

pub use disputes::Entity as Disputes;
pub use listings::Entity as Listings;
pub use order_items::Entity as OrderItems;
pub use order_status_history::Entity as OrderStatusHistory;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use users::Entity as Users;
