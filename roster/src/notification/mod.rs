//! Notification creation and delivery.

mod service;

pub use service::NotificationService;
