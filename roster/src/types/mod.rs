//! Domain types flowing through the pipeline.

mod admin;
mod command;
mod notification;
mod staff;

pub use admin::{AdminId, AdminRecord, NewAdmin};
pub use command::{Command, CommandAction, Delivery, DeliveryId};
pub use notification::{NotificationEvent, NotificationId, NotificationPayload, PushFrame};
pub use staff::{
    NewStaff, SortOrder, StaffFields, StaffFilter, StaffId, StaffQuery, StaffRecord,
    StaffSortField,
};
