pub mod appointment;
pub mod master;
pub mod service;
pub mod session;

pub use appointment::{Appointment, AppointmentStatus, AppointmentView, BookingRequest};
pub use master::Master;
pub use service::Service;
pub use session::{BookingSession, BookingStep};
