pub mod booking;
pub mod candidate;
pub mod presentation;
pub mod reference;
pub mod rejection;
pub mod session;
pub mod step;

pub use booking::{Appointment, AppointmentStatus, BookingFields, ClockTime, StepValue, VisitType};
pub use candidate::{CandidateRecord, ExtractedFields};
pub use presentation::{CalendarProps, ChoiceOption, StepOptions};
pub use reference::{Department, Doctor, Patient, ScheduleSlot};
pub use rejection::{Rejection, RejectionReason};
pub use session::{AgentMode, Role, Session, SessionPatch, SessionStatus, Turn};
pub use step::Step;
