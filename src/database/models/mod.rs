pub mod classroom;
pub mod school;
pub mod session;
pub mod student;
pub mod user;

pub use classroom::{Classroom, ClassroomChanges, NewClassroom};
pub use school::{NewSchool, School, SchoolChanges};
pub use session::Session;
pub use student::{NewStudent, Student, StudentChanges};
pub use user::{NewUser, ProfileChanges, User};
