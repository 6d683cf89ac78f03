pub mod broker;
pub mod catalog;
pub mod course_auth;
pub mod enrollment;
pub mod registry;

pub use broker::{Broker, OfferingResponse};
pub use catalog::CourseCatalogClient;
pub use course_auth::CourseAuthenticator;
pub use enrollment::EnrollmentProxy;
pub use registry::ServiceRegistry;
