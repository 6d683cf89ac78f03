pub mod broker_request;
pub mod institution;
pub mod offering;

pub use broker_request::BrokerRequest;
pub use institution::{
    CourseAuthentication, CourseAuthenticationMode, EnrollmentRequest, Institution,
    InstitutionConfig, SanitizedInstitution,
};
pub use offering::Offering;
